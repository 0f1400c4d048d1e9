// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Composition Root
//!
//! Wires every adapter implementing a domain repository trait or an
//! application-layer outbound port, then dispatches the CLI's validated
//! command to its use case. The nine `ValidatedCommand` variants are this
//! binary's entire operator-facing surface; the chunk processor, aggregator,
//! and failure router use cases are triggered by object-store events in the
//! deployed system rather than invoked here, and are reached only through
//! the `billpipe` library crate.

use std::ops::Range;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{error, info};

use billpipe_bootstrap::cli::{ValidatedReviewCommand, ValidatedUbiCommand};
use billpipe_bootstrap::{bootstrap_cli, result_to_exit_code, ValidatedCli, ValidatedCommand};

use billpipe::application::ports::{EntrataClient, LlmClient, NameMatcher};
use billpipe::application::use_cases::chunk_splitter::ChunkSplitterUseCase;
use billpipe::application::use_cases::enricher::EnricherUseCase;
use billpipe::application::use_cases::entrata_poster::EntrataPosterUseCase;
use billpipe::application::use_cases::review::ReviewUseCase;
use billpipe::application::use_cases::router::RouterUseCase;
use billpipe::application::use_cases::standard_parser::StandardParserUseCase;
use billpipe::application::use_cases::ubi_engine::UbiEngineUseCase;
use billpipe::infrastructure::config::AppConfig;
use billpipe::infrastructure::entrata_client::HttpEntrataClient;
use billpipe::infrastructure::llm_client::GeminiLlmClient;
use billpipe::infrastructure::logging::init_logging;
use billpipe::infrastructure::metrics::MetricsService;
use billpipe::infrastructure::name_matcher::GeminiNameMatcher;
use billpipe::infrastructure::object_store::FilesystemObjectStore;
use billpipe::infrastructure::repositories::{
    SqliteErrorRepository, SqliteJobRepository, SqliteReviewRepository, SqliteRoutingLogRepository, SqliteUbiRepository,
};
use billpipe_domain::entities::{UbiAssignment, UbiPeriod};
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::{ErrorRepository, JobRepository, ObjectStore, ReviewRepository, RoutingLogRepository, UbiRepository};
use billpipe_domain::services::{GlRuleTable, KeyPool};
use billpipe_domain::value_objects::JobId;

/// A UBI stats/master-bills scan with no caller-supplied lower bound covers
/// this entire window rather than "all time", which `NaiveDate` has no
/// representation for.
const WIDE_RANGE_START: &str = "1970-01-01";
const WIDE_RANGE_END: &str = "2999-12-31";

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let validated_cli = match bootstrap_cli() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("CLI Error: {e}");
            return std::process::ExitCode::from(65); // EX_DATAERR
        }
    };

    let result = run(validated_cli).await;
    result_to_exit_code(result)
}

async fn run(cli: ValidatedCli) -> Result<(), PipelineError> {
    let config = AppConfig::load(cli.config.as_ref().and_then(|p| p.to_str()))?;
    init_logging(!cli.verbose);

    let metrics = MetricsService::new()?;

    let object_store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(config.bucket.clone()));

    let pool = SqlitePoolOptions::new()
        .connect(&config.database_url)
        .await
        .map_err(|e| PipelineError::DatabaseError(e.to_string()))?;
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| PipelineError::DatabaseError(e.to_string()))?;

    let error_repository: Arc<dyn ErrorRepository> = Arc::new(SqliteErrorRepository::new(pool.clone()));
    let job_repository: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(pool.clone()));
    let review_repository: Arc<dyn ReviewRepository> = Arc::new(SqliteReviewRepository::new(pool.clone()));
    let routing_log: Arc<dyn RoutingLogRepository> = Arc::new(SqliteRoutingLogRepository::new(pool.clone()));
    let ubi_repository: Arc<dyn UbiRepository> = Arc::new(SqliteUbiRepository::new(pool));

    let llm_client: Arc<dyn LlmClient> = Arc::new(GeminiLlmClient::new(config.llm_base_url.clone(), config.llm_model.clone()));
    let name_matcher: Arc<dyn NameMatcher> = Arc::new(GeminiNameMatcher::new(config.llm_base_url.clone(), config.llm_model.clone()));
    let entrata_client: Arc<dyn EntrataClient> = Arc::new(HttpEntrataClient::new(
        config.entrata_base_url.clone(),
        config.entrata_username.clone(),
        config.entrata_password.clone(),
    ));

    info!(command = ?cli.command, "dispatching command");

    match cli.command {
        ValidatedCommand::Route { key } => {
            let router = RouterUseCase::new(object_store, routing_log, config.max_pages_standard, config.max_size_mb_standard);
            let dest = run_use_case(&metrics, "router", router.execute(&key)).await?;
            println!("routed to {}", dest.full_key());
        }
        ValidatedCommand::Parse { key } => {
            let key_pool = KeyPool::new(config.llm_api_keys.clone())?;
            let parser = StandardParserUseCase::new(
                object_store,
                error_repository,
                llm_client,
                key_pool,
                config.retry_config(),
                config.max_dropped_rows_before_retry as usize,
            );
            match run_use_case(&metrics, "standard_parser", parser.execute(&key)).await? {
                Some(dest) => println!("parsed to {}", dest.full_key()),
                None => println!("parser dropped every row in {key}; no output written"),
            }
        }
        ValidatedCommand::Split { key } => {
            let splitter = ChunkSplitterUseCase::new(object_store, job_repository, config.pages_per_chunk);
            let job_id = run_use_case(&metrics, "chunk_splitter", splitter.execute(&key)).await?;
            println!("job {job_id} registered");
        }
        ValidatedCommand::JobStatus { job_id } => {
            let job_id = JobId::from_string(&job_id)?;
            let job = job_repository
                .find(&job_id)
                .await?
                .ok_or_else(|| PipelineError::NotFound(format!("job {job_id}")))?;
            println!(
                "job {job_id}: {:?} ({}/{} chunks complete)",
                job.status(),
                job.chunks_completed(),
                job.total_chunks()
            );
        }
        ValidatedCommand::Enrich { pdf_id } => {
            // The full object-store key doubles as the CLI's batch identifier
            // here: `PdfId` is a one-way hash of that key with no reverse
            // index, so there is no way to recover a key from a bare id.
            let full_key = pdf_id;
            let matcher_key_pool = KeyPool::new(config.llm_api_keys.clone())?;
            let enricher = EnricherUseCase::new(object_store, name_matcher, matcher_key_pool, GlRuleTable::default_table());
            let dest = run_use_case(&metrics, "enricher", enricher.execute(&full_key)).await?;
            println!("enriched to {dest}");
        }
        ValidatedCommand::Review { command } => {
            let review = ReviewUseCase::new(object_store, review_repository);
            run_review_command(&review, command).await?;
        }
        ValidatedCommand::PostEntrata { keys, vendor_override, post_month } => {
            let poster = EntrataPosterUseCase::new(object_store.clone(), error_repository, entrata_client);
            for key in keys {
                if vendor_override.is_some() || post_month.is_some() {
                    apply_entrata_overrides(object_store.as_ref(), &key, vendor_override.as_deref(), post_month.as_deref()).await?;
                }
                let dest = run_use_case(&metrics, "entrata_poster", poster.execute(&key)).await?;
                println!("posted {key} -> {}", dest.full_key());
            }
        }
        ValidatedCommand::Ubi { command } => {
            let engine = UbiEngineUseCase::new(object_store, ubi_repository);
            run_ubi_command(&engine, command).await?;
        }
        ValidatedCommand::ValidateConfig { config: path } => {
            AppConfig::load(path.to_str())?;
            println!("configuration at {} is valid", path.display());
        }
    }

    Ok(())
}

/// Times one use-case call, recording it with `metrics` under `stage` and
/// forwarding the error (if any) to the error counter before propagating it.
async fn run_use_case<T>(metrics: &MetricsService, stage: &str, future: impl std::future::Future<Output = Result<T, PipelineError>>) -> Result<T, PipelineError> {
    let started = std::time::Instant::now();
    match future.await {
        Ok(value) => {
            metrics.record_object_processed(stage);
            metrics.observe_stage_duration(started.elapsed().as_secs_f64());
            Ok(value)
        }
        Err(e) => {
            metrics.record_error(&e);
            error!(stage, error = %e, "use case failed");
            Err(e)
        }
    }
}

async fn run_review_command(review: &ReviewUseCase, command: ValidatedReviewCommand) -> Result<(), PipelineError> {
    match command {
        ValidatedReviewCommand::Start { pdf_id } => {
            let count = review.start(&pdf_id, "cli", Utc::now()).await?;
            println!("started review on {count} lines");
        }
        ValidatedReviewCommand::Override { pdf_id: _, line_id, field, value } => {
            review.set_override(&line_id, &field, &value).await?;
            println!("recorded override on {line_id}");
        }
        ValidatedReviewCommand::Submit { pdf_id } => {
            let dest = review.submit(&pdf_id).await?;
            println!("submitted to {dest}");
        }
    }
    Ok(())
}

async fn run_ubi_command(engine: &UbiEngineUseCase, command: ValidatedUbiCommand) -> Result<(), PipelineError> {
    match command {
        ValidatedUbiCommand::Assign { key, ubi_code } => {
            let assignment = cli_assignment(&key.line_hash, &key.period, &ubi_code)?;
            engine.assign(&key.line_hash, &ubi_code, std::slice::from_ref(&assignment), None).await?;
            println!("assigned {} for {}", key.line_hash, key.period);
        }
        ValidatedUbiCommand::Reassign { key, ubi_code } => {
            let period = UbiPeriod::parse(&key.period)?;
            let updated = cli_assignment(&key.line_hash, &key.period, &ubi_code)?;
            engine.reassign(&key.line_hash, &period, updated, None).await?;
            println!("reassigned {} for {}", key.line_hash, key.period);
        }
        ValidatedUbiCommand::Unassign { key } => {
            let period = UbiPeriod::parse(&key.period)?;
            engine.unassign(&key.line_hash, &period, None).await?;
            println!("unassigned {} for {}", key.line_hash, key.period);
        }
        ValidatedUbiCommand::Archive { key } => {
            engine.archive(&key.line_hash).await?;
            println!("archived {}", key.line_hash);
        }
        ValidatedUbiCommand::Suggest { property_id } => {
            for suggestion in engine.suggest(&property_id).await? {
                println!("{} {} ${:.2}", suggestion.line_hash, suggestion.period.as_str(), suggestion.amount);
            }
        }
        ValidatedUbiCommand::ListUnassigned { date } => print_rows(engine.list_unassigned(single_day_range(&date)?).await?),
        ValidatedUbiCommand::ListAssigned { date } => print_rows(engine.list_assigned(single_day_range(&date)?).await?),
        ValidatedUbiCommand::ListArchived { date } => print_rows(engine.list_archived(single_day_range(&date)?).await?),
        ValidatedUbiCommand::Stats { property_id } => {
            let stats = engine.stats_by_property(wide_range()?).await?;
            for row in stats.into_iter().filter(|row| row.property_id == property_id) {
                println!("{}: {} unassigned file(s)", row.property_id, row.unassigned_file_count);
            }
        }
        ValidatedUbiCommand::MasterBills { from, to } => {
            let range = parse_date(&from)?..parse_date(&to)?;
            for row in engine.master_bills(range).await? {
                println!("{} total ${:.2}", row.key(), row.total_charge);
            }
        }
    }
    Ok(())
}

/// The CLI's flattened `--line-hash`/`--period`/`ubi_code` surface carries no
/// line body and no per-period amount, so this fills in a single-period
/// assignment with placeholder billing figures; `assigned_by` records that
/// the row came from a direct CLI call rather than the review workflow.
fn cli_assignment(line_hash: &str, period: &str, ubi_code: &str) -> Result<UbiAssignment, PipelineError> {
    Ok(UbiAssignment {
        line_hash: line_hash.to_string(),
        property_id: ubi_code.to_string(),
        period: UbiPeriod::parse(period)?,
        amount: 0.0,
        months_total: 1,
        assigned_by: "cli".to_string(),
        assigned_date: Utc::now(),
    })
}

fn print_rows(rows: Vec<Value>) {
    for row in rows {
        println!("{row}");
    }
}

fn parse_date(date: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| PipelineError::validation(format!("invalid date {date:?}: {e}")))
}

fn single_day_range(date: &str) -> Result<Range<NaiveDate>, PipelineError> {
    let day = parse_date(date)?;
    let next = day.succ_opt().ok_or_else(|| PipelineError::validation(format!("date {date:?} has no successor")))?;
    Ok(day..next)
}

fn wide_range() -> Result<Range<NaiveDate>, PipelineError> {
    Ok(parse_date(WIDE_RANGE_START)?..parse_date(WIDE_RANGE_END)?)
}

/// Patches the "Vendor Name"/"Bill Date" fields of every line in a Stage 6
/// batch in place before posting, bridging the CLI's `post-entrata
/// --vendor-override`/`--post-month` flags onto
/// [`EntrataPosterUseCase::execute`], which posts the batch as written and
/// accepts no override parameters of its own.
async fn apply_entrata_overrides(
    object_store: &dyn ObjectStore,
    key: &str,
    vendor_override: Option<&str>,
    post_month: Option<&str>,
) -> Result<(), PipelineError> {
    let bytes = object_store.get(key).await?;
    let text = String::from_utf8_lossy(&bytes);

    let mut patched_lines = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let mut record: Value = serde_json::from_str(line)?;
        if let Some(vendor) = vendor_override {
            if let Some(map) = record.as_object_mut() {
                map.insert("Vendor Name".to_string(), Value::String(vendor.to_string()));
            }
        }
        if let Some(month) = post_month {
            if let Some(map) = record.as_object_mut() {
                map.insert("Bill Date".to_string(), Value::String(month.to_string()));
            }
        }
        patched_lines.push(record.to_string());
    }

    object_store.put(key, patched_lines.join("\n").into_bytes()).await
}
