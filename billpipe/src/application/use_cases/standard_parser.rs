// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Standard Parser Use Case
//!
//! Spec §4.2. Single-call LLM extraction for a PDF the router judged small
//! enough to process in one invocation: build the pipe-delimited extraction
//! prompt, call the LLM with key rotation and a self-correction pass on
//! retry, normalize and date-format the resulting rows, and land the output
//! NDJSON under `Stage3_ParsedOutputs/`.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde_json::json;

use billpipe_domain::entities::ErrorRecord;
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::{ErrorRepository, ObjectStore};
use billpipe_domain::services::{
    backoff_delay, normalize_date, parse_reply, propagate_header_fields, should_retry, BillKind, ColumnSchema,
    KeyPool, RetryConfig,
};
use billpipe_domain::value_objects::{ObjectKey, PdfId, StagePrefix};
use billpipe_domain::entities::LineRecord;

use crate::application::ports::LlmClient;

use super::support::{count_pdf_pages, object_key_under, propagate_sidecars};

const STANDARD_MIME_TYPE: &str = "application/pdf";

pub struct StandardParserUseCase {
    object_store: Arc<dyn ObjectStore>,
    error_repository: Arc<dyn ErrorRepository>,
    llm_client: Arc<dyn LlmClient>,
    key_pool: KeyPool,
    retry_config: RetryConfig,
    max_dropped_rows_before_retry: usize,
}

impl StandardParserUseCase {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        error_repository: Arc<dyn ErrorRepository>,
        llm_client: Arc<dyn LlmClient>,
        key_pool: KeyPool,
        retry_config: RetryConfig,
        max_dropped_rows_before_retry: usize,
    ) -> Self {
        Self {
            object_store,
            error_repository,
            llm_client,
            key_pool,
            retry_config,
            max_dropped_rows_before_retry,
        }
    }

    pub async fn execute(&self, full_key: &str) -> Result<Option<ObjectKey>, PipelineError> {
        let source = object_key_under(full_key, StagePrefix::Stage1Standard)?;
        let bytes = self.object_store.get(full_key).await?;
        let kind = bill_kind_for(full_key);
        let schema = ColumnSchema::for_kind(kind);
        let hints = self.read_hints(&source).await?;

        match self.extract_with_retry(&bytes, schema, hints.as_deref()).await {
            Ok(mut rows) => {
                propagate_header_fields(&mut rows, schema, header_columns_for(kind));
                normalize_dates(&mut rows, schema);

                let dest = if rows.is_empty() {
                    None
                } else {
                    let pdf_id = PdfId::from_object_key(full_key);
                    let page_count = count_pdf_pages(&bytes).unwrap_or(1).max(1);
                    let records = build_records(&pdf_id, rows, schema, page_count)?;
                    Some(self.write_output(&source, &records, Utc::now()).await?)
                };

                self.archive_input(&source).await?;
                Ok(dest)
            }
            Err(error) => {
                self.fail(&source, &error).await?;
                Err(error)
            }
        }
    }

    async fn extract_with_retry(
        &self,
        bytes: &[u8],
        schema: &ColumnSchema,
        hints: Option<&str>,
    ) -> Result<Vec<Vec<String>>, PipelineError> {
        let mut attempt: u32 = 0;
        let mut previous_reply: Option<String> = None;

        loop {
            attempt += 1;
            let api_key = self.key_pool.key_for_attempt(attempt - 1);
            let prompt = build_prompt(schema, hints, previous_reply.as_deref());

            match self.llm_client.extract(api_key, &prompt, bytes, STANDARD_MIME_TYPE).await {
                Ok(reply) => {
                    let outcome = parse_reply(&reply, schema);
                    if outcome.dropped > self.max_dropped_rows_before_retry {
                        if should_retry(&self.retry_config, attempt) {
                            previous_reply = Some(reply);
                            continue;
                        }
                        return Err(PipelineError::Exhausted(format!(
                            "standard parser dropped {} rows (over the {} threshold) after {attempt} attempts",
                            outcome.dropped, self.max_dropped_rows_before_retry
                        )));
                    }
                    return Ok(outcome.rows);
                }
                Err(error) if error.is_recoverable() || matches!(error, PipelineError::RateLimit(_)) => {
                    if !should_retry(&self.retry_config, attempt) {
                        return Err(PipelineError::Exhausted(format!(
                            "standard parser exhausted after {attempt} attempts: {error}"
                        )));
                    }
                    tokio::time::sleep(backoff_delay(&self.retry_config, attempt, jitter_fraction())).await;
                    previous_reply = None;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn read_hints(&self, source: &ObjectKey) -> Result<Option<String>, PipelineError> {
        for ext in [".rework.json", ".notes.json"] {
            let sidecar = source.sidecar(ext);
            if self.object_store.head(&sidecar.full_key()).await?.is_some() {
                let bytes = self.object_store.get(&sidecar.full_key()).await?;
                return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
            }
        }
        Ok(None)
    }

    async fn write_output(
        &self,
        source: &ObjectKey,
        records: &[LineRecord],
        now: DateTime<Utc>,
    ) -> Result<ObjectKey, PipelineError> {
        let dest = output_key(source, now);
        let ndjson = records
            .iter()
            .map(|record| record.to_json().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        self.object_store.put(&dest.full_key(), ndjson.into_bytes()).await?;
        Ok(dest)
    }

    async fn archive_input(&self, source: &ObjectKey) -> Result<(), PipelineError> {
        let dest = source.rekeyed(StagePrefix::Stage2ParsedInputs);
        self.object_store.copy(&source.full_key(), &dest.full_key()).await?;
        propagate_sidecars(self.object_store.as_ref(), source, StagePrefix::Stage2ParsedInputs).await?;
        self.object_store.delete(&source.full_key()).await?;
        Ok(())
    }

    async fn fail(&self, source: &ObjectKey, error: &PipelineError) -> Result<(), PipelineError> {
        let dest = source.rekeyed(StagePrefix::Failed);
        self.object_store.copy(&source.full_key(), &dest.full_key()).await?;
        self.object_store.delete(&source.full_key()).await?;

        let payload = json!({
            "error_category": error.category(),
            "error_message": error.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        let sidecar = dest.sidecar(".error.json");
        self.object_store.put(&sidecar.full_key(), serde_json::to_vec_pretty(&payload)?).await?;

        let record = ErrorRecord::new(dest.full_key(), error.category().to_string(), error.to_string(), Utc::now());
        self.error_repository.record(&record).await?;
        Ok(())
    }
}

fn jitter_fraction() -> f64 {
    0.5 + rand::random::<f64>() * 0.5
}

fn bill_kind_for(full_key: &str) -> BillKind {
    if full_key.to_lowercase().contains("legal") {
        BillKind::Legal
    } else {
        BillKind::Utility
    }
}

/// Columns treated as uniform across every row in a document, back-filled
/// from the majority non-empty value (spec §4.2/§4.5).
fn header_columns_for(kind: BillKind) -> &'static [&'static str] {
    match kind {
        BillKind::Utility => &[
            "Bill To Name First Line",
            "Bill To Name Second Line",
            "Vendor Name",
            "Account Number",
            "Line Item Account Number",
            "Service Address",
            "Service City",
            "Service Zipcode",
            "Service State",
            "Invoice Number",
            "Bill Date",
            "Due Date",
        ],
        BillKind::Legal => &["Firm Name", "JRK Entity (Property)", "Invoice Number", "Terms"],
    }
}

fn normalize_dates(rows: &mut [Vec<String>], schema: &ColumnSchema) {
    for (index, column) in schema.columns.iter().enumerate() {
        if !column.contains("Date") {
            continue;
        }
        for row in rows.iter_mut() {
            if let Some(value) = row.get_mut(index) {
                *value = normalize_date(value);
            }
        }
    }
}

fn build_records(
    pdf_id: &PdfId,
    rows: Vec<Vec<String>>,
    schema: &ColumnSchema,
    page_count: u32,
) -> Result<Vec<LineRecord>, PipelineError> {
    rows.into_iter()
        .enumerate()
        .map(|(index, fields)| LineRecord::new(pdf_id.clone(), index as u32, schema.kind, fields, 1, page_count))
        .collect()
}

fn output_key(source: &ObjectKey, now: DateTime<Utc>) -> ObjectKey {
    let stem = std::path::Path::new(source.suffix())
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let suffix = format!(
        "yyyy={:04}/mm={:02}/dd={:02}/source=s3/{stem}.jsonl",
        now.year(),
        now.month(),
        now.day()
    );
    ObjectKey::new(StagePrefix::Stage3ParsedOutputs, suffix)
}

fn build_prompt(schema: &ColumnSchema, hints: Option<&str>, previous_reply: Option<&str>) -> String {
    let mut prompt = format!(
        "Extract every billing line item from this PDF as pipe-delimited rows with exactly \
         these {} fields, in order: {}. Emit the literal token EMPTY (and nothing else) if the \
         document has no matching line items.",
        schema.column_count(),
        schema.columns.join(" | "),
    );

    if let Some(hint) = hints {
        prompt.push_str(&format!("\n\nHints from a prior review pass:\n{hint}"));
    }

    if let Some(previous) = previous_reply {
        let excerpt: String = previous.chars().take(500).collect();
        prompt.push_str(&format!(
            "\n\nYour previous reply didn't normalize cleanly into {} columns per row. \
             Excerpt of that reply:\n{excerpt}\n\nRe-emit the full set of rows, each with \
             exactly {} pipe-delimited fields.",
            schema.column_count(),
            schema.column_count()
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::infrastructure::object_store::FilesystemObjectStore;

    struct ScriptedLlmClient {
        replies: std::sync::Mutex<Vec<Result<String, PipelineError>>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlmClient {
        async fn extract(&self, _api_key: &str, _prompt: &str, _bytes: &[u8], _mime: &str) -> Result<String, PipelineError> {
            self.replies.lock().unwrap().remove(0)
        }
    }

    struct NullErrorRepository;

    #[async_trait]
    impl ErrorRepository for NullErrorRepository {
        async fn record(&self, _error: &ErrorRecord) -> Result<(), PipelineError> {
            Ok(())
        }
        async fn list_for_date(&self, _date: &str) -> Result<Vec<ErrorRecord>, PipelineError> {
            Ok(Vec::new())
        }
    }

    fn utility_row(invoice: &str) -> String {
        let mut fields = vec![String::new(); ColumnSchema::for_kind(BillKind::Utility).column_count()];
        fields[2] = "Acme Power".to_string();
        fields[3] = invoice.to_string();
        fields[25] = "100.00".to_string();
        fields.join("|")
    }

    #[tokio::test]
    async fn happy_path_writes_stage3_output_and_archives_input() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        store.put("Stage1_Standard/acme/bill.pdf", b"%PDF-1.4".to_vec()).await.unwrap();

        let llm = Arc::new(ScriptedLlmClient {
            replies: std::sync::Mutex::new(vec![Ok(utility_row("INV1"))]),
        });
        let use_case = StandardParserUseCase::new(
            store.clone(),
            Arc::new(NullErrorRepository),
            llm,
            KeyPool::new(vec!["key-a".into()]).unwrap(),
            RetryConfig::default(),
            5,
        );

        let dest = use_case.execute("Stage1_Standard/acme/bill.pdf").await.unwrap();
        let dest = dest.expect("rows were parsed, so an output key is written");
        assert!(dest.full_key().starts_with("Stage3_ParsedOutputs/"));
        assert!(dest.full_key().ends_with("bill.jsonl"));

        let written = store.get(&dest.full_key()).await.unwrap();
        assert!(String::from_utf8(written).unwrap().contains("INV1"));

        assert!(store.head("Stage1_Standard/acme/bill.pdf").await.unwrap().is_none());
        assert!(store.head("Stage2_ParsedInputs/acme/bill.pdf").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_reply_writes_no_stage3_file_but_still_archives() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        store.put("Stage1_Standard/acme/bill.pdf", b"%PDF-1.4".to_vec()).await.unwrap();

        let llm = Arc::new(ScriptedLlmClient {
            replies: std::sync::Mutex::new(vec![Ok("EMPTY".to_string())]),
        });
        let use_case = StandardParserUseCase::new(
            store.clone(),
            Arc::new(NullErrorRepository),
            llm,
            KeyPool::new(vec!["key-a".into()]).unwrap(),
            RetryConfig::default(),
            5,
        );

        let dest = use_case.execute("Stage1_Standard/acme/bill.pdf").await.unwrap();
        assert!(dest.is_none());
        assert!(store.head("Stage2_ParsedInputs/acme/bill.pdf").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn exhausted_retries_move_input_to_failed_with_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        store.put("Stage1_Standard/acme/bill.pdf", b"%PDF-1.4".to_vec()).await.unwrap();

        let replies = (0..2).map(|_| Err(PipelineError::rate_limit("429"))).collect();
        let llm = Arc::new(ScriptedLlmClient { replies: std::sync::Mutex::new(replies) });
        let use_case = StandardParserUseCase::new(
            store.clone(),
            Arc::new(NullErrorRepository),
            llm,
            KeyPool::new(vec!["key-a".into()]).unwrap(),
            RetryConfig { max_attempts: 2, base_backoff: std::time::Duration::from_millis(1), chunk_stagger: std::time::Duration::ZERO },
            5,
        );

        let result = use_case.execute("Stage1_Standard/acme/bill.pdf").await;
        assert!(matches!(result, Err(PipelineError::Exhausted(_))));
        assert!(store.head("Stage1_Standard/acme/bill.pdf").await.unwrap().is_none());
        assert!(store.head("Failed/acme/bill.pdf").await.unwrap().is_some());
        assert!(store.head("Failed/acme/bill.error.json").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn schema_drift_that_never_clears_routes_to_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        store.put("Stage1_Standard/acme/bill.pdf", b"%PDF-1.4".to_vec()).await.unwrap();

        // Every reply line sanitizes to nothing but pipes, so every reply is
        // all-dropped; with max_attempts 1 there is no second attempt for
        // the drift to clear on.
        let all_dropped_reply = "|||||\n|||||\n|||||\n|||||\n|||||\n|||||".to_string();
        let llm = Arc::new(ScriptedLlmClient { replies: std::sync::Mutex::new(vec![Ok(all_dropped_reply)]) });
        let use_case = StandardParserUseCase::new(
            store.clone(),
            Arc::new(NullErrorRepository),
            llm,
            KeyPool::new(vec!["key-a".into()]).unwrap(),
            RetryConfig { max_attempts: 1, base_backoff: std::time::Duration::from_millis(1), chunk_stagger: std::time::Duration::ZERO },
            5,
        );

        let result = use_case.execute("Stage1_Standard/acme/bill.pdf").await;
        assert!(matches!(result, Err(PipelineError::Exhausted(_))));
        assert!(store.head("Stage1_Standard/acme/bill.pdf").await.unwrap().is_none());
        assert!(store.head("Failed/acme/bill.pdf").await.unwrap().is_some());
        assert!(store.head("Failed/acme/bill.error.json").await.unwrap().is_some());
    }
}
