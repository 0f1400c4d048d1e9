// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Processor Use Case
//!
//! Spec §4.4. Processes one chunk PDF under its job's coordination record:
//! staggers its start so a burst of chunks doesn't open LLM connections in
//! the same instant, extracts and validates its rows, and atomically marks
//! the chunk complete. A rate-limit response rotates keys immediately with
//! no backoff; any other recoverable failure or an over-threshold dropped-row
//! count retries with exponential jittered backoff. Exhausting the retry
//! budget leaves the job record untouched — the chunk is picked up again by
//! whatever re-delivers its creation event (spec §5 back-pressure policy).

use std::sync::Arc;

use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::{JobRepository, ObjectStore};
use billpipe_domain::services::{
    backoff_delay, normalize_date, parse_reply, should_retry, stagger_delay, BillKind, ColumnSchema, KeyPool,
    RetryConfig,
};
use billpipe_domain::value_objects::{JobId, ObjectKey, StagePrefix};

use crate::application::ports::LlmClient;

const CHUNK_MIME_TYPE: &str = "application/pdf";

pub struct ChunkProcessorUseCase {
    object_store: Arc<dyn ObjectStore>,
    job_repository: Arc<dyn JobRepository>,
    llm_client: Arc<dyn LlmClient>,
    key_pool: KeyPool,
    retry_config: RetryConfig,
    max_dropped_rows_before_retry: usize,
}

/// Outcome of processing one chunk: the result key it wrote, and whether
/// this was the job's final outstanding chunk (signalling the aggregator
/// should run next).
pub struct ChunkProcessorOutcome {
    pub result_key: ObjectKey,
    pub job_id: JobId,
    pub ready_for_aggregation: bool,
}

impl ChunkProcessorUseCase {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        job_repository: Arc<dyn JobRepository>,
        llm_client: Arc<dyn LlmClient>,
        key_pool: KeyPool,
        retry_config: RetryConfig,
        max_dropped_rows_before_retry: usize,
    ) -> Self {
        Self {
            object_store,
            job_repository,
            llm_client,
            key_pool,
            retry_config,
            max_dropped_rows_before_retry,
        }
    }

    /// Processes the chunk PDF at `chunk_key`
    /// (`Stage1_LargeFile_Chunks/<job_id>/chunk_NNN.pdf`).
    pub async fn execute(&self, chunk_key: &str) -> Result<ChunkProcessorOutcome, PipelineError> {
        let (job_id, chunk_num) = parse_chunk_key(chunk_key)?;

        let job = self
            .job_repository
            .find(&job_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("job {job_id} not found for chunk {chunk_key}")))?;

        let chunk = job
            .chunks()
            .iter()
            .find(|c| c.chunk_num == chunk_num)
            .ok_or_else(|| PipelineError::NotFound(format!("chunk {chunk_num} not registered in job {job_id}")))?
            .clone();

        tokio::time::sleep(stagger_delay(&self.retry_config, chunk_num)).await;

        let bytes = self.object_store.get(chunk_key).await?;
        let kind = bill_kind_for(job.source_file());
        let schema = ColumnSchema::for_kind(kind);

        let mut rows = self
            .extract_with_retry(&bytes, schema, job.bill_from(), job.previous_context())
            .await?;
        normalize_dates(&mut rows, schema);

        let payload = serde_json::json!({
            "chunk_num": chunk_num,
            "source_page_start": chunk.source_page_start,
            "source_page_end": chunk.source_page_end,
            "rows": rows,
        });
        let result_key = ObjectKey::new(
            StagePrefix::Stage1LargeFileResults,
            format!("{job_id}/chunk_{chunk_num:03}.json"),
        );
        self.object_store
            .put(&result_key.full_key(), serde_json::to_vec(&payload)?)
            .await?;

        let updated_job = self
            .job_repository
            .complete_chunk(&job_id, chunk_num, &result_key.full_key())
            .await?;
        let ready_for_aggregation = updated_job.chunks_completed() >= updated_job.total_chunks();

        Ok(ChunkProcessorOutcome {
            result_key,
            job_id,
            ready_for_aggregation,
        })
    }

    async fn extract_with_retry(
        &self,
        bytes: &[u8],
        schema: &ColumnSchema,
        bill_from: Option<&str>,
        previous_context: Option<&str>,
    ) -> Result<Vec<Vec<String>>, PipelineError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let api_key = self.key_pool.key_for_attempt(attempt - 1);
            let prompt = build_chunk_prompt(schema, bill_from, previous_context);

            match self.llm_client.extract(api_key, &prompt, bytes, CHUNK_MIME_TYPE).await {
                Ok(reply) => {
                    let outcome = parse_reply(&reply, schema);
                    if outcome.dropped > self.max_dropped_rows_before_retry {
                        if !should_retry(&self.retry_config, attempt) {
                            return Err(PipelineError::Exhausted(format!(
                                "chunk processor exhausted after {attempt} attempts with {} dropped rows",
                                outcome.dropped
                            )));
                        }
                        tokio::time::sleep(backoff_delay(&self.retry_config, attempt, jitter_fraction())).await;
                        continue;
                    }
                    return Ok(outcome.rows);
                }
                Err(PipelineError::RateLimit(_)) => {
                    if !should_retry(&self.retry_config, attempt) {
                        return Err(PipelineError::Exhausted(format!(
                            "chunk processor exhausted after {attempt} attempts (rate limited)"
                        )));
                    }
                    // Rate limit forces an immediate key rotation, no backoff sleep.
                    continue;
                }
                Err(error) if error.is_recoverable() => {
                    if !should_retry(&self.retry_config, attempt) {
                        return Err(PipelineError::Exhausted(format!(
                            "chunk processor exhausted after {attempt} attempts: {error}"
                        )));
                    }
                    tokio::time::sleep(backoff_delay(&self.retry_config, attempt, jitter_fraction())).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn jitter_fraction() -> f64 {
    0.5 + rand::random::<f64>() * 0.5
}

fn bill_kind_for(source_file: &str) -> BillKind {
    if source_file.to_lowercase().contains("legal") {
        BillKind::Legal
    } else {
        BillKind::Utility
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

fn build_chunk_prompt(schema: &ColumnSchema, bill_from: Option<&str>, previous_context: Option<&str>) -> String {
    let mut prompt = format!(
        "This PDF is one page-range chunk of a larger multi-page bill. Extract every billing \
         line item visible in this chunk as pipe-delimited rows with exactly these {} fields, \
         in order: {}. Emit the literal token EMPTY if this chunk has no line items.",
        schema.column_count(),
        schema.columns.join(" | "),
    );
    if let Some(bill_from) = bill_from {
        prompt.push_str(&format!("\n\nThe document's \"Bill From\" vendor is: {bill_from}."));
    }
    if let Some(context) = previous_context {
        prompt.push_str(&format!(
            "\n\nHeader fields already established from earlier chunks of this same document \
             (reuse them rather than re-inferring): {context}"
        ));
    }
    prompt
}

/// Parses `Stage1_LargeFile_Chunks/<job_id>/chunk_NNN.pdf` into its job id
/// and 0-based chunk number.
fn parse_chunk_key(chunk_key: &str) -> Result<(JobId, u32), PipelineError> {
    let suffix = chunk_key
        .strip_prefix(StagePrefix::Stage1LargeFileChunks.as_str())
        .ok_or_else(|| PipelineError::validation(format!("{chunk_key} is not under Stage1_LargeFile_Chunks/")))?;
    let (job_id_str, filename) = suffix
        .split_once('/')
        .ok_or_else(|| PipelineError::validation(format!("malformed chunk key {chunk_key}")))?;
    let job_id = JobId::from_string(job_id_str)?;

    let stem = filename.strip_suffix(".pdf").unwrap_or(filename);
    let chunk_num: u32 = stem
        .strip_prefix("chunk_")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| PipelineError::validation(format!("malformed chunk filename {filename}")))?;

    Ok((job_id, chunk_num))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use billpipe_domain::entities::{ChunkRecord, ParseJob};
    use crate::infrastructure::object_store::FilesystemObjectStore;

    #[test]
    fn parses_job_id_and_chunk_number_from_key() {
        let job_id = JobId::new();
        let key = format!("{}{job_id}/chunk_003.pdf", StagePrefix::Stage1LargeFileChunks.as_str());
        let (parsed_job_id, chunk_num) = parse_chunk_key(&key).unwrap();
        assert_eq!(parsed_job_id, job_id);
        assert_eq!(chunk_num, 3);
    }

    #[test]
    fn rejects_key_outside_chunk_prefix() {
        assert!(parse_chunk_key("Stage1_Standard/a.pdf").is_err());
    }

    struct InMemoryJobRepository {
        jobs: Mutex<std::collections::HashMap<JobId, ParseJob>>,
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn save(&self, job: &ParseJob) -> Result<(), PipelineError> {
            self.jobs.lock().unwrap().insert(job.job_id().clone(), job.clone());
            Ok(())
        }
        async fn find(&self, job_id: &JobId) -> Result<Option<ParseJob>, PipelineError> {
            Ok(self.jobs.lock().unwrap().get(job_id).cloned())
        }
        async fn complete_chunk(&self, job_id: &JobId, chunk_num: u32, result_key: &str) -> Result<ParseJob, PipelineError> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(job_id)
                .ok_or_else(|| PipelineError::NotFound(format!("job {job_id}")))?;
            job.complete_chunk(chunk_num, result_key.to_string())?;
            Ok(job.clone())
        }
    }

    struct ScriptedLlmClient {
        reply: String,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlmClient {
        async fn extract(&self, _api_key: &str, _prompt: &str, _bytes: &[u8], _mime: &str) -> Result<String, PipelineError> {
            Ok(self.reply.clone())
        }
    }

    fn utility_row(invoice: &str) -> String {
        let mut fields = vec![String::new(); ColumnSchema::for_kind(BillKind::Utility).column_count()];
        fields[2] = "Acme Power".to_string();
        fields[3] = invoice.to_string();
        fields[25] = "50.00".to_string();
        fields.join("|")
    }

    #[tokio::test]
    async fn execute_writes_result_and_completes_the_only_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));

        let mut job = ParseJob::new("Stage1_LargeFile/acme/bill.pdf", 1, 2);
        let job_id = job.job_id().clone();
        job.register_chunk(ChunkRecord {
            chunk_num: 0,
            chunk_key: format!("{}{job_id}/chunk_000.pdf", StagePrefix::Stage1LargeFileChunks.as_str()),
            source_page_start: 1,
            source_page_end: 2,
            result_key: None,
            completed: false,
        });

        let job_repository: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository {
            jobs: Mutex::new(std::collections::HashMap::from([(job_id.clone(), job)])),
        });

        let chunk_key = format!("{}{job_id}/chunk_000.pdf", StagePrefix::Stage1LargeFileChunks.as_str());
        store.put(&chunk_key, b"%PDF-1.4".to_vec()).await.unwrap();

        let use_case = ChunkProcessorUseCase::new(
            store.clone(),
            job_repository.clone(),
            Arc::new(ScriptedLlmClient { reply: utility_row("INV9") }),
            KeyPool::new(vec!["key-a".into()]).unwrap(),
            RetryConfig {
                max_attempts: 3,
                base_backoff: std::time::Duration::from_millis(1),
                chunk_stagger: std::time::Duration::ZERO,
            },
            5,
        );

        let outcome = use_case.execute(&chunk_key).await.unwrap();
        assert!(outcome.ready_for_aggregation);
        assert_eq!(outcome.job_id, job_id);

        let written = store.get(&outcome.result_key.full_key()).await.unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(payload["chunk_num"], 0);
        assert_eq!(payload["source_page_start"], 1);
        assert!(payload["rows"][0][3].as_str().unwrap() == "INV9");

        let refreshed = job_repository.find(&job_id).await.unwrap().unwrap();
        assert_eq!(refreshed.chunks_completed(), 1);
    }

    #[tokio::test]
    async fn rate_limit_rotates_keys_without_backoff_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));

        let mut job = ParseJob::new("Stage1_LargeFile/acme/bill.pdf", 2, 2);
        let job_id = job.job_id().clone();
        for n in 0..2u32 {
            job.register_chunk(ChunkRecord {
                chunk_num: n,
                chunk_key: format!("{}{job_id}/chunk_{n:03}.pdf", StagePrefix::Stage1LargeFileChunks.as_str()),
                source_page_start: n * 2 + 1,
                source_page_end: n * 2 + 2,
                result_key: None,
                completed: false,
            });
        }
        let job_repository: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository {
            jobs: Mutex::new(std::collections::HashMap::from([(job_id.clone(), job)])),
        });

        let chunk_key = format!("{}{job_id}/chunk_000.pdf", StagePrefix::Stage1LargeFileChunks.as_str());
        store.put(&chunk_key, b"%PDF-1.4".to_vec()).await.unwrap();

        struct FlakyThenOkLlmClient {
            calls: Mutex<u32>,
        }
        #[async_trait]
        impl LlmClient for FlakyThenOkLlmClient {
            async fn extract(&self, _api_key: &str, _prompt: &str, _bytes: &[u8], _mime: &str) -> Result<String, PipelineError> {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    Err(PipelineError::rate_limit("429"))
                } else {
                    Ok(utility_row("INV2"))
                }
            }
        }

        let use_case = ChunkProcessorUseCase::new(
            store.clone(),
            job_repository,
            Arc::new(FlakyThenOkLlmClient { calls: Mutex::new(0) }),
            KeyPool::new(vec!["key-a".into(), "key-b".into()]).unwrap(),
            RetryConfig {
                max_attempts: 3,
                base_backoff: std::time::Duration::from_millis(1),
                chunk_stagger: std::time::Duration::ZERO,
            },
            5,
        );

        let outcome = use_case.execute(&chunk_key).await.unwrap();
        assert!(!outcome.ready_for_aggregation);
    }
}
