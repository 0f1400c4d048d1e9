// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Aggregator Use Case
//!
//! Spec §4.5. Runs once a job's `chunks_completed` reaches `total_chunks`:
//! concatenates every chunk's rows in chunk-number order, normalizes header
//! fields and dates across the whole document, writes the consolidated
//! NDJSON, and deletes the now-redundant chunk/chunk-result artifacts. The
//! final NDJSON write is the commit point — deletions are best-effort and
//! their failure is logged, not propagated, per spec §4.5's stated
//! failure-isolation note.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::warn;

use billpipe_domain::entities::LineRecord;
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::{JobRepository, ObjectStore};
use billpipe_domain::services::{normalize_date, propagate_header_fields, BillKind, ColumnSchema};
use billpipe_domain::value_objects::{JobId, ObjectKey, PdfId, StagePrefix};

const HEADER_COLUMNS_UTILITY: &[&str] = &[
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
];
const HEADER_COLUMNS_LEGAL: &[&str] = &["Firm Name", "JRK Entity (Property)", "Invoice Number", "Terms"];

pub struct AggregatorUseCase {
    object_store: Arc<dyn ObjectStore>,
    job_repository: Arc<dyn JobRepository>,
}

/// A chunk-processor result file's shape, mirroring what
/// [`super::chunk_processor`] writes under `Stage1_LargeFile_Results/`.
#[derive(Debug, serde::Deserialize)]
struct ChunkResult {
    source_page_start: u32,
    source_page_end: u32,
    rows: Vec<Vec<String>>,
}

impl AggregatorUseCase {
    pub fn new(object_store: Arc<dyn ObjectStore>, job_repository: Arc<dyn JobRepository>) -> Self {
        Self { object_store, job_repository }
    }

    /// Runs the aggregator for `job_id`. Returns `None` without action if
    /// the job isn't fully chunked yet (a no-op, not an error — callers may
    /// invoke this speculatively after every chunk completion).
    pub async fn execute(&self, job_id: &JobId) -> Result<Option<ObjectKey>, PipelineError> {
        let mut job = self
            .job_repository
            .find(job_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("job {job_id} not found")))?;

        if job.chunks_completed() < job.total_chunks() {
            return Ok(None);
        }

        let kind = bill_kind_for(job.source_file());
        let schema = ColumnSchema::for_kind(kind);

        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut page_ranges: Vec<(u32, u32)> = Vec::new();
        for result_key in job.ordered_result_keys() {
            let bytes = self.object_store.get(&result_key).await?;
            let result: ChunkResult = serde_json::from_slice(&bytes)?;
            for row in result.rows {
                page_ranges.push((result.source_page_start, result.source_page_end));
                rows.push(row);
            }
        }

        if rows.is_empty() {
            job.mark_failed();
            self.job_repository.save(&job).await?;
            return Err(PipelineError::Validation(format!(
                "job {job_id} aggregated to zero rows across {} chunks",
                job.total_chunks()
            )));
        }

        propagate_header_fields(&mut rows, schema, header_columns_for(kind));
        normalize_dates(&mut rows, schema);

        let pdf_id = PdfId::from_object_key(job.source_file());
        let records = build_records(&pdf_id, rows, page_ranges, schema)?;
        let dest = self.write_output(job.source_file(), &records, Utc::now()).await?;

        self.delete_chunk_artifacts(job_id).await;

        job.mark_completed();
        self.job_repository.save(&job).await?;

        Ok(Some(dest))
    }

    async fn write_output(&self, source_file: &str, records: &[LineRecord], now: DateTime<Utc>) -> Result<ObjectKey, PipelineError> {
        let dest = output_key(source_file, now);
        let ndjson = records
            .iter()
            .map(|record| record.to_json().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        self.object_store.put(&dest.full_key(), ndjson.into_bytes()).await?;
        Ok(dest)
    }

    /// Best-effort cleanup of chunk PDFs and chunk-result objects. Failures
    /// are logged, never surfaced — the NDJSON write above is the commit
    /// point for this job (spec §4.5).
    async fn delete_chunk_artifacts(&self, job_id: &JobId) {
        for prefix in [StagePrefix::Stage1LargeFileChunks, StagePrefix::Stage1LargeFileResults] {
            let list_prefix = format!("{}{job_id}/", prefix.as_str());
            match self.object_store.list(&list_prefix).await {
                Ok(keys) => {
                    for key in keys {
                        if let Err(e) = self.object_store.delete(&key).await {
                            warn!(key = %key, error = %e, "failed to delete chunk artifact after aggregation");
                        }
                    }
                }
                Err(e) => warn!(prefix = %list_prefix, error = %e, "failed to list chunk artifacts for cleanup"),
            }
        }
    }
}

fn bill_kind_for(source_file: &str) -> BillKind {
    if source_file.to_lowercase().contains("legal") {
        BillKind::Legal
    } else {
        BillKind::Utility
    }
}

fn header_columns_for(kind: BillKind) -> &'static [&'static str] {
    match kind {
        BillKind::Utility => HEADER_COLUMNS_UTILITY,
        BillKind::Legal => HEADER_COLUMNS_LEGAL,
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
    page_ranges: Vec<(u32, u32)>,
    schema: &ColumnSchema,
) -> Result<Vec<LineRecord>, PipelineError> {
    rows.into_iter()
        .zip(page_ranges)
        .enumerate()
        .map(|(index, (fields, (start, end)))| LineRecord::new(pdf_id.clone(), index as u32, schema.kind, fields, start, end))
        .collect()
}

fn output_key(source_file: &str, now: DateTime<Utc>) -> ObjectKey {
    let stem = std::path::Path::new(source_file)
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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use billpipe_domain::entities::{ChunkRecord, ParseJob};
    use crate::infrastructure::object_store::FilesystemObjectStore;

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
            let job = jobs.get_mut(job_id).ok_or_else(|| PipelineError::NotFound(format!("job {job_id}")))?;
            job.complete_chunk(chunk_num, result_key.to_string())?;
            Ok(job.clone())
        }
    }

    fn utility_row(invoice: &str) -> Vec<String> {
        let mut fields = vec![String::new(); ColumnSchema::for_kind(BillKind::Utility).column_count()];
        fields[2] = "Acme Power".to_string();
        fields[3] = invoice.to_string();
        fields[25] = "10.00".to_string();
        fields
    }

    async fn seed_job(store: &Arc<dyn ObjectStore>) -> (Arc<dyn JobRepository>, JobId) {
        let mut job = ParseJob::new("Stage1_LargeFile/acme/bill.pdf", 2, 2);
        let job_id = job.job_id().clone();
        for n in 0..2u32 {
            let result_key = format!("{}{job_id}/chunk_{n:03}.json", StagePrefix::Stage1LargeFileResults.as_str());
            job.register_chunk(ChunkRecord {
                chunk_num: n,
                chunk_key: format!("{}{job_id}/chunk_{n:03}.pdf", StagePrefix::Stage1LargeFileChunks.as_str()),
                source_page_start: n * 2 + 1,
                source_page_end: n * 2 + 2,
                result_key: None,
                completed: false,
            });
            let payload = serde_json::json!({
                "chunk_num": n,
                "source_page_start": n * 2 + 1,
                "source_page_end": n * 2 + 2,
                "rows": [utility_row(&format!("INV{n}"))],
            });
            store.put(&result_key, serde_json::to_vec(&payload).unwrap()).await.unwrap();
            job.complete_chunk(n, result_key).unwrap();
        }

        let repo: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository {
            jobs: Mutex::new(std::collections::HashMap::from([(job_id.clone(), job)])),
        });
        (repo, job_id)
    }

    #[tokio::test]
    async fn writes_consolidated_output_in_chunk_order_and_deletes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        let (job_repository, job_id) = seed_job(&store).await;

        let use_case = AggregatorUseCase::new(store.clone(), job_repository.clone());
        let dest = use_case.execute(&job_id).await.unwrap().expect("two chunks produced rows");

        let written = store.get(&dest.full_key()).await.unwrap();
        let text = String::from_utf8(written).unwrap();
        assert!(text.contains("INV0"));
        assert!(text.contains("INV1"));
        assert_eq!(text.lines().count(), 2);

        let remaining_results = store
            .list(&format!("{}{job_id}/", StagePrefix::Stage1LargeFileResults.as_str()))
            .await
            .unwrap();
        assert!(remaining_results.is_empty());

        let job = job_repository.find(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status(), billpipe_domain::entities::JobStatus::Completed);
    }

    #[tokio::test]
    async fn no_ops_while_chunks_are_still_outstanding() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));

        let job = ParseJob::new("Stage1_LargeFile/acme/bill.pdf", 2, 2);
        let job_id = job.job_id().clone();
        let job_repository: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository {
            jobs: Mutex::new(std::collections::HashMap::from([(job_id.clone(), job)])),
        });

        let use_case = AggregatorUseCase::new(store, job_repository);
        let result = use_case.execute(&job_id).await.unwrap();
        assert!(result.is_none());
    }
}
