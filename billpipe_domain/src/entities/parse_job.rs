// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Job Entity
//!
//! Tracks a single large-file PDF through the chunk-splitter / chunk-
//! processor / aggregator pipeline. One job record exists per large-file
//! PDF; it is the coordination point that lets the aggregator know when
//! every chunk has reported in.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::value_objects::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Splitting,
    Processing,
    Aggregating,
    Completed,
    Failed,
}

/// One chunk's tracked state within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_num: u32,
    pub chunk_key: String,
    pub source_page_start: u32,
    pub source_page_end: u32,
    pub result_key: Option<String>,
    pub completed: bool,
}

/// A chunk-splitter/processor/aggregator job for one large PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseJob {
    job_id: JobId,
    source_file: String,
    total_chunks: u32,
    chunks_completed: u32,
    status: JobStatus,
    chunks: Vec<ChunkRecord>,
    /// Header fields carried forward from the previous chunk, so the LLM
    /// prompt for chunk N+1 can be told "this bill's vendor/account number
    /// was already established as X" rather than re-inferring it.
    previous_context: Option<String>,
    /// Rough row-count estimate used to detect grossly incomplete
    /// extraction (not a hard validation gate).
    expected_lines: Option<u32>,
    bill_from: Option<String>,
    pages_per_chunk: u32,
}

impl ParseJob {
    pub fn new(source_file: impl Into<String>, total_chunks: u32, pages_per_chunk: u32) -> Self {
        Self {
            job_id: JobId::new(),
            source_file: source_file.into(),
            total_chunks,
            chunks_completed: 0,
            status: JobStatus::Splitting,
            chunks: Vec::new(),
            previous_context: None,
            expected_lines: None,
            bill_from: None,
            pages_per_chunk,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn chunks_completed(&self) -> u32 {
        self.chunks_completed
    }

    pub fn chunks(&self) -> &[ChunkRecord] {
        &self.chunks
    }

    pub fn pages_per_chunk(&self) -> u32 {
        self.pages_per_chunk
    }

    pub fn previous_context(&self) -> Option<&str> {
        self.previous_context.as_deref()
    }

    pub fn set_previous_context(&mut self, context: impl Into<String>) {
        self.previous_context = Some(context.into());
    }

    pub fn set_bill_from(&mut self, bill_from: impl Into<String>) {
        self.bill_from = Some(bill_from.into());
    }

    pub fn bill_from(&self) -> Option<&str> {
        self.bill_from.as_deref()
    }

    pub fn set_expected_lines(&mut self, expected: u32) {
        self.expected_lines = Some(expected);
    }

    pub fn expected_lines(&self) -> Option<u32> {
        self.expected_lines
    }

    pub fn register_chunk(&mut self, record: ChunkRecord) {
        self.chunks.push(record);
        self.status = JobStatus::Processing;
    }

    /// Marks a chunk complete with its result key. Returns `true` when this
    /// was the final outstanding chunk, signalling the aggregator should
    /// run.
    pub fn complete_chunk(&mut self, chunk_num: u32, result_key: impl Into<String>) -> Result<bool, PipelineError> {
        let chunk = self
            .chunks
            .iter_mut()
            .find(|c| c.chunk_num == chunk_num)
            .ok_or_else(|| PipelineError::NotFound(format!("chunk {chunk_num} not registered in job {}", self.job_id)))?;

        if !chunk.completed {
            chunk.completed = true;
            chunk.result_key = Some(result_key.into());
            self.chunks_completed += 1;
        }

        let all_done = self.chunks_completed >= self.total_chunks;
        if all_done {
            self.status = JobStatus::Aggregating;
        }
        Ok(all_done)
    }

    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
    }

    pub fn mark_failed(&mut self) {
        self.status = JobStatus::Failed;
    }

    /// Result keys ordered by chunk number, for deterministic aggregation.
    pub fn ordered_result_keys(&self) -> Vec<String> {
        let mut ordered: Vec<&ChunkRecord> = self.chunks.iter().filter(|c| c.completed).collect();
        ordered.sort_by_key(|c| c.chunk_num);
        ordered.into_iter().filter_map(|c| c.result_key.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk(num: u32) -> ChunkRecord {
        ChunkRecord {
            chunk_num: num,
            chunk_key: format!("chunk-{num}"),
            source_page_start: num * 10,
            source_page_end: num * 10 + 9,
            result_key: None,
            completed: false,
        }
    }

    #[test]
    fn completes_only_when_every_chunk_reports() {
        let mut job = ParseJob::new("acme/bill.pdf", 2, 10);
        job.register_chunk(sample_chunk(0));
        job.register_chunk(sample_chunk(1));

        assert!(!job.complete_chunk(0, "result-0").unwrap());
        assert!(job.complete_chunk(1, "result-1").unwrap());
        assert_eq!(job.status(), JobStatus::Aggregating);
    }

    #[test]
    fn completing_unknown_chunk_errors() {
        let mut job = ParseJob::new("acme/bill.pdf", 1, 10);
        assert!(job.complete_chunk(5, "result").is_err());
    }

    #[test]
    fn ordered_result_keys_sort_by_chunk_number() {
        let mut job = ParseJob::new("acme/bill.pdf", 3, 10);
        job.register_chunk(sample_chunk(0));
        job.register_chunk(sample_chunk(1));
        job.register_chunk(sample_chunk(2));
        job.complete_chunk(2, "result-2").unwrap();
        job.complete_chunk(0, "result-0").unwrap();
        job.complete_chunk(1, "result-1").unwrap();
        assert_eq!(job.ordered_result_keys(), vec!["result-0", "result-1", "result-2"]);
    }

    #[test]
    fn double_completion_does_not_double_count() {
        let mut job = ParseJob::new("acme/bill.pdf", 1, 10);
        job.register_chunk(sample_chunk(0));
        job.complete_chunk(0, "result-0").unwrap();
        job.complete_chunk(0, "result-0-retry").unwrap();
        assert_eq!(job.chunks_completed(), 1);
    }
}
