// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Repository Port
//!
//! Persists [`ParseJob`] records. The job record must be visible before the
//! first chunk-processor invocation runs, and `chunks_completed` updates
//! must behave as single-attribute conditional increments — the trait is
//! shaped so an implementation can satisfy that with a single `UPDATE ...
//! SET chunks_completed = chunks_completed + 1` statement rather than a
//! read-modify-write race.

use async_trait::async_trait;

use crate::entities::ParseJob;
use crate::error::PipelineError;
use crate::value_objects::JobId;

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn save(&self, job: &ParseJob) -> Result<(), PipelineError>;

    async fn find(&self, job_id: &JobId) -> Result<Option<ParseJob>, PipelineError>;

    /// Atomically marks one chunk complete and returns the updated job.
    /// Implementations must make this safe under concurrent invocations for
    /// different chunks of the same job.
    async fn complete_chunk(&self, job_id: &JobId, chunk_num: u32, result_key: &str) -> Result<ParseJob, PipelineError>;
}
