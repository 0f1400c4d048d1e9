// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object Store Port
//!
//! The pipeline's entire data model is "an object-key prefix is a stage".
//! `ObjectStore` is the port every stage processor programs against;
//! production wires it to an S3-compatible client, tests wire it to an
//! in-memory or local-filesystem implementation.
//!
//! ## Implementation Guidelines
//!
//! - `copy` and `delete` must be idempotent: copying the same source to the
//!   same destination key twice is a no-op the second time, and deleting a
//!   missing key is not an error (mirrors the "at-least-once delivery"
//!   invariant in the concurrency model).
//! - `head` returning `Ok(None)` (not an error) for a missing sidecar is how
//!   callers implement the router's "sidecar may not exist" check without
//!   treating a 404 as a failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PipelineError;

/// Metadata about a stored object, enough to drive routing decisions.
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, PipelineError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, PipelineError>;

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), PipelineError>;

    async fn copy(&self, source_key: &str, dest_key: &str) -> Result<(), PipelineError>;

    async fn delete(&self, key: &str) -> Result<(), PipelineError>;

    /// Lists keys under a prefix. Used by the aggregator (to discover chunk
    /// results when the job record's list is absent) and by the UBI engine
    /// and master-bill generator (to scan date-partitioned stages).
    async fn list(&self, prefix: &str) -> Result<Vec<String>, PipelineError>;
}
