// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A hierarchical error system for the bill ingest pipeline domain. Every
//! fallible domain operation returns `PipelineError`; infrastructure-level
//! errors (HTTP, SQL, filesystem) are wrapped into one of these variants at
//! the boundary rather than leaking their own error types into the domain.
//!
//! The variant set mirrors the error taxonomy: each category carries a
//! [`Disposition`] describing how the caller should react (retry, rotate an
//! API key, fail fast, or sanitize and continue).

use thiserror::Error;

/// How a caller should react to a given error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Retry the same operation, typically with backoff.
    Retry,
    /// Retry after rotating to a different credential (e.g. LLM API key).
    Rotate,
    /// Stop immediately; the operation cannot succeed without intervention.
    FailFast,
    /// Recoverable at the data level: sanitize/normalize and continue.
    Sanitize,
}

/// Domain-specific errors for the bill ingest pipeline.
///
/// ## Error Categories
///
/// - **Transport** — network-level failures talking to the LLM or Entrata.
/// - **RateLimit** — HTTP 429 from the LLM provider; forces key rotation.
/// - **Timeout** — an external call exceeded its deadline.
/// - **SchemaDrift** — an LLM reply could not be normalized to the expected
///   column count after the pad/merge normalizer ran.
/// - **Exhausted** — retry budget exhausted (`MAX_ATTEMPTS`) without success.
/// - **Duplicate** — Entrata rejected a post as a duplicate invoice.
/// - **NotFound** — a referenced object, job, or dimension row doesn't exist.
/// - **AccessDenied** — Entrata or the object store rejected the request on
///   authorization grounds.
/// - **Validation** — a record failed required-field validation.
/// - **Configuration** — malformed or missing configuration.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("schema drift: {0}")]
    SchemaDrift(String),

    #[error("retry budget exhausted: {0}")]
    Exhausted(String),

    #[error("duplicate invoice: {0}")]
    Duplicate(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    IoError(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl PipelineError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn rate_limit(msg: impl Into<String>) -> Self {
        Self::RateLimit(msg.into())
    }

    pub fn schema_drift(msg: impl Into<String>) -> Self {
        Self::SchemaDrift(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// The disposition a caller (retry loop, chunk processor, post-to-Entrata
    /// orchestrator) should act on.
    pub fn disposition(&self) -> Disposition {
        match self {
            PipelineError::RateLimit(_) => Disposition::Rotate,
            PipelineError::Transport(_) | PipelineError::Timeout(_) => Disposition::Retry,
            PipelineError::SchemaDrift(_) => Disposition::Retry,
            PipelineError::Duplicate(_) => Disposition::Sanitize,
            PipelineError::Validation(_) => Disposition::Sanitize,
            PipelineError::Exhausted(_)
            | PipelineError::NotFound(_)
            | PipelineError::AccessDenied(_)
            | PipelineError::Configuration(_)
            | PipelineError::IoError(_)
            | PipelineError::DatabaseError(_)
            | PipelineError::SerializationError(_)
            | PipelineError::InternalError(_) => Disposition::FailFast,
        }
    }

    /// Checks if the error is recoverable by simple retry (no rotation
    /// needed).
    pub fn is_recoverable(&self) -> bool {
        matches!(self.disposition(), Disposition::Retry)
    }

    /// Gets the error category, as used in metrics labels and log fields.
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Transport(_) => "transport",
            PipelineError::RateLimit(_) => "rate_limit",
            PipelineError::Timeout(_) => "timeout",
            PipelineError::SchemaDrift(_) => "schema",
            PipelineError::Exhausted(_) => "exhausted",
            PipelineError::Duplicate(_) => "duplicate",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::AccessDenied(_) => "access_denied",
            PipelineError::Validation(_) => "validation",
            PipelineError::Configuration(_) => "configuration",
            PipelineError::IoError(_) => "io",
            PipelineError::DatabaseError(_) => "database",
            PipelineError::SerializationError(_) => "serialization",
            PipelineError::InternalError(_) => "internal",
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_rotates() {
        assert_eq!(PipelineError::rate_limit("429").disposition(), Disposition::Rotate);
    }

    #[test]
    fn transport_retries() {
        assert!(PipelineError::transport("connection reset").is_recoverable());
    }

    #[test]
    fn not_found_fails_fast() {
        assert_eq!(PipelineError::NotFound("job".into()).disposition(), Disposition::FailFast);
    }

    #[test]
    fn category_matches_variant() {
        assert_eq!(PipelineError::Duplicate("INV1".into()).category(), "duplicate");
    }
}
