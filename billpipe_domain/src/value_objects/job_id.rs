// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Job Identifier Value Object
//!
//! Unlike `PdfId`, a `JobId` is not content-addressed — two chunk-splitter
//! runs over the same large PDF are different jobs. ULID gives us
//! time-ordered, coordination-free identifiers, matching how the original
//! domain identifies pipelines.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use crate::error::PipelineError;

/// Identifier for a chunked-extraction job (one per large-file PDF entering
/// `Stage1_LargeFile`).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct JobId(Ulid);

impl JobId {
    /// Creates a new job id with the current timestamp.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parses a job id from its canonical ULID string form.
    pub fn from_string(s: &str) -> Result<Self, PipelineError> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| PipelineError::validation(format!("invalid job id {:?}: {e}", s)))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string() {
        let id = JobId::new();
        let parsed = JobId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_malformed_string() {
        assert!(JobId::from_string("not-a-ulid").is_err());
    }

    #[test]
    fn new_ids_are_distinct() {
        assert_ne!(JobId::new(), JobId::new());
    }
}
