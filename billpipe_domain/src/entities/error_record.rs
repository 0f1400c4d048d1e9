// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Error Record Entity
//!
//! One row per terminal failure (spec §6/§7), written by the failure router
//! and every use case that exhausts its retries. The partition key mirrors
//! the `<name>.error.json` sidecar's identity so the object-store failure
//! marker and the error table's row for the same failure can be
//! cross-referenced by filename alone.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub pdf_key: String,
    pub error_category: String,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(
        pdf_key: impl Into<String>,
        error_category: impl Into<String>,
        error_message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            pdf_key: pdf_key.into(),
            error_category: error_category.into(),
            error_message: error_message.into(),
            timestamp,
        }
    }

    /// The error table's partition key, `ERROR#<filename>` — the filename
    /// component of `pdf_key`, not the full object-store path, so every
    /// stage's failure for the same source PDF lands under one partition.
    pub fn partition_key(&self) -> String {
        let filename = self.pdf_key.rsplit('/').next().unwrap_or(&self.pdf_key);
        format!("ERROR#{filename}")
    }

    /// `YYYY-MM-DD`, used by the error table's date index and the debug
    /// UI's daily failure feed.
    pub fn date(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.timestamp.year(), self.timestamp.month(), self.timestamp.day())
    }

    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn partition_key_uses_filename_not_full_path() {
        let record = ErrorRecord::new("Failed/2026/01/05/bill.pdf", "exhausted", "all keys exhausted", at("2026-01-05T12:00:00Z"));
        assert_eq!(record.partition_key(), "ERROR#bill.pdf");
    }

    #[test]
    fn date_and_hour_are_derived_from_timestamp() {
        let record = ErrorRecord::new("bill.pdf", "transport", "timeout", at("2026-03-07T14:22:00Z"));
        assert_eq!(record.date(), "2026-03-07");
        assert_eq!(record.hour(), 14);
    }
}
