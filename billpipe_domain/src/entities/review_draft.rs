// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Review Draft Entity
//!
//! One append-style KV record per `line_id`, carrying a human reviewer's
//! field overrides. Overrides are applied on top of Stage 4 records at read
//! time (see [`crate::services::review_service`]) and are never merged back
//! into Stage 4 — Stage 4 stays the enricher's untouched output forever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    Pending,
    Reviewed,
    Submitted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub line_id: String,
    pub status: ReviewStatus,
    pub overrides: BTreeMap<String, String>,
    pub reviewer: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl ReviewDraft {
    pub fn new(line_id: impl Into<String>) -> Self {
        Self {
            line_id: line_id.into(),
            status: ReviewStatus::Pending,
            overrides: BTreeMap::new(),
            reviewer: None,
            started_at: None,
            heartbeat_at: None,
            stopped_at: None,
        }
    }

    pub fn start(&mut self, reviewer: impl Into<String>, at: DateTime<Utc>) {
        self.reviewer = Some(reviewer.into());
        self.started_at = Some(at);
        self.heartbeat_at = Some(at);
    }

    pub fn heartbeat(&mut self, at: DateTime<Utc>) {
        self.heartbeat_at = Some(at);
    }

    pub fn set_override(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(column.into(), value.into());
        self.status = ReviewStatus::Reviewed;
    }

    pub fn stop(&mut self, at: DateTime<Utc>) {
        self.stopped_at = Some(at);
    }

    pub fn mark_submitted(&mut self) {
        self.status = ReviewStatus::Submitted;
    }

    /// Applies this draft's overrides on top of a Stage 4 record, returning
    /// a new JSON object — the enriched record itself is never mutated.
    pub fn apply_over(&self, enriched: &serde_json::Value) -> serde_json::Value {
        let mut merged = enriched.clone();
        if let Some(map) = merged.as_object_mut() {
            for (column, value) in &self.overrides {
                map.insert(column.clone(), serde_json::Value::String(value.clone()));
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overrides_apply_on_top_without_mutating_source() {
        let mut draft = ReviewDraft::new("pdfabc#0");
        draft.set_override("Vendor Name", "Corrected Vendor");
        let enriched = json!({"Vendor Name": "Original Vendor", "Bill Date": "01/01/2026"});
        let merged = draft.apply_over(&enriched);
        assert_eq!(merged["Vendor Name"], "Corrected Vendor");
        assert_eq!(enriched["Vendor Name"], "Original Vendor");
        assert_eq!(merged["Bill Date"], "01/01/2026");
    }

    #[test]
    fn setting_override_moves_status_to_reviewed() {
        let mut draft = ReviewDraft::new("pdfabc#0");
        assert_eq!(draft.status, ReviewStatus::Pending);
        draft.set_override("Vendor Name", "X");
        assert_eq!(draft.status, ReviewStatus::Reviewed);
    }
}
