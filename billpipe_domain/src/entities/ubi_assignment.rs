// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # UBI Assignment Entity
//!
//! A line is "UBI-assigned" iff its stable line hash appears in the
//! assignment table or its archive twin. A single line hash may carry many
//! assignments (multi-period billback); `UbiAssignment` is one
//! `(line_hash, period)` row, `UbiAssignmentSet` is the full set for one
//! line, used to build the dual-write enriched record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// `YYYY-MM` month identifying the billback period.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UbiPeriod(String);

impl UbiPeriod {
    pub fn parse(s: impl Into<String>) -> Result<Self, PipelineError> {
        let s = s.into();
        let valid = s.len() == 7
            && s.as_bytes()[4] == b'-'
            && s[..4].chars().all(|c| c.is_ascii_digit())
            && s[5..].chars().all(|c| c.is_ascii_digit());
        if !valid {
            return Err(PipelineError::validation(format!("invalid UBI period {:?}, expected YYYY-MM", s)));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One `(line_hash, period)` assignment row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UbiAssignment {
    pub line_hash: String,
    pub property_id: String,
    pub period: UbiPeriod,
    pub amount: f64,
    pub months_total: u32,
    pub assigned_by: String,
    pub assigned_date: DateTime<Utc>,
}

/// State of a line with respect to the UBI engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UbiState {
    Unassigned,
    Assigned,
    Archived,
}

/// The full assignment set for one stable line hash, used to build the
/// dual-written enriched record in `Stage8_UBI_Assigned/`.
#[derive(Debug, Clone, Default)]
pub struct UbiAssignmentSet {
    assignments: Vec<UbiAssignment>,
}

impl UbiAssignmentSet {
    pub fn new(assignments: Vec<UbiAssignment>) -> Self {
        Self { assignments }
    }

    pub fn assignments(&self) -> &[UbiAssignment] {
        &self.assignments
    }

    pub fn period_count(&self) -> u32 {
        self.assignments.len() as u32
    }

    /// The earliest-period assignment, whose fields populate the legacy
    /// single-period columns (`ubi_period`, `ubi_amount`,
    /// `ubi_months_total`, `ubi_assigned_by`, `ubi_assigned_date`).
    pub fn earliest(&self) -> Option<&UbiAssignment> {
        self.assignments.iter().min_by(|a, b| a.period.cmp(&b.period))
    }

    /// Builds the legacy-compatible + full-array JSON fields to merge into
    /// an enriched Stage 7 record when dual-writing to Stage 8 / Stage 99.
    pub fn to_legacy_and_full_json(&self) -> serde_json::Value {
        let earliest = self.earliest();
        serde_json::json!({
            "ubi_period": earliest.map(|a| a.period.as_str().to_string()),
            "ubi_amount": earliest.map(|a| a.amount),
            "ubi_months_total": earliest.map(|a| a.months_total),
            "ubi_assigned_by": earliest.map(|a| a.assigned_by.clone()),
            "ubi_assigned_date": earliest.map(|a| a.assigned_date.to_rfc3339()),
            "ubi_assignments": self.assignments,
            "ubi_period_count": self.period_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(period: &str, months: u32) -> UbiAssignment {
        UbiAssignment {
            line_hash: "h".into(),
            property_id: "P1".into(),
            period: UbiPeriod::parse(period).unwrap(),
            amount: 150.0,
            months_total: months,
            assigned_by: "reviewer@example.com".into(),
            assigned_date: Utc::now(),
        }
    }

    #[test]
    fn period_parsing_rejects_malformed_strings() {
        assert!(UbiPeriod::parse("2026-1").is_err());
        assert!(UbiPeriod::parse("2026/01").is_err());
        assert!(UbiPeriod::parse("2026-01").is_ok());
    }

    #[test]
    fn earliest_period_feeds_legacy_fields() {
        let set = UbiAssignmentSet::new(vec![assignment("2026-02", 2), assignment("2026-01", 2)]);
        let earliest = set.earliest().unwrap();
        assert_eq!(earliest.period.as_str(), "2026-01");
        assert_eq!(set.period_count(), 2);
    }

    #[test]
    fn legacy_json_carries_full_array_and_count() {
        let set = UbiAssignmentSet::new(vec![assignment("2026-01", 2), assignment("2026-02", 2)]);
        let json = set.to_legacy_and_full_json();
        assert_eq!(json["ubi_period"], "2026-01");
        assert_eq!(json["ubi_period_count"], 2);
        assert_eq!(json["ubi_assignments"].as_array().unwrap().len(), 2);
    }
}
