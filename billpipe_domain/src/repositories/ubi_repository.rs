// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # UBI Repository Port
//!
//! Backs the UBI assignment engine (spec §4.9). Two tables exist: the live
//! `assignments` table and the `archived` twin a reviewer moves a line's
//! rows into once its billback is "done". The migration rule between them
//! is formalized here rather than left to ad hoc reconciliation scripts
//! that scan both tables (see DESIGN.md's Open Question resolution):
//! `archive` is a move (delete from assignments, insert into archived,
//! same primary key), never a copy, so a hash's rows exist in exactly one
//! of the two tables at any time.

use async_trait::async_trait;
use std::ops::Range;

use crate::entities::{UbiAssignment, UbiPeriod};
use crate::error::PipelineError;

/// A half-open date range, used by every date-scanning UBI operation.
pub type DateRange = Range<chrono::NaiveDate>;

/// Per-property count of files containing at least one unassigned line.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyUnassignedStats {
    pub property_id: String,
    pub unassigned_file_count: u64,
}

/// One row of the master-bill roll-up.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterBillRow {
    pub property_id: String,
    pub ubi_period: UbiPeriod,
    pub gl_code: String,
    pub utility_type: String,
    pub month_start: chrono::NaiveDate,
    pub month_end: chrono::NaiveDate,
    pub total_charge: f64,
}

impl MasterBillRow {
    /// The deterministic roll-up key named in spec §4.9.
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.property_id, self.gl_code, self.utility_type, self.month_start, self.month_end
        )
    }
}

#[async_trait]
pub trait UbiRepository: Send + Sync {
    async fn assign(
        &self,
        line_hash: &str,
        property_id: &str,
        periods: &[UbiAssignment],
    ) -> Result<(), PipelineError>;

    async fn reassign(&self, line_hash: &str, period: &UbiPeriod, updated: UbiAssignment) -> Result<(), PipelineError>;

    async fn unassign(&self, line_hash: &str, period: &UbiPeriod) -> Result<(), PipelineError>;

    /// Moves every assignment row for `line_hash` from the live assignments
    /// table into the archive twin. Idempotent: archiving an
    /// already-archived hash is a no-op.
    async fn archive(&self, line_hash: &str) -> Result<(), PipelineError>;

    async fn assignments_for(&self, line_hash: &str) -> Result<Vec<UbiAssignment>, PipelineError>;

    async fn is_archived(&self, line_hash: &str) -> Result<bool, PipelineError>;

    /// Returns candidate periods/properties from historical account-level
    /// assignments for the given line's account number — feeds the review
    /// UI's `suggest` affordance.
    async fn suggest(&self, account_number: &str) -> Result<Vec<UbiAssignment>, PipelineError>;

    async fn stats_by_property(&self, range: DateRange) -> Result<Vec<PropertyUnassignedStats>, PipelineError>;

    async fn master_bills(&self, range: DateRange) -> Result<Vec<MasterBillRow>, PipelineError>;
}
