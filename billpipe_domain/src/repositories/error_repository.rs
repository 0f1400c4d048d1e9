// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Error table port (spec §6/§7) — powers the debug UI's failure feed and
//! gives the failure router and every terminal-error path a place to write
//! a durable diagnostic record independent of the object-store sidecar.

use async_trait::async_trait;

use crate::entities::ErrorRecord;
use crate::error::PipelineError;

#[async_trait]
pub trait ErrorRepository: Send + Sync {
    async fn record(&self, error: &ErrorRecord) -> Result<(), PipelineError>;

    /// Lists error records for a given `YYYY-MM-DD` date, newest first.
    async fn list_for_date(&self, date: &str) -> Result<Vec<ErrorRecord>, PipelineError>;
}
