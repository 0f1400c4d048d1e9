// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Router audit log port — one row per routing decision (spec's
//! supplemental sidecar/audit-log feature, ported from
//! `jrk-bill-router-log`).

use async_trait::async_trait;

use crate::entities::RoutingDecision;
use crate::error::PipelineError;

#[async_trait]
pub trait RoutingLogRepository: Send + Sync {
    async fn record(&self, decision: &RoutingDecision) -> Result<(), PipelineError>;
}
