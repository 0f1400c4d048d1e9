// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Review/draft store port (spec §4.7): append-style KV keyed by `line_id`.

use async_trait::async_trait;

use crate::entities::ReviewDraft;
use crate::error::PipelineError;

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn save(&self, draft: &ReviewDraft) -> Result<(), PipelineError>;

    async fn find(&self, line_id: &str) -> Result<Option<ReviewDraft>, PipelineError>;
}
