// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite-backed review/draft store (spec §4.7), one JSON row per `line_id`.

use async_trait::async_trait;
use sqlx::SqlitePool;

use billpipe_domain::entities::ReviewDraft;
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::ReviewRepository;

pub struct SqliteReviewRepository {
    pool: SqlitePool,
}

impl SqliteReviewRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> PipelineError {
    PipelineError::DatabaseError(e.to_string())
}

#[async_trait]
impl ReviewRepository for SqliteReviewRepository {
    async fn save(&self, draft: &ReviewDraft) -> Result<(), PipelineError> {
        let data = serde_json::to_string(draft)?;
        sqlx::query("INSERT INTO review_drafts (line_id, data) VALUES (?1, ?2) ON CONFLICT(line_id) DO UPDATE SET data = ?2")
            .bind(&draft.line_id)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find(&self, line_id: &str) -> Result<Option<ReviewDraft>, PipelineError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM review_drafts WHERE line_id = ?1")
            .bind(line_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|(data,)| serde_json::from_str(&data).map_err(PipelineError::from)).transpose()
    }
}
