// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite-backed router decision audit log, ported from the
//! `jrk-bill-router-log` DynamoDB table into a relational append log.

use async_trait::async_trait;
use sqlx::SqlitePool;

use billpipe_domain::entities::RoutingDecision;
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::RoutingLogRepository;

pub struct SqliteRoutingLogRepository {
    pool: SqlitePool,
}

impl SqliteRoutingLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoutingLogRepository for SqliteRoutingLogRepository {
    async fn record(&self, decision: &RoutingDecision) -> Result<(), PipelineError> {
        sqlx::query(
            "INSERT INTO routing_log (pdf_key, timestamp, page_count, file_size_mb, route, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&decision.pdf_key)
        .bind(decision.timestamp.to_rfc3339())
        .bind(decision.page_count)
        .bind(decision.file_size_mb)
        .bind(decision.route.as_str())
        .bind(&decision.reason)
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
