// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite-backed error table, written by the failure router and every use
//! case path that exhausts its retries. Powers the debug UI's failure feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use billpipe_domain::entities::ErrorRecord;
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::ErrorRepository;

pub struct SqliteErrorRepository {
    pool: SqlitePool,
}

impl SqliteErrorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> PipelineError {
    PipelineError::DatabaseError(e.to_string())
}

#[async_trait]
impl ErrorRepository for SqliteErrorRepository {
    async fn record(&self, error: &ErrorRecord) -> Result<(), PipelineError> {
        sqlx::query(
            "INSERT INTO errors (pk, timestamp, pdf_key, error_category, error_message, date, hour)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(error.partition_key())
        .bind(error.timestamp.to_rfc3339())
        .bind(&error.pdf_key)
        .bind(&error.error_category)
        .bind(&error.error_message)
        .bind(error.date())
        .bind(error.hour() as i64)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_for_date(&self, date: &str) -> Result<Vec<ErrorRecord>, PipelineError> {
        let rows = sqlx::query("SELECT * FROM errors WHERE date = ?1 ORDER BY timestamp DESC")
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let timestamp: String = row.try_get("timestamp").map_err(db_err)?;
                Ok(ErrorRecord::new(
                    row.try_get::<String, _>("pdf_key").map_err(db_err)?,
                    row.try_get::<String, _>("error_category").map_err(db_err)?,
                    row.try_get::<String, _>("error_message").map_err(db_err)?,
                    DateTime::parse_from_rfc3339(&timestamp)
                        .map_err(|e| PipelineError::SerializationError(e.to_string()))?
                        .with_timezone(&Utc),
                ))
            })
            .collect()
    }
}
