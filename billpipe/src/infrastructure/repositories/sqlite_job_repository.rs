// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Job Repository
//!
//! Persists [`ParseJob`] records as JSON blobs keyed by `job_id`, the same
//! "entity as a JSON column" shape the teacher's SQLite repositories use.
//! `complete_chunk` runs its read-mutate-write inside one SQLite
//! transaction, so SQLite's own write-lock serializes concurrent chunk
//! completions for the same job rather than racing on a read-modify-write.

use async_trait::async_trait;
use sqlx::SqlitePool;

use billpipe_domain::entities::ParseJob;
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::JobRepository;
use billpipe_domain::value_objects::JobId;

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> PipelineError {
    PipelineError::DatabaseError(e.to_string())
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn save(&self, job: &ParseJob) -> Result<(), PipelineError> {
        let data = serde_json::to_string(job)?;
        sqlx::query("INSERT INTO jobs (job_id, data) VALUES (?1, ?2) ON CONFLICT(job_id) DO UPDATE SET data = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')")
            .bind(job.job_id().to_string())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find(&self, job_id: &JobId) -> Result<Option<ParseJob>, PipelineError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM jobs WHERE job_id = ?1")
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|(data,)| serde_json::from_str(&data).map_err(PipelineError::from)).transpose()
    }

    async fn complete_chunk(&self, job_id: &JobId, chunk_num: u32, result_key: &str) -> Result<ParseJob, PipelineError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row: (String,) = sqlx::query_as("SELECT data FROM jobs WHERE job_id = ?1")
            .bind(job_id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PipelineError::NotFound(format!("job {job_id}")),
                other => db_err(other),
            })?;

        let mut job: ParseJob = serde_json::from_str(&row.0)?;
        job.complete_chunk(chunk_num, result_key)?;

        let data = serde_json::to_string(&job)?;
        sqlx::query("UPDATE jobs SET data = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE job_id = ?1")
            .bind(job_id.to_string())
            .bind(data)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(job)
    }
}
