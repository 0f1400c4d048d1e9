// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Review Use Case
//!
//! Spec §4.7. A thin orchestrator over [`ReviewRepository`]'s per-`line_id`
//! draft store: `start`/`heartbeat`/`stop` track a reviewer's session across
//! every line in one Stage 4 file, `set_override` records one field
//! correction, and `submit` builds the Stage 6 batch by applying every
//! line's draft overrides on top of its Stage 4 record — never mutating
//! Stage 4 itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use billpipe_domain::entities::ReviewDraft;
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::{ObjectStore, ReviewRepository};
use billpipe_domain::value_objects::StagePrefix;

use super::support::object_key_under;

pub struct ReviewUseCase {
    object_store: Arc<dyn ObjectStore>,
    review_repository: Arc<dyn ReviewRepository>,
}

impl ReviewUseCase {
    pub fn new(object_store: Arc<dyn ObjectStore>, review_repository: Arc<dyn ReviewRepository>) -> Self {
        Self { object_store, review_repository }
    }

    /// Starts (or resumes) a review session for every line in the Stage 4
    /// file at `full_key`, under `reviewer`.
    pub async fn start(&self, full_key: &str, reviewer: &str, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        let line_ids = self.line_ids_of(full_key).await?;
        for line_id in &line_ids {
            let mut draft = self.review_repository.find(line_id).await?.unwrap_or_else(|| ReviewDraft::new(line_id.clone()));
            draft.start(reviewer, now);
            self.review_repository.save(&draft).await?;
        }
        Ok(line_ids.len())
    }

    /// Records a reviewer heartbeat across every line of the Stage 4 file.
    pub async fn heartbeat(&self, full_key: &str, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        let line_ids = self.line_ids_of(full_key).await?;
        for line_id in &line_ids {
            if let Some(mut draft) = self.review_repository.find(line_id).await? {
                draft.heartbeat(now);
                self.review_repository.save(&draft).await?;
            }
        }
        Ok(line_ids.len())
    }

    /// Records a review session stop across every line of the Stage 4 file.
    pub async fn stop(&self, full_key: &str, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        let line_ids = self.line_ids_of(full_key).await?;
        for line_id in &line_ids {
            if let Some(mut draft) = self.review_repository.find(line_id).await? {
                draft.stop(now);
                self.review_repository.save(&draft).await?;
            }
        }
        Ok(line_ids.len())
    }

    /// Records one field override on a single line's draft, creating the
    /// draft if a review session hasn't been started on that line yet.
    pub async fn set_override(&self, line_id: &str, column: &str, value: &str) -> Result<(), PipelineError> {
        let mut draft = self.review_repository.find(line_id).await?.unwrap_or_else(|| ReviewDraft::new(line_id.to_string()));
        draft.set_override(column, value);
        self.review_repository.save(&draft).await
    }

    /// Builds the Stage 6 batch for the Stage 4 file at `full_key`: every
    /// line's draft overrides applied on top of its enriched record, every
    /// touched draft marked submitted.
    pub async fn submit(&self, full_key: &str) -> Result<String, PipelineError> {
        let source = object_key_under(full_key, StagePrefix::Stage4EnrichedOutputs)?;
        let bytes = self.object_store.get(full_key).await?;
        let text = String::from_utf8_lossy(&bytes);

        let mut submitted_lines = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let record: Value = serde_json::from_str(line)?;
            let line_id = record.get("line_id").and_then(Value::as_str).unwrap_or_default().to_string();

            let merged = if let Some(mut draft) = self.review_repository.find(&line_id).await? {
                let merged = draft.apply_over(&record);
                draft.mark_submitted();
                self.review_repository.save(&draft).await?;
                merged
            } else {
                record
            };
            submitted_lines.push(merged.to_string());
        }

        let dest = source.rekeyed(StagePrefix::Stage6PreEntrata);
        self.object_store.put(&dest.full_key(), submitted_lines.join("\n").into_bytes()).await?;
        Ok(dest.full_key())
    }

    async fn line_ids_of(&self, full_key: &str) -> Result<Vec<String>, PipelineError> {
        let bytes = self.object_store.get(full_key).await?;
        let text = String::from_utf8_lossy(&bytes);
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| {
                let record: Value = serde_json::from_str(line)?;
                Ok(record.get("line_id").and_then(Value::as_str).unwrap_or_default().to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;

    use crate::infrastructure::object_store::FilesystemObjectStore;

    struct InMemoryReviewRepository {
        drafts: Mutex<HashMap<String, ReviewDraft>>,
    }

    #[async_trait]
    impl ReviewRepository for InMemoryReviewRepository {
        async fn save(&self, draft: &ReviewDraft) -> Result<(), PipelineError> {
            self.drafts.lock().insert(draft.line_id.clone(), draft.clone());
            Ok(())
        }
        async fn find(&self, line_id: &str) -> Result<Option<ReviewDraft>, PipelineError> {
            Ok(self.drafts.lock().get(line_id).cloned())
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn start_creates_a_draft_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        let lines = vec![
            json!({"line_id": "pdf1#0", "Vendor Name": "Acme"}).to_string(),
            json!({"line_id": "pdf1#1", "Vendor Name": "Acme"}).to_string(),
        ]
        .join("\n");
        store.put("Stage4_EnrichedOutputs/acme/bill.pdf.jsonl", lines.into_bytes()).await.unwrap();

        let repo: Arc<dyn ReviewRepository> = Arc::new(InMemoryReviewRepository { drafts: Mutex::new(HashMap::new()) });
        let use_case = ReviewUseCase::new(store, repo.clone());
        let count = use_case.start("Stage4_EnrichedOutputs/acme/bill.pdf.jsonl", "jdoe", now()).await.unwrap();

        assert_eq!(count, 2);
        let draft = repo.find("pdf1#0").await.unwrap().unwrap();
        assert_eq!(draft.reviewer.as_deref(), Some("jdoe"));
    }

    #[tokio::test]
    async fn submit_applies_overrides_and_marks_submitted() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        store
            .put(
                "Stage4_EnrichedOutputs/acme/bill.pdf.jsonl",
                json!({"line_id": "pdf1#0", "Vendor Name": "Original"}).to_string().into_bytes(),
            )
            .await
            .unwrap();

        let repo: Arc<dyn ReviewRepository> = Arc::new(InMemoryReviewRepository { drafts: Mutex::new(HashMap::new()) });
        let use_case = ReviewUseCase::new(store.clone(), repo.clone());
        use_case.set_override("pdf1#0", "Vendor Name", "Corrected").await.unwrap();

        let dest_key = use_case.submit("Stage4_EnrichedOutputs/acme/bill.pdf.jsonl").await.unwrap();
        assert_eq!(dest_key, "Stage6_PreEntrata/acme/bill.pdf.jsonl");

        let written = store.get(&dest_key).await.unwrap();
        let record: Value = serde_json::from_str(&String::from_utf8(written).unwrap()).unwrap();
        assert_eq!(record["Vendor Name"], "Corrected");

        let draft = repo.find("pdf1#0").await.unwrap().unwrap();
        assert_eq!(draft.status, billpipe_domain::entities::ReviewStatus::Submitted);
    }

    #[tokio::test]
    async fn submit_passes_through_lines_with_no_draft() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        store
            .put(
                "Stage4_EnrichedOutputs/acme/bill.pdf.jsonl",
                json!({"line_id": "pdf1#0", "Vendor Name": "Untouched"}).to_string().into_bytes(),
            )
            .await
            .unwrap();

        let repo: Arc<dyn ReviewRepository> = Arc::new(InMemoryReviewRepository { drafts: Mutex::new(HashMap::new()) });
        let use_case = ReviewUseCase::new(store.clone(), repo);
        let dest_key = use_case.submit("Stage4_EnrichedOutputs/acme/bill.pdf.jsonl").await.unwrap();

        let written = store.get(&dest_key).await.unwrap();
        let record: Value = serde_json::from_str(&String::from_utf8(written).unwrap()).unwrap();
        assert_eq!(record["Vendor Name"], "Untouched");
    }
}
