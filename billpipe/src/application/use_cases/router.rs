// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Router Use Case
//!
//! Spec §4.1. Reads a pending PDF, counts its pages and measures its size,
//! and routes it to the standard (single-call) or chunked large-file
//! parsing path. Sidecar metadata (`.notes.json`, `.rework.json`) travels
//! with the PDF; the routing decision itself is written to the audit log
//! so a misrouted file can be traced after the fact.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use billpipe_domain::entities::RoutingDecision;
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::{ObjectStore, RoutingLogRepository};
use billpipe_domain::value_objects::{ObjectKey, StagePrefix};

use super::support::{count_pdf_pages, object_key_under, propagate_sidecars};

/// Number of attempts the router makes to copy the main object to its
/// routed destination before giving up; a transient object-store failure
/// here shouldn't abandon routing outright.
const MAX_COPY_ATTEMPTS: u32 = 3;

pub struct RouterUseCase {
    object_store: Arc<dyn ObjectStore>,
    routing_log: Arc<dyn RoutingLogRepository>,
    max_pages_standard: u32,
    max_size_mb_standard: f64,
}

impl RouterUseCase {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        routing_log: Arc<dyn RoutingLogRepository>,
        max_pages_standard: u32,
        max_size_mb_standard: f64,
    ) -> Self {
        Self {
            object_store,
            routing_log,
            max_pages_standard,
            max_size_mb_standard,
        }
    }

    /// Routes the PDF at `full_key` (expected under `Stage1_Pending/`),
    /// returning the key it was routed to.
    pub async fn execute(&self, full_key: &str) -> Result<ObjectKey, PipelineError> {
        let source = object_key_under(full_key, StagePrefix::Stage1Pending)?;
        let bytes = self.object_store.get(full_key).await?;

        let page_count = count_pages(&bytes);
        let size_mb = bytes.len() as f64 / (1024.0 * 1024.0);

        let decision =
            RoutingDecision::decide(full_key, page_count, size_mb, self.max_pages_standard, self.max_size_mb_standard, Utc::now());

        let dest_prefix = match decision.route {
            billpipe_domain::entities::Route::Standard => StagePrefix::Stage1Standard,
            billpipe_domain::entities::Route::LargeFile => StagePrefix::Stage1LargeFile,
        };
        let dest = source.rekeyed(dest_prefix);

        self.copy_with_retry(&source, &dest).await?;
        propagate_sidecars(self.object_store.as_ref(), &source, dest_prefix).await?;

        if let Err(e) = self.object_store.delete(full_key).await {
            warn!(key = %full_key, error = %e, "failed to delete Stage1_Pending object after routing; leaving orphan for manual cleanup");
        }

        self.routing_log.record(&decision).await?;

        Ok(dest)
    }

    async fn copy_with_retry(&self, source: &ObjectKey, dest: &ObjectKey) -> Result<(), PipelineError> {
        let mut attempt = 0;
        loop {
            match self.object_store.copy(&source.full_key(), &dest.full_key()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 < MAX_COPY_ATTEMPTS => {
                    attempt += 1;
                    warn!(attempt, error = %e, "retrying router copy to routed destination");
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Counts the pages of a PDF as the router's `i32` convention, where `-1`
/// is the "unknown" sentinel (per spec §4.1/§8) that defers to
/// `RoutingDecision::decide`'s fail-open-to-standard behavior rather than
/// treating a malformed header as a hard routing failure.
fn count_pages(bytes: &[u8]) -> i32 {
    count_pdf_pages(bytes).map(|n| n as i32).unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::object_store::FilesystemObjectStore;

    struct NullRoutingLog;

    #[async_trait::async_trait]
    impl RoutingLogRepository for NullRoutingLog {
        async fn record(&self, _decision: &RoutingDecision) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    #[test]
    fn count_pages_returns_unknown_for_garbage_bytes() {
        assert_eq!(count_pages(b"not a pdf"), -1);
    }

    #[tokio::test]
    async fn routes_unparseable_bytes_to_standard_and_deletes_pending_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemObjectStore::new(dir.path()));
        store.put("Stage1_Pending/acme/bill.pdf", b"not a pdf".to_vec()).await.unwrap();

        let use_case = RouterUseCase::new(store.clone(), Arc::new(NullRoutingLog), 10, 10.0);
        let routed = use_case.execute("Stage1_Pending/acme/bill.pdf").await.unwrap();

        assert_eq!(routed.full_key(), "Stage1_Standard/acme/bill.pdf");
        assert!(store.get("Stage1_Standard/acme/bill.pdf").await.is_ok());
        assert!(store.get("Stage1_Pending/acme/bill.pdf").await.is_err());
    }
}
