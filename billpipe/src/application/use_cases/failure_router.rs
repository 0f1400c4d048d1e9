// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Failure Router Use Case
//!
//! Spec §4.10. Receives a Lambda-style failure-destination payload wrapping
//! the original object-created event under `requestPayload`, plus an
//! error type/message pair. Extracts the original Stage 1 key; if the file
//! name already carries a `_LARGEFILE_` marker, the escalation path has
//! already been tried once, so this failure parks the object in `Failed/`.
//! Otherwise it renames with the marker and drops the object into
//! `LargeFile/` for the chunked-retry path.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use billpipe_domain::entities::ErrorRecord;
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::{ErrorRepository, ObjectStore};
use billpipe_domain::value_objects::{ObjectKey, StagePrefix};

const LARGEFILE_MARKER: &str = "_LARGEFILE_";

/// The shape of a failure-destination payload: the original event wrapped
/// under `requestPayload`, alongside the error that triggered delivery.
#[derive(Debug, Deserialize)]
pub struct FailureDestinationPayload {
    #[serde(rename = "requestPayload")]
    pub request_payload: RequestPayload,
    #[serde(rename = "errorType")]
    pub error_type: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestPayload {
    #[serde(rename = "objectKey")]
    pub object_key: String,
}

pub struct FailureRouterUseCase {
    object_store: Arc<dyn ObjectStore>,
    error_repository: Arc<dyn ErrorRepository>,
}

impl FailureRouterUseCase {
    pub fn new(object_store: Arc<dyn ObjectStore>, error_repository: Arc<dyn ErrorRepository>) -> Self {
        Self { object_store, error_repository }
    }

    pub async fn execute(&self, payload_json: &str) -> Result<ObjectKey, PipelineError> {
        let payload: FailureDestinationPayload =
            serde_json::from_str(payload_json).map_err(|e| PipelineError::validation(format!("malformed failure-destination payload: {e}")))?;

        let source_key = payload.request_payload.object_key;
        let already_escalated = source_key.contains(LARGEFILE_MARKER);

        let dest = if already_escalated {
            self.park_in_failed(&source_key).await?
        } else {
            self.escalate_to_largefile(&source_key).await?
        };

        self.write_error_sidecar(&dest, &payload.error_type, &payload.error_message).await?;

        let record = ErrorRecord::new(dest.full_key(), payload.error_type, payload.error_message, Utc::now());
        self.error_repository.record(&record).await?;

        Ok(dest)
    }

    async fn park_in_failed(&self, source_key: &str) -> Result<ObjectKey, PipelineError> {
        let dest_key = format!("{}{}", StagePrefix::Failed.as_str(), strip_known_prefix(source_key));
        self.object_store.copy(source_key, &dest_key).await?;
        self.object_store.delete(source_key).await?;
        Ok(ObjectKey::new(StagePrefix::Failed, strip_known_prefix(source_key)))
    }

    async fn escalate_to_largefile(&self, source_key: &str) -> Result<ObjectKey, PipelineError> {
        let suffix = strip_known_prefix(source_key);
        let marked_suffix = mark_largefile(&suffix);
        let dest = ObjectKey::new(StagePrefix::Stage1LargeFile, marked_suffix);
        self.object_store.copy(source_key, &dest.full_key()).await?;
        self.object_store.delete(source_key).await?;
        Ok(dest)
    }

    async fn write_error_sidecar(&self, dest: &ObjectKey, error_type: &str, error_message: &str) -> Result<(), PipelineError> {
        let payload = json!({
            "error_category": error_type,
            "error_message": error_message,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let sidecar = dest.sidecar(".error.json");
        self.object_store.put(&sidecar.full_key(), serde_json::to_vec_pretty(&payload)?).await?;
        Ok(())
    }
}

/// Strips whichever of the known stage prefixes `source_key` carries, so
/// the same suffix can be re-keyed under `Failed/` or `LargeFile/`.
fn strip_known_prefix(source_key: &str) -> String {
    for prefix in [
        StagePrefix::Stage1Pending,
        StagePrefix::Stage1Standard,
        StagePrefix::Stage1LargeFile,
        StagePrefix::Stage2ParsedInputs,
    ] {
        if let Some(suffix) = source_key.strip_prefix(prefix.as_str()) {
            return suffix.to_string();
        }
    }
    source_key.rsplit_once('/').map(|(_, tail)| tail.to_string()).unwrap_or_else(|| source_key.to_string())
}

/// Inserts the `_LARGEFILE_` marker ahead of the file extension:
/// `acme/bill.pdf` -> `acme/bill_LARGEFILE_.pdf`.
fn mark_largefile(suffix: &str) -> String {
    match suffix.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}{LARGEFILE_MARKER}.{ext}"),
        None => format!("{suffix}{LARGEFILE_MARKER}"),
    }
}
