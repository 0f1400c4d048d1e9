// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Post-to-Entrata Orchestrator
//!
//! Spec §4.8. Input is a Stage 6 batch: one object holding every line of a
//! single invoice, built from Stage 4 enrichment plus Stage 5 overrides by
//! a separate build step upstream of this use case. Validates required
//! fields, submits to the accounting API, classifies the response with the
//! duplicate-aware classifier (duplicate check runs before the generic
//! error-status fallthrough — see
//! [`billpipe_domain::services::duplicate_classifier`]), escalates the
//! invoice-number suffix on a bounded retry loop when the tenant reports a
//! duplicate, and moves the batch to `Stage7_PostEntrata/` on success or
//! `Failed/` on a non-duplicate error.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use billpipe_domain::entities::ErrorRecord;
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::{ErrorRepository, ObjectStore};
use billpipe_domain::services::{classify, escalate_invoice_number, PostOutcome};
use billpipe_domain::value_objects::{ObjectKey, StagePrefix};

use crate::application::ports::{EntrataClient, EntrataInvoice};

use super::support::object_key_under;

/// Maximum number of duplicate-escalation suffixes tried (`-A`..`-Z`)
/// before the batch is treated as a terminal duplicate failure.
const MAX_SUFFIX_ESCALATIONS: u32 = 26;

pub struct EntrataPosterUseCase {
    object_store: Arc<dyn ObjectStore>,
    error_repository: Arc<dyn ErrorRepository>,
    entrata_client: Arc<dyn EntrataClient>,
}

impl EntrataPosterUseCase {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        error_repository: Arc<dyn ErrorRepository>,
        entrata_client: Arc<dyn EntrataClient>,
    ) -> Self {
        Self { object_store, error_repository, entrata_client }
    }

    pub async fn execute(&self, full_key: &str) -> Result<ObjectKey, PipelineError> {
        let source = object_key_under(full_key, StagePrefix::Stage6PreEntrata)?;
        let bytes = self.object_store.get(full_key).await?;
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<Value> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;

        let mut invoice = build_invoice(&lines)?;

        let mut attempt: u32 = 0;
        loop {
            match self.entrata_client.post_invoice(&invoice).await {
                Ok(response) => match classify(&response.status, &response.message) {
                    PostOutcome::Success => return self.finish_success(&source, &response).await,
                    PostOutcome::Duplicate => {
                        let Some(escalated) = escalate_invoice_number(&invoice.invoice_number, attempt, MAX_SUFFIX_ESCALATIONS) else {
                            return self
                                .finish_failure(&source, "duplicate", &format!("duplicate invoice, escalation exhausted: {}", response.message))
                                .await;
                        };
                        invoice.invoice_number = escalated;
                        attempt += 1;
                    }
                    PostOutcome::Error => {
                        return self.finish_failure(&source, "transport", &response.message).await;
                    }
                },
                Err(error) => return self.finish_failure(&source, error.category(), &error.to_string()).await,
            }
        }
    }

    async fn finish_success(&self, source: &ObjectKey, response: &crate::application::ports::EntrataResponse) -> Result<ObjectKey, PipelineError> {
        let dest = source.rekeyed(StagePrefix::Stage7PostEntrata);
        self.object_store.copy(&source.full_key(), &dest.full_key()).await?;
        self.object_store.delete(&source.full_key()).await?;

        let payload = json!({
            "status": response.status,
            "message": response.message,
            "posted_at": Utc::now().to_rfc3339(),
        });
        let sidecar = dest.sidecar(".posted.json");
        self.object_store.put(&sidecar.full_key(), serde_json::to_vec_pretty(&payload)?).await?;
        Ok(dest)
    }

    async fn finish_failure(&self, source: &ObjectKey, category: &str, message: &str) -> Result<ObjectKey, PipelineError> {
        let dest = source.rekeyed(StagePrefix::Failed);
        self.object_store.copy(&source.full_key(), &dest.full_key()).await?;
        self.object_store.delete(&source.full_key()).await?;

        let payload = json!({
            "error_category": category,
            "error_message": message,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let sidecar = dest.sidecar(".error.json");
        self.object_store.put(&sidecar.full_key(), serde_json::to_vec_pretty(&payload)?).await?;

        let record = ErrorRecord::new(dest.full_key(), category.to_string(), message.to_string(), Utc::now());
        self.error_repository.record(&record).await?;

        if category == "duplicate" {
            Err(PipelineError::Duplicate(message.to_string()))
        } else {
            Err(PipelineError::Transport(message.to_string()))
        }
    }
}

/// Builds one `EntrataInvoice` from the batch's header-consistent fields
/// (spec §8's invariant: every line shares vendor/invoice/account/dates),
/// summing each line's charge for the posted amount and validating the
/// required fields named in spec §4.8 step 1.
fn build_invoice(lines: &[Value]) -> Result<EntrataInvoice, PipelineError> {
    let header = lines.first().ok_or_else(|| PipelineError::validation("Stage 6 batch has no lines"))?;

    let vendor_name = required_string(header, "Vendor Name")?;
    let invoice_number = required_string(header, "Invoice Number")?;
    let bill_date = required_string(header, "Bill Date")?;
    let due_date = string_field(header, "Due Date");
    let property_id = required_string(header, "EnrichedPropertyID")?;
    let gl_code = required_string(header, "EnrichedGLAccountNumber")?;

    let amount: f64 = lines
        .iter()
        .filter_map(|line| string_field(line, "Line Item Charge").trim().parse::<f64>().ok())
        .sum();
    if amount <= 0.0 {
        return Err(PipelineError::validation("Stage 6 batch has no line with a parseable amount"));
    }

    Ok(EntrataInvoice {
        invoice_number,
        vendor_name,
        property_id,
        gl_code,
        amount,
        bill_date,
        due_date,
    })
}

fn string_field(record: &Value, column: &str) -> String {
    record.get(column).and_then(Value::as_str).unwrap_or("").to_string()
}

fn required_string(record: &Value, column: &str) -> Result<String, PipelineError> {
    let value = string_field(record, column);
    if value.trim().is_empty() {
        Err(PipelineError::validation(format!("missing required field {column:?}")))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::application::ports::EntrataResponse;
    use crate::infrastructure::object_store::FilesystemObjectStore;

    struct NullErrorRepository;

    #[async_trait]
    impl ErrorRepository for NullErrorRepository {
        async fn record(&self, _error: &ErrorRecord) -> Result<(), PipelineError> {
            Ok(())
        }
        async fn list_for_date(&self, _date: &str) -> Result<Vec<ErrorRecord>, PipelineError> {
            Ok(Vec::new())
        }
    }

    struct ScriptedEntrataClient {
        responses: Mutex<Vec<Result<EntrataResponse, PipelineError>>>,
        seen_invoice_numbers: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EntrataClient for ScriptedEntrataClient {
        async fn post_invoice(&self, invoice: &EntrataInvoice) -> Result<EntrataResponse, PipelineError> {
            self.seen_invoice_numbers.lock().unwrap().push(invoice.invoice_number.clone());
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn batch_line(invoice: &str, charge: &str) -> String {
        json!({
            "Vendor Name": "Acme Electric",
            "Invoice Number": invoice,
            "Bill Date": "01/01/2026",
            "Due Date": "01/31/2026",
            "EnrichedPropertyID": "P1",
            "EnrichedGLAccountNumber": "5706",
            "Line Item Charge": charge,
        })
        .to_string()
    }

    #[tokio::test]
    async fn success_moves_batch_to_stage7_with_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        store.put("Stage6_PreEntrata/acme/bill.pdf.jsonl", batch_line("INV1", "100.00").into_bytes()).await.unwrap();

        let client = Arc::new(ScriptedEntrataClient {
            responses: Mutex::new(vec![Ok(EntrataResponse { status: "ok".into(), message: "accepted".into() })]),
            seen_invoice_numbers: Mutex::new(Vec::new()),
        });
        let use_case = EntrataPosterUseCase::new(store.clone(), Arc::new(NullErrorRepository), client);

        let dest = use_case.execute("Stage6_PreEntrata/acme/bill.pdf.jsonl").await.unwrap();
        assert_eq!(dest.full_key(), "Stage7_PostEntrata/acme/bill.pdf.jsonl");
        assert!(store.head(&dest.sidecar(".posted.json").full_key()).await.unwrap().is_some());
        assert!(store.head("Stage6_PreEntrata/acme/bill.pdf.jsonl").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_escalates_invoice_number_and_retries() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        store.put("Stage6_PreEntrata/acme/bill.pdf.jsonl", batch_line("INV1", "100.00").into_bytes()).await.unwrap();

        let client = Arc::new(ScriptedEntrataClient {
            responses: Mutex::new(vec![
                Ok(EntrataResponse { status: "error".into(), message: "duplicate invoice".into() }),
                Ok(EntrataResponse { status: "ok".into(), message: "accepted".into() }),
            ]),
            seen_invoice_numbers: Mutex::new(Vec::new()),
        });
        let use_case = EntrataPosterUseCase::new(store.clone(), Arc::new(NullErrorRepository), client.clone());

        let dest = use_case.execute("Stage6_PreEntrata/acme/bill.pdf.jsonl").await.unwrap();
        assert_eq!(dest.full_key(), "Stage7_PostEntrata/acme/bill.pdf.jsonl");

        let seen = client.seen_invoice_numbers.lock().unwrap();
        assert_eq!(seen.as_slice(), ["INV1", "INV1-A"]);
    }

    #[tokio::test]
    async fn non_duplicate_error_parks_in_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        store.put("Stage6_PreEntrata/acme/bill.pdf.jsonl", batch_line("INV1", "100.00").into_bytes()).await.unwrap();

        let client = Arc::new(ScriptedEntrataClient {
            responses: Mutex::new(vec![Ok(EntrataResponse { status: "error".into(), message: "invalid GL code".into() })]),
            seen_invoice_numbers: Mutex::new(Vec::new()),
        });
        let use_case = EntrataPosterUseCase::new(store.clone(), Arc::new(NullErrorRepository), client);

        let result = use_case.execute("Stage6_PreEntrata/acme/bill.pdf.jsonl").await;
        assert!(result.is_err());
        assert!(store.head("Failed/acme/bill.pdf.jsonl").await.unwrap().is_some());
        assert!(store.head("Stage6_PreEntrata/acme/bill.pdf.jsonl").await.unwrap().is_none());
    }

    #[test]
    fn build_invoice_rejects_missing_required_field() {
        let line: Value = serde_json::from_str(&json!({"Vendor Name": "Acme"}).to_string()).unwrap();
        assert!(build_invoice(&[line]).is_err());
    }

    #[test]
    fn build_invoice_sums_line_charges() {
        let lines: Vec<Value> = vec![
            serde_json::from_str(&batch_line("INV1", "50.00")).unwrap(),
            serde_json::from_str(&batch_line("INV1", "25.50")).unwrap(),
        ];
        let invoice = build_invoice(&lines).unwrap();
        assert_eq!(invoice.amount, 75.5);
    }
}
