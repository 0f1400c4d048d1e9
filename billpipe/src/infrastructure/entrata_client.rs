// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entrata Posting Client
//!
//! `reqwest`-backed implementation of [`EntrataClient`] against Entrata's
//! accounting API (spec §6): a JSON-RPC-shaped envelope carrying an `auth`
//! block, a request id, and `method: {name, params}`. The duplicate-aware
//! response classification itself lives in the domain
//! (`billpipe_domain::services::classify`); this client only does the HTTP
//! round trip and response-shape parsing.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use billpipe_domain::error::PipelineError;

use crate::application::ports::{EntrataClient, EntrataInvoice, EntrataResponse};

pub struct HttpEntrataClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpEntrataClient {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EntrataRpcResponse {
    response: EntrataRpcBody,
}

#[derive(Debug, Deserialize)]
struct EntrataRpcBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl EntrataClient for HttpEntrataClient {
    async fn post_invoice(&self, invoice: &EntrataInvoice) -> Result<EntrataResponse, PipelineError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let body = json!({
            "auth": {"type": "basic", "username": self.username, "password": self.password},
            "requestId": request_id,
            "method": {
                "name": "postApInvoice",
                "params": {
                    "invoiceNumber": invoice.invoice_number,
                    "vendorName": invoice.vendor_name,
                    "propertyId": invoice.property_id,
                    "glCode": invoice.gl_code,
                    "amount": invoice.amount,
                    "billDate": invoice.bill_date,
                    "dueDate": invoice.due_date,
                },
            },
        });

        let response = self
            .client
            .post(format!("{}/api/v1/invoices", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::transport(format!("Entrata request failed: {e}")))?;

        let status_code = response.status();
        let parsed: EntrataRpcResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::transport(format!("failed to parse Entrata response: {e}")))?;

        if status_code.as_u16() == 401 || status_code.as_u16() == 403 {
            return Err(PipelineError::AccessDenied(parsed.response.message));
        }

        Ok(EntrataResponse {
            status: parsed.response.status,
            message: parsed.response.message,
        })
    }
}
