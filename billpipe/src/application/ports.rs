// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application-Layer Service Ports
//!
//! Outbound ports the use cases program against, alongside the domain's
//! repository traits. Both external systems the pipeline talks to (the LLM
//! provider, Entrata) are HTTP APIs with a shape narrow enough to model as
//! a single trait method each; the infrastructure layer wires these to
//! `reqwest`, tests wire them to in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use billpipe_domain::error::PipelineError;

/// One completion call against the LLM provider (spec §6): a prompt plus
/// the raw bytes of the document page(s) being extracted.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Issues `POST {base}/models/{model}:generateContent?key={api_key}`
    /// and returns the concatenated text of `candidates[0].content.parts`.
    /// A 429 response must be surfaced as `PipelineError::RateLimit` so the
    /// caller's retry loop rotates keys rather than backing off in place.
    async fn extract(
        &self,
        api_key: &str,
        prompt: &str,
        document_bytes: &[u8],
        mime_type: &str,
    ) -> Result<String, PipelineError>;
}

/// One invoice-posting call against Entrata's accounting API (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrataInvoice {
    pub invoice_number: String,
    pub vendor_name: String,
    pub property_id: String,
    pub gl_code: String,
    pub amount: f64,
    pub bill_date: String,
    pub due_date: String,
}

/// Parsed response from an Entrata post, classified by
/// `billpipe_domain::services::classify`.
#[derive(Debug, Clone)]
pub struct EntrataResponse {
    pub status: String,
    pub message: String,
}

#[async_trait]
pub trait EntrataClient: Send + Sync {
    /// Posts one invoice via Entrata's JSON-RPC-shaped `method: {name,
    /// params}` envelope, authenticated with the configured credentials.
    async fn post_invoice(&self, invoice: &EntrataInvoice) -> Result<EntrataResponse, PipelineError>;
}

/// LLM-backed fuzzy name matcher (spec §4.6): the enricher's fallback when
/// a vendor or property name misses exact normalized-name lookup against
/// its dimension snapshot. Rotates through its own "matcher keys" pool,
/// separate from the extraction key pool, since the two calls have very
/// different shapes and cost profiles.
#[async_trait]
pub trait NameMatcher: Send + Sync {
    /// Returns the `(id, name)` candidate's id judged the best match for
    /// `raw_name`, or `None` if no candidate clears the matcher's
    /// confidence bar.
    async fn match_name(
        &self,
        api_key: &str,
        raw_name: &str,
        candidates: &[(String, String)],
    ) -> Result<Option<String>, PipelineError>;
}
