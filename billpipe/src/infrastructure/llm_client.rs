// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # LLM Extraction Client
//!
//! `reqwest`-backed implementation of [`LlmClient`] against the
//! Gemini-shaped `generateContent` endpoint (spec §6): the document goes in
//! as inline base64 bytes alongside the extraction prompt, the reply text
//! comes back nested under `candidates[0].content.parts[*].text`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::json;

use billpipe_domain::error::PipelineError;

use crate::application::ports::LlmClient;

pub struct GeminiLlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiLlmClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorEnvelopeBody,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelopeBody {
    #[serde(default)]
    message: String,
}

#[async_trait]
impl LlmClient for GeminiLlmClient {
    async fn extract(
        &self,
        api_key: &str,
        prompt: &str,
        document_bytes: &[u8],
        mime_type: &str,
    ) -> Result<String, PipelineError> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, api_key);
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"inline_data": {"mime_type": mime_type, "data": STANDARD.encode(document_bytes)}},
                    {"text": prompt},
                ],
            }],
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::transport(format!("LLM request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(PipelineError::rate_limit("LLM provider returned 429"));
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(PipelineError::transport(format!("LLM request failed with {status}: {message}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::transport(format!("failed to parse LLM response: {e}")))?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::transport("LLM response carried no candidates"))?;

        Ok(candidate.content.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
    }
}
