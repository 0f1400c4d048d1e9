// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # LLM Fuzzy Name Matcher
//!
//! The enricher's fallback match path (spec §4.6) against the same
//! Gemini-shaped `generateContent` endpoint [`crate::infrastructure::llm_client`]
//! uses, but text-only: no `inline_data` part, since there's no document to
//! attach, just a name and a candidate list. A separate client (rather than
//! reusing `GeminiLlmClient::extract`, which requires document bytes) keeps
//! the two call shapes from leaking into each other.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use billpipe_domain::error::PipelineError;

use crate::application::ports::NameMatcher;

pub struct GeminiNameMatcher {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiNameMatcher {
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

const NO_MATCH_TOKEN: &str = "NONE";

fn build_prompt(raw_name: &str, candidates: &[(String, String)]) -> String {
    let list = candidates.iter().map(|(id, name)| format!("{id} = {name}")).collect::<Vec<_>>().join("\n");
    format!(
        "You match billing names to a known dimension list. Given the name \"{raw_name}\", \
         pick the single best match from this id/name list (one per line):\n{list}\n\n\
         Reply with only the matching id, or the literal token {NO_MATCH_TOKEN} if none of \
         these are plausibly the same entity."
    )
}

#[async_trait]
impl NameMatcher for GeminiNameMatcher {
    async fn match_name(
        &self,
        api_key: &str,
        raw_name: &str,
        candidates: &[(String, String)],
    ) -> Result<Option<String>, PipelineError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, api_key);
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": build_prompt(raw_name, candidates)}],
            }],
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::transport(format!("name matcher request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(PipelineError::rate_limit("name matcher provider returned 429"));
        }
        if !status.is_success() {
            return Err(PipelineError::transport(format!("name matcher request failed with {status}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::transport(format!("failed to parse name matcher response: {e}")))?;

        let reply = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
            .unwrap_or_default();
        let answer = reply.trim();

        if answer.is_empty() || answer.eq_ignore_ascii_case(NO_MATCH_TOKEN) {
            return Ok(None);
        }
        if candidates.iter().any(|(id, _)| id == answer) {
            Ok(Some(answer.to_string()))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_every_candidate_with_its_id() {
        let prompt = build_prompt("Acme Elec", &[("V1".into(), "Acme Electric".into()), ("V2".into(), "Beta Gas".into())]);
        assert!(prompt.contains("V1 = Acme Electric"));
        assert!(prompt.contains("V2 = Beta Gas"));
        assert!(prompt.contains("Acme Elec"));
    }
}
