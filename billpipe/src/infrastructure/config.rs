// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Configuration
//!
//! Loads the runtime tuning knobs (spec §8) from environment variables,
//! layered over the defaults the original Lambda functions shipped with, via
//! the `config` crate. A `config.toml`/`config.yaml` file, if present, takes
//! precedence over the built-in defaults but is itself overridden by
//! environment variables — the same override order the Lambda deployment
//! scripts used (env vars are how Lambda injects per-stage settings).

use serde::Deserialize;

use billpipe_domain::error::PipelineError;
use billpipe_domain::services::RetryConfig;

/// Fully resolved application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bucket: String,
    pub max_pages_standard: u32,
    pub max_size_mb_standard: f64,
    pub pages_per_chunk: u32,
    pub max_attempts: u32,
    pub base_backoff_seconds: f64,
    pub chunk_stagger_seconds: f64,
    pub max_dropped_rows_before_retry: u32,
    pub database_url: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_keys: Vec<String>,
    pub entrata_base_url: String,
    pub entrata_username: String,
    pub entrata_password: String,
    pub entrata_max_suffix_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bucket: "bill-ingest".to_string(),
            max_pages_standard: 10,
            max_size_mb_standard: 10.0,
            pages_per_chunk: 2,
            max_attempts: 10,
            base_backoff_seconds: 2.0,
            chunk_stagger_seconds: 1.5,
            max_dropped_rows_before_retry: 5,
            database_url: "sqlite://./billpipe.db".to_string(),
            llm_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            llm_model: "gemini-1.5-flash".to_string(),
            llm_api_keys: Vec::new(),
            entrata_base_url: String::new(),
            entrata_username: String::new(),
            entrata_password: String::new(),
            entrata_max_suffix_attempts: 26,
        }
    }
}

impl AppConfig {
    /// Loads configuration from an optional file plus the `BILLPIPE_*`
    /// environment variable prefix, environment variables taking
    /// precedence.
    pub fn load(config_path: Option<&str>) -> Result<Self, PipelineError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(config::Environment::with_prefix("BILLPIPE").separator("__").try_parsing(true));

        let resolved = builder
            .build()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        resolved
            .try_deserialize()
            .map_err(|e| PipelineError::Configuration(e.to_string()))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_backoff: std::time::Duration::from_secs_f64(self.base_backoff_seconds),
            chunk_stagger: std::time::Duration::from_secs_f64(self.chunk_stagger_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_original_lambda_environment() {
        let config = AppConfig::default();
        assert_eq!(config.max_pages_standard, 10);
        assert_eq!(config.max_size_mb_standard, 10.0);
        assert_eq!(config.pages_per_chunk, 2);
        assert_eq!(config.max_attempts, 10);
    }

    #[test]
    fn load_with_no_file_falls_back_to_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.max_attempts, 10);
    }
}
