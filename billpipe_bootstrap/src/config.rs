// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap-Phase Configuration
//!
//! A minimal, immutable configuration snapshot produced by CLI parsing and
//! security validation, before the richer `billpipe::infrastructure::config`
//! layer (defaults → TOML file → `BILLPIPE__*` env overrides) takes over.
//! This type only carries what the bootstrap layer itself needs to start up:
//! the application name and the initial log level.

/// Log verbosity requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Immutable bootstrap-phase configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    app_name: String,
    log_level: LogLevel,
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    app_name: Option<String>,
    log_level: Option<LogLevel>,
}

impl AppConfigBuilder {
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn build(self) -> AppConfig {
        AppConfig {
            app_name: self.app_name.unwrap_or_else(|| "billpipe".to_string()),
            log_level: self.log_level.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let config = AppConfig::builder().build();
        assert_eq!(config.app_name(), "billpipe");
        assert_eq!(config.log_level(), LogLevel::Info);
    }

    #[test]
    fn builder_applies_overrides() {
        let config = AppConfig::builder().app_name("billpipe-cli").log_level(LogLevel::Debug).build();
        assert_eq!(config.app_name(), "billpipe-cli");
        assert_eq!(config.log_level(), LogLevel::Debug);
    }
}
