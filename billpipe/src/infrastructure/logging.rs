// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Structured Logging
//!
//! Initializes `tracing-subscriber` with a JSON formatter for production and
//! a human-readable formatter for local runs, matching each processor stage
//! (router, chunk processor, aggregator, enricher, Entrata poster, UBI
//! engine) to its own `target` so a single deployment's logs can be filtered
//! per stage.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes global tracing. `json` selects the production formatter;
/// otherwise logs are human-readable, matching local development.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        fmt().with_env_filter(filter).json().with_target(true).init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }
}
