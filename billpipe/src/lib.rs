// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Bill Ingest Pipeline
//!
//! Ingest-to-ledger pipeline for utility and legal bill PDFs. A PDF dropped
//! into object storage is routed to a standard or chunked parsing path,
//! extracted into pipe-delimited line records by an LLM, enriched against
//! vendor/property/GL dimension snapshots, optionally overridden by a
//! reviewer, posted to Entrata, and finally assigned a UBI billing code.
//!
//! ## Architecture Overview
//!
//! The crate follows Clean Architecture and Domain-Driven Design principles,
//! split across three crates in this workspace:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  billpipe_bootstrap — CLI parsing, signals, exit codes      │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │  billpipe::application — use cases, one per pipeline stage  │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │  billpipe_domain — entities, value objects, domain services │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │  billpipe::infrastructure — sqlite, object store, LLM/      │
//! │  Entrata HTTP clients, config, logging, metrics             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no presentation/API layer in this crate: the `billpipe` binary's
//! CLI, wired through `billpipe_bootstrap`, is the bounded interface. The
//! review UI described in the wider system's design is an external,
//! out-of-scope caller of the same object-store and repository contracts
//! exposed here.
//!
//! ## Core Concepts
//!
//! ### Stages
//! A PDF moves through the object store by key prefix as it is routed,
//! parsed, enriched, reviewed, posted, and UBI-assigned. Each transition is
//! driven by one use case in [`application::use_cases`] and is idempotent:
//! re-delivering the same event re-runs the stage and overwrites the same
//! output key rather than producing a duplicate.
//!
//! ### Identity
//! A PDF's identity (`pdf_id`) is the SHA-1 of its final object-store key, so
//! identity survives being copied and re-keyed between stages. A line's
//! stable hash additionally survives re-parsing, re-enrichment, and review
//! edits by hashing only the fields that do not change across those
//! operations, which is what lets the UBI assignment engine recognize "the
//! same line" across re-processing.
//!
//! ### Chunked large-file processing
//! PDFs over the configured page or size threshold are split into page-range
//! chunks, processed independently (with staggered starts and independent
//! retry/backoff), and recombined by an aggregator that imposes the final
//! row ordering by chunk number.
//!
//! ## Error Handling
//!
//! [`billpipe_domain::PipelineError`] categorizes every failure into a
//! [`billpipe_domain::Disposition`] (retry, rotate API key, fail fast, or
//! sanitize-and-report) that every use case consults to decide what to do
//! next, rather than matching on error text ad hoc.
//!
//! ## Testing
//!
//! ```bash
//! # Run all tests
//! cargo test
//!
//! # Run a single crate's tests
//! cargo test -p billpipe-domain
//! ```

pub mod application;
pub mod infrastructure;

// Tests are organized as:
// - Unit tests: #[cfg(test)] modules within each source file
// - Integration tests: separate files in tests/ directory

// Re-export domain types for convenient access
pub use billpipe_domain::{Disposition, PipelineError};
