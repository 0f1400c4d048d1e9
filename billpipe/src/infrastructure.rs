// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Layer
//!
//! Adapters implementing the domain's repository traits and the
//! application's outbound ports: SQLite-backed persistence, a filesystem
//! object store, HTTP clients for the LLM provider and Entrata, plus the
//! ambient concerns (configuration, logging, metrics).

pub mod config;
pub mod entrata_client;
pub mod llm_client;
pub mod logging;
pub mod metrics;
pub mod name_matcher;
pub mod object_store;
pub mod repositories;
