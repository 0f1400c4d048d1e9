// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bill Ingest Pipeline — Domain
//!
//! Domain-Driven Design core for the utility and legal bill ingest-to-ledger
//! pipeline: value objects, entities, domain services, and repository ports.
//! This crate has no knowledge of S3, sqlite, or HTTP — those live in the
//! `billpipe` application crate's infrastructure layer, which depends on
//! this crate and provides concrete implementations of its repository
//! traits.
//!
//! ## Layout
//!
//! - [`error`] — the domain error taxonomy and its retry/rotate/fail-fast
//!   dispositions.
//! - [`value_objects`] — content-addressed IDs (`PdfId`, `LineId`), the
//!   `JobId`, stage-prefix object keys, and the stable line hash.
//! - [`entities`] — `LineRecord`, `ParseJob`, `UbiAssignment`,
//!   `RoutingDecision`, `ReviewDraft`.
//! - [`services`] — the shared column schemas, the generic parse/normalize
//!   engine, GL code resolution, Entrata response classification, and
//!   chunk-processor retry scheduling.
//! - [`repositories`] — ports for the object store, job state, UBI
//!   assignments, the router audit log, and review drafts.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use error::{Disposition, PipelineError};
