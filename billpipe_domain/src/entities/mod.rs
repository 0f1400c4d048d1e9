// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entities: domain objects with identity that persists across mutation.

pub mod dimension_snapshot;
pub mod error_record;
pub mod line_record;
pub mod parse_job;
pub mod review_draft;
pub mod routing_decision;
pub mod ubi_assignment;

pub use dimension_snapshot::{GlDimensionRow, NameIndex, PropertyDimensionRow, VendorDimensionRow};
pub use error_record::ErrorRecord;
pub use line_record::{InferredFields, LineRecord};
pub use parse_job::{ChunkRecord, JobStatus, ParseJob};
pub use review_draft::{ReviewDraft, ReviewStatus};
pub use routing_decision::{Route, RoutingDecision};
pub use ubi_assignment::{UbiAssignment, UbiAssignmentSet, UbiPeriod, UbiState};
