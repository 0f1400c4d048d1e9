// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Value objects: immutable, content-defined types with no identity of their
//! own beyond their value.

pub mod job_id;
pub mod line_id;
pub mod object_key;
pub mod pdf_id;
pub mod stable_hash;

pub use job_id::JobId;
pub use line_id::LineId;
pub use object_key::{ObjectKey, StagePrefix};
pub use pdf_id::PdfId;
pub use stable_hash::{stable_line_hash, STABLE_HASH_VERSION};
