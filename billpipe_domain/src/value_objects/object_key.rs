// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object-Store Stage Prefixes and Keys
//!
//! The pipeline's data model is entirely defined by which prefix an object
//! lives under. `StagePrefix` enumerates every prefix named in the data
//! model; `ObjectKey` pairs a prefix with the remainder of the key so stage
//! transitions are expressed as "move this suffix to a different prefix"
//! rather than ad hoc string surgery.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every stage prefix the pipeline moves objects through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StagePrefix {
    Stage1Pending,
    Stage1Standard,
    Stage1LargeFile,
    Stage1LargeFileChunks,
    Stage1LargeFileResults,
    Stage2ParsedInputs,
    Stage3ParsedOutputs,
    Stage4EnrichedOutputs,
    Stage5Overrides,
    Stage6PreEntrata,
    Stage7PostEntrata,
    Stage8UbiAssigned,
    Stage99HistoricalArchive,
    Failed,
    EnrichmentExportsDimVendor,
    EnrichmentExportsDimProperty,
    EnrichmentExportsDimGl,
}

impl StagePrefix {
    /// The literal object-store prefix string, matching the data model
    /// table verbatim (trailing slash included, as S3-style prefixes use).
    pub fn as_str(&self) -> &'static str {
        match self {
            StagePrefix::Stage1Pending => "Stage1_Pending/",
            StagePrefix::Stage1Standard => "Stage1_Standard/",
            StagePrefix::Stage1LargeFile => "Stage1_LargeFile/",
            StagePrefix::Stage1LargeFileChunks => "Stage1_LargeFile_Chunks/",
            StagePrefix::Stage1LargeFileResults => "Stage1_LargeFile_Results/",
            StagePrefix::Stage2ParsedInputs => "Stage2_ParsedInputs/",
            StagePrefix::Stage3ParsedOutputs => "Stage3_ParsedOutputs/",
            StagePrefix::Stage4EnrichedOutputs => "Stage4_EnrichedOutputs/",
            StagePrefix::Stage5Overrides => "Stage5_Overrides/",
            StagePrefix::Stage6PreEntrata => "Stage6_PreEntrata/",
            StagePrefix::Stage7PostEntrata => "Stage7_PostEntrata/",
            StagePrefix::Stage8UbiAssigned => "Stage8_UBI_Assigned/",
            StagePrefix::Stage99HistoricalArchive => "Stage99_HistoricalArchive/",
            StagePrefix::Failed => "Failed/",
            StagePrefix::EnrichmentExportsDimVendor => "Enrichment/exports/dim_vendor/",
            StagePrefix::EnrichmentExportsDimProperty => "Enrichment/exports/dim_property/",
            StagePrefix::EnrichmentExportsDimGl => "Enrichment/exports/dim_gl/",
        }
    }
}

impl fmt::Display for StagePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully-qualified object-store key: a stage prefix plus the suffix that
/// travels unchanged across every stage transition a given PDF goes through
/// (so `Stage1_Standard/acme/2026-01/bill.pdf` and
/// `Stage3_ParsedOutputs/2026-01-05/acme/2026-01/bill.pdf.jsonl` both carry
/// the same logical suffix, only the prefix and extension change).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    prefix: StagePrefix,
    suffix: String,
}

impl ObjectKey {
    pub fn new(prefix: StagePrefix, suffix: impl Into<String>) -> Self {
        Self {
            prefix,
            suffix: suffix.into(),
        }
    }

    pub fn prefix(&self) -> StagePrefix {
        self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns the same suffix under a different stage prefix — the core
    /// operation behind every stage transition in the pipeline.
    pub fn rekeyed(&self, new_prefix: StagePrefix) -> Self {
        Self::new(new_prefix, self.suffix.clone())
    }

    /// The full key string as it would be stored in the object store.
    pub fn full_key(&self) -> String {
        format!("{}{}", self.prefix.as_str(), self.suffix)
    }

    /// The sidecar key for a given extension (`.notes.json`, `.rework.json`),
    /// formed by stripping the suffix's own extension and appending the
    /// sidecar extension, matching the router's sidecar-propagation rule.
    pub fn sidecar(&self, sidecar_ext: &str) -> Self {
        let base = match self.suffix.rsplit_once('.') {
            Some((base, _ext)) => base.to_string(),
            None => self.suffix.clone(),
        };
        Self::new(self.prefix, format!("{base}{sidecar_ext}"))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_key())
    }
}
