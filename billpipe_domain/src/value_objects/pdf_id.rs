// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # PDF Identifier Value Object
//!
//! `PdfId` is a content-addressed identifier: unlike `PipelineId` in the
//! original file-processing domain (randomly generated, ULID-based), a
//! `PdfId` is *derived* from the final object-store key via SHA-1, so the
//! same object always yields the same id regardless of which stage computes
//! it. This is what lets the router, the chunk aggregator, and the UBI
//! engine all agree on "which PDF" without a shared sequence generator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Content-addressed identifier for a single ingested PDF.
///
/// `PdfId = SHA1(final object-store key)`, hex-encoded. Two different PDFs
/// routed to the same stage key (which cannot happen under normal operation
/// since keys are unique per file) would collide; a re-parsed PDF at a new
/// stage key gets a *different* `PdfId`, which is why the stable line hash
/// (not the `PdfId`) is what downstream UBI matching relies on across
/// re-parses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PdfId(String);

impl PdfId {
    /// Derives a `PdfId` from an object-store key.
    pub fn from_object_key(key: &str) -> Self {
        use sha1::{Digest, Sha1};
        let mut hasher = Sha1::new();
        hasher.update(key.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Parses a previously computed hex digest, validating its shape.
    pub fn parse(hex_digest: impl Into<String>) -> Result<Self, PipelineError> {
        let s = hex_digest.into();
        if s.len() != 40 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PipelineError::validation(format!(
                "pdf_id must be a 40-character hex SHA-1 digest, got {:?}",
                s
            )));
        }
        Ok(Self(s.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PdfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_yields_same_id() {
        let a = PdfId::from_object_key("Stage1_Standard/acme/bill.pdf");
        let b = PdfId::from_object_key("Stage1_Standard/acme/bill.pdf");
        assert_eq!(a, b);
    }

    #[test]
    fn different_keys_yield_different_ids() {
        let a = PdfId::from_object_key("Stage1_Standard/acme/bill.pdf");
        let b = PdfId::from_object_key("Stage1_Standard/acme/other.pdf");
        assert_ne!(a, b);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(PdfId::parse("deadbeef").is_err());
    }

    #[test]
    fn parse_accepts_valid_digest() {
        let id = PdfId::from_object_key("x");
        assert!(PdfId::parse(id.as_str().to_string()).is_ok());
    }
}
