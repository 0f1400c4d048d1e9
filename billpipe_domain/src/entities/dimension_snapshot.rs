// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Dimension Snapshot Entities
//!
//! The enricher (spec §4.6) matches extracted rows against the latest
//! vendor, property, and GL dimension exports (`Enrichment/exports/{dim_
//! vendor,dim_property,dim_gl}/`). Each row is keyed by its *normalized*
//! name so exact-match lookup is a single hash-map probe; the enricher
//! falls back to the LLM-backed fuzzy matcher only on a miss.

use serde::{Deserialize, Serialize};

use crate::services::enrichment::normalize_name;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorDimensionRow {
    pub vendor_id: String,
    pub vendor_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDimensionRow {
    pub property_id: String,
    pub property_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlDimensionRow {
    pub property_id: String,
    pub utility_type: String,
    pub gl_code: String,
}

/// An in-memory index over one dimension export, keyed by normalized name.
/// Built once per enricher invocation from the latest snapshot the object
/// store holds under the dimension's export prefix.
#[derive(Debug, Clone, Default)]
pub struct NameIndex<T> {
    by_normalized_name: std::collections::HashMap<String, T>,
}

impl<T: Clone> NameIndex<T> {
    pub fn build(rows: impl IntoIterator<Item = (String, T)>) -> Self {
        let mut by_normalized_name = std::collections::HashMap::new();
        for (name, row) in rows {
            by_normalized_name.insert(normalize_name(&name), row);
        }
        Self { by_normalized_name }
    }

    pub fn lookup(&self, raw_name: &str) -> Option<&T> {
        self.by_normalized_name.get(&normalize_name(raw_name))
    }

    pub fn len(&self) -> usize {
        self.by_normalized_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_normalized_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_matches_after_normalization() {
        let index = NameIndex::build([(
            "Acme Electric & Gas".to_string(),
            VendorDimensionRow { vendor_id: "V1".into(), vendor_name: "Acme Electric & Gas".into() },
        )]);
        let found = index.lookup("acme electric and gas").unwrap();
        assert_eq!(found.vendor_id, "V1");
    }

    #[test]
    fn lookup_misses_unknown_name() {
        let index: NameIndex<VendorDimensionRow> = NameIndex::build([]);
        assert!(index.lookup("anything").is_none());
    }
}
