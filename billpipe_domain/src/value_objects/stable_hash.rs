// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stable Line Hash
//!
//! The UBI assignment engine identifies "the same line" across re-parses of
//! a PDF, enrichment re-runs, and review edits by a content hash rather than
//! `line_id` (which is tied to a specific object-store key). The hash is
//! SHA-256 over the canonical JSON of the line record with a fixed,
//! version-pinned set of volatile fields removed first.
//!
//! `VOLATILE_FIELDS` is pinned at this version of the hash algorithm; adding
//! a field here changes every previously computed hash, so changes must ship
//! as a new `STABLE_HASH_VERSION` rather than silently mutating the set.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Bump whenever `VOLATILE_FIELDS` changes. Exposed so callers (the UBI
/// reconciliation job) can detect hashes computed under an older version.
pub const STABLE_HASH_VERSION: u32 = 1;

/// Fields excluded from the stable hash because they change across
/// re-parses, re-enrichment, or review/UBI annotation without the line
/// itself being "different" for UBI purposes. Per spec §4.9's
/// stable-hash discipline this set must include *exactly*: source-file /
/// extraction bookkeeping, the charge-code annotation, amount overrides,
/// the exclusion flag, the mapped-utility name, and the UBI annotations
/// themselves (legacy single-period columns plus the full array).
pub const VOLATILE_FIELDS: &[&str] = &[
    "line_id",
    "pdf_id",
    "source_file",
    "source_page_start",
    "source_page_end",
    "chunk_num",
    "extracted_at",
    "enriched_at",
    "inferred_fields",
    "reviewed",
    "reviewed_at",
    "reviewed_by",
    "charge_code",
    "amount_override",
    "excluded",
    "mapped_utility_name",
    "ubi_period",
    "ubi_amount",
    "ubi_months_total",
    "ubi_assigned_by",
    "ubi_assigned_date",
    "ubi_assignments",
    "ubi_period_count",
];

/// Computes the stable hash of a line record represented as a JSON object.
///
/// Non-object values hash as-is (after canonicalization) since they carry no
/// volatile fields to strip.
pub fn stable_line_hash(record: &Value) -> String {
    let canonical = canonicalize(record);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Produces a canonical JSON string: volatile fields stripped, object keys
/// in sorted order (guaranteed by `serde_json::Map`'s `BTreeMap` backing
/// since this crate does not enable the `preserve_order` feature), and no
/// incidental whitespace.
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let filtered: serde_json::Map<String, Value> = map
                .iter()
                .filter(|(k, _)| !VOLATILE_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            serde_json::to_string(&Value::Object(filtered)).unwrap_or_default()
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_ignores_volatile_fields() {
        let a = json!({
            "vendor": "Acme Electric",
            "line_item_charge": "123.45",
            "line_id": "abc#0",
            "extracted_at": "2026-01-01T00:00:00Z",
        });
        let b = json!({
            "vendor": "Acme Electric",
            "line_item_charge": "123.45",
            "line_id": "def#7",
            "extracted_at": "2026-06-01T00:00:00Z",
        });
        assert_eq!(stable_line_hash(&a), stable_line_hash(&b));
    }

    #[test]
    fn hash_changes_on_material_field() {
        let a = json!({"vendor": "Acme Electric", "line_item_charge": "123.45"});
        let b = json!({"vendor": "Acme Electric", "line_item_charge": "999.99"});
        assert_ne!(stable_line_hash(&a), stable_line_hash(&b));
    }

    #[test]
    fn hash_is_key_order_independent() {
        let a = json!({"a": "1", "b": "2"});
        let b = json!({"b": "2", "a": "1"});
        assert_eq!(stable_line_hash(&a), stable_line_hash(&b));
    }

    #[test]
    fn hash_is_deterministic() {
        let record = json!({"vendor": "Acme Electric", "amount": "10.00"});
        assert_eq!(stable_line_hash(&record), stable_line_hash(&record));
    }

    #[test]
    fn hash_ignores_ubi_and_override_annotations() {
        let unassigned = json!({
            "vendor": "Acme Electric",
            "line_item_charge": "123.45",
            "charge_code": Value::Null,
            "amount_override": Value::Null,
            "excluded": false,
            "mapped_utility_name": Value::Null,
            "ubi_assignments": [],
        });
        let assigned = json!({
            "vendor": "Acme Electric",
            "line_item_charge": "123.45",
            "charge_code": "5706",
            "amount_override": "100.00",
            "excluded": true,
            "mapped_utility_name": "Electric",
            "ubi_period": "2026-01",
            "ubi_amount": "100.00",
            "ubi_months_total": 1,
            "ubi_assigned_by": "jdoe",
            "ubi_assigned_date": "2026-01-15",
            "ubi_assignments": [{"period": "2026-01", "amount": "100.00"}],
            "ubi_period_count": 1,
        });
        assert_eq!(stable_line_hash(&unassigned), stable_line_hash(&assigned));
    }
}
