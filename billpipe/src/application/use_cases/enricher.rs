// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Enricher Use Case
//!
//! Spec §4.6. Reads `Stage3_ParsedOutputs/`, matches each line's vendor and
//! property names against the latest dimension snapshots (exact match on
//! normalized name, falling back to the LLM-backed fuzzy matcher), resolves
//! a GL code, parses the service address, converts consumption to gallons,
//! and lands `Stage4_EnrichedOutputs/`. Idempotent: re-running on the same
//! Stage 3 key overwrites the same Stage 4 key.
//!
//! Property resolution has no dedicated column in either bill schema — the
//! original parsers never extracted one — so this reads `Bill To Name First
//! Line`, the field utility bills addressed to a managed property actually
//! carry the property's name in. See DESIGN.md for the Open Question this
//! resolves.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use billpipe_domain::entities::{GlDimensionRow, NameIndex, PropertyDimensionRow, VendorDimensionRow};
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::ObjectStore;
use billpipe_domain::services::{build_gl_description, convert_to_gallons, parse_service_address, GlRuleTable, KeyPool, Occupancy};
use billpipe_domain::value_objects::StagePrefix;

use crate::application::ports::NameMatcher;

use super::support::object_key_under;

pub struct EnricherUseCase {
    object_store: Arc<dyn ObjectStore>,
    name_matcher: Arc<dyn NameMatcher>,
    matcher_key_pool: KeyPool,
    gl_rules: GlRuleTable,
}

impl EnricherUseCase {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        name_matcher: Arc<dyn NameMatcher>,
        matcher_key_pool: KeyPool,
        gl_rules: GlRuleTable,
    ) -> Self {
        Self {
            object_store,
            name_matcher,
            matcher_key_pool,
            gl_rules,
        }
    }

    pub async fn execute(&self, full_key: &str) -> Result<String, PipelineError> {
        let source = object_key_under(full_key, StagePrefix::Stage3ParsedOutputs)?;
        let bytes = self.object_store.get(full_key).await?;
        let text = String::from_utf8_lossy(&bytes);

        let vendor_rows = self.load_snapshot::<VendorDimensionRow>(StagePrefix::EnrichmentExportsDimVendor).await?;
        let property_rows =
            self.load_snapshot::<PropertyDimensionRow>(StagePrefix::EnrichmentExportsDimProperty).await?;
        let gl_rows = self.load_snapshot::<GlDimensionRow>(StagePrefix::EnrichmentExportsDimGl).await?;

        let vendor_index = NameIndex::build(vendor_rows.iter().map(|r| (r.vendor_name.clone(), r.clone())));
        let property_index = NameIndex::build(property_rows.iter().map(|r| (r.property_name.clone(), r.clone())));
        let vendor_candidates: Vec<(String, String)> =
            vendor_rows.iter().map(|r| (r.vendor_id.clone(), r.vendor_name.clone())).collect();
        let property_candidates: Vec<(String, String)> =
            property_rows.iter().map(|r| (r.property_id.clone(), r.property_name.clone())).collect();
        let gl_overrides: HashMap<(String, String), String> =
            gl_rows.into_iter().map(|r| ((r.property_id, r.utility_type), r.gl_code)).collect();

        let mut enriched_lines = Vec::new();
        let mut attempt: u32 = 0;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let record: Value = serde_json::from_str(line)?;
            let enriched = self
                .enrich_record(record, &vendor_index, &vendor_candidates, &property_index, &property_candidates, &gl_overrides, &mut attempt)
                .await?;
            enriched_lines.push(enriched.to_string());
        }

        let dest = source.rekeyed(StagePrefix::Stage4EnrichedOutputs);
        self.object_store.put(&dest.full_key(), enriched_lines.join("\n").into_bytes()).await?;
        Ok(dest.full_key())
    }

    async fn enrich_record(
        &self,
        mut record: Value,
        vendor_index: &NameIndex<VendorDimensionRow>,
        vendor_candidates: &[(String, String)],
        property_index: &NameIndex<PropertyDimensionRow>,
        property_candidates: &[(String, String)],
        gl_overrides: &HashMap<(String, String), String>,
        attempt: &mut u32,
    ) -> Result<Value, PipelineError> {
        let vendor_name = string_field(&record, "Vendor Name");
        let property_name = string_field(&record, "Bill To Name First Line");
        let utility_type = string_field(&record, "Utility Type");
        let occupancy = Occupancy::parse(&string_field(&record, "House Or Vacant"));
        let service_address = string_field(&record, "Service Address");
        let unit_of_measure = string_field(&record, "Unit of Measure");
        let consumption_amount: Option<f64> = string_field(&record, "Consumption Amount").trim().parse().ok();

        let (vendor_id, resolved_vendor_name) =
            self.resolve_name(&vendor_name, vendor_index, vendor_candidates, attempt).await?;
        let (property_id, resolved_property_name) =
            self.resolve_name(&property_name, property_index, property_candidates, attempt).await?;

        let gl_code = property_id
            .as_ref()
            .and_then(|id| gl_overrides.get(&(id.clone(), utility_type.clone())))
            .cloned()
            .or_else(|| self.gl_rules.resolve(&utility_type, occupancy).map(|c| c.to_string()));

        let parsed_address = parse_service_address(&service_address);
        let gl_description = gl_code.as_deref().map(|code| {
            build_gl_description(code, &utility_type, resolved_property_name.as_deref().unwrap_or(""), parsed_address.unit.as_deref())
        });

        let converted = consumption_amount.and_then(|amount| convert_to_gallons(amount, &unit_of_measure));

        if let Some(map) = record.as_object_mut() {
            map.insert("EnrichedVendorID".into(), optional_string(vendor_id));
            map.insert("EnrichedVendorName".into(), optional_string(resolved_vendor_name.clone()));
            map.insert("EnrichedPropertyID".into(), optional_string(property_id));
            map.insert("EnrichedPropertyName".into(), optional_string(resolved_property_name.clone()));
            map.insert("EnrichedGLAccountNumber".into(), optional_string(gl_code.clone()));
            map.insert(
                "EnrichedGLAccountName".into(),
                optional_string(gl_code.as_ref().map(|_| utility_type.clone())),
            );
            map.insert("GL_LINE_DESC".into(), optional_string(gl_description));
            map.insert(
                "ENRICHED CONSUMPTION".into(),
                converted.map(|v| Value::from(v)).unwrap_or(Value::Null),
            );
            map.insert(
                "ENRICHED UOM".into(),
                optional_string(converted.map(|_| "gallons".to_string())),
            );
        }

        Ok(record)
    }

    /// Exact-match lookup by normalized name, falling back to the
    /// LLM-backed fuzzy matcher on a miss. Returns `(id, display_name)`,
    /// both `None` when the raw name is blank or no match is found.
    async fn resolve_name<T: DimensionRow + Clone>(
        &self,
        raw_name: &str,
        index: &NameIndex<T>,
        candidates: &[(String, String)],
        attempt: &mut u32,
    ) -> Result<(Option<String>, Option<String>), PipelineError> {
        if raw_name.trim().is_empty() {
            return Ok((None, None));
        }
        if let Some(row) = index.lookup(raw_name) {
            return Ok((Some(row.id().to_string()), Some(row.name().to_string())));
        }
        if candidates.is_empty() {
            return Ok((None, None));
        }

        let api_key = self.matcher_key_pool.key_for_attempt(*attempt);
        *attempt += 1;
        let matched_id = self.name_matcher.match_name(api_key, raw_name, candidates).await?;
        let matched_name = matched_id
            .as_ref()
            .and_then(|id| candidates.iter().find(|(cand_id, _)| cand_id == id).map(|(_, name)| name.clone()));
        Ok((matched_id, matched_name))
    }

    async fn load_snapshot<T: serde::de::DeserializeOwned>(&self, prefix: StagePrefix) -> Result<Vec<T>, PipelineError> {
        let mut keys = self.object_store.list(prefix.as_str()).await?;
        keys.sort();
        let Some(latest) = keys.last() else {
            return Ok(Vec::new());
        };
        let bytes = self.object_store.get(latest).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Common accessor over the two dimension row shapes so `resolve_name` can
/// be generic instead of duplicated per dimension.
trait DimensionRow {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

impl DimensionRow for VendorDimensionRow {
    fn id(&self) -> &str {
        &self.vendor_id
    }
    fn name(&self) -> &str {
        &self.vendor_name
    }
}

impl DimensionRow for PropertyDimensionRow {
    fn id(&self) -> &str {
        &self.property_id
    }
    fn name(&self) -> &str {
        &self.property_name
    }
}

fn string_field(record: &Value, column: &str) -> String {
    record.get(column).and_then(Value::as_str).unwrap_or("").to_string()
}

fn optional_string(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}
