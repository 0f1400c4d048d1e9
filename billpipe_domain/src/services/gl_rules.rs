// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # GL Code Resolution
//!
//! Enrichment (spec §4.4) resolves a GL code for each line item from the
//! utility type plus the `House Or Vacant` flag. Most utility types map to
//! one GL code regardless of occupancy; a few split between a "house"
//! (JRK-occupied) code and a "vacant" code, mirroring the split columns
//! `dim_gl` carries for those utility types.

use std::collections::HashMap;

/// Whether the unit a line item's meter serves is occupied by the owner
/// (house) or vacant, as reported in the `House Or Vacant` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    House,
    Vacant,
    Unknown,
}

impl Occupancy {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "house" | "h" => Occupancy::House,
            "vacant" | "v" => Occupancy::Vacant,
            _ => Occupancy::Unknown,
        }
    }
}

/// A GL code, or an occupancy-split pair of GL codes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GlRule {
    Fixed(&'static str),
    SplitByOccupancy { house: &'static str, vacant: &'static str },
}

/// Looks up the GL rule for a utility type against the property's
/// vendor/GL dimension export, falling back to the split rule the house
/// electric/water utility types carry when the dimension export has no
/// row for this exact `(property, utility_type)` pair.
pub struct GlRuleTable {
    by_utility_type: HashMap<String, GlRule>,
}

impl GlRuleTable {
    /// Default table mirroring the house/vacant GL-code pairs the original
    /// `dim_gl` export carries, covering at least electric, gas, water,
    /// sewer, trash, and HOA (spec §4.6).
    pub fn default_table() -> Self {
        let mut by_utility_type = HashMap::new();
        by_utility_type.insert(
            "Electric".to_string(),
            GlRule::SplitByOccupancy { house: "5706", vacant: "5705" },
        );
        by_utility_type.insert(
            "Water".to_string(),
            GlRule::SplitByOccupancy { house: "5710", vacant: "5715" },
        );
        by_utility_type.insert(
            "Gas".to_string(),
            GlRule::SplitByOccupancy { house: "5716", vacant: "5717" },
        );
        by_utility_type.insert(
            "Sewer".to_string(),
            GlRule::SplitByOccupancy { house: "5712", vacant: "5713" },
        );
        by_utility_type.insert("Trash".to_string(), GlRule::Fixed("5720"));
        by_utility_type.insert("HOA".to_string(), GlRule::Fixed("5730"));
        GlRuleTable { by_utility_type }
    }

    /// Overrides or adds a fixed (non-split) GL code for a utility type,
    /// as loaded from a property's `dim_gl` export row.
    pub fn set_fixed(&mut self, utility_type: &str, gl_code: &'static str) {
        self.by_utility_type.insert(utility_type.to_string(), GlRule::Fixed(gl_code));
    }

    /// Resolves the GL code for a line item. Returns `None` when the
    /// utility type is unknown to this table — callers should route such
    /// lines to `Stage5_Overrides/` for manual GL assignment rather than
    /// guessing.
    pub fn resolve(&self, utility_type: &str, occupancy: Occupancy) -> Option<&'static str> {
        match self.by_utility_type.get(utility_type)? {
            GlRule::Fixed(code) => Some(code),
            GlRule::SplitByOccupancy { house, vacant } => match occupancy {
                Occupancy::House => Some(house),
                Occupancy::Vacant => Some(vacant),
                Occupancy::Unknown => None,
            },
        }
    }
}

impl Default for GlRuleTable {
    fn default() -> Self {
        Self::default_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn electric_house_resolves_to_5706() {
        let table = GlRuleTable::default_table();
        assert_eq!(table.resolve("Electric", Occupancy::House), Some("5706"));
    }

    #[test]
    fn electric_vacant_resolves_to_5705() {
        let table = GlRuleTable::default_table();
        assert_eq!(table.resolve("Electric", Occupancy::Vacant), Some("5705"));
    }

    #[test]
    fn water_split_mirrors_electric() {
        let table = GlRuleTable::default_table();
        assert_eq!(table.resolve("Water", Occupancy::House), Some("5710"));
        assert_eq!(table.resolve("Water", Occupancy::Vacant), Some("5715"));
    }

    #[test]
    fn unknown_occupancy_on_split_utility_is_none() {
        let table = GlRuleTable::default_table();
        assert_eq!(table.resolve("Electric", Occupancy::Unknown), None);
    }

    #[test]
    fn unknown_utility_type_is_none() {
        let table = GlRuleTable::default_table();
        assert_eq!(table.resolve("Telecom", Occupancy::House), None);
    }

    #[test]
    fn fixed_override_ignores_occupancy() {
        let mut table = GlRuleTable::default_table();
        table.set_fixed("Cable", "5740");
        assert_eq!(table.resolve("Cable", Occupancy::Unknown), Some("5740"));
    }

    #[test]
    fn trash_and_hoa_are_fixed_codes_regardless_of_occupancy() {
        let table = GlRuleTable::default_table();
        assert_eq!(table.resolve("Trash", Occupancy::House), Some("5720"));
        assert_eq!(table.resolve("Trash", Occupancy::Unknown), Some("5720"));
        assert_eq!(table.resolve("HOA", Occupancy::Vacant), Some("5730"));
    }

    #[test]
    fn gas_and_sewer_split_by_occupancy() {
        let table = GlRuleTable::default_table();
        assert_eq!(table.resolve("Gas", Occupancy::House), Some("5716"));
        assert_eq!(table.resolve("Gas", Occupancy::Vacant), Some("5717"));
        assert_eq!(table.resolve("Sewer", Occupancy::House), Some("5712"));
        assert_eq!(table.resolve("Sewer", Occupancy::Vacant), Some("5713"));
    }

    #[test]
    fn occupancy_parse_is_case_insensitive() {
        assert_eq!(Occupancy::parse("House"), Occupancy::House);
        assert_eq!(Occupancy::parse("VACANT"), Occupancy::Vacant);
        assert_eq!(Occupancy::parse(""), Occupancy::Unknown);
    }
}
