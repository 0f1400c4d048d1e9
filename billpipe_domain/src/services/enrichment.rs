// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Enrichment Support
//!
//! Pure functions the Enricher (spec §4.6) composes: vendor/property name
//! normalization for dimension matching, service-address parsing, unit
//! conversion to gallons, and the GL description string builder. Kept free
//! of any repository/HTTP dependency so it can be unit tested directly; the
//! `enricher` application service wires these against the dimension
//! snapshots and the fuzzy-match LLM call.

use std::collections::HashMap;

/// Lowercases, expands `&` to `and`, strips punctuation, and collapses
/// whitespace — the normalization both vendor and property names go through
/// before an exact-match lookup against the dimension snapshot.
pub fn normalize_name(raw: &str) -> String {
    let expanded = raw.replace('&', " and ");
    let stripped: String = expanded
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    stripped.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parsed components of a service address line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAddress {
    pub street_num: Option<String>,
    pub street_letter: Option<String>,
    pub unit: Option<String>,
    pub building: Option<String>,
}

/// Splits a service address into `{street_num, street_letter, unit,
/// building}` using the fixed patterns spec §4.6 names: `APT`, `UNIT`,
/// `STE`/`SUITE`, `#`, `BLDG`.
pub fn parse_service_address(raw: &str) -> ParsedAddress {
    let mut result = ParsedAddress::default();
    let upper = raw.to_uppercase();

    if let Some(first_token) = raw.split_whitespace().next() {
        let digits: String = first_token.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            result.street_num = Some(digits.clone());
            let rest: String = first_token.chars().skip(digits.len()).collect();
            if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphabetic()) {
                result.street_letter = Some(rest);
            }
        }
    }

    for marker in ["APT", "UNIT", "STE", "SUITE", "#"] {
        if let Some(pos) = upper.find(marker) {
            let after = raw[pos + marker.len()..].trim_start_matches(['.', ' ', ':', '-']);
            let token = after.split_whitespace().next().unwrap_or("").trim_matches(',');
            if !token.is_empty() {
                result.unit = Some(token.to_string());
                break;
            }
        }
    }

    if let Some(pos) = upper.find("BLDG") {
        let after = raw[pos + 4..].trim_start_matches(['.', ' ', ':', '-']);
        let token = after.split_whitespace().next().unwrap_or("").trim_matches(',');
        if !token.is_empty() {
            result.building = Some(token.to_string());
        }
    }

    result
}

/// Conversion factors to gallons, keyed by lowercased unit-of-measure
/// token, per spec §4.6's fixed conversion table.
fn gallons_conversion_factor(unit: &str) -> Option<f64> {
    let table: HashMap<&str, f64> = HashMap::from([
        ("gallon", 1.0),
        ("gallons", 1.0),
        ("gal", 1.0),
        ("ccf", 748.0),
        ("kgal", 1000.0),
        ("cubic-feet", 7.48052),
        ("cubic feet", 7.48052),
        ("cf", 7.48052),
        ("mgal", 1_000_000.0),
        ("thousand-gallons", 1000.0),
        ("thousand gallons", 1000.0),
    ]);
    table.get(unit.to_lowercase().as_str()).copied()
}

/// Converts a consumption amount to gallons, when the unit of measure is
/// recognized. Returns `None` (not zero) when the unit isn't in the
/// conversion table, so the caller can leave `ENRICHED CONSUMPTION` /
/// `ENRICHED UOM` blank rather than write a wrong number.
pub fn convert_to_gallons(amount: f64, unit_of_measure: &str) -> Option<f64> {
    gallons_conversion_factor(unit_of_measure).map(|factor| amount * factor)
}

/// Builds the compact GL description string for a GL-code family: `"<GL
/// code> - <utility type> - <property> <unit>"`, trimming empty segments.
pub fn build_gl_description(gl_code: &str, utility_type: &str, property_name: &str, unit: Option<&str>) -> String {
    let mut parts = vec![gl_code.to_string(), utility_type.to_string(), property_name.to_string()];
    if let Some(unit) = unit {
        if !unit.is_empty() {
            parts.push(unit.to_string());
        }
    }
    parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" - ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_expands_ampersand_and_strips_punctuation() {
        assert_eq!(normalize_name("Smith & Sons, LLC."), "smith and sons llc");
    }

    #[test]
    fn normalize_name_collapses_whitespace() {
        assert_eq!(normalize_name("  Acme   Electric  "), "acme electric");
    }

    #[test]
    fn parses_street_num_and_letter() {
        let parsed = parse_service_address("123B Main St, Apt 4, Bldg C");
        assert_eq!(parsed.street_num.as_deref(), Some("123"));
        assert_eq!(parsed.street_letter.as_deref(), Some("B"));
        assert_eq!(parsed.unit.as_deref(), Some("4,"));
        assert_eq!(parsed.building.as_deref(), Some("C"));
    }

    #[test]
    fn parses_unit_number_sign() {
        let parsed = parse_service_address("500 Oak Ave #12");
        assert_eq!(parsed.unit.as_deref(), Some("12"));
    }

    #[test]
    fn parses_suite() {
        let parsed = parse_service_address("1 Corporate Dr Suite 200");
        assert_eq!(parsed.unit.as_deref(), Some("200"));
    }

    #[test]
    fn address_with_no_leading_number_has_no_street_num() {
        let parsed = parse_service_address("Main St");
        assert_eq!(parsed.street_num, None);
    }

    #[test]
    fn gallons_conversion_table_matches_spec() {
        assert_eq!(convert_to_gallons(1.0, "ccf"), Some(748.0));
        assert_eq!(convert_to_gallons(2.0, "kgal"), Some(2000.0));
        assert_eq!(convert_to_gallons(1.0, "mgal"), Some(1_000_000.0));
        assert_eq!(convert_to_gallons(10.0, "gallon"), Some(10.0));
    }

    #[test]
    fn unrecognized_unit_converts_to_none() {
        assert_eq!(convert_to_gallons(10.0, "therms"), None);
    }

    #[test]
    fn gl_description_omits_empty_unit() {
        let desc = build_gl_description("5706", "Electric", "Acme Apartments", None);
        assert_eq!(desc, "5706 - Electric - Acme Apartments");
    }

    #[test]
    fn gl_description_includes_unit_when_present() {
        let desc = build_gl_description("5706", "Electric", "Acme Apartments", Some("Bldg C"));
        assert_eq!(desc, "5706 - Electric - Acme Apartments - Bldg C");
    }
}
