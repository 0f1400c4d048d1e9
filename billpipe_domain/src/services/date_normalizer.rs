// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Date Normalization
//!
//! Every recognized date field coerces to `MM/DD/YYYY` (spec §4.2 / §4.5).
//! Accepted source forms: `M/D/YY`, `M-D-YYYY`, `YYYY-MM-DD`, `Mon D, YYYY`,
//! and eight-digit packed forms (`YYYYMMDD` and `MMDDYYYY`, the original
//! parser accepted both packed orderings since the LLM was inconsistent
//! about which it emitted). A value that matches none of these patterns
//! passes through unchanged, per spec: this is a best-effort normalizer, not
//! a validator.

use chrono::NaiveDate;

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTH_NAMES.iter().position(|m| lower.starts_with(m)).map(|i| i as u32 + 1)
}

fn format_date(year: i32, month: u32, day: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, day).map(|_| format!("{month:02}/{day:02}/{year:04}"))
}

fn expand_two_digit_year(yy: i32) -> i32 {
    // Matches the original parser's pivot: 00-68 -> 2000s, 69-99 -> 1900s
    // (the same pivot `strptime`'s `%y` uses on POSIX systems).
    if yy <= 68 {
        2000 + yy
    } else {
        1900 + yy
    }
}

/// Tries `M/D/YY` or `M/D/YYYY` (also accepts zero-padded forms).
fn try_slash(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let month: u32 = parts[0].trim().parse().ok()?;
    let day: u32 = parts[1].trim().parse().ok()?;
    let year_raw = parts[2].trim();
    let year: i32 = year_raw.parse().ok()?;
    let year = if year_raw.len() <= 2 { expand_two_digit_year(year) } else { year };
    format_date(year, month, day)
}

/// Tries `M-D-YYYY` or `YYYY-MM-DD` (distinguished by which segment is
/// four digits).
fn try_dash(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    if parts[0].trim().len() == 4 {
        // YYYY-MM-DD
        let year: i32 = parts[0].trim().parse().ok()?;
        let month: u32 = parts[1].trim().parse().ok()?;
        let day: u32 = parts[2].trim().parse().ok()?;
        format_date(year, month, day)
    } else {
        // M-D-YYYY
        let month: u32 = parts[0].trim().parse().ok()?;
        let day: u32 = parts[1].trim().parse().ok()?;
        let year: i32 = parts[2].trim().parse().ok()?;
        format_date(year, month, day)
    }
}

/// Tries `Mon D, YYYY` / `Mon D YYYY` (e.g. `Jan 5, 2026`).
fn try_month_name(raw: &str) -> Option<String> {
    let cleaned = raw.replace(',', " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.len() != 3 {
        return None;
    }
    let month = month_from_name(tokens[0])?;
    let day: u32 = tokens[1].trim().parse().ok()?;
    let year: i32 = tokens[2].trim().parse().ok()?;
    format_date(year, month, day)
}

/// Tries an eight-digit packed date, trying `YYYYMMDD` first and falling
/// back to `MMDDYYYY` if the first interpretation isn't a valid calendar
/// date.
fn try_packed(raw: &str) -> Option<String> {
    if raw.len() != 8 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = raw[0..4].parse().ok()?;
    let month: u32 = raw[4..6].parse().ok()?;
    let day: u32 = raw[6..8].parse().ok()?;
    if let Some(d) = format_date(year, month, day) {
        return Some(d);
    }
    let month: u32 = raw[0..2].parse().ok()?;
    let day: u32 = raw[2..4].parse().ok()?;
    let year: i32 = raw[4..8].parse().ok()?;
    format_date(year, month, day)
}

/// Coerces one date field to `MM/DD/YYYY`. Returns the original string,
/// unchanged, if no recognized pattern matches (spec: unparseable values
/// pass through unchanged rather than being blanked or erroring).
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return raw.to_string();
    }

    try_slash(trimmed)
        .or_else(|| try_dash(trimmed))
        .or_else(|| try_month_name(trimmed))
        .or_else(|| try_packed(trimmed))
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_two_digit_year_expands_with_pivot() {
        assert_eq!(normalize_date("3/4/26"), "03/04/2026");
        assert_eq!(normalize_date("3/4/99"), "03/04/1999");
    }

    #[test]
    fn dash_m_d_yyyy() {
        assert_eq!(normalize_date("3-4-2026"), "03/04/2026");
    }

    #[test]
    fn dash_iso_form() {
        assert_eq!(normalize_date("2026-03-04"), "03/04/2026");
    }

    #[test]
    fn month_name_with_comma() {
        assert_eq!(normalize_date("Mar 4, 2026"), "03/04/2026");
    }

    #[test]
    fn month_name_without_comma() {
        assert_eq!(normalize_date("March 4 2026"), "03/04/2026");
    }

    #[test]
    fn packed_eight_digit_prefers_yyyymmdd() {
        assert_eq!(normalize_date("20260304"), "03/04/2026");
    }

    #[test]
    fn packed_eight_digit_falls_back_to_mmddyyyy() {
        // 13 is not a valid month, so YYYYMMDD parse fails and MMDDYYYY wins.
        assert_eq!(normalize_date("03042026"), "03/04/2026");
    }

    #[test]
    fn unparseable_value_passes_through_unchanged() {
        assert_eq!(normalize_date("see attached schedule"), "see attached schedule");
    }

    #[test]
    fn empty_string_passes_through() {
        assert_eq!(normalize_date(""), "");
    }

    #[test]
    fn already_normalized_round_trips() {
        assert_eq!(normalize_date("03/04/2026"), "03/04/2026");
    }
}
