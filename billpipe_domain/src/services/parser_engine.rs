// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Generic LLM → Pipe-Delimited → Validate → Normalize Engine
//!
//! Both the utility-bill and legal-bill parsers instruct the LLM to emit
//! exactly `K` pipe-delimited fields per row (`K` from the [`ColumnSchema`])
//! and the literal token `EMPTY` when a page has no line items. This module
//! is the one engine both schemas share, per the design note that the
//! rewrite should express the parser generically rather than duplicating it.

use super::column_schema::ColumnSchema;

/// The literal token the LLM is instructed to emit for a page with no rows.
pub const EMPTY_TOKEN: &str = "EMPTY";

/// Outcome of parsing one LLM reply.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    /// Rows that parsed to exactly `schema.column_count()` fields, after
    /// normalization.
    pub rows: Vec<Vec<String>>,
    /// Count of raw reply lines dropped because they could not be
    /// normalized into a full row (i.e. were completely empty after
    /// sanitization, or the reply contained no rows at all).
    pub dropped: usize,
}

/// Parses one LLM reply against a column schema.
///
/// A reply consisting solely of the `EMPTY` token (after trimming) is valid
/// and parses to zero rows with `dropped == 0` — this is the documented "no
/// line items on this page" case, not a failure.
pub fn parse_reply(reply: &str, schema: &ColumnSchema) -> ParseOutcome {
    let trimmed = reply.trim();
    if trimmed.eq_ignore_ascii_case(EMPTY_TOKEN) {
        return ParseOutcome::default();
    }

    let mut outcome = ParseOutcome::default();
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<String> = line.split('|').map(sanitize_field).collect();
        if parts.iter().all(|p| p.is_empty()) {
            outcome.dropped += 1;
            continue;
        }
        outcome.rows.push(normalize_row(parts, schema));
    }
    outcome
}

/// Strips internal pipes, carriage returns, and collapses whitespace in one
/// field — applied to every field before column-count validation so a
/// pipe inside a field's own text never masquerades as a column separator
/// downstream.
pub fn sanitize_field(raw: &str) -> String {
    let no_cr = raw.replace('\r', "");
    let no_pipe = no_cr.replace('|', " ");
    no_pipe.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The column-drift normalizer (spec §4.2): pads a too-short row with empty
/// strings; for a too-long row, assumes a pipe leaked into the schema's
/// designated overflow column and rejoins the excess fields there with a
/// `-` separator.
pub fn normalize_row(parts: Vec<String>, schema: &ColumnSchema) -> Vec<String> {
    let want = schema.column_count();
    if parts.len() == want {
        return parts;
    }
    if parts.len() < want {
        let mut padded = parts;
        padded.resize(want, String::new());
        return padded;
    }

    // Too many fields: merge the excess into merge_overflow_index.
    let overflow_index = schema.merge_overflow_index;
    let mut result = Vec::with_capacity(want);
    result.extend_from_slice(&parts[..overflow_index]);

    let excess_count = parts.len() - (want - 1);
    let merged = parts[overflow_index..overflow_index + excess_count].join("-");
    result.push(merged);

    result.extend_from_slice(&parts[overflow_index + excess_count..]);
    result
}

/// Finds the single most common non-empty value across a column, or `None`
/// if every row has that column empty.
fn majority_value<'a>(rows: &'a [Vec<String>], column_index: usize) -> Option<&'a str> {
    use std::collections::HashMap;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        if let Some(value) = row.get(column_index) {
            if !value.is_empty() {
                *counts.entry(value.as_str()).or_insert(0) += 1;
            }
        }
    }
    counts.into_iter().max_by_key(|(_, count)| *count).map(|(value, _)| value)
}

/// Header-field propagation across a whole document's rows (spec §4.2 /
/// §4.5): for each header-level column, finds the majority non-empty value
/// and back-fills every row whose value is empty. Also symmetrically
/// back-fills `Account Number` from `Line Item Account Number` and vice
/// versa wherever both columns exist in the schema.
pub fn propagate_header_fields(rows: &mut [Vec<String>], schema: &ColumnSchema, header_columns: &[&str]) {
    for &column in header_columns {
        let Some(index) = schema.index_of(column) else { continue };
        let Some(majority) = majority_value(rows, index).map(str::to_string) else { continue };
        for row in rows.iter_mut() {
            if row[index].is_empty() {
                row[index] = majority.clone();
            }
        }
    }

    if let (Some(account_idx), Some(line_account_idx)) =
        (schema.index_of("Account Number"), schema.index_of("Line Item Account Number"))
    {
        for row in rows.iter_mut() {
            if row[account_idx].is_empty() && !row[line_account_idx].is_empty() {
                row[account_idx] = row[line_account_idx].clone();
            } else if row[line_account_idx].is_empty() && !row[account_idx].is_empty() {
                row[line_account_idx] = row[account_idx].clone();
            }
        }
    }
}
