// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Column Schemas
//!
//! The utility-bill and legal-bill parsers share one shape — "LLM emits
//! exactly K pipe-delimited fields per row, literal `EMPTY` for no rows" —
//! differing only in the column list. `ColumnSchema` captures that list plus
//! the one schema-specific rule the normalizer needs: which column absorbs
//! excess fields when a row has too many (see [`crate::services::parser_engine`]).
//!
//! The utility column list is pinned to the original parser's exact output
//! columns (`original_source/aws_lambdas/us-east-1/jrk-bill-parser`); the
//! legal column list to `original_source/LEGAL_BILL_PARSER`.

/// Which bill family a document belongs to, determining which
/// [`ColumnSchema`] its rows are parsed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BillKind {
    Utility,
    Legal,
}

/// A fixed, ordered column list plus the merge-target index used by the
/// column-drift normalizer.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub kind: BillKind,
    pub columns: &'static [&'static str],
    /// Index of the column that absorbs excess pipe-delimited fields when a
    /// row has more fields than `columns.len()` (the "pipe leaked into the
    /// description" case).
    pub merge_overflow_index: usize,
}

/// Utility-bill schema: 30 columns, `Line Item Description` fixed at index
/// 24 — the column the normalizer merges overflow into.
pub const UTILITY_COLUMNS: &[&str] = &[
    "Bill To Name First Line",
    "Bill To Name Second Line",
    "Vendor Name",
    "Invoice Number",
    "Account Number",
    "Line Item Account Number",
    "Service Address",
    "Service City",
    "Service Zipcode",
    "Service State",
    "Meter Number",
    "Meter Size",
    "House Or Vacant",
    "Bill Period Start",
    "Bill Period End",
    "Utility Type",
    "Consumption Amount",
    "Unit of Measure",
    "Previous Reading",
    "Previous Reading Date",
    "Current Reading",
    "Current Reading Date",
    "Rate",
    "Number of Days",
    "Line Item Description",
    "Line Item Charge",
    "Bill Date",
    "Due Date",
    "Special Instructions",
    "Inferred Fields",
];

/// Legal-bill schema: 11 columns, no multi-line-item merge target (legal
/// bills are one amount per invoice), so overflow merges into the last
/// column (`Inferred Fields`) rather than a description field.
pub const LEGAL_COLUMNS: &[&str] = &[
    "Firm Name",
    "JRK Entity (Property)",
    "Invoice Number",
    "Claim Number",
    "Period Start Date",
    "Period End Date",
    "Matter",
    "Amount of Invoice",
    "Hours Billed For",
    "Terms",
    "Inferred Fields",
];

pub const UTILITY_SCHEMA: ColumnSchema = ColumnSchema {
    kind: BillKind::Utility,
    columns: UTILITY_COLUMNS,
    merge_overflow_index: 24,
};

pub const LEGAL_SCHEMA: ColumnSchema = ColumnSchema {
    kind: BillKind::Legal,
    columns: LEGAL_COLUMNS,
    merge_overflow_index: LEGAL_COLUMNS.len() - 1,
};

impl ColumnSchema {
    pub fn for_kind(kind: BillKind) -> &'static ColumnSchema {
        match kind {
            BillKind::Utility => &UTILITY_SCHEMA,
            BillKind::Legal => &LEGAL_SCHEMA,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Index of a named column, if present in this schema.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utility_schema_has_thirty_columns() {
        assert_eq!(UTILITY_SCHEMA.column_count(), 30);
    }

    #[test]
    fn utility_merge_index_is_line_item_description() {
        assert_eq!(UTILITY_COLUMNS[UTILITY_SCHEMA.merge_overflow_index], "Line Item Description");
    }

    #[test]
    fn legal_schema_has_eleven_columns() {
        assert_eq!(LEGAL_SCHEMA.column_count(), 11);
    }

    #[test]
    fn for_kind_selects_matching_schema() {
        assert_eq!(ColumnSchema::for_kind(BillKind::Utility).columns.len(), 30);
        assert_eq!(ColumnSchema::for_kind(BillKind::Legal).columns.len(), 11);
    }
}
