// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Routing Decision Entity
//!
//! Records why the router sent a given PDF to `standard` or `largefile`.
//! Ported from the `jrk-bill-router-log` DynamoDB item shape into a typed
//! entity the pipeline's own audit-log repository persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Standard,
    LargeFile,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Standard => "standard",
            Route::LargeFile => "largefile",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub pdf_key: String,
    pub page_count: i32,
    pub file_size_mb: f64,
    pub route: Route,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl RoutingDecision {
    /// Page count of `-1` (could not be determined) always routes to
    /// `standard` with this reason, matching the router's documented
    /// fail-open behavior.
    pub const UNKNOWN_PAGE_COUNT_REASON: &'static str = "unknown_page_count_default_standard";
    pub const WITHIN_THRESHOLDS_REASON: &'static str = "within_thresholds";

    pub fn decide(
        pdf_key: impl Into<String>,
        page_count: i32,
        file_size_mb: f64,
        max_pages_standard: u32,
        max_size_mb_standard: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let (route, reason) = if page_count < 0 {
            (Route::Standard, Self::UNKNOWN_PAGE_COUNT_REASON.to_string())
        } else if page_count as u32 > max_pages_standard {
            (
                Route::LargeFile,
                format!("page_count_{page_count}_exceeds_{max_pages_standard}"),
            )
        } else if file_size_mb > max_size_mb_standard {
            (
                Route::LargeFile,
                format!("file_size_{file_size_mb:.1}MB_exceeds_{max_size_mb_standard}MB"),
            )
        } else {
            (Route::Standard, Self::WITHIN_THRESHOLDS_REASON.to_string())
        };

        Self {
            pdf_key: pdf_key.into(),
            page_count,
            file_size_mb,
            route,
            reason,
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-05T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn unknown_page_count_defaults_to_standard() {
        let d = RoutingDecision::decide("k", -1, 2.0, 10, 10.0, now());
        assert_eq!(d.route, Route::Standard);
        assert_eq!(d.reason, RoutingDecision::UNKNOWN_PAGE_COUNT_REASON);
    }

    #[test]
    fn too_many_pages_routes_largefile() {
        let d = RoutingDecision::decide("k", 11, 2.0, 10, 10.0, now());
        assert_eq!(d.route, Route::LargeFile);
        assert_eq!(d.reason, "page_count_11_exceeds_10");
    }

    #[test]
    fn oversized_file_routes_largefile() {
        let d = RoutingDecision::decide("k", 5, 10.5, 10, 10.0, now());
        assert_eq!(d.route, Route::LargeFile);
        assert_eq!(d.reason, "file_size_10.5MB_exceeds_10MB");
    }

    #[test]
    fn page_count_check_takes_priority_over_size() {
        let d = RoutingDecision::decide("k", 11, 20.0, 10, 10.0, now());
        assert!(d.reason.starts_with("page_count_"));
    }

    #[test]
    fn within_thresholds_routes_standard() {
        let d = RoutingDecision::decide("k", 3, 1.0, 10, 10.0, now());
        assert_eq!(d.route, Route::Standard);
        assert_eq!(d.reason, RoutingDecision::WITHIN_THRESHOLDS_REASON);
    }
}
