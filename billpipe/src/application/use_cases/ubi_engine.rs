// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # UBI Assignment Engine
//!
//! Spec §4.9. Stage 7 is the source of truth for "what lines exist"; the
//! [`UbiRepository`] tables are the source of truth for "which lines have
//! been billed back". A line's state is derived by combining the two:
//! unassigned (hash absent from both tables), assigned (hash has ≥1 live
//! assignment rows), or archived (hash moved to the archive twin).
//!
//! Every mutation dual-writes an enriched copy of the line to
//! `Stage8_UBI_Assigned/` and `Stage99_HistoricalArchive/`, keyed by the
//! line's stable hash (the same identity `UbiRepository` keys its tables
//! by). The write reflects the full assignment set as of that write, not a
//! diff — an `unassign` down to zero periods still overwrites the Stage 8
//! copy (an object this engine created, which §5 permits) rather than
//! deleting it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde_json::{json, Value};

use billpipe_domain::entities::{UbiAssignment, UbiAssignmentSet, UbiPeriod};
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::{DateRange, MasterBillRow, ObjectStore, PropertyUnassignedStats, UbiRepository};
use billpipe_domain::value_objects::{stable_line_hash, ObjectKey, StagePrefix};

pub struct UbiEngineUseCase {
    object_store: Arc<dyn ObjectStore>,
    ubi_repository: Arc<dyn UbiRepository>,
}

/// Which bucket a `list_*` scan keeps lines in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UbiState {
    Unassigned,
    Assigned,
    Archived,
}

impl UbiEngineUseCase {
    pub fn new(object_store: Arc<dyn ObjectStore>, ubi_repository: Arc<dyn UbiRepository>) -> Self {
        Self { object_store, ubi_repository }
    }

    pub async fn list_unassigned(&self, range: DateRange) -> Result<Vec<Value>, PipelineError> {
        self.list_by_state(range, UbiState::Unassigned).await
    }

    pub async fn list_assigned(&self, range: DateRange) -> Result<Vec<Value>, PipelineError> {
        self.list_by_state(range, UbiState::Assigned).await
    }

    pub async fn list_archived(&self, range: DateRange) -> Result<Vec<Value>, PipelineError> {
        self.list_by_state(range, UbiState::Archived).await
    }

    async fn list_by_state(&self, range: DateRange, state: UbiState) -> Result<Vec<Value>, PipelineError> {
        let keys = self.object_store.list(StagePrefix::Stage7PostEntrata.as_str()).await?;
        let mut rows = Vec::new();
        for key in keys {
            let suffix = key.strip_prefix(StagePrefix::Stage7PostEntrata.as_str()).unwrap_or(&key);
            match date_prefix_of(suffix) {
                Some(date) if range.contains(&date) => {}
                _ => continue,
            }

            let bytes = self.object_store.get(&key).await?;
            let text = String::from_utf8_lossy(&bytes);
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                let record: Value = serde_json::from_str(line)?;
                let hash = stable_line_hash(&record);
                let archived = self.ubi_repository.is_archived(&hash).await?;
                let assigned = !self.ubi_repository.assignments_for(&hash).await?.is_empty();

                let matches = match state {
                    UbiState::Unassigned => !archived && !assigned,
                    UbiState::Assigned => !archived && assigned,
                    UbiState::Archived => archived,
                };
                if matches {
                    rows.push(record);
                }
            }
        }
        Ok(rows)
    }

    /// Inserts one assignment row per period under `line_hash`, then
    /// dual-writes the enriched copy reflecting the full assignment set.
    /// `source_record` is the Stage 7 line, when the caller already has it
    /// (e.g. the review flow, acting right after a `list_unassigned` scan);
    /// without it the previous Stage 8 copy is reused as the enrichment
    /// base, falling back to a bare `{line_hash}` object on a first-ever
    /// assignment driven purely from a hash (the CLI's flattened `ubi
    /// assign --line-hash ... --period ...` surface carries no line body).
    pub async fn assign(&self, line_hash: &str, property_id: &str, periods: &[UbiAssignment], source_record: Option<&Value>) -> Result<(), PipelineError> {
        self.ubi_repository.assign(line_hash, property_id, periods).await?;
        self.dual_write(line_hash, source_record).await
    }

    pub async fn reassign(&self, line_hash: &str, period: &UbiPeriod, updated: UbiAssignment, source_record: Option<&Value>) -> Result<(), PipelineError> {
        self.ubi_repository.reassign(line_hash, period, updated).await?;
        self.dual_write(line_hash, source_record).await
    }

    pub async fn unassign(&self, line_hash: &str, period: &UbiPeriod, source_record: Option<&Value>) -> Result<(), PipelineError> {
        self.ubi_repository.unassign(line_hash, period).await?;
        self.dual_write(line_hash, source_record).await
    }

    pub async fn archive(&self, line_hash: &str) -> Result<(), PipelineError> {
        self.ubi_repository.archive(line_hash).await
    }

    pub async fn suggest(&self, account_number: &str) -> Result<Vec<UbiAssignment>, PipelineError> {
        self.ubi_repository.suggest(account_number).await
    }

    pub async fn stats_by_property(&self, range: DateRange) -> Result<Vec<PropertyUnassignedStats>, PipelineError> {
        self.ubi_repository.stats_by_property(range).await
    }

    /// Scans `Stage8_UBI_Assigned/` directly rather than through
    /// `UbiRepository::master_bills` — the assignment tables carry no GL or
    /// charge data, only the per-period billback metadata, so the roll-up
    /// the review UI needs can only be built from the dual-written enriched
    /// copies.
    pub async fn master_bills(&self, range: DateRange) -> Result<Vec<MasterBillRow>, PipelineError> {
        let keys = self.object_store.list(StagePrefix::Stage8UbiAssigned.as_str()).await?;
        let mut totals: HashMap<String, MasterBillRow> = HashMap::new();

        for key in keys {
            let bytes = self.object_store.get(&key).await?;
            let record: Value = serde_json::from_slice(&bytes)?;

            let Some(period_str) = record.get("ubi_period").and_then(Value::as_str) else {
                continue;
            };
            let Ok(period) = UbiPeriod::parse(period_str) else {
                continue;
            };
            let Some((month_start, month_end)) = period_bounds(&period) else {
                continue;
            };
            if month_start < range.start || month_start >= range.end {
                continue;
            }

            let property_id = string_field(&record, "EnrichedPropertyID");
            let gl_code = string_field(&record, "EnrichedGLAccountNumber");
            let utility_type = string_field(&record, "Utility Type");
            let charge = record
                .get("ubi_amount")
                .and_then(Value::as_f64)
                .or_else(|| string_field(&record, "Line Item Charge").trim().parse::<f64>().ok())
                .unwrap_or(0.0);

            let row = MasterBillRow {
                property_id: property_id.clone(),
                ubi_period: period.clone(),
                gl_code: gl_code.clone(),
                utility_type: utility_type.clone(),
                month_start,
                month_end,
                total_charge: 0.0,
            };
            let entry = totals.entry(row.key()).or_insert(row);
            entry.total_charge += charge;
        }

        Ok(totals.into_values().collect())
    }

    async fn dual_write(&self, line_hash: &str, source_record: Option<&Value>) -> Result<(), PipelineError> {
        let set = UbiAssignmentSet::new(self.ubi_repository.assignments_for(line_hash).await?);
        let suffix = format!("{line_hash}.json");
        let stage8 = ObjectKey::new(StagePrefix::Stage8UbiAssigned, suffix.clone());
        let stage99 = ObjectKey::new(StagePrefix::Stage99HistoricalArchive, suffix);

        let mut enriched = match source_record {
            Some(record) => record.clone(),
            None => match self.object_store.get(&stage8.full_key()).await {
                Ok(bytes) => serde_json::from_slice(&bytes)?,
                Err(_) => json!({ "line_hash": line_hash }),
            },
        };
        merge_object(&mut enriched, set.to_legacy_and_full_json());

        let body = serde_json::to_vec_pretty(&enriched)?;
        self.object_store.put(&stage8.full_key(), body.clone()).await?;
        self.object_store.put(&stage99.full_key(), body).await
    }
}

fn string_field(record: &Value, column: &str) -> String {
    record.get(column).and_then(Value::as_str).unwrap_or("").to_string()
}

fn merge_object(base: &mut Value, overlay: Value) {
    if let (Value::Object(base_map), Value::Object(overlay_map)) = (base, overlay) {
        for (key, value) in overlay_map {
            base_map.insert(key, value);
        }
    }
}

/// Parses the `yyyy=YYYY/mm=MM/dd=DD` partition every date-partitioned stage
/// key carries, minted by `output_key` in the parser and the aggregator and
/// preserved through every later stage's `rekeyed()` copy.
fn date_prefix_of(suffix: &str) -> Option<NaiveDate> {
    let mut segments = suffix.split('/');
    let year: i32 = segments.next()?.strip_prefix("yyyy=")?.parse().ok()?;
    let month: u32 = segments.next()?.strip_prefix("mm=")?.parse().ok()?;
    let day: u32 = segments.next()?.strip_prefix("dd=")?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// The first and last calendar day of a `YYYY-MM` period.
fn period_bounds(period: &UbiPeriod) -> Option<(NaiveDate, NaiveDate)> {
    let (year_str, month_str) = period.as_str().split_once('-')?;
    let year: i32 = year_str.parse().ok()?;
    let month: u32 = month_str.parse().ok()?;
    let month_start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let month_end = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
    Some((month_start, month_end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::HashMap as StdHashMap;

    use crate::infrastructure::object_store::FilesystemObjectStore;

    #[derive(Default)]
    struct InMemoryUbiRepository {
        live: Mutex<StdHashMap<String, Vec<UbiAssignment>>>,
        archived: Mutex<StdHashMap<String, Vec<UbiAssignment>>>,
    }

    #[async_trait]
    impl UbiRepository for InMemoryUbiRepository {
        async fn assign(&self, line_hash: &str, property_id: &str, periods: &[UbiAssignment]) -> Result<(), PipelineError> {
            let mut live = self.live.lock();
            let entry = live.entry(line_hash.to_string()).or_default();
            for period in periods {
                let mut period = period.clone();
                period.property_id = property_id.to_string();
                entry.retain(|a| a.period != period.period);
                entry.push(period);
            }
            Ok(())
        }

        async fn reassign(&self, line_hash: &str, period: &UbiPeriod, updated: UbiAssignment) -> Result<(), PipelineError> {
            let mut live = self.live.lock();
            let entry = live.entry(line_hash.to_string()).or_default();
            entry.retain(|a| &a.period != period);
            entry.push(updated);
            Ok(())
        }

        async fn unassign(&self, line_hash: &str, period: &UbiPeriod) -> Result<(), PipelineError> {
            if let Some(entry) = self.live.lock().get_mut(line_hash) {
                entry.retain(|a| &a.period != period);
            }
            Ok(())
        }

        async fn archive(&self, line_hash: &str) -> Result<(), PipelineError> {
            if let Some(rows) = self.live.lock().remove(line_hash) {
                self.archived.lock().insert(line_hash.to_string(), rows);
            }
            Ok(())
        }

        async fn assignments_for(&self, line_hash: &str) -> Result<Vec<UbiAssignment>, PipelineError> {
            Ok(self.live.lock().get(line_hash).cloned().unwrap_or_default())
        }

        async fn is_archived(&self, line_hash: &str) -> Result<bool, PipelineError> {
            Ok(self.archived.lock().contains_key(line_hash))
        }

        async fn suggest(&self, _account_number: &str) -> Result<Vec<UbiAssignment>, PipelineError> {
            Ok(Vec::new())
        }

        async fn stats_by_property(&self, _range: DateRange) -> Result<Vec<PropertyUnassignedStats>, PipelineError> {
            Ok(Vec::new())
        }

        async fn master_bills(&self, _range: DateRange) -> Result<Vec<MasterBillRow>, PipelineError> {
            Ok(Vec::new())
        }
    }

    fn assignment(period: &str) -> UbiAssignment {
        assignment_with_amount(period, 150.0)
    }

    fn assignment_with_amount(period: &str, amount: f64) -> UbiAssignment {
        UbiAssignment {
            line_hash: String::new(),
            property_id: "P1".into(),
            period: UbiPeriod::parse(period).unwrap(),
            amount,
            months_total: 1,
            assigned_by: "jdoe".into(),
            assigned_date: Utc::now(),
        }
    }

    fn line_record(line_id: &str, property: &str, gl: &str, charge: &str) -> Value {
        json!({
            "line_id": line_id,
            "EnrichedPropertyID": property,
            "EnrichedGLAccountNumber": gl,
            "Utility Type": "Electric",
            "Line Item Charge": charge,
        })
    }

    #[tokio::test]
    async fn assign_dual_writes_stage8_and_stage99() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        let repo: Arc<dyn UbiRepository> = Arc::new(InMemoryUbiRepository::default());
        let engine = UbiEngineUseCase::new(store.clone(), repo);

        let record = line_record("pdf1#0", "P1", "5706", "100.00");
        let hash = stable_line_hash(&record);
        engine.assign(&hash, "P1", &[assignment("2026-01")], Some(&record)).await.unwrap();

        let stage8 = store.get(&format!("Stage8_UBI_Assigned/{hash}.json")).await.unwrap();
        let stage99 = store.get(&format!("Stage99_HistoricalArchive/{hash}.json")).await.unwrap();
        let stage8_json: Value = serde_json::from_slice(&stage8).unwrap();
        let stage99_json: Value = serde_json::from_slice(&stage99).unwrap();
        assert_eq!(stage8_json["ubi_period"], "2026-01");
        assert_eq!(stage99_json["ubi_period"], "2026-01");
    }

    #[tokio::test]
    async fn assign_without_source_record_reuses_prior_stage8_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        let repo: Arc<dyn UbiRepository> = Arc::new(InMemoryUbiRepository::default());
        let engine = UbiEngineUseCase::new(store.clone(), repo);

        let record = line_record("pdf1#0", "P1", "5706", "100.00");
        let hash = stable_line_hash(&record);
        engine.assign(&hash, "P1", &[assignment("2026-01")], Some(&record)).await.unwrap();
        engine.reassign(&hash, &UbiPeriod::parse("2026-01").unwrap(), assignment("2026-02"), None).await.unwrap();

        let stage8 = store.get(&format!("Stage8_UBI_Assigned/{hash}.json")).await.unwrap();
        let stage8_json: Value = serde_json::from_slice(&stage8).unwrap();
        assert_eq!(stage8_json["EnrichedPropertyID"], "P1");
        assert_eq!(stage8_json["ubi_period"], "2026-02");
    }

    #[tokio::test]
    async fn list_unassigned_excludes_assigned_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        let repo: Arc<dyn UbiRepository> = Arc::new(InMemoryUbiRepository::default());
        let engine = UbiEngineUseCase::new(store.clone(), repo);

        let assigned = line_record("pdf1#0", "P1", "5706", "100.00");
        let unassigned = line_record("pdf2#0", "P1", "5706", "50.00");
        let batch = vec![assigned.to_string(), unassigned.to_string()].join("\n");
        store
            .put("Stage7_PostEntrata/yyyy=2026/mm=01/dd=05/source=s3/bill.pdf.jsonl", batch.into_bytes())
            .await
            .unwrap();

        let hash = stable_line_hash(&assigned);
        engine.assign(&hash, "P1", &[assignment("2026-01")], Some(&assigned)).await.unwrap();

        let range = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()..NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let rows = engine.list_unassigned(range.clone()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["line_id"], "pdf2#0");

        let assigned_rows = engine.list_assigned(range).await.unwrap();
        assert_eq!(assigned_rows.len(), 1);
        assert_eq!(assigned_rows[0]["line_id"], "pdf1#0");
    }

    #[tokio::test]
    async fn master_bills_groups_and_sums_by_roll_up_key() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        let repo: Arc<dyn UbiRepository> = Arc::new(InMemoryUbiRepository::default());
        let engine = UbiEngineUseCase::new(store.clone(), repo);

        // "Line Item Charge" is not in VOLATILE_FIELDS, so these two records
        // get distinct stable hashes and dual-write to separate Stage 8
        // objects; each assignment's own amount is what gets summed, not the
        // line's raw charge.
        let a = line_record("pdf1#0", "P1", "5706", "100.00");
        let b = line_record("pdf2#0", "P1", "5706", "50.00");
        engine.assign(&stable_line_hash(&a), "P1", &[assignment_with_amount("2026-01", 75.0)], Some(&a)).await.unwrap();
        engine.assign(&stable_line_hash(&b), "P1", &[assignment_with_amount("2026-01", 75.0)], Some(&b)).await.unwrap();

        let range = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()..NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let rows = engine.master_bills(range).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_charge, 150.0);
        assert_eq!(rows[0].key(), "P1|5706|Electric|2026-01-01|2026-01-31");
    }

    #[test]
    fn period_bounds_handles_december_rollover() {
        let period = UbiPeriod::parse("2026-12").unwrap();
        let (start, end) = period_bounds(&period).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
    }

    #[test]
    fn date_prefix_of_parses_leading_segment() {
        assert_eq!(
            date_prefix_of("yyyy=2026/mm=01/dd=05/source=s3/bill.pdf.jsonl"),
            NaiveDate::from_ymd_opt(2026, 1, 5)
        );
        assert_eq!(date_prefix_of("acme/bill.pdf.jsonl"), None);
    }
}
