//! Deterministic repairs that bring a record table within the domain invariants.
//!
//! After [`clean`] every record has `sessions > 0`, a bounce rate in `[0, 1]`,
//! `conversions <= sessions` and no missing numeric values. Row order and the
//! categorical fields are never changed.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::Serialize;
use traffic_core::models::TrafficRecord;

/// Number of rows or cells affected by each cleaning step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    pub input_rows: usize,
    pub duplicates_removed: usize,
    /// Rows whose `sessions` was zero, negative or missing.
    pub non_positive_sessions_removed: usize,
    pub bounce_rates_clamped: usize,
    pub conversions_capped: usize,
    /// Individual numeric cells filled with `0`.
    pub nulls_filled: usize,
    /// Rows made identical to an earlier row by the repairs above.
    pub duplicates_after_repair: usize,
    pub output_rows: usize,
}

impl RepairSummary {
    /// `true` when no step changed anything.
    pub fn is_empty(&self) -> bool {
        self.rows_removed() == 0
            && self.bounce_rates_clamped == 0
            && self.conversions_capped == 0
            && self.nulls_filled == 0
    }

    pub fn rows_removed(&self) -> usize {
        self.duplicates_removed + self.non_positive_sessions_removed + self.duplicates_after_repair
    }
}

/// Apply the repair steps in order and return the new table with its summary.
pub fn clean(records: &[TrafficRecord]) -> (Vec<TrafficRecord>, RepairSummary) {
    let mut summary = RepairSummary {
        input_rows: records.len(),
        ..Default::default()
    };

    let (unique, dropped) = dedup(records.iter().cloned());
    summary.duplicates_removed = dropped;

    let mut rows: Vec<TrafficRecord> = unique
        .into_iter()
        .filter(|r| r.sessions.is_some_and(|s| s > 0))
        .collect();
    summary.non_positive_sessions_removed = records.len() - summary.duplicates_removed - rows.len();

    for r in &mut rows {
        if let Some(b) = r.bounce_rate {
            let clamped = b.clamp(0.0, 1.0);
            if clamped != b {
                r.bounce_rate = Some(clamped);
                summary.bounce_rates_clamped += 1;
            }
        }
    }

    for r in &mut rows {
        if let (Some(c), Some(s)) = (r.conversions, r.sessions) {
            if c > s {
                r.conversions = Some(s);
                summary.conversions_capped += 1;
            }
        }
    }

    for r in &mut rows {
        summary.nulls_filled += fill_nulls(r);
    }

    let (rows, dropped) = dedup(rows.into_iter());
    summary.duplicates_after_repair = dropped;
    summary.output_rows = rows.len();

    (rows, summary)
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn fill_nulls(r: &mut TrafficRecord) -> usize {
    let mut filled = 0;
    for slot in [&mut r.sessions, &mut r.users, &mut r.conversions] {
        if slot.is_none() {
            *slot = Some(0);
            filled += 1;
        }
    }
    for slot in [&mut r.bounce_rate, &mut r.avg_session_duration] {
        if slot.is_none() {
            *slot = Some(0.0);
            filled += 1;
        }
    }
    filled
}

/// Hashable identity of a record. Derived fields follow from the timestamp.
type RecordKey = (
    NaiveDateTime,
    String,
    String,
    String,
    [Option<i64>; 3],
    [Option<u64>; 2],
);

fn record_key(r: &TrafficRecord) -> RecordKey {
    // `+ 0.0` maps -0.0 to 0.0 so bitwise equality matches numeric equality.
    let bits = |v: Option<f64>| v.map(|x| (x + 0.0).to_bits());
    (
        r.timestamp,
        r.page.clone(),
        r.device.clone(),
        r.country.clone(),
        [r.sessions, r.users, r.conversions],
        [bits(r.bounce_rate), bits(r.avg_session_duration)],
    )
}

/// Keep the first occurrence of every record; returns the kept rows and the
/// number dropped.
fn dedup(records: impl Iterator<Item = TrafficRecord>) -> (Vec<TrafficRecord>, usize) {
    let mut seen: HashSet<RecordKey> = HashSet::new();
    let mut kept = Vec::new();
    let mut dropped = 0;
    for r in records {
        if seen.insert(record_key(&r)) {
            kept.push(r);
        } else {
            dropped += 1;
        }
    }
    (kept, dropped)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
