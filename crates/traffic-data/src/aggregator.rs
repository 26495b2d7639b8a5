//! KPI and dimensional aggregation over traffic record subsets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use traffic_core::error::{Result, TrafficError};
use traffic_core::models::{
    AggregateRow, Dimension, GroupKey, KpiSet, NumericColumn, TrafficRecord,
};
use traffic_core::stats::{rate_percent, MeanAccumulator};
use traffic_core::time_utils::DayOfWeek;

// ── TrafficStats ──────────────────────────────────────────────────────────────

/// Running sums and means over a group of records. Missing values are skipped.
///
/// Counts are summed in `i128` so no input can overflow the accumulator; the
/// totals are narrowed back to `i64` when the row is produced.
#[derive(Debug, Clone, Default)]
pub struct TrafficStats {
    pub records: usize,
    sessions: i128,
    users: i128,
    conversions: i128,
    bounce_rate: MeanAccumulator,
    avg_session_duration: MeanAccumulator,
}

impl TrafficStats {
    /// Fold one record into the running totals.
    pub fn add_record(&mut self, record: &TrafficRecord) {
        self.records += 1;
        self.sessions += i128::from(record.sessions.unwrap_or(0));
        self.users += i128::from(record.users.unwrap_or(0));
        self.conversions += i128::from(record.conversions.unwrap_or(0));
        self.bounce_rate.push(record.bounce_rate);
        self.avg_session_duration.push(record.avg_session_duration);
    }

    pub fn sessions(&self) -> Result<i64> {
        narrow(self.sessions, NumericColumn::Sessions)
    }

    pub fn users(&self) -> Result<i64> {
        narrow(self.users, NumericColumn::Users)
    }

    pub fn conversions(&self) -> Result<i64> {
        narrow(self.conversions, NumericColumn::Conversions)
    }

    pub fn mean_bounce_rate(&self) -> f64 {
        self.bounce_rate.mean()
    }

    pub fn mean_session_duration(&self) -> f64 {
        self.avg_session_duration.mean()
    }

    /// `conversions / sessions * 100`, `0.0` without sessions.
    pub fn conversion_rate(&self) -> f64 {
        rate_percent(self.conversions, self.sessions)
    }

    fn into_row(self, key: GroupKey) -> Result<AggregateRow> {
        Ok(AggregateRow {
            key,
            records: self.records,
            sessions: self.sessions()?,
            users: self.users()?,
            conversions: self.conversions()?,
            bounce_rate: self.mean_bounce_rate(),
            avg_session_duration: self.mean_session_duration(),
            conversion_rate: self.conversion_rate(),
        })
    }

    fn into_kpis(self) -> Result<KpiSet> {
        Ok(KpiSet {
            records: self.records,
            total_sessions: self.sessions()?,
            total_users: self.users()?,
            total_conversions: self.conversions()?,
            avg_bounce_rate: self.mean_bounce_rate(),
            avg_session_duration: self.mean_session_duration(),
            conversion_rate: self.conversion_rate(),
        })
    }
}

fn narrow(total: i128, column: NumericColumn) -> Result<i64> {
    i64::try_from(total).map_err(|_| TrafficError::CountOverflow { column })
}

// ── HeatmapRow ────────────────────────────────────────────────────────────────

/// Sessions per hour for one day of the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapRow {
    pub day: DayOfWeek,
    /// Index is the hour of day; hours without records hold 0.
    pub sessions: [i64; 24],
}

// ── TrafficAggregator ─────────────────────────────────────────────────────────

/// Stateless helper that rolls records up into KPIs and grouped rows.
pub struct TrafficAggregator;

impl TrafficAggregator {
    /// Scalar metrics over the whole subset.
    pub fn summarize(records: &[TrafficRecord]) -> Result<KpiSet> {
        if records.is_empty() {
            return Err(TrafficError::EmptySubset);
        }
        let mut stats = TrafficStats::default();
        for record in records {
            stats.add_record(record);
        }
        stats.into_kpis()
    }

    /// One [`AggregateRow`] per distinct key of `dimension`, in key order.
    ///
    /// Keys never observed in the subset are omitted.
    pub fn group_by(records: &[TrafficRecord], dimension: Dimension) -> Result<Vec<AggregateRow>> {
        if records.is_empty() {
            return Err(TrafficError::EmptySubset);
        }
        let mut groups: BTreeMap<GroupKey, TrafficStats> = BTreeMap::new();
        for record in records {
            groups
                .entry(dimension.key_for(record))
                .or_default()
                .add_record(record);
        }
        groups
            .into_iter()
            .map(|(key, stats)| stats.into_row(key))
            .collect()
    }

    /// Day-of-week × hour session matrix, one row per observed day, Monday first.
    pub fn heatmap(records: &[TrafficRecord]) -> Result<Vec<HeatmapRow>> {
        let cells = Self::group_by(records, Dimension::DayOfWeekHour)?;
        let mut days: BTreeMap<DayOfWeek, [i64; 24]> = BTreeMap::new();
        for row in cells {
            if let GroupKey::DayOfWeekHour(day, hour) = row.key {
                if let Some(slot) = days.entry(day).or_insert([0; 24]).get_mut(hour as usize) {
                    *slot = row.sessions;
                }
            }
        }
        Ok(days
            .into_iter()
            .map(|(day, sessions)| HeatmapRow { day, sessions })
            .collect())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
