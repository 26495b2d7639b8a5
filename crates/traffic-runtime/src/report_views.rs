//! Cached report views over loaded snapshots.

use std::sync::Arc;

use traffic_core::error::Result;
use traffic_core::thresholds::{AlertThresholds, ScoringConfig};
use traffic_data::analysis::{build_report_view, ReportView, Snapshot};
use traffic_data::filter::SubsetFilter;

use crate::cache::{CacheStats, ViewCache, ViewKey};

/// Serves [`ReportView`]s, computing each distinct request once.
#[derive(Default)]
pub struct ReportViews {
    cache: ViewCache<ReportView>,
}

impl ReportViews {
    pub fn new(cache: ViewCache<ReportView>) -> Self {
        Self { cache }
    }

    /// The report view of `snapshot` restricted by `filter`.
    ///
    /// Identical to calling [`build_report_view`] on the filtered records.
    pub fn view(
        &mut self,
        snapshot: &Snapshot,
        filter: &SubsetFilter,
        scoring: &ScoringConfig,
        alerts: &AlertThresholds,
    ) -> Result<Arc<ReportView>> {
        let key = ViewKey::new(snapshot.id, filter, view_params(scoring, alerts));
        self.cache.get_or_try_insert_with(key, || {
            let subset = filter.apply(&snapshot.records);
            tracing::debug!(
                snapshot = %snapshot.id,
                rows = subset.len(),
                "computing report view"
            );
            build_report_view(&subset, scoring, alerts)
        })
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Parameters that change a report view. `Debug` output of `f64` round-trips,
/// so equal parameters always give equal strings.
fn view_params(scoring: &ScoringConfig, alerts: &AlertThresholds) -> String {
    format!("report|{scoring:?}|{alerts:?}")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
