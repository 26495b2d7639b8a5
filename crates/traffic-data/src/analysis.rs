//! Top-level pipelines for the traffic audit.
//!
//! [`run_validation`] loads, validates and optionally cleans one file.
//! [`load_snapshot`] and [`build_report_view`] produce the aggregate views
//! behind the report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use traffic_core::error::Result;
use traffic_core::models::{AggregateRow, Dimension, KpiSet, PageScore, TrafficRecord};
use traffic_core::thresholds::{AlertThresholds, ScoringConfig};

use crate::aggregator::{HeatmapRow, TrafficAggregator};
use crate::cleaner::{clean, RepairSummary};
use crate::export::{build_workbook, Workbook};
use crate::insights::{derive_insights, Insights};
use crate::reader::{load_table, SnapshotId};
use crate::scoring::PageScorer;
use crate::validator::{ValidationReport, Validator};
use crate::writer::write_records;

// ── Validation pipeline ───────────────────────────────────────────────────────

/// Inputs of [`run_validation`] besides the file itself.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Timestamps after this are reported as future dates.
    pub reference_time: NaiveDateTime,
    /// Destination of the cleaned table.
    pub output_path: PathBuf,
}

/// Result of the cleaning step.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningOutcome {
    pub summary: RepairSummary,
    pub output_path: PathBuf,
}

/// Metadata produced alongside a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineMetadata {
    /// RFC 3339 timestamp of the run.
    pub generated_at: String,
    pub snapshot: SnapshotId,
    pub rows_loaded: usize,
    pub load_time_seconds: f64,
    pub validate_time_seconds: f64,
}

/// The complete output of [`run_validation`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub report: ValidationReport,
    /// `None` when no cleaning was requested or needed.
    pub cleaning: Option<CleaningOutcome>,
    pub metadata: PipelineMetadata,
}

/// Load → validate → optionally clean and write.
///
/// `should_clean` is consulted only when the report contains at least one
/// issue. Cleaning needs typed records, so a table whose dates or numbers
/// cannot be converted makes this return the conversion error.
pub fn run_validation(
    path: &Path,
    options: &ValidationOptions,
    should_clean: impl FnOnce(&ValidationReport) -> bool,
) -> Result<PipelineOutcome> {
    // ── Step 1: Load ──────────────────────────────────────────────────────────
    let load_start = Instant::now();
    let table = load_table(path)?;
    let load_time = load_start.elapsed().as_secs_f64();

    // ── Step 2: Validate ──────────────────────────────────────────────────────
    let validate_start = Instant::now();
    let report = Validator::new(options.reference_time).validate(&table);
    let validate_time = validate_start.elapsed().as_secs_f64();
    debug!(
        issues = report.issues.len(),
        fatal = report.has_fatal(),
        "Validation finished"
    );

    // ── Step 3: Clean ─────────────────────────────────────────────────────────
    let mut cleaning = None;
    if !report.is_clean() && should_clean(&report) {
        let records = table.to_records().map_err(|e| {
            warn!(error = %e, "Table cannot be cleaned");
            e
        })?;
        let (cleaned, summary) = clean(&records);
        write_records(&options.output_path, &cleaned)?;
        info!(
            removed = summary.rows_removed(),
            remaining = summary.output_rows,
            "Cleaned table"
        );
        cleaning = Some(CleaningOutcome {
            summary,
            output_path: options.output_path.clone(),
        });
    }

    let metadata = PipelineMetadata {
        generated_at: Utc::now().to_rfc3339(),
        snapshot: table.snapshot_id(),
        rows_loaded: table.len(),
        load_time_seconds: load_time,
        validate_time_seconds: validate_time,
    };

    Ok(PipelineOutcome {
        report,
        cleaning,
        metadata,
    })
}

// ── Report views ──────────────────────────────────────────────────────────────

/// Cleaned, immutable records of one input file.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub records: Arc<[TrafficRecord]>,
    /// Repairs applied while preparing the snapshot.
    pub repairs: RepairSummary,
}

/// Load a file, convert it and clean it in memory for analysis.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let table = load_table(path)?;
    let records = table.to_records()?;
    let (cleaned, repairs) = clean(&records);
    if !repairs.is_empty() {
        debug!(
            removed = repairs.rows_removed(),
            "Applied in-memory repairs for analysis"
        );
    }
    Ok(Snapshot {
        id: table.snapshot_id(),
        records: cleaned.into(),
        repairs,
    })
}

/// Every aggregate view of one record subset.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub kpis: KpiSet,
    /// Scored pages in page order.
    pub pages: Vec<PageScore>,
    pub devices: Vec<AggregateRow>,
    pub countries: Vec<AggregateRow>,
    pub daily: Vec<AggregateRow>,
    pub hourly: Vec<AggregateRow>,
    pub weekdays: Vec<AggregateRow>,
    pub weekly: Vec<AggregateRow>,
    pub heatmap: Vec<HeatmapRow>,
    pub insights: Insights,
}

impl ReportView {
    /// Export sheets for this view.
    pub fn workbook(&self) -> Workbook {
        build_workbook(
            &self.pages,
            &self.devices,
            &self.countries,
            &self.daily,
            &self.hourly,
        )
    }
}

/// Compute every view over `records`. Fails with `EmptySubset` when
/// `records` is empty.
pub fn build_report_view(
    records: &[TrafficRecord],
    scoring: &ScoringConfig,
    alerts: &AlertThresholds,
) -> Result<ReportView> {
    let scorer = PageScorer::new(*scoring)?;
    let kpis = TrafficAggregator::summarize(records)?;
    let page_rows = TrafficAggregator::group_by(records, Dimension::Page)?;
    let pages = scorer.score(&page_rows)?;
    let devices = TrafficAggregator::group_by(records, Dimension::Device)?;
    let hourly = TrafficAggregator::group_by(records, Dimension::HourOfDay)?;
    let insights = derive_insights(&pages, &devices, &hourly, alerts)?;

    Ok(ReportView {
        kpis,
        pages,
        devices,
        countries: TrafficAggregator::group_by(records, Dimension::Country)?,
        daily: TrafficAggregator::group_by(records, Dimension::CalendarDay)?,
        hourly,
        weekdays: TrafficAggregator::group_by(records, Dimension::DayOfWeek)?,
        weekly: TrafficAggregator::group_by(records, Dimension::IsoWeek)?,
        heatmap: TrafficAggregator::heatmap(records)?,
        insights,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
