use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::time_utils::{iso_week, DayOfWeek};

// ── Column schema ─────────────────────────────────────────────────────────────

/// Columns every input table must provide.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "date",
    "page",
    "device",
    "country",
    "sessions",
    "users",
    "bounce_rate",
    "conversions",
    "avg_session_duration",
];

/// Columns summarised by cardinality and top values.
pub const CATEGORICAL_COLUMNS: [&str; 3] = ["page", "device", "country"];

/// One of the five numeric input columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericColumn {
    Sessions,
    Users,
    Conversions,
    BounceRate,
    AvgSessionDuration,
}

impl NumericColumn {
    /// Numeric columns in checking order.
    pub const ALL: [NumericColumn; 5] = [
        NumericColumn::Sessions,
        NumericColumn::Users,
        NumericColumn::Conversions,
        NumericColumn::BounceRate,
        NumericColumn::AvgSessionDuration,
    ];

    /// Header name in the input file.
    pub fn name(self) -> &'static str {
        match self {
            NumericColumn::Sessions => "sessions",
            NumericColumn::Users => "users",
            NumericColumn::Conversions => "conversions",
            NumericColumn::BounceRate => "bounce_rate",
            NumericColumn::AvgSessionDuration => "avg_session_duration",
        }
    }

    /// Count columns hold whole numbers; the other two are reals.
    pub fn is_count(self) -> bool {
        matches!(
            self,
            NumericColumn::Sessions | NumericColumn::Users | NumericColumn::Conversions
        )
    }
}

impl fmt::Display for NumericColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── TrafficRecord ─────────────────────────────────────────────────────────────

/// One row of web-traffic input.
///
/// Numeric fields are `None` where the source cell was empty. Raw data may
/// also carry negative counts or out-of-range rates; cleaning removes both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRecord {
    /// When the traffic was recorded (no timezone attached).
    pub timestamp: NaiveDateTime,
    pub page: String,
    pub device: String,
    pub country: String,
    pub sessions: Option<i64>,
    pub users: Option<i64>,
    /// Fraction of sessions that left without interacting, nominally 0–1.
    pub bounce_rate: Option<f64>,
    pub conversions: Option<i64>,
    /// Mean session length in seconds.
    pub avg_session_duration: Option<f64>,
    /// Calendar day of `timestamp`.
    pub date: NaiveDate,
    /// Hour of day, 0–23.
    pub hour: u32,
    pub day_of_week: DayOfWeek,
    /// ISO `(year, week)`.
    pub iso_week: (i32, u32),
}

impl TrafficRecord {
    /// Build a record, deriving the calendar fields from `timestamp`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: NaiveDateTime,
        page: impl Into<String>,
        device: impl Into<String>,
        country: impl Into<String>,
        sessions: Option<i64>,
        users: Option<i64>,
        bounce_rate: Option<f64>,
        conversions: Option<i64>,
        avg_session_duration: Option<f64>,
    ) -> Self {
        let date = timestamp.date();
        Self {
            timestamp,
            page: page.into(),
            device: device.into(),
            country: country.into(),
            sessions,
            users,
            bounce_rate,
            conversions,
            avg_session_duration,
            date,
            hour: timestamp.hour(),
            day_of_week: DayOfWeek::from(date.weekday()),
            iso_week: iso_week(date),
        }
    }

    /// Value of a numeric column as `f64`, `None` when missing.
    pub fn numeric(&self, column: NumericColumn) -> Option<f64> {
        match column {
            NumericColumn::Sessions => self.sessions.map(|v| v as f64),
            NumericColumn::Users => self.users.map(|v| v as f64),
            NumericColumn::Conversions => self.conversions.map(|v| v as f64),
            NumericColumn::BounceRate => self.bounce_rate,
            NumericColumn::AvgSessionDuration => self.avg_session_duration,
        }
    }
}

// ── Dimensions ────────────────────────────────────────────────────────────────

/// A grouping axis for the dimensional aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Page,
    Device,
    Country,
    CalendarDay,
    DayOfWeek,
    /// `(day of week, hour)` cells for heat maps.
    DayOfWeekHour,
    HourOfDay,
    IsoWeek,
}

impl Dimension {
    /// Short name used in errors and export headers.
    pub fn name(self) -> &'static str {
        match self {
            Dimension::Page => "page",
            Dimension::Device => "device",
            Dimension::Country => "country",
            Dimension::CalendarDay => "date",
            Dimension::DayOfWeek => "day_of_week",
            Dimension::DayOfWeekHour => "day_of_week_hour",
            Dimension::HourOfDay => "hour",
            Dimension::IsoWeek => "iso_week",
        }
    }

    /// Grouping key of `record` along this dimension.
    pub fn key_for(self, record: &TrafficRecord) -> GroupKey {
        match self {
            Dimension::Page => GroupKey::Page(record.page.clone()),
            Dimension::Device => GroupKey::Device(record.device.clone()),
            Dimension::Country => GroupKey::Country(record.country.clone()),
            Dimension::CalendarDay => GroupKey::Day(record.date),
            Dimension::DayOfWeek => GroupKey::DayOfWeek(record.day_of_week),
            Dimension::DayOfWeekHour => GroupKey::DayOfWeekHour(record.day_of_week, record.hour),
            Dimension::HourOfDay => GroupKey::Hour(record.hour),
            Dimension::IsoWeek => GroupKey::IsoWeek(record.iso_week.0, record.iso_week.1),
        }
    }
}

/// The value an [`AggregateRow`] is grouped by.
///
/// The derived ordering is the presentation order: strings ascending, days
/// ascending, weekdays Monday first, hours ascending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    /// Whole-subset rollup.
    Total,
    Page(String),
    Device(String),
    Country(String),
    Day(NaiveDate),
    DayOfWeek(DayOfWeek),
    DayOfWeekHour(DayOfWeek, u32),
    Hour(u32),
    IsoWeek(i32, u32),
}

impl GroupKey {
    /// The dimension this key belongs to, `None` for [`GroupKey::Total`].
    pub fn dimension(&self) -> Option<Dimension> {
        match self {
            GroupKey::Total => None,
            GroupKey::Page(_) => Some(Dimension::Page),
            GroupKey::Device(_) => Some(Dimension::Device),
            GroupKey::Country(_) => Some(Dimension::Country),
            GroupKey::Day(_) => Some(Dimension::CalendarDay),
            GroupKey::DayOfWeek(_) => Some(Dimension::DayOfWeek),
            GroupKey::DayOfWeekHour(_, _) => Some(Dimension::DayOfWeekHour),
            GroupKey::Hour(_) => Some(Dimension::HourOfDay),
            GroupKey::IsoWeek(_, _) => Some(Dimension::IsoWeek),
        }
    }

    /// Name of the key's dimension, `"total"` for the whole-subset key.
    pub fn dimension_name(&self) -> &'static str {
        self.dimension().map(Dimension::name).unwrap_or("total")
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Total => f.write_str("Total"),
            GroupKey::Page(s) | GroupKey::Device(s) | GroupKey::Country(s) => f.write_str(s),
            GroupKey::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            GroupKey::DayOfWeek(d) => f.write_str(d.name()),
            GroupKey::DayOfWeekHour(d, h) => write!(f, "{} {:02}:00", d.name(), h),
            GroupKey::Hour(h) => write!(f, "{:02}:00", h),
            GroupKey::IsoWeek(y, w) => write!(f, "{}-W{:02}", y, w),
        }
    }
}

// ── Aggregates ────────────────────────────────────────────────────────────────

/// Metrics for one group of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub key: GroupKey,
    /// Number of input rows folded into this group.
    pub records: usize,
    pub sessions: i64,
    pub users: i64,
    pub conversions: i64,
    /// Mean of the rows' bounce rates.
    pub bounce_rate: f64,
    /// Mean of the rows' session durations, seconds.
    pub avg_session_duration: f64,
    /// `conversions / sessions * 100` from the grouped sums, `0.0` without sessions.
    pub conversion_rate: f64,
}

/// Scalar summary metrics over a record subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSet {
    pub records: usize,
    pub total_sessions: i64,
    pub total_users: i64,
    pub total_conversions: i64,
    pub avg_bounce_rate: f64,
    pub avg_session_duration: f64,
    pub conversion_rate: f64,
}

// ── Page classification ───────────────────────────────────────────────────────

/// Performance quadrant of a page relative to the cohort medians.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    StarPerformer,
    HighTrafficLowConversion,
    HiddenGem,
    NeedsAttention,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::StarPerformer,
        Category::HighTrafficLowConversion,
        Category::HiddenGem,
        Category::NeedsAttention,
    ];

    /// Quadrant for a page given whether it reaches each median.
    pub fn from_thresholds(high_traffic: bool, high_conversion: bool) -> Self {
        match (high_traffic, high_conversion) {
            (true, true) => Category::StarPerformer,
            (true, false) => Category::HighTrafficLowConversion,
            (false, true) => Category::HiddenGem,
            (false, false) => Category::NeedsAttention,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Category::StarPerformer => "Star Performers",
            Category::HighTrafficLowConversion => "High Traffic - Low Conversion",
            Category::HiddenGem => "Hidden Gems",
            Category::NeedsAttention => "Needs Attention",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A scored and categorised page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageScore {
    pub page: String,
    pub sessions: i64,
    pub conversions: i64,
    pub conversion_rate: f64,
    pub bounce_rate: f64,
    pub avg_session_duration: f64,
    /// Weighted composite, 0–100 for cleaned input.
    pub quality_score: f64,
    pub category: Category,
}

// ── Tests ──────────────────────────────────────────────────────────────────────
