//! Schema, type, range and consistency checks over a raw traffic table.
//!
//! Validation never fails on data content: every problem becomes an [`Issue`]
//! in the [`ValidationReport`]. Only loading the file can fail outright.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;
use traffic_core::error::{Result, TrafficError};
use traffic_core::models::{KpiSet, NumericColumn, CATEGORICAL_COLUMNS};
use traffic_core::time_utils::parse_record_timestamp;

use crate::aggregator::TrafficAggregator;
use crate::reader::{parse_numeric_cell, NumericCell, RawTable};

/// Number of most frequent values listed per categorical column.
pub const TOP_VALUES: usize = 5;

// ── Issues ────────────────────────────────────────────────────────────────────

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Fatal,
}

/// The check that raised an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Schema,
    Temporal,
    NumericType,
    Range,
    CrossField,
}

/// One finding of the validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    MissingColumns {
        columns: Vec<String>,
    },
    /// Reported once per run; `first_row` is 1-based, header excluded.
    UnparseableDates {
        count: usize,
        first_row: usize,
        first_value: String,
    },
    FutureDates {
        count: usize,
    },
    NonNumeric {
        column: NumericColumn,
        count: usize,
        first_row: usize,
        first_value: String,
    },
    /// Whole numbers beyond the 64-bit count range; typed conversion fails.
    CountOutOfRange {
        column: NumericColumn,
        count: usize,
        first_row: usize,
        first_value: String,
    },
    /// Counts with a fractional part; cleaning rounds them.
    NonIntegralCounts {
        column: NumericColumn,
        count: usize,
    },
    NegativeValues {
        column: NumericColumn,
        count: usize,
    },
    BounceRateOutOfRange {
        count: usize,
    },
    MissingValues {
        column: NumericColumn,
        count: usize,
    },
    SessionsBelowUsers {
        count: usize,
    },
    ConversionsExceedSessions {
        count: usize,
    },
    ZeroSessions {
        count: usize,
    },
    /// The column total does not fit in 64 bits, so no summary is available.
    TotalOverflow {
        column: NumericColumn,
    },
}

impl Issue {
    pub fn severity(&self) -> Severity {
        match self {
            Issue::MissingColumns { .. }
            | Issue::UnparseableDates { .. }
            | Issue::NonNumeric { .. }
            | Issue::CountOutOfRange { .. } => Severity::Fatal,
            _ => Severity::Warning,
        }
    }

    pub fn check(&self) -> Check {
        match self {
            Issue::MissingColumns { .. } => Check::Schema,
            Issue::UnparseableDates { .. } | Issue::FutureDates { .. } => Check::Temporal,
            Issue::NonNumeric { .. }
            | Issue::CountOutOfRange { .. }
            | Issue::NonIntegralCounts { .. } => Check::NumericType,
            Issue::NegativeValues { .. }
            | Issue::BounceRateOutOfRange { .. }
            | Issue::MissingValues { .. }
            | Issue::TotalOverflow { .. } => Check::Range,
            Issue::SessionsBelowUsers { .. }
            | Issue::ConversionsExceedSessions { .. }
            | Issue::ZeroSessions { .. } => Check::CrossField,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::MissingColumns { columns } => {
                write!(f, "Missing columns: {}", columns.join(", "))
            }
            Issue::UnparseableDates {
                count,
                first_row,
                first_value,
            } => write!(
                f,
                "Date parsing error: {count} value(s) not in DD-MM-YYYY HH:MM format \
                 (first at row {first_row}: {first_value:?})"
            ),
            Issue::FutureDates { count } => write!(f, "{count} future dates found"),
            Issue::NonNumeric {
                column,
                first_row,
                first_value,
                ..
            } => write!(
                f,
                "'{column}' is not numeric (row {first_row}: {first_value:?})"
            ),
            Issue::CountOutOfRange {
                column,
                count,
                first_row,
                first_value,
            } => write!(
                f,
                "{count} values in '{column}' exceed the 64-bit count range \
                 (first at row {first_row}: {first_value:?})"
            ),
            Issue::NonIntegralCounts { column, count } => {
                write!(f, "{count} non-integer values in '{column}'")
            }
            Issue::NegativeValues { column, count } => {
                write!(f, "{count} negative values in '{column}'")
            }
            Issue::BounceRateOutOfRange { count } => {
                write!(f, "{count} invalid bounce_rate values (should be 0-1)")
            }
            Issue::MissingValues { column, count } => {
                write!(f, "{count} missing values in '{column}'")
            }
            Issue::SessionsBelowUsers { count } => {
                write!(f, "{count} records with sessions < users")
            }
            Issue::ConversionsExceedSessions { count } => {
                write!(f, "{count} records with conversions > sessions")
            }
            Issue::ZeroSessions { count } => write!(f, "{count} records with zero sessions"),
            Issue::TotalOverflow { column } => {
                write!(f, "total of '{column}' exceeds the 64-bit range")
            }
        }
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// Outcome of the numeric checks for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericColumnCheck {
    pub column: NumericColumn,
    pub numeric: bool,
    pub missing: usize,
    pub negative: usize,
    /// Values outside `[0, 1]`; only meaningful for `bounce_rate`.
    pub out_of_range: usize,
    /// Count cells with a fractional part.
    pub non_integral: usize,
    /// Count cells too large for a 64-bit integer.
    pub oversized: usize,
}

/// A value and how often it occurs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
    /// Percentage of all rows.
    pub share: f64,
}

/// Cardinality and most frequent values of a categorical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub column: String,
    pub distinct: usize,
    pub top: Vec<ValueCount>,
}

/// Inclusive timestamp bounds of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Structured result of validating one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub rows: usize,
    /// Required columns that were found.
    pub columns_present: Vec<String>,
    /// `None` unless every date parsed.
    pub date_range: Option<DateRange>,
    pub numeric_checks: Vec<NumericColumnCheck>,
    pub categorical: Vec<CategoricalSummary>,
    /// Rows identical to an earlier row. Diagnostic only.
    pub duplicate_rows: usize,
    /// Present when every row converts to a typed record.
    pub summary: Option<KpiSet>,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    fn empty(rows: usize) -> Self {
        Self {
            rows,
            columns_present: Vec::new(),
            date_range: None,
            numeric_checks: Vec::new(),
            categorical: Vec::new(),
            duplicate_rows: 0,
            summary: None,
            issues: Vec::new(),
        }
    }

    /// No issue of any severity.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_fatal(&self) -> bool {
        self.issues.iter().any(Issue::is_fatal)
    }

    pub fn fatals(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.is_fatal())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| !i.is_fatal())
    }

    /// Issues raised by one check, in report order.
    pub fn issues_for(&self, check: Check) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.check() == check)
    }

    /// Pretty JSON rendering for machine consumption.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ── Validator ─────────────────────────────────────────────────────────────────

/// Validates tables against a fixed reference time.
///
/// Timestamps after `reference_time` are reported as future dates.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    reference_time: NaiveDateTime,
}

impl Validator {
    pub fn new(reference_time: NaiveDateTime) -> Self {
        Self { reference_time }
    }

    pub fn reference_time(&self) -> NaiveDateTime {
        self.reference_time
    }

    /// Run every check over `table`.
    pub fn validate(&self, table: &RawTable) -> ValidationReport {
        let mut report = ValidationReport::empty(table.len());

        // Schema; nothing else is meaningful without the full column set.
        let missing = table.missing_columns();
        report.columns_present = traffic_core::models::REQUIRED_COLUMNS
            .iter()
            .filter(|c| !missing.iter().any(|m| m == *c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            report.issues.push(Issue::MissingColumns { columns: missing });
            return report;
        }

        self.check_dates(table, &mut report);
        let parsed = check_numeric_columns(table, &mut report);
        check_cross_fields(&parsed, &mut report);

        report.categorical = CATEGORICAL_COLUMNS
            .iter()
            .filter_map(|c| categorical_summary(table, c))
            .collect();
        report.duplicate_rows = count_duplicate_rows(table);

        if let Ok(records) = table.to_records() {
            match TrafficAggregator::summarize(&records) {
                Ok(kpis) => report.summary = Some(kpis),
                Err(TrafficError::CountOverflow { column }) => {
                    report.issues.push(Issue::TotalOverflow { column })
                }
                Err(_) => {}
            }
        }

        report
    }

    fn check_dates(&self, table: &RawTable, report: &mut ValidationReport) {
        let Some(cells) = table.column("date") else {
            return;
        };

        let mut unparseable = 0usize;
        let mut first_bad: Option<(usize, &str)> = None;
        let mut future = 0usize;
        let mut range: Option<DateRange> = None;

        for (i, cell) in cells.iter().enumerate() {
            match parse_record_timestamp(cell) {
                Some(ts) => {
                    if ts > self.reference_time {
                        future += 1;
                    }
                    range = Some(match range {
                        None => DateRange { start: ts, end: ts },
                        Some(r) => DateRange {
                            start: r.start.min(ts),
                            end: r.end.max(ts),
                        },
                    });
                }
                None => {
                    unparseable += 1;
                    first_bad.get_or_insert((i + 1, *cell));
                }
            }
        }

        if let Some((first_row, first_value)) = first_bad {
            report.issues.push(Issue::UnparseableDates {
                count: unparseable,
                first_row,
                first_value: first_value.to_string(),
            });
        } else {
            report.date_range = range;
        }
        if future > 0 {
            report.issues.push(Issue::FutureDates { count: future });
        }
    }

    /// [`Validator::validate`] with an explicit reference time.
    pub fn validate_at(table: &RawTable, reference_time: NaiveDateTime) -> ValidationReport {
        Validator::new(reference_time).validate(table)
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Parsed values of every numeric column that passed the type check.
type ParsedColumns = HashMap<NumericColumn, Vec<Option<f64>>>;

fn check_numeric_columns(table: &RawTable, report: &mut ValidationReport) -> ParsedColumns {
    let mut parsed = HashMap::new();

    for column in NumericColumn::ALL {
        let Some(cells) = table.column(column.name()) else {
            continue;
        };

        let mut values = Vec::with_capacity(cells.len());
        let mut invalid = 0usize;
        let mut first_bad: Option<(usize, &str)> = None;
        let mut non_integral = 0usize;
        let mut oversized = 0usize;
        let mut first_oversized: Option<(usize, &str)> = None;
        for (i, cell) in cells.iter().enumerate() {
            let value = parse_numeric_cell(column, cell);
            match value {
                NumericCell::Invalid => {
                    invalid += 1;
                    first_bad.get_or_insert((i + 1, *cell));
                }
                NumericCell::Fractional(_) => non_integral += 1,
                NumericCell::OutOfRange(_) => {
                    oversized += 1;
                    first_oversized.get_or_insert((i + 1, *cell));
                }
                NumericCell::Missing | NumericCell::Value(_) => {}
            }
            values.push(value.value());
        }

        if let Some((first_row, first_value)) = first_bad {
            report.numeric_checks.push(NumericColumnCheck {
                column,
                numeric: false,
                missing: 0,
                negative: 0,
                out_of_range: 0,
                non_integral,
                oversized,
            });
            report.issues.push(Issue::NonNumeric {
                column,
                count: invalid,
                first_row,
                first_value: first_value.to_string(),
            });
            continue;
        }

        let missing = values.iter().filter(|v| v.is_none()).count();
        let negative = values.iter().flatten().filter(|v| **v < 0.0).count();
        let out_of_range = if column == NumericColumn::BounceRate {
            values
                .iter()
                .flatten()
                .filter(|v| !(0.0..=1.0).contains(*v))
                .count()
        } else {
            0
        };

        if let Some((first_row, first_value)) = first_oversized {
            report.issues.push(Issue::CountOutOfRange {
                column,
                count: oversized,
                first_row,
                first_value: first_value.to_string(),
            });
        }
        if non_integral > 0 {
            report.issues.push(Issue::NonIntegralCounts {
                column,
                count: non_integral,
            });
        }
        if column != NumericColumn::BounceRate && negative > 0 {
            report.issues.push(Issue::NegativeValues {
                column,
                count: negative,
            });
        }
        if out_of_range > 0 {
            report
                .issues
                .push(Issue::BounceRateOutOfRange { count: out_of_range });
        }
        if missing > 0 {
            report.issues.push(Issue::MissingValues {
                column,
                count: missing,
            });
        }

        report.numeric_checks.push(NumericColumnCheck {
            column,
            numeric: true,
            missing,
            negative,
            out_of_range,
            non_integral,
            oversized,
        });
        parsed.insert(column, values);
    }

    parsed
}

/// Count rows where both operands are present and `pred` holds.
fn count_pairs(
    parsed: &ParsedColumns,
    left: NumericColumn,
    right: NumericColumn,
    pred: impl Fn(f64, f64) -> bool,
) -> Option<usize> {
    let l = parsed.get(&left)?;
    let r = parsed.get(&right)?;
    Some(
        l.iter()
            .zip(r)
            .filter(|(a, b)| matches!((a, b), (Some(a), Some(b)) if pred(*a, *b)))
            .count(),
    )
}

fn check_cross_fields(parsed: &ParsedColumns, report: &mut ValidationReport) {
    use NumericColumn::{Conversions, Sessions, Users};

    if let Some(count) = count_pairs(parsed, Sessions, Users, |s, u| s < u).filter(|c| *c > 0) {
        report.issues.push(Issue::SessionsBelowUsers { count });
    }
    if let Some(count) =
        count_pairs(parsed, Conversions, Sessions, |c, s| c > s).filter(|c| *c > 0)
    {
        report.issues.push(Issue::ConversionsExceedSessions { count });
    }
    if let Some(sessions) = parsed.get(&Sessions) {
        let count = sessions.iter().filter(|s| **s == Some(0.0)).count();
        if count > 0 {
            report.issues.push(Issue::ZeroSessions { count });
        }
    }
}

/// Distinct count and top values, ordered by count descending then value.
fn categorical_summary(table: &RawTable, column: &str) -> Option<CategoricalSummary> {
    let cells = table.column(column)?;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for cell in &cells {
        *counts.entry(*cell).or_default() += 1;
    }

    let distinct = counts.len();
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // Stable sort keeps the BTreeMap's ascending value order for equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let total = cells.len().max(1) as f64;
    let top = ranked
        .into_iter()
        .take(TOP_VALUES)
        .map(|(value, count)| ValueCount {
            value: value.to_string(),
            count,
            share: count as f64 / total * 100.0,
        })
        .collect();

    Some(CategoricalSummary {
        column: column.to_string(),
        distinct,
        top,
    })
}

fn count_duplicate_rows(table: &RawTable) -> usize {
    let mut seen: HashSet<&Vec<String>> = HashSet::with_capacity(table.len());
    table.rows().iter().filter(|row| !seen.insert(*row)).count()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
