//! Delimited-file loading for traffic tables.
//!
//! [`load_table`] reads the raw string cells exactly as they appear in the
//! file so the validator can inspect malformed data. [`RawTable::to_records`]
//! is the typed view used by cleaning and aggregation, and fails closed on the
//! first structural or type problem.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use traffic_core::error::{Result, TrafficError};
use traffic_core::models::{NumericColumn, TrafficRecord, REQUIRED_COLUMNS};
use traffic_core::time_utils::parse_record_timestamp;

/// Cell contents treated as a missing value.
pub const NULL_TOKENS: [&str; 9] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "none"];

/// `true` when `cell` (already trimmed) denotes a missing value.
pub fn is_null_token(cell: &str) -> bool {
    NULL_TOKENS.contains(&cell)
}

// ── Numeric cells ─────────────────────────────────────────────────────────────

/// Smallest count magnitude that does not fit in an `i64` (2^63).
const COUNT_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Interpretation of one cell in a numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericCell {
    Missing,
    Value(f64),
    /// A count with a fractional part, such as `12.5`.
    Fractional(f64),
    /// A count too large in magnitude for a 64-bit integer.
    OutOfRange(f64),
    /// Not a finite number.
    Invalid,
}

impl NumericCell {
    /// The parsed number, if the cell holds one.
    pub fn value(self) -> Option<f64> {
        match self {
            NumericCell::Value(v) | NumericCell::Fractional(v) | NumericCell::OutOfRange(v) => {
                Some(v)
            }
            NumericCell::Missing | NumericCell::Invalid => None,
        }
    }
}

/// Parse a numeric cell for `column`.
///
/// Count columns accept integral decimals such as `12.0`; fractional and
/// oversized counts are still numbers but are classified separately.
pub fn parse_numeric_cell(column: NumericColumn, cell: &str) -> NumericCell {
    let cell = cell.trim();
    if is_null_token(cell) {
        return NumericCell::Missing;
    }
    match cell.parse::<f64>() {
        Ok(v) if !v.is_finite() => NumericCell::Invalid,
        Ok(v) if column.is_count() && v.abs() >= COUNT_LIMIT => NumericCell::OutOfRange(v),
        Ok(v) if column.is_count() && v.fract() != 0.0 => NumericCell::Fractional(v),
        Ok(v) => NumericCell::Value(v),
        Err(_) => NumericCell::Invalid,
    }
}

// ── SnapshotId ────────────────────────────────────────────────────────────────

/// Content identity of a loaded table, stable within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotId(pub u64);

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// ── RawTable ──────────────────────────────────────────────────────────────────

/// Header names and trimmed string cells of a delimited file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a table from already-split cells. Every row must have one cell
    /// per header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Parse CSV text with a header row from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` in the header, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// All cells of column `name` in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }

    /// Required columns absent from the header, in schema order.
    pub fn missing_columns(&self) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|c| self.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect()
    }

    /// Convert every row to a [`TrafficRecord`].
    ///
    /// Fractional counts are rounded to the nearest whole number, halves away
    /// from zero. Counts beyond the `i64` range fail with
    /// [`TrafficError::CountOutOfRange`]. Row numbers in errors are 1-based and
    /// exclude the header.
    pub fn to_records(&self) -> Result<Vec<TrafficRecord>> {
        let missing = self.missing_columns();
        if !missing.is_empty() {
            return Err(TrafficError::MissingColumns(missing));
        }
        let idx = |name: &str| self.column_index(name).unwrap_or(0);
        let date_idx = idx("date");
        let page_idx = idx("page");
        let device_idx = idx("device");
        let country_idx = idx("country");
        let numeric_idx: Vec<(NumericColumn, usize)> = NumericColumn::ALL
            .iter()
            .map(|c| (*c, idx(c.name())))
            .collect();

        let mut records = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            let row_no = i + 1;
            let cell = |j: usize| row.get(j).map(String::as_str).unwrap_or("");

            let raw_date = cell(date_idx);
            let timestamp =
                parse_record_timestamp(raw_date).ok_or_else(|| TrafficError::DateParse {
                    row: row_no,
                    value: raw_date.to_string(),
                })?;

            let mut values = [None; 5];
            for (slot, (column, j)) in values.iter_mut().zip(&numeric_idx) {
                *slot = match parse_numeric_cell(*column, cell(*j)) {
                    NumericCell::Missing => None,
                    NumericCell::Value(v) | NumericCell::Fractional(v) => Some(v),
                    NumericCell::OutOfRange(_) => {
                        return Err(TrafficError::CountOutOfRange {
                            column: column.name().to_string(),
                            row: row_no,
                            value: cell(*j).to_string(),
                        })
                    }
                    NumericCell::Invalid => {
                        return Err(TrafficError::NonNumeric {
                            column: column.name().to_string(),
                            row: row_no,
                            value: cell(*j).to_string(),
                        })
                    }
                };
            }
            let [sessions, users, conversions, bounce_rate, duration] = values;

            records.push(TrafficRecord::new(
                timestamp,
                cell(page_idx),
                cell(device_idx),
                cell(country_idx),
                sessions.map(to_count),
                users.map(to_count),
                bounce_rate,
                conversions.map(to_count),
                duration,
            ));
        }
        Ok(records)
    }

    /// Content hash of the headers and cells.
    pub fn snapshot_id(&self) -> SnapshotId {
        let mut hasher = DefaultHasher::new();
        self.headers.hash(&mut hasher);
        self.rows.hash(&mut hasher);
        SnapshotId(hasher.finish())
    }
}

/// Round a count already checked to lie within the `i64` range.
fn to_count(v: f64) -> i64 {
    v.round() as i64
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load a delimited file with a header row.
///
/// A missing file is reported as [`TrafficError::FileNotFound`] before any
/// parsing happens; a file without a header or data rows is
/// [`TrafficError::EmptySource`].
pub fn load_table(path: &Path) -> Result<RawTable> {
    if !path.exists() {
        return Err(TrafficError::FileNotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path).map_err(|source| TrafficError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let table = RawTable::from_reader(std::io::BufReader::new(file))?;
    if table.headers.iter().all(|h| h.is_empty()) || table.is_empty() {
        return Err(TrafficError::EmptySource(path.to_path_buf()));
    }

    debug!(
        path = %path.display(),
        rows = table.len(),
        columns = table.headers.len(),
        "Loaded traffic table"
    );
    Ok(table)
}

/// Load a file and convert it straight to typed records.
pub fn load_records(path: &Path) -> Result<Vec<TrafficRecord>> {
    load_table(path)?.to_records()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
