use std::path::PathBuf;
use thiserror::Error;

use crate::models::NumericColumn;

/// All errors produced by the traffic-audit crates.
#[derive(Error, Debug)]
pub enum TrafficError {
    /// The input file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The delimited file could not be parsed.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The source has no header row or no data rows.
    #[error("No records found in {0}")]
    EmptySource(PathBuf),

    /// One or more required columns are absent from the header.
    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// A `date` cell did not match `DD-MM-YYYY HH:MM`.
    #[error("Invalid date at row {row}: {value:?} (expected DD-MM-YYYY HH:MM)")]
    DateParse { row: usize, value: String },

    /// A numeric column holds a value that is not a number.
    #[error("Column '{column}' is not numeric (row {row}: {value:?})")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    /// A count cell is a whole number too large for a 64-bit integer.
    #[error("Column '{column}' holds a count outside the 64-bit range (row {row}: {value:?})")]
    CountOutOfRange {
        column: String,
        row: usize,
        value: String,
    },

    /// Summing a count column exceeded the 64-bit range.
    #[error("Total of '{column}' exceeds the 64-bit range")]
    CountOverflow { column: NumericColumn },

    /// The requested subset contains no rows.
    #[error("No data available for the selected subset")]
    EmptySubset,

    /// Quality-score weights are negative or do not sum to 1.0.
    #[error("Invalid quality score weights: {0}")]
    InvalidWeights(String),

    /// An aggregate row was keyed by a different dimension than expected.
    #[error("Expected {expected} aggregates, found a {found} row")]
    WrongDimension {
        expected: &'static str,
        found: &'static str,
    },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JSON document could not be parsed or written.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrafficError {
    /// `true` for conditions raised before any row-level content is inspected.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            TrafficError::FileNotFound(_)
                | TrafficError::FileRead { .. }
                | TrafficError::Csv(_)
                | TrafficError::EmptySource(_)
        )
    }
}

/// Convenience alias used throughout the traffic crates.
pub type Result<T> = std::result::Result<T, TrafficError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_not_found() {
        let err = TrafficError::FileNotFound(PathBuf::from("web_traffic_data.csv"));
        assert_eq!(err.to_string(), "File not found: web_traffic_data.csv");
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TrafficError::FileRead {
            path: PathBuf::from("/data/traffic.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/data/traffic.csv"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_error_display_missing_columns() {
        let err = TrafficError::MissingColumns(vec!["users".into(), "bounce_rate".into()]);
        assert_eq!(err.to_string(), "Missing columns: users, bounce_rate");
    }

    #[test]
    fn test_error_display_date_parse() {
        let err = TrafficError::DateParse {
            row: 3,
            value: "2024/01/15".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("row 3"));
        assert!(msg.contains("DD-MM-YYYY HH:MM"));
    }

    #[test]
    fn test_error_display_non_numeric() {
        let err = TrafficError::NonNumeric {
            column: "sessions".to_string(),
            row: 7,
            value: "lots".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Column 'sessions' is not numeric (row 7: \"lots\")"
        );
    }

    #[test]
    fn test_error_display_count_range() {
        let err = TrafficError::CountOutOfRange {
            column: "sessions".to_string(),
            row: 2,
            value: "1e20".to_string(),
        };
        assert!(err.to_string().contains("row 2"));

        let err = TrafficError::CountOverflow {
            column: NumericColumn::Users,
        };
        assert_eq!(err.to_string(), "Total of 'users' exceeds the 64-bit range");
    }

    #[test]
    fn test_error_display_empty_subset() {
        let msg = TrafficError::EmptySubset.to_string();
        assert!(msg.contains("No data available"));
    }

    #[test]
    fn test_error_display_wrong_dimension() {
        let err = TrafficError::WrongDimension {
            expected: "page",
            found: "device",
        };
        assert_eq!(err.to_string(), "Expected page aggregates, found a device row");
    }

    #[test]
    fn test_load_failure_classification() {
        assert!(TrafficError::FileNotFound(PathBuf::from("x.csv")).is_load_failure());
        assert!(TrafficError::EmptySource(PathBuf::from("x.csv")).is_load_failure());
        assert!(!TrafficError::EmptySubset.is_load_failure());
        assert!(!TrafficError::MissingColumns(vec!["page".into()]).is_load_failure());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: TrafficError = io_err.into();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: TrafficError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
