//! CSV persistence for cleaned tables and report sheets.

use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use tracing::{debug, info};
use traffic_core::error::Result;
use traffic_core::models::{TrafficRecord, REQUIRED_COLUMNS};
use traffic_core::time_utils::format_record_timestamp;

use crate::export::{Sheet, Workbook};

/// Write records with the input column layout and date format.
///
/// The header is exactly the required columns in their canonical order.
/// Extra columns of the source table are ignored on input and are not
/// written back. Missing numeric values are written as empty cells.
pub fn write_records(path: &Path, records: &[TrafficRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(REQUIRED_COLUMNS)?;

    let opt = |v: Option<String>| v.unwrap_or_default();
    for r in records {
        writer.write_record([
            format_record_timestamp(&r.timestamp),
            r.page.clone(),
            r.device.clone(),
            r.country.clone(),
            opt(r.sessions.map(|v| v.to_string())),
            opt(r.users.map(|v| v.to_string())),
            opt(r.bounce_rate.map(|v| v.to_string())),
            opt(r.conversions.map(|v| v.to_string())),
            opt(r.avg_session_duration.map(|v| v.to_string())),
        ])?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = records.len(), "Wrote cleaned records");
    Ok(())
}

/// Write one sheet as a CSV file with a header row.
pub fn write_sheet(path: &Path, sheet: &Sheet) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), sheet = %sheet.name, rows = sheet.rows.len(), "Wrote sheet");
    Ok(())
}

/// Write every sheet of `workbook` into `dir`, creating it if needed.
///
/// Returns the written paths in sheet order.
pub fn write_workbook(dir: &Path, workbook: &Workbook) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(workbook.sheets.len());
    for sheet in &workbook.sheets {
        let path = dir.join(sheet.file_name());
        write_sheet(&path, sheet)?;
        written.push(path);
    }
    info!(dir = %dir.display(), sheets = written.len(), "Exported report");
    Ok(written)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::load_records;
    use tempfile::TempDir;
    use traffic_core::time_utils::parse_record_timestamp;

    fn sample() -> Vec<TrafficRecord> {
        vec![
            TrafficRecord::new(
                parse_record_timestamp("07-03-2024 18:05").unwrap(),
                "Checkout, step 2",
                "Mobile",
                "GB",
                Some(42),
                Some(40),
                Some(0.25),
                Some(3),
                Some(75.5),
            ),
            TrafficRecord::new(
                parse_record_timestamp("08-03-2024 09:00").unwrap(),
                "Home",
                "Desktop",
                "US",
                Some(10),
                None,
                Some(1.0),
                Some(0),
                Some(12.0),
            ),
        ]
    }

    #[test]
    fn test_write_records_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cleaned.csv");
        write_records(&path, &sample()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), REQUIRED_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "07-03-2024 18:05,\"Checkout, step 2\",Mobile,GB,42,40,0.25,3,75.5"
        );
        assert_eq!(lines.next().unwrap(), "08-03-2024 09:00,Home,Desktop,US,10,,1,0,12");
    }

    #[test]
    fn test_written_records_load_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("cleaned.csv");
        let records = sample();
        write_records(&path, &records).unwrap();
        assert_eq!(load_records(&path).unwrap(), records);
    }

    #[test]
    fn test_write_workbook_one_file_per_sheet() {
        let tmp = TempDir::new().unwrap();
        let workbook = Workbook {
            sheets: vec![Sheet {
                name: "Daily Trends".into(),
                headers: vec!["date".into(), "sessions".into()],
                rows: vec![vec!["2024-03-01".into(), "12".into()]],
            }],
        };
        let dir = tmp.path().join("report");
        let written = write_workbook(&dir, &workbook).unwrap();
        assert_eq!(written, vec![dir.join("daily_trends.csv")]);
        let text = std::fs::read_to_string(&written[0]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["date,sessions", "2024-03-01,12"]);
    }
}
