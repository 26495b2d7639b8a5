//! Tabular report sheets built from aggregate views.

use serde::Serialize;
use traffic_core::models::{AggregateRow, PageScore};

pub const PAGE_SHEET: &str = "Page Performance";
pub const DEVICE_SHEET: &str = "Device Analysis";
pub const COUNTRY_SHEET: &str = "Country Analysis";
pub const DAILY_SHEET: &str = "Daily Trends";
pub const HOURLY_SHEET: &str = "Hourly Patterns";

/// One named table of string cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    fn new(name: &str, headers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// File name used when the sheet is written on its own,
    /// e.g. `"Daily Trends"` → `daily_trends.csv`.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name.to_lowercase().replace(' ', "_"))
    }
}

/// Ordered collection of report sheets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// Build the five report sheets.
///
/// Rates and means are written with fixed precision; counts as integers.
pub fn build_workbook(
    pages: &[PageScore],
    devices: &[AggregateRow],
    countries: &[AggregateRow],
    daily: &[AggregateRow],
    hourly: &[AggregateRow],
) -> Workbook {
    let mut page_sheet = Sheet::new(
        PAGE_SHEET,
        &[
            "page",
            "sessions",
            "conversions",
            "bounce_rate",
            "avg_session_duration",
            "conversion_rate",
            "quality_score",
            "category",
        ],
    );
    page_sheet.rows = pages
        .iter()
        .map(|p| {
            vec![
                p.page.clone(),
                p.sessions.to_string(),
                p.conversions.to_string(),
                format!("{:.4}", p.bounce_rate),
                format!("{:.2}", p.avg_session_duration),
                format!("{:.4}", p.conversion_rate),
                format!("{:.2}", p.quality_score),
                p.category.label().to_string(),
            ]
        })
        .collect();

    Workbook {
        sheets: vec![
            page_sheet,
            segment_sheet(DEVICE_SHEET, "device", devices),
            segment_sheet(COUNTRY_SHEET, "country", countries),
            trend_sheet(DAILY_SHEET, "date", daily),
            trend_sheet(HOURLY_SHEET, "hour", hourly),
        ],
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn segment_sheet(name: &str, key_header: &str, rows: &[AggregateRow]) -> Sheet {
    let mut sheet = Sheet::new(
        name,
        &[
            key_header,
            "sessions",
            "users",
            "conversions",
            "bounce_rate",
            "avg_session_duration",
            "conversion_rate",
        ],
    );
    sheet.rows = rows
        .iter()
        .map(|r| {
            vec![
                r.key.to_string(),
                r.sessions.to_string(),
                r.users.to_string(),
                r.conversions.to_string(),
                format!("{:.4}", r.bounce_rate),
                format!("{:.2}", r.avg_session_duration),
                format!("{:.4}", r.conversion_rate),
            ]
        })
        .collect();
    sheet
}

fn trend_sheet(name: &str, key_header: &str, rows: &[AggregateRow]) -> Sheet {
    let mut sheet = Sheet::new(
        name,
        &[
            key_header,
            "sessions",
            "conversions",
            "bounce_rate",
            "conversion_rate",
        ],
    );
    sheet.rows = rows
        .iter()
        .map(|r| {
            vec![
                r.key.to_string(),
                r.sessions.to_string(),
                r.conversions.to_string(),
                format!("{:.4}", r.bounce_rate),
                format!("{:.4}", r.conversion_rate),
            ]
        })
        .collect();
    sheet
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use traffic_core::models::{Category, GroupKey};

    fn agg(key: GroupKey) -> AggregateRow {
        AggregateRow {
            key,
            records: 2,
            sessions: 1200,
            users: 900,
            conversions: 30,
            bounce_rate: 0.425,
            avg_session_duration: 93.456,
            conversion_rate: 2.5,
        }
    }

    fn workbook() -> Workbook {
        let page = PageScore {
            page: "Home".into(),
            sessions: 1200,
            conversions: 30,
            conversion_rate: 2.5,
            bounce_rate: 0.425,
            avg_session_duration: 93.456,
            quality_score: 48.123,
            category: Category::HiddenGem,
        };
        build_workbook(
            &[page],
            &[agg(GroupKey::Device("Mobile".into()))],
            &[agg(GroupKey::Country("US".into()))],
            &[agg(GroupKey::Day(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))],
            &[agg(GroupKey::Hour(7))],
        )
    }

    #[test]
    fn test_sheet_names_in_order() {
        let wb = workbook();
        let names: Vec<&str> = wb.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![PAGE_SHEET, DEVICE_SHEET, COUNTRY_SHEET, DAILY_SHEET, HOURLY_SHEET]
        );
    }

    #[test]
    fn test_page_sheet_row() {
        let wb = workbook();
        let sheet = wb.sheet(PAGE_SHEET).unwrap();
        assert_eq!(sheet.headers.len(), sheet.rows[0].len());
        assert_eq!(
            sheet.rows[0],
            vec![
                "Home",
                "1200",
                "30",
                "0.4250",
                "93.46",
                "2.5000",
                "48.12",
                "Hidden Gems"
            ]
        );
    }

    #[test]
    fn test_trend_sheets_use_key_display() {
        let wb = workbook();
        assert_eq!(wb.sheet(DAILY_SHEET).unwrap().rows[0][0], "2024-03-01");
        assert_eq!(wb.sheet(HOURLY_SHEET).unwrap().rows[0][0], "07:00");
        assert_eq!(wb.sheet(DEVICE_SHEET).unwrap().headers[0], "device");
    }

    #[test]
    fn test_sheet_file_name() {
        let wb = workbook();
        assert_eq!(
            wb.sheet(COUNTRY_SHEET).unwrap().file_name(),
            "country_analysis.csv"
        );
    }
}
