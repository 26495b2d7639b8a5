//! Plain-text rendering of validation reports and report views.

use std::path::Path;

use traffic_core::formatting::{
    format_count, format_fraction_percent, format_number, format_percent, format_seconds,
    percentage,
};
use traffic_data::analysis::ReportView;
use traffic_data::cleaner::RepairSummary;
use traffic_data::insights::{Alert, AlertKind};
use traffic_data::validator::{Check, Issue, ValidationReport};
use unicode_width::UnicodeWidthStr;

const RULE_WIDTH: usize = 60;

// ── Tables ────────────────────────────────────────────────────────────────────

/// Render a table with a header rule. The first column is left-aligned, the
/// rest right-aligned; widths are measured in terminal columns.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.width());
            }
        }
    }

    let line = |cells: &mut dyn Iterator<Item = &str>| -> String {
        cells
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, w))| {
                let pad = " ".repeat(w.saturating_sub(cell.width()));
                if i == 0 {
                    format!("{cell}{pad}")
                } else {
                    format!("{pad}{cell}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(&mut headers.iter().copied())];
    let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push("-".repeat(total));
    for row in rows {
        out.push(line(&mut row.iter().map(String::as_str)));
    }
    out.join("\n")
}

// ── Validation report ─────────────────────────────────────────────────────────

/// Render the validation report in section order.
pub fn render_validation(report: &ValidationReport, source: &Path) -> String {
    let mut out = Vec::new();
    out.push("=".repeat(RULE_WIDTH));
    out.push("DATA VALIDATION REPORT".to_string());
    out.push("=".repeat(RULE_WIDTH));
    out.push(format!(
        "✓ Successfully loaded {} records from {}",
        format_count(report.rows as i64),
        source.display()
    ));

    section(&mut out, "Column Validation");
    match report.issues_for(Check::Schema).next() {
        Some(issue) => {
            out.push(format!("✗ {issue}"));
            finish(&mut out, report);
            return out.join("\n");
        }
        None => out.push("✓ All required columns present".to_string()),
    }

    section(&mut out, "Date Validation");
    for issue in report.issues_for(Check::Temporal) {
        match issue {
            Issue::FutureDates { count } => {
                out.push(format!("⚠ Warning: {count} records have future dates"))
            }
            other => {
                out.push(format!("✗ {other}"));
                out.push("  Expected format: DD-MM-YYYY HH:MM".to_string());
            }
        }
    }
    if let Some(range) = &report.date_range {
        out.push(format!(
            "✓ Date range: {} to {}",
            range.start.format("%Y-%m-%d %H:%M"),
            range.end.format("%Y-%m-%d %H:%M")
        ));
    }

    section(&mut out, "Numeric Validation");
    let mut numeric_issues = 0;
    for issue in report
        .issues
        .iter()
        .filter(|i| matches!(i.check(), Check::NumericType | Check::Range))
    {
        numeric_issues += 1;
        let mark = if issue.is_fatal() { "✗" } else { "⚠ Warning:" };
        out.push(format!("{mark} {issue}"));
    }
    if numeric_issues == 0 {
        out.push("✓ All numeric validations passed".to_string());
    }

    section(&mut out, "Categorical Summary");
    for summary in &report.categorical {
        out.push(format!("  {}:", summary.column));
        out.push(format!("    - Unique values: {}", format_count(summary.distinct as i64)));
        out.push("    - Top 5:".to_string());
        for v in &summary.top {
            out.push(format!(
                "      {}: {} ({})",
                v.value,
                format_count(v.count as i64),
                format_percent(v.share, 1)
            ));
        }
    }

    section(&mut out, "Quality Checks");
    out.push(format!(
        "  - Duplicate rows: {} ({})",
        format_count(report.duplicate_rows as i64),
        format_percent(
            percentage(report.duplicate_rows as f64, report.rows as f64, 2),
            2
        )
    ));
    for issue in report.issues_for(Check::CrossField) {
        out.push(format!("  ⚠ Warning: {issue}"));
    }

    section(&mut out, "Summary Statistics");
    match &report.summary {
        Some(kpis) => {
            out.push(format!("  - Total Records: {}", format_count(kpis.records as i64)));
            if let Some(range) = &report.date_range {
                out.push(format!(
                    "  - Date Range: {} to {}",
                    range.start.format("%Y-%m-%d %H:%M"),
                    range.end.format("%Y-%m-%d %H:%M")
                ));
            }
            out.push(format!("  - Total Sessions: {}", format_count(kpis.total_sessions)));
            out.push(format!("  - Total Users: {}", format_count(kpis.total_users)));
            out.push(format!(
                "  - Total Conversions: {}",
                format_count(kpis.total_conversions)
            ));
            out.push(format!(
                "  - Avg Bounce Rate: {}",
                format_fraction_percent(kpis.avg_bounce_rate, 2)
            ));
            out.push(format!(
                "  - Avg Session Duration: {}",
                format_seconds(kpis.avg_session_duration)
            ));
            out.push(format!(
                "  - Overall Conversion Rate: {}",
                format_percent(kpis.conversion_rate, 2)
            ));
        }
        None => out.push("  (unavailable: table has unparseable values)".to_string()),
    }

    finish(&mut out, report);
    out.join("\n")
}

/// Render the repairs applied by the cleaner.
pub fn render_repairs(summary: &RepairSummary, output: &Path) -> String {
    let lines = [
        "Cleaning Data...".to_string(),
        format!("  - Removed {} duplicate records", summary.duplicates_removed),
        format!(
            "  - Removed {} records with zero, negative or missing sessions",
            summary.non_positive_sessions_removed
        ),
        format!("  - Clamped {} bounce rates into 0-1", summary.bounce_rates_clamped),
        format!(
            "  - Capped conversions at sessions in {} records",
            summary.conversions_capped
        ),
        format!("  - Filled {} missing values with 0", summary.nulls_filled),
        format!(
            "  - Removed {} records duplicated by the repairs",
            summary.duplicates_after_repair
        ),
        format!("✓ Cleaned data exported to '{}'", output.display()),
        format!("  Final record count: {}", format_count(summary.output_rows as i64)),
    ];
    lines.join("\n")
}

fn section(out: &mut Vec<String>, title: &str) {
    out.push(String::new());
    out.push("=".repeat(RULE_WIDTH));
    out.push(format!("  {title}"));
    out.push("=".repeat(RULE_WIDTH));
}

fn finish(out: &mut Vec<String>, report: &ValidationReport) {
    out.push(String::new());
    out.push("=".repeat(RULE_WIDTH));
    if report.is_clean() {
        out.push("✓ VALIDATION PASSED: Data is ready for analysis!".to_string());
    } else {
        if report.has_fatal() {
            out.push("✗ VALIDATION FAILED: Please fix errors before proceeding".to_string());
        }
        out.push(format!(
            "⚠ VALIDATION COMPLETED WITH {} ISSUES:",
            report.issues.len()
        ));
        for (i, issue) in report.issues.iter().enumerate() {
            let tag = if issue.is_fatal() { " [fatal]" } else { "" };
            out.push(format!("  {}. {issue}{tag}", i + 1));
        }
    }
    out.push("=".repeat(RULE_WIDTH));
}

// ── Report view ───────────────────────────────────────────────────────────────

/// Render KPIs, the page table, segment tables and insights.
pub fn render_report_view(view: &ReportView) -> String {
    let k = &view.kpis;
    let mut out = vec![
        "Key Performance Indicators".to_string(),
        format!("  Total Sessions:       {}", format_count(k.total_sessions)),
        format!("  Total Users:          {}", format_count(k.total_users)),
        format!("  Total Conversions:    {}", format_count(k.total_conversions)),
        format!("  Conversion Rate:      {}", format_percent(k.conversion_rate, 2)),
        format!("  Avg Bounce Rate:      {}", format_fraction_percent(k.avg_bounce_rate, 1)),
        format!("  Avg Session Duration: {}", format_seconds(k.avg_session_duration)),
        String::new(),
        "Page Performance".to_string(),
    ];

    let page_rows: Vec<Vec<String>> = view
        .pages
        .iter()
        .map(|p| {
            vec![
                p.page.clone(),
                format_count(p.sessions),
                format_percent(p.conversion_rate, 2),
                format_fraction_percent(p.bounce_rate, 1),
                format_seconds(p.avg_session_duration),
                format_number(p.quality_score, 1),
                p.category.label().to_string(),
            ]
        })
        .collect();
    out.push(render_table(
        &["Page", "Sessions", "Conv. Rate", "Bounce", "Duration", "Quality", "Category"],
        &page_rows,
    ));

    for (title, key, rows) in [
        ("Device Analysis", "Device", &view.devices),
        ("Country Analysis", "Country", &view.countries),
        ("Day of Week", "Day", &view.weekdays),
    ] {
        out.push(String::new());
        out.push(title.to_string());
        let table_rows: Vec<Vec<String>> = rows
            .iter()
            .map(|r| {
                vec![
                    r.key.to_string(),
                    format_count(r.sessions),
                    format_count(r.conversions),
                    format_percent(r.conversion_rate, 2),
                    format_fraction_percent(r.bounce_rate, 1),
                ]
            })
            .collect();
        out.push(render_table(
            &[key, "Sessions", "Conversions", "Conv. Rate", "Bounce"],
            &table_rows,
        ));
    }

    out.push(String::new());
    out.extend(render_insights(view));
    out.join("\n")
}

fn render_insights(view: &ReportView) -> Vec<String> {
    let ins = &view.insights;
    let mut out = vec!["Key Insights".to_string()];
    out.push(format!(
        "  Star Performer: {} has the highest quality score ({}) with {} sessions and {} conversion rate.",
        ins.top_page.page,
        format_number(ins.top_page.quality_score, 1),
        format_count(ins.top_page.sessions),
        format_percent(ins.top_page.conversion_rate, 2)
    ));
    if let Some(first) = ins.needs_attention.first() {
        out.push(format!(
            "  Attention Required: {} pages need optimization, starting with '{first}'.",
            ins.needs_attention.len()
        ));
    }
    if let Some(best) = &ins.best_device {
        out.push(format!(
            "  Best Converting Device: {} converts at {}.",
            best.name,
            format_percent(best.value, 2)
        ));
    }

    out.push(String::new());
    out.push("Recommendations".to_string());
    if !ins.high_traffic_low_conversion.is_empty() {
        out.push(format!(
            "  - Optimize high-traffic pages: {} receive significant traffic but convert below the median.",
            ins.high_traffic_low_conversion.join(", ")
        ));
    }
    if !ins.hidden_gems.is_empty() {
        out.push(format!(
            "  - Promote hidden gems: {} convert well but receive little traffic.",
            ins.hidden_gems.join(", ")
        ));
    }
    out.push(format!(
        "  - Reduce bounce rates: focus on {} (bounce rate {}).",
        ins.highest_bounce.name,
        format_fraction_percent(ins.highest_bounce.value, 1)
    ));
    if let Some(worst) = &ins.worst_device {
        out.push(format!(
            "  - Device optimization: {} has the lowest conversion rate ({}).",
            worst.name,
            format_percent(worst.value, 2)
        ));
    }
    if let Some(hour) = ins.peak_conversion_hour {
        out.push(format!(
            "  - Timing: conversions peak around {hour:02}:00."
        ));
    }

    if !ins.alerts.is_empty() {
        out.push(String::new());
        out.push("Alerts".to_string());
        out.extend(ins.alerts.iter().map(|a| format!("  ⚠ {}", describe_alert(a))));
    }
    out
}

fn describe_alert(alert: &Alert) -> String {
    match alert.kind {
        AlertKind::HighBounceRate => format!(
            "{}: bounce rate {} above {}",
            alert.page,
            format_fraction_percent(alert.value, 1),
            format_fraction_percent(alert.threshold, 0)
        ),
        AlertKind::LowConversionRate => format!(
            "{}: conversion rate {} below {}",
            alert.page,
            format_percent(alert.value, 2),
            format_percent(alert.threshold, 1)
        ),
        AlertKind::LowSessionDuration => format!(
            "{}: average session {} below {}",
            alert.page,
            format_seconds(alert.value),
            format_seconds(alert.threshold)
        ),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
