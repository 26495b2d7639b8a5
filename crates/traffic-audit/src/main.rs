mod bootstrap;
mod prompt;
mod report;

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use traffic_core::settings::Settings;
use traffic_core::thresholds::AlertThresholds;
use traffic_core::time_utils::{resolve_timezone, wall_clock_in};
use traffic_data::analysis::{load_snapshot, run_validation, ValidationOptions};
use traffic_data::filter::SubsetFilter;
use traffic_data::writer::write_workbook;
use traffic_runtime::report_views::ReportViews;

fn main() -> Result<ExitCode> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    let _log_guard = bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Traffic Audit v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Input: {}, View: {}, Timezone: {}",
        settings.input.display(),
        settings.view,
        settings.timezone
    );

    match settings.view.as_str() {
        "validate" => validate(&settings),
        "report" => report_view(&settings),
        unknown => {
            eprintln!("Unknown view mode: {}", unknown);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Validate the input, print the report and optionally write a cleaned copy.
fn validate(settings: &Settings) -> Result<ExitCode> {
    let reference_time = wall_clock_in(resolve_timezone(&settings.timezone), Utc::now());
    let options = ValidationOptions {
        reference_time,
        output_path: settings.output.clone(),
    };

    let mut printed = false;
    let outcome = run_validation(&settings.input, &options, |report| {
        if report.has_fatal() {
            return false;
        }
        if settings.json {
            return settings.clean_decision().unwrap_or(false);
        }
        println!("{}", report::render_validation(report, &settings.input));
        printed = true;
        settings.clean_decision().unwrap_or_else(|| {
            let stdin = std::io::stdin();
            prompt::ask_yes_no(
                "\nWould you like to clean the data?",
                &mut stdin.lock(),
                &mut std::io::stdout(),
            )
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Could not read answer; not cleaning");
                false
            })
        })
    })
    .with_context(|| format!("validating {}", settings.input.display()))?;

    if settings.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        if !printed {
            println!(
                "{}",
                report::render_validation(&outcome.report, &settings.input)
            );
        }
        if let Some(cleaning) = &outcome.cleaning {
            println!();
            println!(
                "{}",
                report::render_repairs(&cleaning.summary, &cleaning.output_path)
            );
        }
    }

    Ok(if outcome.report.has_fatal() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Load, clean and analyse the input, then print the report view and write
/// the export sheets when `--export-dir` is given.
fn report_view(settings: &Settings) -> Result<ExitCode> {
    let snapshot = load_snapshot(&settings.input)
        .with_context(|| format!("loading {}", settings.input.display()))?;
    let filter = SubsetFilter::from_lists(
        settings.from,
        settings.to,
        &settings.pages,
        &settings.devices,
        &settings.countries,
    );
    let scoring = settings.scoring_config()?;

    let mut views = ReportViews::default();
    let view = views
        .view(&snapshot, &filter, &scoring, &AlertThresholds::default())
        .context("building report view")?;

    if settings.json {
        println!("{}", serde_json::to_string_pretty(&*view)?);
    } else {
        println!("{}", report::render_report_view(&view));
    }

    if let Some(dir) = &settings.export_dir {
        let written = write_workbook(dir, &view.workbook())
            .with_context(|| format!("exporting to {}", dir.display()))?;
        tracing::info!(files = written.len(), dir = %dir.display(), "Report exported");
        if !settings.json {
            println!();
            println!("✓ Exported {} sheets to '{}'", written.len(), dir.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
