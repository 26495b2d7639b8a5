use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::thresholds::{
    ScoringConfig, ScoringWeights, DEFAULT_BOUNCE_WEIGHT, DEFAULT_CONVERSION_WEIGHT,
    DEFAULT_DURATION_WEIGHT,
};

/// Input file used when none is given on the command line.
pub const DEFAULT_INPUT_FILE: &str = "web_traffic_data.csv";

/// Destination of the cleaned table when none is given.
pub const DEFAULT_CLEANED_FILE: &str = "cleaned_data.csv";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Validate, clean and summarise web-traffic data
#[derive(Parser, Debug, Clone)]
#[command(
    name = "traffic-audit",
    about = "Validate, clean and summarise web-traffic data",
    version
)]
pub struct Settings {
    /// Input CSV file
    #[arg(value_name = "INPUT", default_value = DEFAULT_INPUT_FILE)]
    pub input: PathBuf,

    /// What to print after loading
    #[arg(long, default_value = "validate", value_parser = ["validate", "report"])]
    pub view: String,

    /// Where the cleaned table is written
    #[arg(short, long, default_value = DEFAULT_CLEANED_FILE)]
    pub output: PathBuf,

    /// Clean without asking when issues are found
    #[arg(long, conflicts_with = "no_clean")]
    pub clean: bool,

    /// Never clean, and never ask
    #[arg(long)]
    pub no_clean: bool,

    /// Directory to write one CSV per report sheet into (report view)
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// First day to include, YYYY-MM-DD (report view)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day to include, YYYY-MM-DD (report view)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Only include these pages (repeatable)
    #[arg(long = "page")]
    pub pages: Vec<String>,

    /// Only include these devices (repeatable)
    #[arg(long = "device")]
    pub devices: Vec<String>,

    /// Only include these countries (repeatable)
    #[arg(long = "country")]
    pub countries: Vec<String>,

    /// Quality score weight of (1 - bounce rate)
    #[arg(long, default_value_t = DEFAULT_BOUNCE_WEIGHT)]
    pub weight_bounce: f64,

    /// Quality score weight of the conversion rate
    #[arg(long, default_value_t = DEFAULT_CONVERSION_WEIGHT)]
    pub weight_conversion: f64,

    /// Quality score weight of the normalised session duration
    #[arg(long, default_value_t = DEFAULT_DURATION_WEIGHT)]
    pub weight_duration: f64,

    /// Timezone the timestamps were recorded in (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Print the validation report as JSON
    #[arg(long)]
    pub json: bool,

    /// Logging level
    #[arg(long, default_value = "WARNING", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.traffic-audit/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
}

impl LastUsedParams {
    /// Default path of the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".traffic-audit").join("last_used.json")
    }

    /// Load persisted params; `Default` when the file is absent or unreadable.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params, creating parent directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        // Write to a temp file then rename.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit arguments and
    /// config path.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        // Raw ArgMatches are needed to query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins over persisted values.
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "output") {
            if let Some(v) = last.output {
                settings.output = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "export_dir") && settings.export_dir.is_none() {
            settings.export_dir = last.export_dir;
        }

        // Persist before resolving "auto" so the system timezone is re-detected
        // on every run.
        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        Self::resolve_auto_values(settings)
    }

    /// Resolve the `"auto"` timezone and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Scorer configuration from the weight flags; fails when the weights are
    /// invalid.
    pub fn scoring_config(&self) -> Result<ScoringConfig> {
        let weights = ScoringWeights::new(
            self.weight_bounce,
            self.weight_conversion,
            self.weight_duration,
        )?;
        Ok(ScoringConfig {
            weights,
            ..ScoringConfig::default()
        })
    }

    /// `Some(true)` for `--clean`, `Some(false)` for `--no-clean`, `None` to ask.
    pub fn clean_decision(&self) -> Option<bool> {
        if self.clean {
            Some(true)
        } else if self.no_clean {
            Some(false)
        } else {
            None
        }
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            view: Some(s.view.clone()),
            timezone: Some(s.timezone.clone()),
            output: Some(s.output.clone()),
            export_dir: s.export_dir.clone(),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrafficError;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    // ── LastUsedParams ───────────────────────────────────────────────────────

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            view: Some("report".to_string()),
            timezone: Some("Europe/Berlin".to_string()),
            output: Some(PathBuf::from("out.csv")),
            export_dir: Some(PathBuf::from("sheets")),
        };

        params.save_to(&path).expect("save");
        assert_eq!(LastUsedParams::load_from(&path), params);
    }

    #[test]
    fn test_last_used_params_default_when_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = LastUsedParams::load_from(&tmp_config_path(&tmp));
        assert_eq!(loaded, LastUsedParams::default());
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists());

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    // ── Settings parsing ─────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["traffic-audit"]);

        assert_eq!(settings.input, PathBuf::from(DEFAULT_INPUT_FILE));
        assert_eq!(settings.output, PathBuf::from(DEFAULT_CLEANED_FILE));
        assert_eq!(settings.view, "validate");
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.log_level, "WARNING");
        assert!(settings.export_dir.is_none());
        assert!(settings.pages.is_empty());
        assert_eq!(settings.clean_decision(), None);
        assert!(!settings.json);
    }

    #[test]
    fn test_settings_positional_input_and_filters() {
        let settings = Settings::parse_from([
            "traffic-audit",
            "march.csv",
            "--view",
            "report",
            "--from",
            "2024-03-01",
            "--page",
            "Home",
            "--page",
            "Checkout",
        ]);
        assert_eq!(settings.input, PathBuf::from("march.csv"));
        assert_eq!(settings.view, "report");
        assert_eq!(settings.from, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(settings.pages, vec!["Home", "Checkout"]);
    }

    #[test]
    fn test_settings_clean_flags() {
        assert_eq!(
            Settings::parse_from(["traffic-audit", "--clean"]).clean_decision(),
            Some(true)
        );
        assert_eq!(
            Settings::parse_from(["traffic-audit", "--no-clean"]).clean_decision(),
            Some(false)
        );
        assert!(Settings::try_parse_from(["traffic-audit", "--clean", "--no-clean"]).is_err());
    }

    #[test]
    fn test_settings_scoring_config_from_weights() {
        let settings = Settings::parse_from([
            "traffic-audit",
            "--weight-bounce",
            "0.2",
            "--weight-conversion",
            "0.5",
            "--weight-duration",
            "0.3",
        ]);
        let config = settings.scoring_config().unwrap();
        assert_eq!(config.weights.conversion_rate, 0.5);
    }

    #[test]
    fn test_settings_scoring_config_rejects_bad_weights() {
        let settings = Settings::parse_from(["traffic-audit", "--weight-bounce", "0.9"]);
        assert!(matches!(
            settings.scoring_config(),
            Err(TrafficError::InvalidWeights(_))
        ));
    }

    // ── load_with_last_used ──────────────────────────────────────────────────

    #[test]
    fn test_load_with_last_used_merges_persisted_view() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            view: Some("report".to_string()),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(vec!["traffic-audit".into()], &config_path);
        assert_eq!(settings.view, "report");
        assert_eq!(settings.timezone, "UTC");
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            output: Some(PathBuf::from("old.csv")),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            vec!["traffic-audit".into(), "--output".into(), "new.csv".into()],
            &config_path,
        );
        assert_eq!(settings.output, PathBuf::from("new.csv"));
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&config_path).expect("save");

        Settings::load_with_last_used_impl(
            vec!["traffic-audit".into(), "--clear".into()],
            &config_path,
        );
        assert!(!config_path.exists(), "file must be gone after --clear");
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load_with_last_used_impl(
            vec!["traffic-audit".into(), "--debug".into()],
            &tmp_config_path(&tmp),
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_keeps_auto_timezone_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        let settings =
            Settings::load_with_last_used_impl(vec!["traffic-audit".into()], &config_path);
        assert_ne!(settings.timezone, "auto");

        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.timezone, Some("auto".to_string()));
    }
}
