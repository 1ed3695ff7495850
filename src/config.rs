//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.stepstat.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working and data directories.
pub const CONFIG_FILE_NAME: &str = ".stepstat.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Record loader settings.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Log at debug level unless --quiet is given.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "stepstat_report.md".to_string()
}

/// Participant file discovery and validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// File extensions to include.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// File or directory names to skip.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Maximum number of participant files to load.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// How deep to descend below the data directory (1 = direct children only).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Required number of days per condition.
    #[serde(default = "default_expected_days")]
    pub expected_days: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            excludes: default_excludes(),
            max_files: default_max_files(),
            max_depth: default_max_depth(),
            expected_days: default_expected_days(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["json".to_string()]
}

fn default_excludes() -> Vec<String> {
    vec!["package.json", "package-lock.json", "tsconfig.json", "node_modules", "target"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_files() -> usize {
    100
}

fn default_max_depth() -> usize {
    1
}

fn default_expected_days() -> usize {
    7
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Column labels for the daily step tables of paired records.
    #[serde(default = "default_day_labels")]
    pub day_labels: Vec<String>,

    /// Column labels for the daily step tables of single-series records.
    #[serde(default = "default_series_day_labels")]
    pub series_day_labels: Vec<String>,

    /// Include the per-participant daily step tables.
    #[serde(default = "default_true")]
    pub include_daily: bool,

    /// Include the pooled distribution section.
    #[serde(default = "default_true")]
    pub include_distribution: bool,

    /// Decimal places for averages and coefficients.
    #[serde(default = "default_precision")]
    pub precision: usize,

    /// How many participants to list under "Top Improvers".
    #[serde(default = "default_top_improvers")]
    pub top_improvers: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            day_labels: default_day_labels(),
            series_day_labels: default_series_day_labels(),
            include_daily: true,
            include_distribution: true,
            precision: default_precision(),
            top_improvers: default_top_improvers(),
        }
    }
}

fn default_day_labels() -> Vec<String> {
    vec!["Wed", "Thu", "Fri", "Sat", "Sun", "Mon", "Tue"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_series_day_labels() -> Vec<String> {
    vec!["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_precision() -> usize {
    2
}

fn default_top_improvers() -> usize {
    3
}

impl ReportConfig {
    /// Paired-record labels for `days` columns, falling back to "Day N" past
    /// the configured list.
    pub fn labels_for(&self, days: usize) -> Vec<String> {
        extend_labels(&self.day_labels, days)
    }

    /// Single-series labels for `days` columns.
    pub fn series_labels_for(&self, days: usize) -> Vec<String> {
        extend_labels(&self.series_day_labels, days)
    }
}

fn extend_labels(labels: &[String], days: usize) -> Vec<String> {
    (0..days)
        .map(|i| {
            labels
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Day {}", i + 1))
        })
        .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the current directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory (e.g. the data directory).
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.to_string_lossy().to_string();
        }

        if let Some(max_files) = args.max_files {
            self.loader.max_files = max_files;
        }
        if let Some(days) = args.days {
            self.loader.expected_days = days;
        }
        if let Some(ref extensions) = args.extensions {
            self.loader.extensions = extensions.clone();
        }
        if let Some(ref excludes) = args.exclude {
            self.loader.excludes = excludes.clone();
        }

        if let Some(ref labels) = args.day_labels {
            self.report.day_labels = labels.clone();
            self.report.series_day_labels = labels.clone();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "stepstat_report.md");
        assert_eq!(config.loader.expected_days, 7);
        assert_eq!(config.loader.extensions, vec!["json"]);
        assert_eq!(config.report.day_labels.len(), 7);
        assert_eq!(config.report.day_labels[0], "Wed");
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "study.md"
verbose = true

[loader]
max_files = 12
expected_days = 5

[report]
day_labels = ["Mon", "Tue", "Wed", "Thu", "Fri"]
precision = 0
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "study.md");
        assert!(config.general.verbose);
        assert_eq!(config.loader.max_files, 12);
        assert_eq!(config.loader.expected_days, 5);
        assert_eq!(config.loader.extensions, vec!["json"]);
        assert_eq!(config.report.precision, 0);
        assert!(config.report.include_daily);
    }

    #[test]
    fn test_labels_for_extends_past_configured() {
        let report = ReportConfig {
            day_labels: vec!["Mon".to_string(), "Tue".to_string()],
            ..ReportConfig::default()
        };

        assert_eq!(report.labels_for(3), vec!["Mon", "Tue", "Day 3"]);
        assert_eq!(report.labels_for(1), vec!["Mon"]);
    }

    #[test]
    fn test_series_labels_default_to_sunday_first() {
        let report = ReportConfig::default();
        assert_eq!(
            report.series_labels_for(7),
            vec!["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]
        );
        assert_eq!(report.series_labels_for(8)[7], "Day 8");
        assert_eq!(report.labels_for(1), vec!["Wed"]);
    }

    #[test]
    fn test_merge_with_args() {
        let mut args = crate::cli::Args::parse_from([
            "stepstat",
            "--day-labels",
            "D1,D2",
            "--days",
            "2",
        ]);
        let mut config = Config::default();
        config.general.verbose = true;
        config.merge_with_args(&args);

        assert_eq!(config.loader.expected_days, 2);
        assert_eq!(config.report.day_labels, vec!["D1", "D2"]);
        assert_eq!(config.report.series_day_labels, vec!["D1", "D2"]);
        // A verbose config file is not switched off by a plain command line
        assert!(config.general.verbose);

        args.verbose = true;
        let mut config = Config::default();
        config.merge_with_args(&args);
        assert!(config.general.verbose);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[loader]\nmax_depth = 3\n",
        )
        .unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.loader.max_depth, 3);
        assert_eq!(config.loader.max_files, 100);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[loader]"));
        assert!(toml_str.contains("[report]"));
    }
}
