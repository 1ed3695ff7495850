//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Stepstat - step-count analysis for game intervention studies
///
/// Loads one JSON file per participant (daily steps before and while
/// playing, plus game level and balance), computes averages, improvement
/// and correlations, and writes a Markdown or JSON report.
///
/// Examples:
///   stepstat ./data
///   stepstat ./data --format json -o study.json
///   stepstat --file data/Participant1.json --file data/Participant2.json
///   stepstat ./data --dry-run
///   stepstat --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory containing participant JSON files
    ///
    /// Ignored for loading when --file is given, but still searched for
    /// a .stepstat.toml.
    #[arg(value_name = "DIR", default_value = ".", env = "STEPSTAT_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Load these participant files, in this order, instead of scanning DIR
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to the configured output (stepstat_report.md), with a
    /// .json extension when --format json is used.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .stepstat.toml in the current directory,
    /// then in DIR
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output (also `verbose = true` in [general])
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum number of participant files to load
    #[arg(long, value_name = "COUNT")]
    pub max_files: Option<usize>,

    /// Required number of days per condition
    #[arg(long, value_name = "DAYS")]
    pub days: Option<usize>,

    /// File extensions to include (comma-separated)
    ///
    /// Example: --extensions json,jsn
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Names to exclude from the directory scan (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Labels for the day columns (comma-separated)
    ///
    /// Example: --day-labels Sun,Mon,Tue,Wed,Thu,Fri,Sat
    #[arg(long, value_name = "LABELS", value_delimiter = ',')]
    pub day_labels: Option<Vec<String>>,

    /// Dry run: list the participant files that would be loaded and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 if any attribute correlation could not be computed
    #[arg(long)]
    pub strict: bool,

    /// Generate a default .stepstat.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.max_files == Some(0) {
            return Err("Max files must be at least 1".to_string());
        }

        if self.days == Some(0) {
            return Err("Days must be at least 1".to_string());
        }

        if let Some(ref labels) = self.day_labels {
            if labels.iter().any(|l| l.trim().is_empty()) {
                return Err("Day labels must not be empty".to_string());
            }
        }

        // Validate the data directory when it is the record source
        if self.files.is_empty() {
            if !self.data_dir.exists() {
                return Err(format!(
                    "Data directory does not exist: {}",
                    self.data_dir.display()
                ));
            }
            if !self.data_dir.is_dir() {
                return Err(format!(
                    "Data path is not a directory: {}",
                    self.data_dir.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the `[general] verbose` setting; --quiet wins over
    /// both it and --verbose.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Resolve the report path: explicit --output, else the configured
    /// default with its extension matched to --format.
    pub fn output_path(&self, configured: &str) -> PathBuf {
        match self.output {
            Some(ref path) => path.clone(),
            None => PathBuf::from(configured).with_extension(self.format.extension()),
        }
    }
}
