//! Stepstat - step-count analysis for game intervention studies
//!
//! A CLI tool that loads per-participant step counts recorded before and
//! while playing, relates the change to game progress, and writes a
//! Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing files, invalid records, bad config, etc.)
//!   2 - --strict was set and a correlation could not be computed

mod analysis;
mod cli;
mod config;
mod error;
mod loader;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use loader::{DirectoryLoader, FileListLoader, LoadConfig, RecordSource};
use models::{ImprovementSummary, Report, ReportMetadata};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first so [general] verbose can raise the log level
    let loaded = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(args.log_level(loaded.config.general.verbose));

    info!("Stepstat v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    loaded.log_lookup();

    let mut config = loaded.config;
    config.merge_with_args(&args);

    match run_analysis(args, config) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .stepstat.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize day labels, expected days, excludes, and more.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete analysis. Returns exit code (0 or 2).
fn run_analysis(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let source = record_source(&args, &config);

    // Handle --dry-run: list files and exit
    if args.dry_run {
        return handle_dry_run(source.as_ref());
    }

    // Step 1: Load participant records
    println!("📥 Loading participant records from {}", source.describe());
    let records = source.load()?;
    let days = records.first().map(|r| r.days()).unwrap_or(0);
    println!("   {} participants, {} days per condition", records.len(), days);

    // Step 2: Aggregate
    println!("\n🧮 Computing summaries...");
    let summaries = analysis::summarize(&records)?;
    let associations = analysis::associations(&summaries);
    let distributions = analysis::pooled_distributions(&records)?;
    let overview = ImprovementSummary::from_summaries(&summaries);

    let associations_failed = associations.iter().filter(|a| !a.successful).count();

    // Step 3: Build the report
    println!("\n📝 Generating report...");

    let metadata = ReportMetadata {
        source: source.describe(),
        analysis_date: Utc::now(),
        participants: records.len(),
        days_per_condition: days,
        associations_failed,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let report = Report {
        metadata,
        day_labels: config.report.labels_for(days),
        series_day_labels: config.report.series_labels_for(days),
        participants: records,
        summaries,
        overview,
        associations,
        distributions: Some(distributions),
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = args.output_path(&config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    println!("\n📊 Analysis Summary:");
    println!("   Participants: {}", report.participants.len());
    if report.overview.participants > 0 {
        println!(
            "   📈 Improved: {} | 📉 Declined: {} | ➖ Unchanged: {}",
            report.overview.improved, report.overview.declined, report.overview.unchanged
        );
        println!(
            "   Mean improvement: {:+.1} steps/day",
            report.overview.mean_improvement
        );
    } else {
        println!("   No baseline steps, improvement not computed");
    }
    for assoc in &report.associations {
        let r = assoc
            .correlation
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "   Correlation (R) for {} and {}: {}",
            assoc.attribute, assoc.outcome, r
        );
    }
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    if args.strict && associations_failed > 0 {
        eprintln!(
            "\n⛔ {} correlation(s) could not be computed. Failing (exit code 2).",
            associations_failed
        );
        return Ok(2);
    }

    Ok(0)
}

/// Pick the record source: explicit files win over the directory scan.
fn record_source(args: &Args, config: &Config) -> Box<dyn RecordSource> {
    let load_config = LoadConfig::from(&config.loader);

    if args.files.is_empty() {
        Box::new(DirectoryLoader::new(args.data_dir.clone(), load_config))
    } else {
        Box::new(FileListLoader::new(args.files.clone(), load_config.required_days()))
    }
}

/// Handle --dry-run: list the files that would be loaded, exit.
fn handle_dry_run(source: &dyn RecordSource) -> Result<i32> {
    println!("\n🔍 Dry run: discovering participant files in {}...\n", source.describe());

    let files = source.discover()?;

    if files.is_empty() {
        println!("   No participant files found.");
    } else {
        println!("   Found {} files that would be loaded:\n", files.len());
        for file in &files {
            let size = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);
            println!("     📄 {} ({} bytes)", file.display(), size);
        }
        println!("\n   Total: {} files", files.len());
    }

    println!("\n✅ Dry run complete. No records were analysed.");
    Ok(0)
}

/// Configuration plus what happened while looking for it. The lookup runs
/// before logging is set up, so it is logged afterwards.
struct LoadedConfig {
    config: Config,
    origin: Option<String>,
    warnings: Vec<String>,
}

impl LoadedConfig {
    fn log_lookup(&self) {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
        match self.origin {
            Some(ref origin) => info!("Loaded configuration from {}", origin),
            None => debug!("No config file found, using defaults"),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<LoadedConfig> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok(LoadedConfig {
            config: Config::load(config_path)?,
            origin: Some(config_path.display().to_string()),
            warnings: Vec::new(),
        });
    }

    // Then the working directory, then the data directory
    let lookups = [
        ("current directory", Config::load_default()),
        ("data directory", Config::load_from_dir(&args.data_dir)),
    ];

    let mut warnings = Vec::new();
    for (place, result) in lookups {
        match result {
            Ok(Some(config)) => {
                return Ok(LoadedConfig {
                    config,
                    origin: Some(format!("{} in the {}", CONFIG_FILE_NAME, place)),
                    warnings,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warnings.push(format!("Failed to load config from the {}: {:#}", place, e));
            }
        }
    }

    Ok(LoadedConfig {
        config: Config::default(),
        origin: None,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_config_verbose_sets_debug_level() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("study.toml");
        std::fs::write(&config_path, "[general]\nverbose = true\n").unwrap();
        let path = config_path.to_string_lossy().to_string();

        let args = Args::parse_from(["stepstat", "--config", path.as_str()]);
        let loaded = load_config(&args).unwrap();
        assert!(loaded.config.general.verbose);
        assert!(loaded.origin.is_some());
        assert_eq!(args.log_level(loaded.config.general.verbose), tracing::Level::DEBUG);

        let args = Args::parse_from(["stepstat", "-q", "--config", path.as_str()]);
        let loaded = load_config(&args).unwrap();
        assert_eq!(args.log_level(loaded.config.general.verbose), tracing::Level::ERROR);
    }

    #[test]
    fn test_broken_config_in_data_dir_is_reported_after_lookup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[general\nverbose = ").unwrap();
        let data_dir = dir.path().to_string_lossy().to_string();

        let args = Args::parse_from(["stepstat", data_dir.as_str()]);
        let loaded = load_config(&args).unwrap();

        assert!(loaded.origin.is_none());
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("data directory"));
        assert!(!loaded.config.general.verbose);
    }
}
