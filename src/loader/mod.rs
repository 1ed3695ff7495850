//! Participant record loading.
//!
//! This module discovers participant JSON files and turns them into
//! validated [`ParticipantRecord`]s. Where the files come from is behind the
//! [`RecordSource`] trait: a directory scan or an explicit file list.

use crate::error::AnalysisError;
use crate::models::ParticipantRecord;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A source of participant records.
pub trait RecordSource {
    /// Human-readable description of where records come from.
    fn describe(&self) -> String;

    /// Participant files in load order.
    fn discover(&self) -> Result<Vec<PathBuf>>;

    /// Required days per condition, if enforced.
    fn expected_days(&self) -> Option<usize>;

    /// Load and validate every discovered record.
    ///
    /// Fails on the first unreadable or invalid file, and when two records
    /// share an id.
    fn load(&self) -> Result<Vec<ParticipantRecord>> {
        let paths = self.discover()?;
        if paths.is_empty() {
            bail!("No participant files found in {}", self.describe());
        }

        let mut records = Vec::with_capacity(paths.len());
        for path in &paths {
            let record = parse_record(path, self.expected_days())?;
            debug!("Loaded {} from {}", record.id, path.display());
            records.push(record);
        }

        ensure_unique_ids(&records)?;

        info!(
            "Loaded {} participant records from {}",
            records.len(),
            self.describe()
        );
        Ok(records)
    }
}

/// Configuration for directory scanning.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// File extensions to include (e.g., ["json"])
    pub extensions: Vec<String>,
    /// Names to exclude (files or directories)
    pub excludes: Vec<String>,
    /// Maximum number of files to load
    pub max_files: usize,
    /// Maximum directory depth below the root
    pub max_depth: usize,
    /// Required days per condition (0 disables the check)
    pub expected_days: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self::from(&crate::config::LoaderConfig::default())
    }
}

impl From<&crate::config::LoaderConfig> for LoadConfig {
    fn from(config: &crate::config::LoaderConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
            max_files: config.max_files,
            max_depth: config.max_depth.max(1),
            expected_days: config.expected_days,
        }
    }
}

impl LoadConfig {
    /// Required days per condition, or `None` when the check is disabled.
    pub fn required_days(&self) -> Option<usize> {
        (self.expected_days > 0).then_some(self.expected_days)
    }
}

/// Loads every matching file below a data directory.
pub struct DirectoryLoader {
    config: LoadConfig,
    root: PathBuf,
}

impl DirectoryLoader {
    /// Create a new directory loader.
    pub fn new(root: PathBuf, config: LoadConfig) -> Self {
        Self { config, root }
    }

    /// Check if a file matches the extension filter.
    fn matches(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.config
            .extensions
            .iter()
            .any(|wanted| wanted.eq_ignore_ascii_case(ext))
    }

    /// Check if a name matches exclusion patterns.
    fn is_excluded(&self, name: &str) -> bool {
        // Hidden files
        if name.starts_with('.') {
            return true;
        }

        self.config.excludes.iter().any(|pattern| name == pattern)
    }
}

impl RecordSource for DirectoryLoader {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            bail!("Data directory not found: {}", self.root.display());
        }

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(self.config.max_depth)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !self.is_excluded(&e.file_name().to_string_lossy())
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort_by(|a, b| natural_path_cmp(a, b));

        if files.len() > self.config.max_files {
            warn!(
                "Found {} participant files, loading only the first {}",
                files.len(),
                self.config.max_files
            );
            files.truncate(self.config.max_files);
        }

        Ok(files)
    }

    fn expected_days(&self) -> Option<usize> {
        self.config.required_days()
    }
}

/// Loads an explicit, ordered list of files.
pub struct FileListLoader {
    files: Vec<PathBuf>,
    expected_days: Option<usize>,
}

impl FileListLoader {
    /// Create a loader over `files`, in the given order.
    pub fn new(files: Vec<PathBuf>, expected_days: Option<usize>) -> Self {
        Self {
            files,
            expected_days,
        }
    }
}

impl RecordSource for FileListLoader {
    fn describe(&self) -> String {
        format!("{} listed file(s)", self.files.len())
    }

    fn discover(&self) -> Result<Vec<PathBuf>> {
        for file in &self.files {
            if !file.is_file() {
                bail!("Participant file not found: {}", file.display());
            }
        }
        Ok(self.files.clone())
    }

    fn expected_days(&self) -> Option<usize> {
        self.expected_days
    }
}

/// On-disk shape of a participant file.
///
/// A paired file carries the days before and while playing. A single-series
/// file carries only `stepsLastSevenDays`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(default, rename = "stepsSevendaysBeforeplaying", alias = "baseline")]
    baseline: Option<Vec<u32>>,
    #[serde(default, rename = "stepsLastSevenDaysWhilePlaying", alias = "treatment")]
    treatment: Option<Vec<u32>>,
    #[serde(default, alias = "steps")]
    steps_last_seven_days: Option<Vec<u32>>,
    level: f64,
    balance: f64,
    #[serde(default)]
    experience: Option<f64>,
    #[serde(default)]
    total_steps_today: Option<u64>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Read one participant file. The record id is the file stem.
pub fn parse_record(path: &Path, expected_days: Option<usize>) -> Result<ParticipantRecord> {
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .with_context(|| format!("Participant file has no name: {}", path.display()))?;

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read participant file: {}", path.display()))?;

    record_from_json(&id, &content, expected_days)
        .with_context(|| format!("Invalid participant file: {}", path.display()))
}

/// Build a validated record from JSON text.
pub fn record_from_json(
    id: &str,
    content: &str,
    expected_days: Option<usize>,
) -> Result<ParticipantRecord> {
    let raw: RawRecord = serde_json::from_str(content)
        .with_context(|| format!("Failed to parse participant JSON for {}", id))?;

    let timestamp = raw
        .timestamp
        .as_deref()
        .and_then(|ts| match parse_timestamp(ts) {
            Some(t) => Some(t),
            None => {
                warn!("{}: ignoring unparseable timestamp '{}'", id, ts);
                None
            }
        });

    let base = match (raw.baseline, raw.treatment, raw.steps_last_seven_days) {
        (Some(baseline), Some(treatment), series) => {
            if series.is_some() {
                debug!("{}: paired steps present, ignoring stepsLastSevenDays", id);
            }
            ParticipantRecord::new(id, baseline, treatment, raw.level, raw.balance)
        }
        (None, Some(steps), None) | (None, None, Some(steps)) => {
            ParticipantRecord::single_series(id, steps, raw.level, raw.balance)
        }
        (Some(_), None, _) => bail!(
            "{} has steps before playing but none while playing \
             (stepsLastSevenDaysWhilePlaying)",
            id
        ),
        (None, Some(_), Some(_)) => bail!(
            "{} has both stepsLastSevenDaysWhilePlaying and stepsLastSevenDays \
             without a baseline",
            id
        ),
        (None, None, None) => bail!(
            "{} has no daily steps (expected stepsSevendaysBeforeplaying and \
             stepsLastSevenDaysWhilePlaying, or stepsLastSevenDays)",
            id
        ),
    };

    let record = ParticipantRecord {
        experience: raw.experience,
        total_steps_today: raw.total_steps_today,
        timestamp,
        ..base
    };

    record.validate(expected_days)?;
    Ok(record)
}

/// Parse an ISO-8601 instant; values without an offset are taken as UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn ensure_unique_ids(records: &[ParticipantRecord]) -> Result<()> {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.id.as_str()) {
            return Err(AnalysisError::invalid(
                &record.id,
                "two participant files share this name",
            )
            .into());
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NameChunk {
    Number(u64),
    Text(String),
}

/// Split a name into digit and non-digit runs so "p2" sorts before "p10".
fn natural_key(name: &str) -> Vec<NameChunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;

    let flush = |current: &mut String, in_digits: bool, chunks: &mut Vec<NameChunk>| {
        if current.is_empty() {
            return;
        }
        let chunk = if in_digits {
            current
                .parse()
                .map(NameChunk::Number)
                .unwrap_or_else(|_| NameChunk::Text(current.clone()))
        } else {
            NameChunk::Text(current.to_lowercase())
        };
        chunks.push(chunk);
        current.clear();
    };

    for c in name.chars() {
        let is_digit = c.is_ascii_digit();
        if is_digit != in_digits {
            flush(&mut current, in_digits, &mut chunks);
            in_digits = is_digit;
        }
        current.push(c);
    }
    flush(&mut current, in_digits, &mut chunks);

    chunks
}

fn natural_path_cmp(a: &Path, b: &Path) -> Ordering {
    let name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    };

    natural_key(&name(a))
        .cmp(&natural_key(&name(b)))
        .then_with(|| a.cmp(b))
}
