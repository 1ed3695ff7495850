//! Data models for the step-count analysis.
//!
//! This module contains the core data structures used throughout
//! the application for representing participants, summaries and reports.

use crate::error::{AnalysisError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One participant's step counts and game attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    /// Identifier, unique within a batch.
    pub id: String,
    /// Steps per day before the intervention. Absent for single-series
    /// records, which only carry the last days of play.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Vec<u32>>,
    /// Steps per day during the intervention.
    pub treatment: Vec<u32>,
    /// Game level reached.
    pub level: f64,
    /// In-game currency balance.
    pub balance: f64,
    /// Experience points, carried through but not analysed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<f64>,
    /// Steps on the day the record was exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps_today: Option<u64>,
    /// When the record was exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ParticipantRecord {
    /// Creates a paired record with only the required fields set.
    pub fn new(
        id: impl Into<String>,
        baseline: Vec<u32>,
        treatment: Vec<u32>,
        level: f64,
        balance: f64,
    ) -> Self {
        Self {
            baseline: Some(baseline),
            ..Self::single_series(id, treatment, level, balance)
        }
    }

    /// Creates a record holding one series of daily steps taken while
    /// playing, with no baseline.
    pub fn single_series(id: impl Into<String>, steps: Vec<u32>, level: f64, balance: f64) -> Self {
        Self {
            id: id.into(),
            baseline: None,
            treatment: steps,
            level,
            balance,
            experience: None,
            total_steps_today: None,
            timestamp: None,
        }
    }

    /// Whether the record has a baseline to compare against.
    pub fn is_paired(&self) -> bool {
        self.baseline.is_some()
    }

    /// Number of days per condition.
    pub fn days(&self) -> usize {
        self.treatment.len()
    }

    /// Check the record invariants.
    ///
    /// The treatment series must be non-empty. A paired record's baseline
    /// must be non-empty and as long as the treatment. When `expected_days`
    /// is set, the series length must match it too.
    pub fn validate(&self, expected_days: Option<usize>) -> Result<()> {
        if self.treatment.is_empty() {
            return Err(AnalysisError::invalid(
                &self.id,
                "treatment must contain at least one day",
            ));
        }

        if let Some(ref baseline) = self.baseline {
            if baseline.is_empty() {
                return Err(AnalysisError::invalid(
                    &self.id,
                    "baseline must contain at least one day",
                ));
            }

            if baseline.len() != self.treatment.len() {
                return Err(AnalysisError::invalid(
                    &self.id,
                    format!(
                        "baseline has {} days, treatment has {}",
                        baseline.len(),
                        self.treatment.len()
                    ),
                ));
            }
        }

        if let Some(days) = expected_days {
            if self.treatment.len() != days {
                return Err(AnalysisError::invalid(
                    &self.id,
                    format!("expected {} days per condition, found {}", days, self.treatment.len()),
                ));
            }
        }

        if !self.level.is_finite() || !self.balance.is_finite() {
            return Err(AnalysisError::invalid(&self.id, "level and balance must be finite"));
        }

        Ok(())
    }
}

/// Per-participant aggregate produced by `summarize`.
///
/// The baseline fields and the improvement are `None` for single-series
/// records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Participant identifier.
    pub id: String,
    /// Mean daily steps before the intervention.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_baseline: Option<f64>,
    /// Mean daily steps during the intervention.
    pub avg_treatment: f64,
    /// `avg_treatment - avg_baseline`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement: Option<f64>,
    /// Best single day before the intervention.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_baseline: Option<u32>,
    /// Best single day during the intervention.
    pub best_treatment: u32,
    /// Game level reached.
    pub level: f64,
    /// In-game currency balance.
    pub balance: f64,
    /// Steps on the day the record was exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps_today: Option<u64>,
}

/// Scalar attribute that can be related to the improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    /// Game level.
    Level,
    /// Currency balance.
    Balance,
}

impl Attribute {
    /// All attributes, in report order.
    pub const ALL: [Attribute; 2] = [Attribute::Level, Attribute::Balance];

    /// Read this attribute from a summary.
    pub fn value_of(&self, summary: &Summary) -> f64 {
        match self {
            Attribute::Level => summary.level,
            Attribute::Balance => summary.balance,
        }
    }

    /// Axis label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Attribute::Level => "Game Level",
            Attribute::Balance => "Balance",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Level => write!(f, "level"),
            Attribute::Balance => write!(f, "balance"),
        }
    }
}

/// Per-participant quantity an attribute is related to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Change in mean daily steps; paired records only.
    Improvement,
    /// Mean daily steps while playing.
    AverageSteps,
}

impl Outcome {
    /// Read this outcome from a summary, if the summary has it.
    pub fn value_of(&self, summary: &Summary) -> Option<f64> {
        match self {
            Outcome::Improvement => summary.improvement,
            Outcome::AverageSteps => Some(summary.avg_treatment),
        }
    }

    /// Axis label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Improvement => "Improvement in Steps",
            Outcome::AverageSteps => "Average Daily Steps",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Improvement => write!(f, "improvement"),
            Outcome::AverageSteps => write!(f, "average steps"),
        }
    }
}

/// Least-squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    /// Evaluate the line at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// How one attribute relates to an outcome across participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAssociation {
    /// The attribute on the x axis.
    pub attribute: Attribute,
    /// The outcome on the y axis.
    pub outcome: Outcome,
    /// Pearson's R between the attribute and the outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<f64>,
    /// Best-fit line of the outcome against the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<LinearFit>,
    /// Whether the statistics could be computed.
    pub successful: bool,
    /// Error message if they could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttributeAssociation {
    /// Creates a failed association.
    pub fn failed(attribute: Attribute, outcome: Outcome, error: String) -> Self {
        Self {
            attribute,
            outcome,
            correlation: None,
            fit: None,
            successful: false,
            error: Some(error),
        }
    }
}

/// Box-plot summary of a set of daily step counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub count: usize,
    pub min: f64,
    pub lower_quartile: f64,
    pub median: f64,
    pub upper_quartile: f64,
    pub max: f64,
    pub mean: f64,
}

/// Pooled daily-step distributions for both conditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionDistributions {
    /// `None` when no record has a baseline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Distribution>,
    pub treatment: Distribution,
}

/// Headline counts over the participants with a baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImprovementSummary {
    /// Number of participants with a baseline.
    pub participants: usize,
    /// Participants who walked more during the intervention.
    pub improved: usize,
    /// Participants who walked less.
    pub declined: usize,
    /// Participants with no change.
    pub unchanged: usize,
    /// Mean improvement across participants.
    pub mean_improvement: f64,
}

impl ImprovementSummary {
    /// Creates a summary from per-participant summaries.
    ///
    /// Single-series summaries have no improvement and are not counted.
    pub fn from_summaries(summaries: &[Summary]) -> Self {
        let improvements: Vec<f64> = summaries.iter().filter_map(|s| s.improvement).collect();
        let mut summary = Self {
            participants: improvements.len(),
            ..Self::default()
        };

        for &improvement in &improvements {
            if improvement > 0.0 {
                summary.improved += 1;
            } else if improvement < 0.0 {
                summary.declined += 1;
            } else {
                summary.unchanged += 1;
            }
        }

        if !improvements.is_empty() {
            summary.mean_improvement =
                improvements.iter().sum::<f64>() / improvements.len() as f64;
        }

        summary
    }
}

/// Metadata about the analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Where the records were loaded from.
    pub source: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Number of participants analysed.
    pub participants: usize,
    /// Days per condition.
    pub days_per_condition: usize,
    /// Number of attribute associations that could not be computed.
    pub associations_failed: usize,
    /// Duration of the analysis in seconds.
    pub duration_seconds: f64,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Metadata about the report.
    pub metadata: ReportMetadata,
    /// Labels for each day column of paired records.
    pub day_labels: Vec<String>,
    /// Labels for each day column of single-series records.
    pub series_day_labels: Vec<String>,
    /// Loaded records, in load order.
    pub participants: Vec<ParticipantRecord>,
    /// Per-participant aggregates, in load order.
    pub summaries: Vec<Summary>,
    /// Headline counts.
    pub overview: ImprovementSummary,
    /// Attribute vs. outcome statistics.
    pub associations: Vec<AttributeAssociation>,
    /// Pooled daily-step distributions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributions: Option<ConditionDistributions>,
}
