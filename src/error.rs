//! Error types for participant aggregation and statistics.

use thiserror::Error;

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised by the aggregator and the statistics helpers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// A participant record violates the record invariants.
    #[error("Invalid record '{id}': {reason}")]
    InvalidRecord {
        /// Identifier of the offending record.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Not enough paired values to compute the statistic.
    #[error("Insufficient data: need two equal-length sequences of at least 2 values (got {xs} and {ys})")]
    InsufficientData {
        /// Length of the first sequence.
        xs: usize,
        /// Length of the second sequence.
        ys: usize,
    },

    /// The statistic is undefined for this input (zero variance).
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
}

impl AnalysisError {
    /// Build an `InvalidRecord` error.
    pub fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
