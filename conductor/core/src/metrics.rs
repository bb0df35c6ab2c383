//! Dialogue Metrics
//!
//! Running statistics over completed turns:
//! - Estimated token usage and the derived cost
//! - Per-turn response times and their mean
//! - Per-turn word counts
//! - Error tallies by category
//!
//! The token and cost figures are heuristics (words × 1.3, flat price per
//! thousand tokens), kept for reproducibility rather than billing accuracy.
//! All accumulators only grow; [`Metrics::reset`] is the single way back to
//! zero.

use serde::{Deserialize, Serialize};

use crate::turn::{Turn, TurnStatus};

/// Estimated tokens per word
pub const TOKENS_PER_WORD: f64 = 1.3;

/// Estimated price per thousand tokens
pub const COST_PER_1K_TOKENS: f64 = 0.0002;

/// Cost estimate for a token total
#[must_use]
pub fn estimate_cost(tokens: f64) -> f64 {
    (tokens / 1000.0) * COST_PER_1K_TOKENS
}

/// Error bucket a failure is counted under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// A stream record could not be parsed
    Api,
    /// The request exceeded its deadline
    Timeout,
    /// Any other network or request failure
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api => write!(f, "api"),
            Self::Timeout => write!(f, "timeout"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Error tallies
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCounts {
    /// Malformed stream records
    pub api: u64,
    /// Timed-out requests
    pub timeout: u64,
    /// Other failures
    pub other: u64,
}

impl ErrorCounts {
    /// Sum over all categories
    #[must_use]
    pub fn total(&self) -> u64 {
        self.api + self.timeout + self.other
    }
}

/// Process-wide accumulator
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// Estimated tokens over all recorded turns
    pub total_tokens: f64,
    /// Mean of `response_times`
    pub average_response_time: f64,
    /// Seconds per recorded turn, in order
    pub response_times: Vec<f64>,
    /// Words per recorded turn, in order
    pub word_counts: Vec<usize>,
    /// Error tallies
    pub error_counts: ErrorCounts,
    /// Cost derived from `total_tokens`
    pub cost_estimate: f64,
}

impl Metrics {
    /// Create zeroed metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a completed turn into the running statistics
    ///
    /// Turns in any other status are ignored.
    pub fn record(&mut self, turn: &Turn) {
        if turn.status != TurnStatus::Completed {
            tracing::debug!(status = ?turn.status, "Skipping metrics for non-completed turn");
            return;
        }

        self.word_counts.push(turn.word_count);
        self.response_times.push(turn.elapsed_seconds);
        self.average_response_time =
            self.response_times.iter().sum::<f64>() / self.response_times.len() as f64;

        self.total_tokens += turn.estimated_tokens();
        self.cost_estimate = estimate_cost(self.total_tokens);
    }

    /// Count one error
    pub fn record_error(&mut self, category: ErrorCategory) {
        match category {
            ErrorCategory::Api => self.error_counts.api += 1,
            ErrorCategory::Timeout => self.error_counts.timeout += 1,
            ErrorCategory::Other => self.error_counts.other += 1,
        }
    }

    /// Total errors over all categories
    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.error_counts.total()
    }

    /// Number of recorded turns
    #[must_use]
    pub fn turns_recorded(&self) -> usize {
        self.response_times.len()
    }

    /// Zero every accumulator
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Copy for the display surface
    #[must_use]
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}
