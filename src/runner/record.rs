//! Iteration records and the final run result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::validation::ValidationResult;

use super::state::LoopState;

/// Why a run stopped. Exactly one per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    /// A candidate was accepted
    Success,
    /// Iteration budget used up without an acceptable candidate
    Exhausted,
    /// No iteration produced a candidate
    Failed,
    /// Stopped by an external signal
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Success => "SUCCESS",
            StopReason::Exhausted => "EXHAUSTED",
            StopReason::Failed => "FAILED",
            StopReason::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One pass of the loop. Appended to the run history and never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-indexed, strictly increasing within a run
    pub iteration_number: u32,
    /// Empty when generation failed
    pub candidate_text: String,
    /// `None` when generation failed
    pub validation_result: Option<ValidationResult>,
    /// Instructions handed to the next generation call
    pub feedback_generated: Vec<String>,
    /// Overall score of the validation result, 0.0 when generation failed
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    pub generation_attempts: u32,
    pub generation_error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub generation_metadata: BTreeMap<String, serde_json::Value>,
}

impl IterationRecord {
    /// Record for an iteration whose candidate was validated
    pub fn validated(
        iteration_number: u32,
        candidate_text: impl Into<String>,
        validation_result: ValidationResult,
        feedback_generated: Vec<String>,
        generation_attempts: u32,
        generation_metadata: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            iteration_number,
            candidate_text: candidate_text.into(),
            score: validation_result.overall_score,
            validation_result: Some(validation_result),
            feedback_generated,
            timestamp: Utc::now(),
            generation_attempts,
            generation_error: None,
            generation_metadata,
        }
    }

    /// Record for an iteration where generation exhausted its retries
    pub fn generation_failed(iteration_number: u32, generation_attempts: u32, error: impl Into<String>) -> Self {
        Self {
            iteration_number,
            candidate_text: String::new(),
            validation_result: None,
            feedback_generated: Vec::new(),
            score: 0.0,
            timestamp: Utc::now(),
            generation_attempts,
            generation_error: Some(error.into()),
            generation_metadata: BTreeMap::new(),
        }
    }

    pub fn has_candidate(&self) -> bool {
        self.validation_result.is_some()
    }

    pub fn is_acceptable(&self) -> bool {
        self.validation_result.as_ref().is_some_and(|r| r.is_acceptable)
    }
}

/// Highest-scoring record that produced a candidate; the earliest wins ties.
pub fn select_best(records: &[IterationRecord]) -> Option<&IterationRecord> {
    records
        .iter()
        .filter(|r| r.has_candidate())
        .fold(None, |best: Option<&IterationRecord>, r| match best {
            Some(b) if b.score >= r.score => Some(b),
            _ => Some(r),
        })
}

/// Summary of a whole run, produced once at termination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub final_text: String,
    pub iterations: Vec<IterationRecord>,
    pub best_iteration: Option<IterationRecord>,
    pub success: bool,
    pub stop_reason: StopReason,
    /// One entry per iteration record, in order
    pub score_history: Vec<f64>,
    pub final_state: LoopState,
    pub rule_set_fingerprint: Option<String>,
    pub duration_ms: u64,
}

impl AgentResult {
    pub fn iteration_count(&self) -> usize {
        self.iterations.len()
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_iteration.as_ref().map(|r| r.score)
    }

    /// Score gained from the first to the last validated candidate
    pub fn improvement(&self) -> Option<f64> {
        let mut validated = self.iterations.iter().filter(|r| r.has_candidate());
        let first = validated.next()?;
        let last = validated.last().unwrap_or(first);
        Some(last.score - first.score)
    }
}
