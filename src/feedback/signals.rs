//! Progress signals derived from the score history.
//!
//! These are not errors. They tell the feedback builder how the run is
//! trending so it can steer the next attempt.

use serde::{Deserialize, Serialize};

use crate::runner::IterationRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum ProgressSignal {
    /// The last `streak` score changes were all below the improvement threshold
    Stagnation { streak: usize, delta: f64 },
    /// Current score is not above the previous one
    Regression { previous: f64, current: f64 },
    /// Current score is above the previous one
    Improvement { previous: f64, current: f64 },
}

impl ProgressSignal {
    pub fn is_stagnation(&self) -> bool {
        matches!(self, ProgressSignal::Stagnation { .. })
    }

    pub fn is_regression(&self) -> bool {
        matches!(self, ProgressSignal::Regression { .. })
    }
}

/// Compare `current` against the validated scores in `history`.
///
/// Iterations whose generation failed carry no score and are ignored.
pub fn detect_signals(current: f64, history: &[IterationRecord], improvement_threshold: f64) -> Vec<ProgressSignal> {
    let mut scores: Vec<f64> = history.iter().filter(|r| r.has_candidate()).map(|r| r.score).collect();
    scores.push(current);

    let Some(&previous) = scores.len().checked_sub(2).and_then(|i| scores.get(i)) else {
        return Vec::new();
    };

    let mut signals = Vec::new();

    let streak = scores
        .windows(2)
        .rev()
        .take_while(|w| (w[1] - w[0]).abs() < improvement_threshold)
        .count();
    if streak > 0 {
        signals.push(ProgressSignal::Stagnation {
            streak,
            delta: (current - previous).abs(),
        });
    }

    if current <= previous {
        signals.push(ProgressSignal::Regression { previous, current });
    } else {
        signals.push(ProgressSignal::Improvement { previous, current });
    }

    signals
}
