//! Loop state machine.
//!
//! INIT → GENERATING → VALIDATING → {ACCEPTED → COMPLETED | IMPROVING → GENERATING}
//! and from there to one of the terminal states.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Init,
    Generating,
    Validating,
    Accepted,
    Improving,
    Completed,
    Exhausted,
    Failed,
    Cancelled,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopState::Completed | LoopState::Exhausted | LoopState::Failed | LoopState::Cancelled
        )
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;
        match (self, next) {
            (Init, Generating | Cancelled) => true,
            // A failed generation moves straight on to the next attempt or ends the run
            (Generating, Validating | Generating | Failed | Exhausted | Cancelled) => true,
            (Validating, Accepted | Improving | Exhausted) => true,
            (Accepted, Completed) => true,
            (Improving, Generating | Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Init => "init",
            LoopState::Generating => "generating",
            LoopState::Validating => "validating",
            LoopState::Accepted => "accepted",
            LoopState::Improving => "improving",
            LoopState::Completed => "completed",
            LoopState::Exhausted => "exhausted",
            LoopState::Failed => "failed",
            LoopState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
