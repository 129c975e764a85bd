//! Rule-based validation of candidate definitions.

pub mod engine;
pub mod types;

pub use engine::{CandidateValidator, ScoringConfig, ValidationEngine};
pub use types::{Severity, TextSpan, ValidationResult, ValidationViolation, ViolationKind};
