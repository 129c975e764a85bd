//! Definitor - rule-checked definition generation
//!
//! Definitor drives a generate-validate-improve loop: a generator proposes a
//! definition, a rule engine scores it, and targeted feedback steers the next
//! attempt until a candidate is accepted or the iteration budget runs out.

pub mod error;
pub mod feedback;
pub mod generation;
pub mod rules;
pub mod runner;
pub mod validation;

pub use error::{DefinitorError, Result};
