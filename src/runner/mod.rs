//! Iteration controller - runs the generate-validate-improve loop.
//!
//! This module provides:
//! - Orchestrator for executing one definition request
//! - LoopState machine and per-iteration records
//! - AgentResult with the stop reason and best iteration
//! - Cancellation and observer hooks

mod control;
mod orchestrator;
mod record;
mod state;

pub use control::{CancellationToken, IterationObserver, NoOpObserver};
pub use orchestrator::{DefinitionRequest, Orchestrator, OrchestratorConfig};
pub use record::{AgentResult, IterationRecord, StopReason, select_best};
pub use state::LoopState;
