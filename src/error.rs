//! Error types for Definitor
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::generation::GenerationError;

/// All error types that can occur in Definitor
#[derive(Debug, Error)]
pub enum DefinitorError {
    /// Malformed, duplicate, or unparseable rule definitions. Fatal at load time.
    #[error("Validation config error in {source_name}: {message}")]
    ValidationConfig { source_name: String, message: String },

    /// A single rule could not be evaluated. Never aborts a validation.
    #[error("Rule evaluation error for {rule_id}: {message}")]
    RuleEvaluation { rule_id: String, message: String },

    /// Orchestrator, scoring or feedback settings out of range
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Generation collaborator failed
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DefinitorError {
    /// Shorthand for a load-time rule configuration error
    pub fn config(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationConfig {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error must stop a run from starting
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RuleEvaluation { .. } | Self::Generation(_))
    }
}

/// Result type alias for Definitor operations
pub type Result<T> = std::result::Result<T, DefinitorError>;
