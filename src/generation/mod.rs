//! Generation layer - the external text-generation collaborator.
//!
//! This module provides:
//! - GenerationClient trait for backend abstraction
//! - Request/result types and GenerationError
//! - AnthropicGenerator HTTP implementation
//! - MockGenerationClient for tests

pub mod anthropic;
pub mod client;

pub use anthropic::{AnthropicConfig, AnthropicGenerator};
pub use client::{GenerationClient, GenerationError, GenerationRequest, GenerationResult, MockGenerationClient};
