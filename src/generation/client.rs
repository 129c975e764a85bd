//! Generation client trait and request/response types.
//!
//! Text generation is an external collaborator. The orchestrator only sees
//! this trait, so any backend (HTTP model, local model, scripted mock) can
//! be injected.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::rules::TermCategory;

/// Everything the generator needs for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub term: String,
    pub context: String,
    pub category: TermCategory,
    /// Accumulated improvement instructions from earlier iterations
    pub feedback: Vec<String>,
}

impl GenerationRequest {
    pub fn new(term: impl Into<String>, context: impl Into<String>, category: TermCategory) -> Self {
        Self {
            term: term.into(),
            context: context.into(),
            category,
            feedback: Vec::new(),
        }
    }

    pub fn with_feedback(mut self, feedback: Vec<String>) -> Self {
        self.feedback = feedback;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl GenerationResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Errors that can occur while generating a candidate
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("Generator unavailable: {0}")]
    Unavailable(String),
}

impl GenerationError {
    /// Transient failures worth one more attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Timeout(_) => true,
            GenerationError::RateLimited { .. } => true,
            GenerationError::Api { status, .. } => *status >= 500,
            GenerationError::Network(_) => true,
            GenerationError::InvalidResponse(_) => false,
            GenerationError::MissingApiKey { .. } => false,
            GenerationError::Unavailable(_) => true,
        }
    }
}

/// Stateless generation client - each call is independent
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerationError>;

    /// Name of the backing model, for logs and metadata
    fn model(&self) -> &str {
        "unknown"
    }
}

/// Scripted client for tests: returns queued results in order
pub struct MockGenerationClient {
    responses: Mutex<VecDeque<Result<GenerationResult, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    always_fail: bool,
    delay: Option<Duration>,
}

impl MockGenerationClient {
    /// Queue one outcome per call. Once the queue is empty every call fails.
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| r.map(GenerationResult::new)).collect()),
            requests: Mutex::new(Vec::new()),
            always_fail: false,
            delay: None,
        }
    }

    /// Shorthand for a script of successful candidates
    pub fn with_texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::new(texts.into_iter().map(|t| Ok(t.into())).collect())
    }

    /// A client whose every call fails with a retryable error
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// Sleep before answering, to exercise timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in call order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl GenerationClient for MockGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerationError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.always_fail {
            return Err(GenerationError::Unavailable("mock generator is down".to_string()));
        }

        let next = self.responses.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        next.unwrap_or_else(|| Err(GenerationError::Unavailable("no scripted responses left".to_string())))
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
