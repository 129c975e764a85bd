//! Anthropic Messages API generator
//!
//! Implements GenerationClient over HTTP. The prompt carries the term, its
//! context and category, and the accumulated feedback.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::generation::client::{GenerationClient, GenerationError, GenerationRequest, GenerationResult};

/// Anthropic API base URL
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const DEFAULT_MAX_TOKENS: u32 = 1024;

const SYSTEM_PROMPT: &str = "You write definitions of terms for legal and governmental use. \
Answer with the definition only: a single sentence, no heading, no quotes, no explanation. \
Start with the genus noun, do not start with a verb or an article, do not repeat the term itself, \
and do not end with a period.";

/// Configuration for the Anthropic generator
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub api_url: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(120),
            api_url: ANTHROPIC_API_URL.to_string(),
        }
    }
}

impl AnthropicConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

pub struct AnthropicGenerator {
    client: Client,
    api_key: String,
    config: AnthropicConfig,
}

impl AnthropicGenerator {
    /// Create a generator, reading the API key from ANTHROPIC_API_KEY
    pub fn new(config: AnthropicConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| GenerationError::MissingApiKey {
            env_var: API_KEY_ENV.to_string(),
        })?;
        Self::with_api_key(api_key, config)
    }

    pub fn with_api_key(api_key: impl Into<String>, config: AnthropicConfig) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    /// User prompt for one attempt
    fn build_prompt(request: &GenerationRequest) -> String {
        let mut prompt = format!(
            "Term: {}\nTerm category: {}\n",
            request.term, request.category
        );
        if !request.context.trim().is_empty() {
            prompt.push_str(&format!("Context: {}\n", request.context.trim()));
        }
        if !request.feedback.is_empty() {
            prompt.push_str("\nPrevious attempts were rejected. Apply these instructions:\n");
            for item in &request.feedback {
                prompt.push_str(&format!("- {}\n", item));
            }
        }
        prompt.push_str("\nDefinition:");
        prompt
    }

    fn build_body(&self, request: &GenerationRequest) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": Self::build_prompt(request) }
            ]
        })
    }

    fn parse_response(body: &Value) -> Result<GenerationResult, GenerationError> {
        let text = body["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::InvalidResponse("response contained no text".to_string()));
        }

        let mut result = GenerationResult::new(text);
        if let Some(model) = body["model"].as_str() {
            result = result.with_metadata("model", model);
        }
        if let Some(stop) = body["stop_reason"].as_str() {
            result = result.with_metadata("stop_reason", stop);
        }
        if let Some(usage) = body.get("usage") {
            result = result.with_metadata("usage", usage.clone());
        }
        Ok(result)
    }

    async fn send_request(&self, body: Value) -> Result<Value, GenerationError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.config.timeout)
                } else {
                    GenerationError::Network(e)
                }
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(GenerationError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl GenerationClient for AnthropicGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerationError> {
        let body = self.build_body(request);
        let response = self.send_request(body).await?;
        Self::parse_response(&response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for AnthropicGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicGenerator")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}
