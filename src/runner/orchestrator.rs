//! Orchestrator - drives the generate-validate-improve loop.
//!
//! Each iteration:
//! 1. Asks the generator for a candidate, seeded with accumulated feedback
//! 2. Validates the candidate
//! 3. On acceptance: stops with SUCCESS
//! 4. On the last iteration: stops with EXHAUSTED (or FAILED if nothing was generated)
//! 5. Otherwise: builds feedback for the next attempt and continues
//!
//! Iterations run strictly in sequence. Independent runs share nothing but
//! the read-only validator, so many can run concurrently.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{DefinitorError, Result};
use crate::feedback::FeedbackBuilder;
use crate::generation::{GenerationClient, GenerationError, GenerationRequest, GenerationResult};
use crate::rules::TermCategory;
use crate::validation::{CandidateValidator, ValidationEngine};

use super::control::{CancellationToken, IterationObserver, NoOpObserver};
use super::record::{AgentResult, IterationRecord, StopReason, select_best};
use super::state::LoopState;

/// Settings for one run. Every value is overridable.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub max_iterations: u32,
    pub acceptance_threshold: f64,
    pub improvement_threshold: f64,
    /// Bound on each generation attempt
    pub generation_timeout: Duration,
    /// Extra attempts after a retryable generation failure
    pub generation_retries: u32,
    /// Base delay before a retry, multiplied by the attempt number
    pub retry_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            acceptance_threshold: 0.8,
            improvement_threshold: 0.05,
            generation_timeout: Duration::from_secs(120),
            generation_retries: 1,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(DefinitorError::InvalidConfig("max_iterations must be at least 1".to_string()));
        }
        for (name, value) in [
            ("acceptance_threshold", self.acceptance_threshold),
            ("improvement_threshold", self.improvement_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DefinitorError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.generation_timeout.is_zero() {
            return Err(DefinitorError::InvalidConfig("generation_timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// What to define
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionRequest {
    pub term: String,
    #[serde(default)]
    pub context: String,
    pub category: TermCategory,
}

impl DefinitionRequest {
    pub fn new(term: impl Into<String>, context: impl Into<String>, category: TermCategory) -> Self {
        Self {
            term: term.into(),
            context: context.into(),
            category,
        }
    }
}

/// Runs the loop against an injected generator and validator
pub struct Orchestrator<G, V = ValidationEngine>
where
    G: GenerationClient,
    V: CandidateValidator,
{
    generator: Arc<G>,
    validator: Arc<V>,
    feedback: FeedbackBuilder,
    observer: Arc<dyn IterationObserver>,
}

impl<G, V> Orchestrator<G, V>
where
    G: GenerationClient,
    V: CandidateValidator,
{
    pub fn new(generator: Arc<G>, validator: Arc<V>) -> Self {
        Self {
            generator,
            validator,
            feedback: FeedbackBuilder::new(),
            observer: Arc::new(NoOpObserver),
        }
    }

    pub fn with_feedback(mut self, feedback: FeedbackBuilder) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn IterationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run to completion. `Err` only for an invalid config.
    pub async fn run(&self, request: &DefinitionRequest, config: &OrchestratorConfig) -> Result<AgentResult> {
        self.run_with_cancellation(request, config, &CancellationToken::new())
            .await
    }

    /// Run until acceptance, exhaustion, or cancellation.
    ///
    /// Cancellation is checked at the top of each iteration; a generation
    /// call already in flight is allowed to finish.
    pub async fn run_with_cancellation(
        &self,
        request: &DefinitionRequest,
        config: &OrchestratorConfig,
        cancel: &CancellationToken,
    ) -> Result<AgentResult> {
        config.validate()?;

        let started = Instant::now();
        let feedback = self
            .feedback
            .clone()
            .with_improvement_threshold(config.improvement_threshold);

        let mut state = LoopState::Init;
        let mut records: Vec<IterationRecord> = Vec::new();
        let mut accumulated: Vec<String> = Vec::new();
        let mut stop: Option<StopReason> = None;
        let mut final_text = String::new();

        log::info!(
            "Starting run for '{}' ({}), max {} iteration(s)",
            request.term,
            request.category,
            config.max_iterations
        );

        for iteration in 1..=config.max_iterations {
            if cancel.is_cancelled() {
                log::info!("Run for '{}' cancelled before iteration {}", request.term, iteration);
                transition(&mut state, LoopState::Cancelled);
                stop = Some(StopReason::Cancelled);
                break;
            }

            transition(&mut state, LoopState::Generating);
            let generation_request = GenerationRequest::new(&request.term, &request.context, request.category)
                .with_feedback(accumulated.clone());

            let (outcome, attempts) = self.generate_with_retry(&generation_request, config).await;
            let generated = match outcome {
                Ok(generated) => generated,
                Err(e) => {
                    log::warn!(
                        "Iteration {} produced no candidate after {} attempt(s): {}",
                        iteration,
                        attempts,
                        e
                    );
                    self.append(
                        &mut records,
                        IterationRecord::generation_failed(iteration, attempts, e.to_string()),
                    );
                    continue;
                }
            };

            transition(&mut state, LoopState::Validating);
            // Violation spans refer to the trimmed text, so that is what gets recorded
            let text = generated.text.trim().to_string();
            let validation = self
                .validator
                .validate(&text, request.category, config.acceptance_threshold);
            tracing::info!(
                iteration,
                score = validation.overall_score,
                violations = validation.violations.len(),
                acceptable = validation.is_acceptable,
                "Candidate validated"
            );

            let mut metadata = generated.metadata;
            metadata
                .entry("model".to_string())
                .or_insert_with(|| serde_json::Value::from(self.generator.model()));

            if validation.is_acceptable {
                transition(&mut state, LoopState::Accepted);
                final_text = text.clone();
                self.append(
                    &mut records,
                    IterationRecord::validated(iteration, text, validation, Vec::new(), attempts, metadata),
                );
                transition(&mut state, LoopState::Completed);
                stop = Some(StopReason::Success);
                break;
            }

            if iteration == config.max_iterations {
                self.append(
                    &mut records,
                    IterationRecord::validated(iteration, text, validation, Vec::new(), attempts, metadata),
                );
                break;
            }

            transition(&mut state, LoopState::Improving);
            let items = feedback.build(&validation, iteration, &records);
            accumulated.extend(items.iter().cloned());
            self.append(
                &mut records,
                IterationRecord::validated(iteration, text, validation, items, attempts, metadata),
            );
        }

        let best_iteration = select_best(&records).cloned();
        let stop_reason = match stop {
            Some(reason) => reason,
            None if best_iteration.is_some() => {
                transition(&mut state, LoopState::Exhausted);
                StopReason::Exhausted
            }
            None => {
                transition(&mut state, LoopState::Failed);
                StopReason::Failed
            }
        };

        if stop_reason != StopReason::Success {
            final_text = best_iteration
                .as_ref()
                .map(|r| r.candidate_text.clone())
                .unwrap_or_default();
        }

        match stop_reason {
            StopReason::Failed => log::error!(
                "Run for '{}' failed: no candidate generated in {} iteration(s)",
                request.term,
                records.len()
            ),
            _ => log::info!(
                "Run for '{}' finished with {} after {} iteration(s), best score {:?}",
                request.term,
                stop_reason,
                records.len(),
                best_iteration.as_ref().map(|r| r.score)
            ),
        }

        let result = AgentResult {
            final_text,
            score_history: records.iter().map(|r| r.score).collect(),
            iterations: records,
            best_iteration,
            success: stop_reason == StopReason::Success,
            stop_reason,
            final_state: state,
            rule_set_fingerprint: self.validator.fingerprint(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        self.observer.on_complete(&result);
        Ok(result)
    }

    /// One generation with a bounded number of retries for transient failures.
    ///
    /// Returns the outcome and the number of attempts made.
    async fn generate_with_retry(
        &self,
        request: &GenerationRequest,
        config: &OrchestratorConfig,
    ) -> (std::result::Result<GenerationResult, GenerationError>, u32) {
        let max_attempts = config.generation_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(config.generation_timeout, self.generator.generate(request)).await {
                Ok(Ok(generated)) if generated.text.trim().is_empty() => Err(GenerationError::InvalidResponse(
                    "generator returned an empty candidate".to_string(),
                )),
                Ok(outcome) => outcome,
                Err(_) => Err(GenerationError::Timeout(config.generation_timeout)),
            };

            match outcome {
                Ok(generated) => return (Ok(generated), attempt),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let backoff = backoff_delay(config.retry_backoff, attempt);
                    log::warn!(
                        "Generation attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        max_attempts,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }

    fn append(&self, records: &mut Vec<IterationRecord>, record: IterationRecord) {
        self.observer.on_iteration(&record);
        records.push(record);
    }
}

/// Linear backoff, saturating instead of overflowing on huge settings
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

fn transition(state: &mut LoopState, next: LoopState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal loop transition {} -> {}",
        state,
        next
    );
    log::debug!("Loop state {} -> {}", state, next);
    *state = next;
}
