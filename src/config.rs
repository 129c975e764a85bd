use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use definitor::feedback::FeedbackConfig;
use definitor::generation::AnthropicConfig;
use definitor::runner::OrchestratorConfig;
use definitor::validation::ScoringConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub rules: RulesConfig,
    pub iteration: IterationConfig,
    pub scoring: ScoringSection,
    pub feedback: FeedbackSection,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub dir: PathBuf,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("rules"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    pub max_iterations: u32,
    pub acceptance_threshold: f64,
    pub improvement_threshold: f64,
    pub generation_timeout_ms: u64,
    pub generation_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            acceptance_threshold: 0.8,
            improvement_threshold: 0.05,
            generation_timeout_ms: 120000,
            generation_retries: 1,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub case_insensitive: bool,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            critical: 0.30,
            high: 0.15,
            medium: 0.05,
            low: 0.02,
            case_insensitive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSection {
    pub max_items: usize,
    pub max_critical: usize,
}

impl Default for FeedbackSection {
    fn default() -> Self {
        Self {
            max_items: 5,
            max_critical: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            timeout_ms: 120000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            rules: RulesConfig::default(),
            iteration: IterationConfig::default(),
            scoring: ScoringSection::default(),
            feedback: FeedbackSection::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_iterations: self.iteration.max_iterations,
            acceptance_threshold: self.iteration.acceptance_threshold,
            improvement_threshold: self.iteration.improvement_threshold,
            generation_timeout: Duration::from_millis(self.iteration.generation_timeout_ms),
            generation_retries: self.iteration.generation_retries,
            retry_backoff: Duration::from_millis(self.iteration.retry_backoff_ms),
        }
    }

    pub fn scoring(&self) -> ScoringConfig {
        ScoringConfig {
            critical_weight: self.scoring.critical,
            high_weight: self.scoring.high,
            medium_weight: self.scoring.medium,
            low_weight: self.scoring.low,
            acceptance_threshold: self.iteration.acceptance_threshold,
            case_insensitive: self.scoring.case_insensitive,
            ..ScoringConfig::default()
        }
    }

    pub fn feedback(&self) -> FeedbackConfig {
        FeedbackConfig {
            max_items: self.feedback.max_items,
            max_critical: self.feedback.max_critical,
            improvement_threshold: self.iteration.improvement_threshold,
        }
    }

    pub fn anthropic(&self) -> AnthropicConfig {
        AnthropicConfig {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            timeout: Duration::from_millis(self.llm.timeout_ms),
            ..AnthropicConfig::default()
        }
    }
}
