//! Configuration types for the practice-session engine.
//!
//! `drill.json` is read from the working directory (or an explicit path).
//! Every field has a default, so a missing file or an empty object yields a
//! usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DrillError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "drill.json";

/// Domains the generator picks from when a session does not name one.
pub const DEFAULT_DOMAINS: [&str; 10] = [
    "user_management",
    "file_processing",
    "data_validation",
    "calculation",
    "inventory_system",
    "notification_service",
    "logging",
    "banking",
    "e-commerce",
    "student_management",
];

/// Default evaluation budget per generation run.
pub const fn default_max_evaluation_attempts() -> u32 {
    3
}

/// Default review iteration budget.
pub const fn default_max_iterations() -> u32 {
    3
}

/// Default minimum review length in characters, after trimming.
pub const fn default_min_review_length() -> usize {
    10
}

const fn default_duplicate_window_secs() -> u64 {
    10
}

const fn default_lock_timeout_secs() -> u64 {
    5
}

fn default_domains() -> Vec<String> {
    DEFAULT_DOMAINS.iter().map(ToString::to_string).collect()
}

fn default_catalog() -> String {
    "catalog.json".to_string()
}

/// Default state file path for the terminal session.
fn default_state_file() -> String {
    ".drill/session.json".to_string()
}

/// Default output directory for reports.
fn default_output_dir() -> String {
    ".".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_request_timeout() -> u64 {
    120
}

/// Main configuration for practice sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Maximum evaluation calls per generation run.
    #[serde(default = "default_max_evaluation_attempts")]
    pub max_evaluation_attempts: u32,

    /// Maximum review iterations per session.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Minimum trimmed review length in characters.
    #[serde(default = "default_min_review_length")]
    pub min_review_length: usize,

    /// Window in seconds within which an identical resubmission is ignored.
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: u64,

    /// How long a request waits for the per-session lock.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Domain pool for sessions that do not name a domain.
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,

    /// Path to the error catalog file.
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// Path where the terminal session persists its state.
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// Output directory for generated reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Chat-completion backend settings.
    #[serde(default)]
    pub llm: LlmSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_evaluation_attempts: default_max_evaluation_attempts(),
            max_iterations: default_max_iterations(),
            min_review_length: default_min_review_length(),
            duplicate_window_secs: default_duplicate_window_secs(),
            lock_timeout_secs: default_lock_timeout_secs(),
            domains: default_domains(),
            catalog: default_catalog(),
            state_file: default_state_file(),
            output_dir: default_output_dir(),
            llm: LlmSettings::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            DrillError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `drill.json` in the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::ConfigParseError` if the file exists but contains
    /// invalid JSON, and `DrillError::ConfigValidationError` if a value is out
    /// of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(DrillError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| DrillError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        if self.max_evaluation_attempts == 0 {
            return Err(DrillError::config_validation(
                "maxEvaluationAttempts must be greater than 0",
                "Set maxEvaluationAttempts to at least 1 in your drill.json",
            ));
        }

        if self.max_iterations == 0 {
            return Err(DrillError::config_validation(
                "maxIterations must be greater than 0",
                "Set maxIterations to at least 1 in your drill.json",
            ));
        }

        if self.min_review_length == 0 {
            return Err(DrillError::config_validation(
                "minReviewLength must be greater than 0",
                "Set minReviewLength to at least 1 in your drill.json",
            ));
        }

        if self.lock_timeout_secs == 0 {
            return Err(DrillError::config_validation(
                "lockTimeoutSecs must be greater than 0",
                "Set lockTimeoutSecs to at least 1 second in your drill.json",
            ));
        }

        if self.domains.is_empty() || self.domains.iter().any(|d| d.trim().is_empty()) {
            return Err(DrillError::config_validation(
                "domains must be a non-empty list of non-empty names",
                "Remove the domains field to use the built-in pool",
            ));
        }

        if self.catalog.trim().is_empty() {
            return Err(DrillError::config_validation(
                "catalog path must not be empty",
                "Provide the path to your error catalog JSON in drill.json",
            ));
        }

        if self.output_dir.trim().is_empty() {
            return Err(DrillError::config_validation(
                "outputDir must not be empty",
                "Provide a valid output directory path in your drill.json (use '.' for current directory)",
            ));
        }

        self.llm.validate()
    }
}

/// Settings for the OpenAI-compatible chat backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettings {
    /// Base URL of the API, without the `/chat/completions` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl LlmSettings {
    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(DrillError::config_validation(
                "llm.baseUrl must not be empty",
                "Set llm.baseUrl to your provider's API root, e.g. https://api.openai.com/v1",
            ));
        }

        if self.model.trim().is_empty() {
            return Err(DrillError::config_validation(
                "llm.model must not be empty",
                "Set llm.model in your drill.json",
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(DrillError::config_validation(
                format!("llm.temperature must be between 0 and 2, got {}", self.temperature),
                "Use a temperature such as 0.7",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(DrillError::config_validation(
                "llm.requestTimeoutSecs must be greater than 0",
                "Set llm.requestTimeoutSecs to at least 1 second in your drill.json",
            ));
        }

        Ok(())
    }
}
