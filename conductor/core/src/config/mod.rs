//! TOML Configuration File Support
//!
//! Centralized configuration loading for llm-duel, supporting a TOML file at
//! `~/.config/llm-duel/duel.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`RunOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! base_url = "https://openrouter.ai/api/v1"
//! referer = "https://github.com/llm-duel"
//! request_timeout_secs = 120
//!
//! [run]
//! rounds = 3
//! pacing_ms = 2000
//! stop_grace_ms = 1000
//!
//! [agent_a]
//! model = "google/gemma-2-9b-it:free"
//! context = "Respond in exactly one sentence."
//!
//! [agent_b]
//! model = "mistralai/mistral-7b-instruct:free"
//!
//! [sampling]
//! temperature = 0.7
//! max_tokens = 100
//! stop_sequences = "END, STOP"
//! ```
//!
//! The API key is never read from the file; it comes from `OPENROUTER_API_KEY`.

mod run;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use run::{
    short_model_name, RunConfig, SamplingParams, DEFAULT_CONTEXT_A, DEFAULT_CONTEXT_B,
    DEFAULT_MODEL, KNOWN_MODELS,
};

/// Default chat-completion endpoint base
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Referer sent when none is configured
pub const DEFAULT_REFERER: &str = "https://github.com/llm-duel/llm-duel";

/// Environment variable holding the bearer token
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// No credential available for the backend
    #[error("Missing credential: set {0}")]
    MissingCredential(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// API section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Endpoint base URL (without `/chat/completions`)
    pub base_url: Option<String>,
    /// Value for the `HTTP-Referer` header
    pub referer: Option<String>,
    /// Value for the `X-Title` header
    pub app_title: Option<String>,
    /// Whole-request deadline in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Run section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunToml {
    /// Number of rounds
    pub rounds: Option<u32>,
    /// Pause between turns in milliseconds
    pub pacing_ms: Option<u64>,
    /// Grace period granted to an in-flight turn on stop, in milliseconds
    pub stop_grace_ms: Option<u64>,
}

/// Per-agent section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentToml {
    /// Model identifier
    pub model: Option<String>,
    /// System context
    pub context: Option<String>,
}

/// Sampling section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingToml {
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Maximum tokens per reply
    pub max_tokens: Option<u32>,
    /// Frequency penalty
    pub frequency_penalty: Option<f32>,
    /// Presence penalty
    pub presence_penalty: Option<f32>,
    /// Nucleus sampling mass
    pub top_p: Option<f32>,
    /// Comma-separated stop sequences
    pub stop_sequences: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DuelToml {
    /// API section
    pub api: ApiToml,
    /// Run section
    pub run: RunToml,
    /// Agent A section
    pub agent_a: AgentToml,
    /// Agent B section
    pub agent_b: AgentToml,
    /// Sampling section
    pub sampling: SamplingToml,
}

// =============================================================================
// Main Configuration Structs
// =============================================================================

/// Connection settings for the upstream API
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiSettings {
    /// Endpoint base URL
    pub base_url: String,
    /// Bearer token (from the environment only)
    pub api_key: Option<String>,
    /// `HTTP-Referer` header value
    pub referer: String,
    /// Optional `X-Title` header value
    pub app_title: Option<String>,
    /// Whole-request deadline; exceeding it is tallied as a timeout
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            referer: DEFAULT_REFERER.to_string(),
            app_title: Some("llm-duel".to_string()),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Orchestrator timing knobs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConductorConfig {
    /// Pause between consecutive turns
    pub pacing: Duration,
    /// How long `stop()` waits for the in-flight turn to notice cancellation
    pub stop_grace: Duration,
    /// Prompt that seeds the first round
    pub opening_prompt: String,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_secs(2),
            stop_grace: Duration::from_secs(1),
            opening_prompt: "Hi!".to_string(),
        }
    }
}

/// Centralized configuration for llm-duel
///
/// Consolidates all configuration sources. Use [`load_config`] to load
/// configuration with proper priority handling.
#[derive(Clone, Debug, Default)]
pub struct DuelConfigFile {
    /// Upstream API settings
    pub api: ApiSettings,
    /// Orchestrator timing
    pub conductor: ConductorConfig,
    /// Default run snapshot
    pub run: RunConfig,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    /// Source of configuration values
    source: ConfigSource,
}

impl DuelConfigFile {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Directory holding `duel.toml` and saved presets
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("llm-duel"))
}

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/llm-duel/duel.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("duel.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<DuelConfigFile, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then apply the process environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<DuelConfigFile, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration using a custom environment lookup
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_with_env<F>(
    path: Option<PathBuf>,
    env: F,
) -> Result<DuelConfigFile, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = DuelConfigFile::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: DuelToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut DuelConfigFile, toml: &DuelToml) {
    // API settings
    if let Some(ref url) = toml.api.base_url {
        config.api.base_url = url.clone();
    }
    if let Some(ref referer) = toml.api.referer {
        config.api.referer = referer.clone();
    }
    if toml.api.app_title.is_some() {
        config.api.app_title = toml.api.app_title.clone();
    }
    if let Some(secs) = toml.api.request_timeout_secs {
        config.api.request_timeout = Duration::from_secs(secs);
    }

    // Run settings
    if let Some(rounds) = toml.run.rounds {
        config.run.rounds = rounds;
    }
    if let Some(ms) = toml.run.pacing_ms {
        config.conductor.pacing = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.run.stop_grace_ms {
        config.conductor.stop_grace = Duration::from_millis(ms);
    }

    // Agents
    if let Some(ref model) = toml.agent_a.model {
        config.run.model_a = model.clone();
    }
    if let Some(ref context) = toml.agent_a.context {
        config.run.context_a = context.clone();
    }
    if let Some(ref model) = toml.agent_b.model {
        config.run.model_b = model.clone();
    }
    if let Some(ref context) = toml.agent_b.context {
        config.run.context_b = context.clone();
    }

    // Sampling
    let sampling = &mut config.run.sampling;
    if let Some(t) = toml.sampling.temperature {
        sampling.temperature = t;
    }
    if let Some(n) = toml.sampling.max_tokens {
        sampling.max_tokens = n;
    }
    if let Some(p) = toml.sampling.frequency_penalty {
        sampling.frequency_penalty = p;
    }
    if let Some(p) = toml.sampling.presence_penalty {
        sampling.presence_penalty = p;
    }
    if let Some(p) = toml.sampling.top_p {
        sampling.top_p = p;
    }
    if let Some(ref stop) = toml.sampling.stop_sequences {
        sampling.stop_sequences = stop.clone();
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut DuelConfigFile, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    // The credential is not a tracked "setting"; it never changes the source
    if let Some(key) = env(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
        config.api.api_key = Some(key);
    }

    if let Some(url) = env("DUEL_BASE_URL") {
        config.api.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = env("DUEL_MODEL_A") {
        config.run.model_a = model;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = env("DUEL_MODEL_B") {
        config.run.model_b = model;
        config.source = ConfigSource::Env;
    }
    if let Some(rounds) = env("DUEL_ROUNDS") {
        if let Ok(n) = rounds.parse::<u32>() {
            config.run.rounds = n;
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line overrides for the run snapshot
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct RunOverrides {
    /// Agent A model
    pub model_a: Option<String>,
    /// Agent B model
    pub model_b: Option<String>,
    /// Agent A context
    pub context_a: Option<String>,
    /// Agent B context
    pub context_b: Option<String>,
    /// Round count
    pub rounds: Option<u32>,
    /// Temperature
    pub temperature: Option<f32>,
    /// Max tokens
    pub max_tokens: Option<u32>,
    /// Frequency penalty
    pub frequency_penalty: Option<f32>,
    /// Presence penalty
    pub presence_penalty: Option<f32>,
    /// Nucleus sampling cutoff
    pub top_p: Option<f32>,
    /// Comma-separated stop sequences
    pub stop_sequences: Option<String>,
}

impl RunOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.model_a.is_none()
            && self.model_b.is_none()
            && self.context_a.is_none()
            && self.context_b.is_none()
            && self.rounds.is_none()
            && self.temperature.is_none()
            && self.max_tokens.is_none()
            && self.frequency_penalty.is_none()
            && self.presence_penalty.is_none()
            && self.top_p.is_none()
            && self.stop_sequences.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut DuelConfigFile) {
        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }
        self.apply_to_run(&mut config.run);
    }

    /// Apply overrides to a bare run snapshot
    pub fn apply_to_run(&self, run: &mut RunConfig) {
        if let Some(ref model) = self.model_a {
            run.model_a = model.clone();
        }
        if let Some(ref model) = self.model_b {
            run.model_b = model.clone();
        }
        if let Some(ref context) = self.context_a {
            run.context_a = context.clone();
        }
        if let Some(ref context) = self.context_b {
            run.context_b = context.clone();
        }
        if let Some(rounds) = self.rounds {
            run.rounds = rounds;
        }
        if let Some(t) = self.temperature {
            run.sampling.temperature = t;
        }
        if let Some(n) = self.max_tokens {
            run.sampling.max_tokens = n;
        }
        if let Some(p) = self.frequency_penalty {
            run.sampling.frequency_penalty = p;
        }
        if let Some(p) = self.presence_penalty {
            run.sampling.presence_penalty = p;
        }
        if let Some(p) = self.top_p {
            run.sampling.top_p = p;
        }
        if let Some(ref stop) = self.stop_sequences {
            run.sampling.stop_sequences = stop.clone();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
