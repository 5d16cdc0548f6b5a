//! Configuration loading, validation, and management for rlmgate.
//!
//! Loads configuration from `~/.rlmgate/config.toml` (or the file named by
//! `RLM_CONFIG`) and then applies environment variable overrides. The result
//! is validated once at startup and treated as read-only afterwards.

use rlmgate_core::{Backend, BudgetLimits, ModelDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The root configuration structure.
///
/// Maps directly to `~/.rlmgate/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory holding one subdirectory per session
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Backend consulted by the selector when no model is requested
    #[serde(default = "default_preferred_provider")]
    pub preferred_provider: Backend,

    /// Below this much remaining cost (USD) the cheap tier is used
    #[serde(default = "default_cheap_threshold")]
    pub cheap_threshold_usd: f64,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Budget ceilings given to every new session
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Tier → default model id
    #[serde(default)]
    pub tiers: TierConfig,

    /// Provider-specific configurations, keyed by backend name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// HTTP transport configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Extra catalog entries appended to the built-in models
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
}

fn default_data_dir() -> PathBuf {
    AppConfig::config_dir().join("sessions")
}
fn default_preferred_provider() -> Backend {
    Backend::Anthropic
}
fn default_cheap_threshold() -> f64 {
    1.0
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("preferred_provider", &self.preferred_provider)
            .field("cheap_threshold_usd", &self.cheap_threshold_usd)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("budget", &self.budget)
            .field("tiers", &self.tiers)
            .field("providers", &self.providers)
            .field("gateway", &self.gateway)
            .field("models", &self.models)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Budget ceilings for new sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_budget_tokens")]
    pub max_tokens: u64,

    #[serde(default = "default_budget_cost")]
    pub max_cost: f64,

    #[serde(default = "default_budget_iterations")]
    pub max_iterations: u64,

    #[serde(default = "default_budget_depth")]
    pub max_depth: u32,

    #[serde(default = "default_budget_time_ms")]
    pub max_time_ms: u64,
}

fn default_budget_tokens() -> u64 {
    1_000_000
}
fn default_budget_cost() -> f64 {
    10.0
}
fn default_budget_iterations() -> u64 {
    100
}
fn default_budget_depth() -> u32 {
    5
}
fn default_budget_time_ms() -> u64 {
    3_600_000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_budget_tokens(),
            max_cost: default_budget_cost(),
            max_iterations: default_budget_iterations(),
            max_depth: default_budget_depth(),
            max_time_ms: default_budget_time_ms(),
        }
    }
}

impl BudgetConfig {
    pub fn limits(&self) -> BudgetLimits {
        BudgetLimits {
            max_tokens: self.max_tokens,
            max_cost: self.max_cost,
            max_iterations: self.max_iterations,
            max_depth: self.max_depth,
            max_time_ms: self.max_time_ms,
        }
    }
}

/// Default model id per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_cheap_model")]
    pub cheap: String,

    #[serde(default = "default_standard_model")]
    pub standard: String,

    #[serde(default = "default_premium_model")]
    pub premium: String,

    #[serde(default = "default_local_model")]
    pub local: String,
}

fn default_cheap_model() -> String {
    "claude-3-5-haiku-20241022".into()
}
fn default_standard_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_premium_model() -> String {
    "claude-opus-4-20250514".into()
}
fn default_local_model() -> String {
    "llama3.2".into()
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            cheap: default_cheap_model(),
            standard: default_standard_model(),
            premium: default_premium_model(),
            local: default_local_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    42718
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path with env var overrides.
    ///
    /// Search order:
    /// 1. `$RLM_CONFIG` if set
    /// 2. `~/.rlmgate/config.toml`
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("RLM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));

        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Unparseable numeric values are errors rather than silently ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("RLM_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        override_parsed(&lookup, "RLM_MAX_TOKENS", &mut self.budget.max_tokens)?;
        override_parsed(&lookup, "RLM_MAX_COST", &mut self.budget.max_cost)?;
        override_parsed(&lookup, "RLM_MAX_ITERATIONS", &mut self.budget.max_iterations)?;
        override_parsed(&lookup, "RLM_MAX_DEPTH", &mut self.budget.max_depth)?;
        override_parsed(&lookup, "RLM_MAX_TIME_MS", &mut self.budget.max_time_ms)?;
        override_parsed(&lookup, "RLM_CHEAP_THRESHOLD", &mut self.cheap_threshold_usd)?;
        override_parsed(&lookup, "RLM_PORT", &mut self.gateway.port)?;

        if let Some(provider) = lookup("RLM_PREFERRED_PROVIDER") {
            self.preferred_provider =
                Backend::from_str(&provider).map_err(|_| ConfigError::InvalidEnv {
                    var: "RLM_PREFERRED_PROVIDER".into(),
                    value: provider.clone(),
                })?;
        }

        if let Some(model) = lookup("RLM_MODEL_CHEAP") {
            self.tiers.cheap = model;
        }
        if let Some(model) = lookup("RLM_MODEL_STANDARD") {
            self.tiers.standard = model;
        }
        if let Some(model) = lookup("RLM_MODEL_PREMIUM") {
            self.tiers.premium = model;
        }
        if let Some(model) = lookup("RLM_MODEL_LOCAL") {
            self.tiers.local = model;
        }
        if let Some(host) = lookup("RLM_HOST") {
            self.gateway.host = host;
        }

        for backend in Backend::ALL {
            if let Some(var) = backend.credential_env()
                && let Some(key) = lookup(var).filter(|k| !k.trim().is_empty())
            {
                self.providers
                    .entry(backend.as_str().to_string())
                    .or_default()
                    .api_key = Some(key);
            }
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.providers
                .entry(Backend::Ollama.as_str().to_string())
                .or_default()
                .api_url = Some(url);
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".rlmgate")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !self.budget.max_cost.is_finite() || self.budget.max_cost < 0.0 {
            return Err(ConfigError::ValidationError(
                "budget.max_cost must be a non-negative number".into(),
            ));
        }

        if !self.cheap_threshold_usd.is_finite() || self.cheap_threshold_usd < 0.0 {
            return Err(ConfigError::ValidationError(
                "cheap_threshold_usd must be a non-negative number".into(),
            ));
        }

        for model in &self.models {
            if model.id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "custom model id must not be empty".into(),
                ));
            }
            if model.input_per_m < 0.0 || model.output_per_m < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "model '{}' has a negative price",
                    model.id
                )));
            }
        }

        Ok(())
    }

    /// The credential for `backend`, if one is configured.
    pub fn api_key(&self, backend: Backend) -> Option<&str> {
        self.providers
            .get(backend.as_str())
            .and_then(|p| p.api_key.as_deref())
    }

    /// The base URL for `backend`, falling back to its well-known default.
    pub fn api_url(&self, backend: Backend) -> String {
        self.providers
            .get(backend.as_str())
            .and_then(|p| p.api_url.clone())
            .unwrap_or_else(|| backend.default_base_url().to_string())
    }

    /// Render the effective configuration as TOML with every secret masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        for provider in shown.providers.values_mut() {
            if provider.api_key.is_some() {
                provider.api_key = Some("[REDACTED]".into());
            }
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn override_parsed<F, T>(lookup: &F, var: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(var) {
        *target = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: var.into(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            preferred_provider: default_preferred_provider(),
            cheap_threshold_usd: default_cheap_threshold(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            budget: BudgetConfig::default(),
            tiers: TierConfig::default(),
            providers: HashMap::new(),
            gateway: GatewayConfig::default(),
            models: vec![],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv { var: String, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for rlmgate_core::Error {
    fn from(err: ConfigError) -> Self {
        rlmgate_core::Error::config(err.to_string())
    }
}
