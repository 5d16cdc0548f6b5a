//! Provider trait: the abstraction over model backends.
//!
//! A Provider knows how to send a list of role-tagged turns to one backend
//! and normalize the reply into text plus two usage counts.
//!
//! Implementations: Anthropic Messages (Anthropic, Z.AI) and
//! OpenAI-compatible chat completions (OpenAI, OpenRouter, Ollama).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ProviderError;
use crate::message::Message;

/// The closed set of backends rlmgate can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "openrouter")]
    OpenRouter,
    Zai,
    Ollama,
}

impl Backend {
    pub const ALL: [Backend; 5] = [
        Backend::Anthropic,
        Backend::OpenAi,
        Backend::OpenRouter,
        Backend::Zai,
        Backend::Ollama,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::Zai => "zai",
            Self::Ollama => "ollama",
        }
    }

    /// Environment variable holding this backend's secret, if it needs one.
    pub fn credential_env(&self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::Zai => Some("Z_AI_API_KEY"),
            Self::Ollama => None,
        }
    }

    /// Local backends run offline and are never billed.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Ollama)
    }

    /// Base URL used when the configuration does not override it.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::Zai => "https://api.z.ai/api/anthropic",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            "zai" | "z.ai" => Ok(Self::Zai),
            "ollama" | "local" => Ok(Self::Ollama),
            other => Err(ProviderError::NotConfigured(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

/// A request to a single backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The backend-native model id (e.g. "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,

    /// The ordered turns
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// A normalized reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text
    pub text: String,

    /// Token usage (zero when the backend omitted it)
    pub usage: Usage,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// The core Provider trait.
///
/// Every backend adapter implements this trait. The gateway calls
/// `complete()` without knowing which backend sits behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter", "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;
}
