//! Model descriptors and quality/cost tiers.
//!
//! Prices are in USD per 1 million tokens.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;
use crate::provider::Backend;

/// Quality/cost bucket used to pick a default model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Cheap,
    Standard,
    Premium,
    Local,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Cheap, Tier::Standard, Tier::Premium, Tier::Local];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cheap => "cheap",
            Self::Standard => "standard",
            Self::Premium => "premium",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cheap" => Ok(Self::Cheap),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            "local" => Ok(Self::Local),
            other => Err(Error::config(format!("unknown tier '{other}'"))),
        }
    }
}

/// An immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub id: String,
    pub backend: Backend,
    /// Price per 1M input tokens in USD.
    #[serde(alias = "input_per_m")]
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    #[serde(alias = "output_per_m")]
    pub output_per_m: f64,
    #[serde(alias = "context_window")]
    pub context_window: u32,
    pub tier: Tier,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        backend: Backend,
        input_per_m: f64,
        output_per_m: f64,
        context_window: u32,
        tier: Tier,
    ) -> Self {
        Self {
            id: id.into(),
            backend,
            input_per_m,
            output_per_m,
            context_window,
            tier,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}
