//! Model registry and tier selector.
//!
//! The registry is built once at startup from the built-in catalog plus any
//! `[[models]]` entries in the configuration, and is immutable afterwards.

use rlmgate_config::AppConfig;
use rlmgate_core::{Backend, Error, ModelDescriptor, ProviderError, Result, Session, Tier};
use serde::Serialize;
use std::collections::HashMap;

use crate::ledger;

/// Default model id for each tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierDefaults {
    pub cheap: String,
    pub standard: String,
    pub premium: String,
    pub local: String,
}

impl TierDefaults {
    pub fn get(&self, tier: Tier) -> &str {
        match tier {
            Tier::Cheap => &self.cheap,
            Tier::Standard => &self.standard,
            Tier::Premium => &self.premium,
            Tier::Local => &self.local,
        }
    }
}

impl Default for TierDefaults {
    fn default() -> Self {
        Self {
            cheap: "claude-3-5-haiku-20241022".into(),
            standard: "claude-sonnet-4-20250514".into(),
            premium: "claude-opus-4-20250514".into(),
            local: "llama3.2".into(),
        }
    }
}

/// The immutable model catalog.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    /// Catalog order is preserved for listing.
    models: Vec<ModelDescriptor>,
    index: HashMap<String, usize>,
    tiers: TierDefaults,
}

impl ModelRegistry {
    /// Create a registry with the built-in catalog and default tiers.
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            models: Vec::new(),
            index: HashMap::new(),
            tiers: TierDefaults::default(),
        };

        use Backend::*;
        use Tier::*;

        // ── Anthropic ──────────────────────────────────────────────
        registry.insert(ModelDescriptor::new("claude-3-5-haiku-20241022", Anthropic, 0.8, 4.0, 200_000, Cheap));
        registry.insert(ModelDescriptor::new("claude-sonnet-4-20250514", Anthropic, 3.0, 15.0, 200_000, Standard));
        registry.insert(ModelDescriptor::new("claude-opus-4-20250514", Anthropic, 15.0, 75.0, 200_000, Premium));

        // ── OpenAI ─────────────────────────────────────────────────
        registry.insert(ModelDescriptor::new("gpt-4o-mini", OpenAi, 0.15, 0.6, 128_000, Cheap));
        registry.insert(ModelDescriptor::new("gpt-4o", OpenAi, 2.5, 10.0, 128_000, Standard));
        registry.insert(ModelDescriptor::new("o1", OpenAi, 15.0, 60.0, 200_000, Premium));

        // ── OpenRouter ─────────────────────────────────────────────
        registry.insert(ModelDescriptor::new("meta-llama/llama-3.1-8b-instruct", OpenRouter, 0.055, 0.055, 131_072, Cheap));
        registry.insert(ModelDescriptor::new("deepseek/deepseek-chat", OpenRouter, 0.27, 1.1, 65_536, Standard));

        // ── Z.AI ───────────────────────────────────────────────────
        registry.insert(ModelDescriptor::new("glm-4.5-air", Zai, 0.2, 1.1, 128_000, Cheap));
        registry.insert(ModelDescriptor::new("glm-4.7", Zai, 0.6, 2.2, 200_000, Standard));

        // ── Ollama (local) ─────────────────────────────────────────
        registry.insert(ModelDescriptor::new("llama3.2", Ollama, 0.0, 0.0, 128_000, Local));
        registry.insert(ModelDescriptor::new("qwen2.5-coder", Ollama, 0.0, 0.0, 32_768, Local));

        registry
    }

    /// Built-in catalog plus custom models and tier defaults from config.
    ///
    /// Fails if a tier default names an unknown model, or if the local tier
    /// points at a billed backend.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut registry = Self::with_defaults();
        for model in &config.models {
            tracing::debug!(model = %model.id, backend = %model.backend, "Registering custom model");
            registry.insert(model.clone());
        }

        registry.tiers = TierDefaults {
            cheap: config.tiers.cheap.clone(),
            standard: config.tiers.standard.clone(),
            premium: config.tiers.premium.clone(),
            local: config.tiers.local.clone(),
        };
        registry.validate_tiers()?;
        Ok(registry)
    }

    fn insert(&mut self, model: ModelDescriptor) {
        match self.index.get(&model.id) {
            Some(&slot) => self.models[slot] = model,
            None => {
                self.index.insert(model.id.clone(), self.models.len());
                self.models.push(model);
            }
        }
    }

    fn validate_tiers(&self) -> Result<()> {
        for tier in Tier::ALL {
            let id = self.tiers.get(tier);
            let model = self.get(id).ok_or_else(|| {
                Error::config(format!("{tier} tier default '{id}' is not a known model"))
            })?;
            if tier == Tier::Local && !model.backend.is_local() {
                return Err(Error::config(format!(
                    "local tier default '{id}' runs on {} which is not a local backend",
                    model.backend
                )));
            }
        }
        Ok(())
    }

    /// Look up a model by id.
    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.index.get(id).map(|&slot| &self.models[slot])
    }

    /// Look up a model by id, failing with `unknown model`.
    pub fn require(&self, id: &str) -> Result<&ModelDescriptor> {
        self.get(id)
            .ok_or_else(|| ProviderError::ModelNotFound(id.to_string()).into())
    }

    /// Every registered model in catalog order.
    pub fn list(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn tiers(&self) -> &TierDefaults {
        &self.tiers
    }

    /// The descriptor for a tier's default model.
    pub fn tier_default(&self, tier: Tier) -> Result<&ModelDescriptor> {
        self.require(self.tiers.get(tier))
    }
}

/// Picks the model for the next call given a session's remaining budget.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    preferred_backend: Backend,
    cheap_threshold_usd: f64,
}

impl ModelSelector {
    pub fn new(preferred_backend: Backend, cheap_threshold_usd: f64) -> Self {
        Self {
            preferred_backend,
            cheap_threshold_usd,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.preferred_provider, config.cheap_threshold_usd)
    }

    pub fn preferred_backend(&self) -> Backend {
        self.preferred_backend
    }

    /// Choose a model.
    ///
    /// 1. A known `preferred` id always wins; an unknown one is an error.
    /// 2. Low remaining cost selects the cheap tier.
    /// 3. A local preferred backend selects the local tier.
    /// 4. Otherwise the standard tier.
    pub fn select<'r>(
        &self,
        registry: &'r ModelRegistry,
        session: &Session,
        preferred: Option<&str>,
    ) -> Result<&'r ModelDescriptor> {
        if let Some(id) = preferred.filter(|id| !id.trim().is_empty()) {
            return registry.require(id);
        }

        let remaining = ledger::remaining(session);
        let tier = if remaining.cost < self.cheap_threshold_usd {
            Tier::Cheap
        } else if self.preferred_backend.is_local() {
            Tier::Local
        } else {
            Tier::Standard
        };

        tracing::debug!(
            session = %session.id,
            %tier,
            remaining_cost = remaining.cost,
            "Selected tier"
        );
        registry.tier_default(tier)
    }
}
