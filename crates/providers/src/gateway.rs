//! Provider gateway: one uniform call interface over every backend.
//!
//! Looks up the model in the registry, routes to the adapter registered for
//! its backend, and normalizes the reply into text plus two usage counts.

use std::collections::HashMap;
use std::sync::Arc;

use rlmgate_core::error::ProviderError;
use rlmgate_core::message::Message;
use rlmgate_core::provider::{Backend, Provider, ProviderRequest};
use rlmgate_telemetry::ModelRegistry;
use serde::Serialize;
use tracing::debug;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// A normalized completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// The model that answered, as reported by the backend.
    pub model: String,
}

enum BackendSlot {
    Ready(Arc<dyn Provider>),
    /// The credential variable that must be set before this backend works.
    MissingCredential(&'static str),
}

/// Routes model calls to the adapter for each model's backend.
pub struct ProviderGateway {
    registry: Arc<ModelRegistry>,
    backends: HashMap<Backend, BackendSlot>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ProviderGateway {
    /// Create a gateway with no backends registered.
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            backends: HashMap::new(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_generation(mut self, temperature: f32, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Register a provider for a backend.
    pub fn register(&mut self, backend: Backend, provider: Arc<dyn Provider>) {
        self.backends.insert(backend, BackendSlot::Ready(provider));
    }

    fn mark_missing(&mut self, backend: Backend, var: &'static str) {
        self.backends
            .insert(backend, BackendSlot::MissingCredential(var));
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Backends that can be called right now.
    pub fn ready_backends(&self) -> Vec<Backend> {
        let mut ready: Vec<Backend> = self
            .backends
            .iter()
            .filter(|(_, slot)| matches!(slot, BackendSlot::Ready(_)))
            .map(|(backend, _)| *backend)
            .collect();
        ready.sort();
        ready
    }

    /// Send `turns` to `model_id`.
    ///
    /// Unknown models and unconfigured backends fail before any network
    /// traffic.
    pub async fn call(
        &self,
        model_id: &str,
        turns: Vec<Message>,
    ) -> Result<Completion, ProviderError> {
        let model = self
            .registry
            .get(model_id)
            .ok_or_else(|| ProviderError::ModelNotFound(model_id.to_string()))?;

        let provider = match self.backends.get(&model.backend) {
            Some(BackendSlot::Ready(provider)) => provider,
            Some(BackendSlot::MissingCredential(var)) => {
                return Err(ProviderError::NotConfigured(format!(
                    "{var} is not set (required by {})",
                    model.backend
                )));
            }
            None => {
                return Err(ProviderError::NotConfigured(format!(
                    "no adapter registered for backend {}",
                    model.backend
                )));
            }
        };

        debug!(
            backend = %model.backend,
            model = %model.id,
            turns = turns.len(),
            "Dispatching model call"
        );

        let request = ProviderRequest {
            model: model.id.clone(),
            messages: turns,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let response = provider.complete(request).await?;

        Ok(Completion {
            text: response.text,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            model: response.model,
        })
    }
}

/// Build a gateway from configuration.
///
/// Every backend gets a slot: credentialed backends are ready, the others
/// remember which variable is missing so calls can name it.
pub fn build_from_config(
    config: &rlmgate_config::AppConfig,
    registry: Arc<ModelRegistry>,
) -> ProviderGateway {
    let mut gateway = ProviderGateway::new(registry)
        .with_generation(config.default_temperature, Some(config.default_max_tokens));

    for backend in Backend::ALL {
        let base_url = config.api_url(backend);

        if backend.is_local() {
            gateway.register(
                backend,
                Arc::new(OpenAiCompatProvider::ollama(Some(&base_url))),
            );
            continue;
        }

        let Some(api_key) = config.api_key(backend) else {
            if let Some(var) = backend.credential_env() {
                gateway.mark_missing(backend, var);
            }
            continue;
        };

        let provider: Arc<dyn Provider> = match backend {
            Backend::Anthropic => Arc::new(AnthropicProvider::new(api_key).with_base_url(&base_url)),
            Backend::Zai => Arc::new(AnthropicProvider::zai(api_key).with_base_url(&base_url)),
            _ => Arc::new(OpenAiCompatProvider::new(backend.as_str(), &base_url, api_key)),
        };
        gateway.register(backend, provider);
    }

    debug!(ready = ?gateway.ready_backends(), "Provider gateway built");
    gateway
}
