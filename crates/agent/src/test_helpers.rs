//! Shared test helpers for orchestrator and handler tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rlmgate_core::error::ProviderError;
use rlmgate_core::provider::{Backend, Provider, ProviderRequest, ProviderResponse, Usage};
use rlmgate_core::BudgetLimits;
use rlmgate_providers::ProviderGateway;
use rlmgate_session::SessionManager;
use rlmgate_telemetry::{ModelRegistry, ModelSelector};

use crate::orchestrator::Orchestrator;

/// A provider that replays scripted outcomes in order.
///
/// Once the script is exhausted every further call returns `fallback`.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    fallback: Option<String>,
    echo: bool,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            echo: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same text.
    pub fn repeating(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Self::new(Vec::new())
        }
    }

    /// Answer every call with its own last message.
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::new(Vec::new())
        }
    }

    /// Answer with each text in turn.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(text_response(t))).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if self.echo {
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.requests.lock().unwrap().push(request);
            return Ok(text_response(&last));
        }
        self.requests.lock().unwrap().push(request);
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.fallback {
            Some(text) => Ok(text_response(text)),
            None => panic!("ScriptedProvider: script exhausted"),
        }
    }
}

/// A reply of 10 input and 5 output tokens.
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        text: text.to_string(),
        usage: Usage::new(10, 5),
        model: "mock-model".into(),
    }
}

/// An orchestrator over `dir` whose Anthropic backend is `provider`.
pub fn orchestrator_with(dir: &Path, provider: Arc<ScriptedProvider>) -> Orchestrator {
    orchestrator_with_budget(dir, provider, BudgetLimits::default())
}

pub fn orchestrator_with_budget(
    dir: &Path,
    provider: Arc<ScriptedProvider>,
    limits: BudgetLimits,
) -> Orchestrator {
    let registry = Arc::new(ModelRegistry::with_defaults());
    let mut gateway = ProviderGateway::new(registry);
    gateway.register(Backend::Anthropic, provider);

    Orchestrator::new(
        Arc::new(SessionManager::new(dir, limits)),
        Arc::new(gateway),
        ModelSelector::new(Backend::Anthropic, 1.0),
    )
}
