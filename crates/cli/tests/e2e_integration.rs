//! End-to-end integration tests for rlmgate.
//!
//! These drive whole workflows through the outer request handler: ingest a
//! document, chunk it, process each chunk, synthesize, and inspect the
//! budget, both in-process and over HTTP.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Request;
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use rlmgate_agent::{Orchestrator, RequestHandler, ToolReply};
use rlmgate_config::{AppConfig, ProviderConfig};
use rlmgate_core::error::ProviderError;
use rlmgate_core::provider::{Backend, Provider, ProviderRequest, ProviderResponse, Usage};
use rlmgate_core::BudgetLimits;
use rlmgate_providers::ProviderGateway;
use rlmgate_session::SessionManager;
use rlmgate_telemetry::{ModelRegistry, ModelSelector};
use serde_json::{Value, json};
use tower::ServiceExt;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Numbers its replies and remembers every prompt it was sent.
struct CountingProvider {
    prompts: Mutex<Vec<String>>,
}

impl CountingProvider {
    fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for CountingProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut prompts = self.prompts.lock().unwrap();
        let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        prompts.push(last);
        Ok(ProviderResponse {
            text: format!("reply {}", prompts.len()),
            usage: Usage::new(100, 20),
            model: request.model,
        })
    }
}

fn handler_with(dir: &std::path::Path, provider: Arc<CountingProvider>, limits: BudgetLimits) -> RequestHandler {
    let registry = Arc::new(ModelRegistry::with_defaults());
    let mut gateway = ProviderGateway::new(registry);
    gateway.register(Backend::Anthropic, provider);
    let orchestrator = Orchestrator::new(
        Arc::new(SessionManager::new(dir, limits)),
        Arc::new(gateway),
        ModelSelector::new(Backend::Anthropic, 1.0),
    );
    RequestHandler::new(Arc::new(orchestrator))
}

async fn ok(handler: &RequestHandler, name: &str, arguments: Value) -> Value {
    let reply = handler.handle(name, arguments).await;
    assert!(!reply.is_error, "{}", reply.joined_text());
    serde_json::from_str(&reply.joined_text()).unwrap()
}

// ── E2E: Map-reduce over a document ─────────────────────────────────────

#[tokio::test]
async fn e2e_ingest_chunk_process_synthesize() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(CountingProvider::new());
    let handler = handler_with(dir.path(), provider.clone(), BudgetLimits::default());

    let document = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
    let ingested = ok(
        &handler,
        "rlm",
        json!({"mode": "ingest", "sessionId": "doc", "data": document, "name": "greek"}),
    )
    .await;
    assert_eq!(ingested["bytes"], document.len());

    let chunks = ok(
        &handler,
        "rlm",
        json!({"mode": "chunk", "sessionId": "doc", "path": "input/greek.txt", "size": 20, "overlap": 5}),
    )
    .await;
    let paths: Vec<String> = serde_json::from_value(chunks["paths"].clone()).unwrap();
    assert_eq!(chunks["count"], paths.len());
    assert!(paths.len() >= 3);

    let mut outputs = Vec::new();
    for (i, path) in paths.iter().enumerate() {
        let result = ok(
            &handler,
            "rlm",
            json!({
                "mode": "process",
                "sessionId": "doc",
                "prompt": "List the words.",
                "contextPaths": [path]
            }),
        )
        .await;
        assert_eq!(result["response"], format!("reply {}", i + 1));
        assert_eq!(result["tokensUsed"], 120);
        assert_eq!(result["budgetExceeded"], false);

        let saved = ok(
            &handler,
            "rlm",
            json!({"mode": "ingest", "sessionId": "doc", "data": result["response"], "name": format!("part{i}")}),
        )
        .await;
        outputs.push(saved["path"].as_str().unwrap().to_string());
    }

    let synthesis = ok(
        &handler,
        "rlm",
        json!({"mode": "synthesize", "sessionId": "doc", "task": "Combine.", "resultPaths": outputs}),
    )
    .await;
    assert_eq!(synthesis["model"], "claude-opus-4-20250514");
    let output_path = synthesis["outputPath"].as_str().unwrap();
    assert!(std::path::Path::new(output_path).exists());

    let calls = paths.len() + 1;
    assert_eq!(provider.calls(), calls);

    let budget = ok(&handler, "state", json!({"op": "budget", "sessionId": "doc"})).await;
    assert_eq!(budget["used"]["callsMade"], calls);
    assert_eq!(budget["used"]["tokensUsed"], calls * 120);
    assert_eq!(budget["ok"], true);

    let found = ok(
        &handler,
        "rlm",
        json!({"mode": "search", "sessionId": "doc", "query": "THETA"}),
    )
    .await;
    assert_eq!(found["count"], 1);
}

// ── E2E: Budget enforcement ─────────────────────────────────────────────

#[tokio::test]
async fn e2e_budget_stops_calls_until_raised() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(CountingProvider::new());
    let handler = handler_with(dir.path(), provider.clone(), BudgetLimits::default());

    ok(
        &handler,
        "state",
        json!({"op": "budget", "sessionId": "tight", "budget": {"maxIterations": 1}}),
    )
    .await;

    let first = ok(&handler, "rlm", json!({"mode": "process", "sessionId": "tight", "prompt": "one"})).await;
    assert_eq!(first["budgetExceeded"], false);

    let second = ok(&handler, "rlm", json!({"mode": "process", "sessionId": "tight", "prompt": "two"})).await;
    assert_eq!(second["budgetExceeded"], true);
    assert_eq!(second["reason"], "iterations");
    assert!(second["response"].as_str().unwrap().starts_with("[BUDGET_EXCEEDED]"));
    assert_eq!(provider.calls(), 1);

    let other = ok(&handler, "rlm", json!({"mode": "process", "sessionId": "roomy", "prompt": "x"})).await;
    assert_eq!(other["budgetExceeded"], false);

    ok(
        &handler,
        "state",
        json!({"op": "budget", "sessionId": "tight", "budget": {"max_iterations": 5}}),
    )
    .await;
    let third = ok(&handler, "rlm", json!({"mode": "process", "sessionId": "tight", "prompt": "three"})).await;
    assert_eq!(third["budgetExceeded"], false);
}

#[tokio::test]
async fn e2e_think_chain_and_reset() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(CountingProvider::new());
    let handler = handler_with(dir.path(), provider.clone(), BudgetLimits::default());

    let result = ok(
        &handler,
        "rlm",
        json!({"mode": "think", "sessionId": "t", "pattern": "chain", "input": "Is P = NP?"}),
    )
    .await;
    assert_eq!(result["thoughts"], json!(["reply 1", "reply 2", "reply 3"]));
    assert_eq!(result["conclusion"], "reply 3");
    assert_eq!(result["tokensUsed"], 360);

    let reset = ok(&handler, "state", json!({"op": "reset", "sessionId": "t"})).await;
    assert_eq!(reset["reset"], true);
    let budget = ok(&handler, "state", json!({"op": "budget", "sessionId": "t"})).await;
    assert_eq!(budget["used"]["callsMade"], 0);
}

// ── E2E: Batch fan-out over structured chunks ───────────────────────────

#[tokio::test]
async fn e2e_markdown_chunks_fan_out_in_one_batch() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(CountingProvider::new());
    let handler = handler_with(dir.path(), provider.clone(), BudgetLimits::default());

    let notes = "# Intro\nhello there\n# Usage\nrun it\n# Limits\nnone yet\n";
    ok(&handler, "rlm", json!({"mode": "ingest", "sessionId": "b", "data": notes, "name": "notes.md"})).await;
    let chunks = ok(
        &handler,
        "rlm",
        json!({"mode": "chunk", "sessionId": "b", "path": "input/notes.md", "size": 20, "strategy": "markdown"}),
    )
    .await;
    assert_eq!(chunks["count"], 3);
    assert_eq!(chunks["strategy"], "markdown");

    let batch = ok(
        &handler,
        "rlm",
        json!({
            "mode": "batch",
            "sessionId": "b",
            "prompts": ["Summarize intro.", "Summarize usage.", "Summarize limits."],
            "contextPaths": ["input/notes.md"]
        }),
    )
    .await;
    assert_eq!(batch["completed"], 3);
    assert_eq!(batch["tokensUsed"], 360);
    assert_eq!(batch["results"].as_array().unwrap().len(), 3);
    assert_eq!(provider.calls(), 3);

    let budget = ok(&handler, "state", json!({"op": "budget", "sessionId": "b"})).await;
    assert_eq!(budget["used"]["callsMade"], 3);
}

// ── E2E: Persistence across restarts ────────────────────────────────────

#[tokio::test]
async fn e2e_state_survives_a_new_handler() {
    let dir = tempfile::tempdir().unwrap();

    {
        let handler = handler_with(dir.path(), Arc::new(CountingProvider::new()), BudgetLimits::default());
        ok(&handler, "state", json!({"op": "set", "sessionId": "p", "key": "plan", "value": ["a", "b"]})).await;
        ok(&handler, "rlm", json!({"mode": "process", "sessionId": "p", "prompt": "go"})).await;
    }

    let handler = handler_with(dir.path(), Arc::new(CountingProvider::new()), BudgetLimits::default());
    let entry = ok(&handler, "state", json!({"op": "get", "sessionId": "p", "key": "plan"})).await;
    assert_eq!(entry["value"], json!(["a", "b"]));
    let budget = ok(&handler, "state", json!({"op": "budget", "sessionId": "p"})).await;
    assert_eq!(budget["used"]["tokensUsed"], 120);

    let export = ok(&handler, "state", json!({"op": "export", "sessionId": "p"})).await;
    let doc: Value =
        serde_json::from_str(&std::fs::read_to_string(export["path"].as_str().unwrap()).unwrap()).unwrap();
    assert_eq!(doc["usage"]["callsMade"], 1);
    assert_eq!(doc["scratch"]["plan"], json!(["a", "b"]));
}

// ── E2E: Real adapter against a mock backend ────────────────────────────

async fn spawn_mock(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn e2e_http_gateway_through_anthropic_adapter() {
    let mock = Router::new().route(
        "/v1/messages",
        post(|Json(body): Json<Value>| async move {
            Json(json!({
                "model": body["model"],
                "content": [{"type": "text", "text": "mocked answer"}],
                "usage": {"input_tokens": 1000, "output_tokens": 500}
            }))
        }),
    );
    let base = spawn_mock(mock).await;

    let dir = tempfile::tempdir().unwrap();
    let mut providers = HashMap::new();
    providers.insert(
        "anthropic".to_string(),
        ProviderConfig {
            api_key: Some("sk-ant-e2e".into()),
            api_url: Some(base),
        },
    );
    let config = AppConfig {
        data_dir: dir.path().to_path_buf(),
        providers,
        ..AppConfig::default()
    };
    let orchestrator = Arc::new(Orchestrator::from_config(&config).unwrap());
    let app = rlmgate_gateway::build_router(rlmgate_gateway::GatewayState::new(RequestHandler::new(
        orchestrator,
    )));

    let body = json!({"name": "rlm", "arguments": {"mode": "process", "sessionId": "http", "prompt": "hi"}});
    let req = Request::builder()
        .method("POST")
        .uri("/v1/call")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let reply: ToolReply = serde_json::from_slice(&bytes).unwrap();
    assert!(!reply.is_error, "{}", reply.joined_text());

    let result: Value = serde_json::from_str(&reply.joined_text()).unwrap();
    assert_eq!(result["response"], "mocked answer");
    assert_eq!(result["model"], "claude-sonnet-4-20250514");
    assert_eq!(result["tokensUsed"], 1500);
    // 1000 * $3/M + 500 * $15/M
    let cost = result["cost"].as_f64().unwrap();
    assert!((cost - 0.0105).abs() < 1e-9);
}
