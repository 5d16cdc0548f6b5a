//! HTTP transport for rlmgate.
//!
//! Exposes a health check and the `/v1` tool routes over the shared
//! [`RequestHandler`]. Built on Axum.

pub mod api_v1;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get};
use rlmgate_agent::{Orchestrator, RequestHandler};
use serde::Serialize;
use tracing::info;

/// Ingested documents arrive in request bodies.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub handler: RequestHandler,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(handler: RequestHandler) -> SharedState {
        Arc::new(Self { handler })
    }
}

/// Build the full router: `/health` plus the nested `/v1` API.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn start(config: rlmgate_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    let state = GatewayState::new(RequestHandler::new(orchestrator));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, data_dir = %config.data_dir.display(), "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use rlmgate_agent::ToolReply;
    use rlmgate_config::AppConfig;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_app(dir: &std::path::Path) -> Router {
        let config = AppConfig {
            data_dir: dir.to_path_buf(),
            ..AppConfig::default()
        };
        let orchestrator = Arc::new(Orchestrator::from_config(&config).unwrap());
        build_router(GatewayState::new(RequestHandler::new(orchestrator)))
    }

    async fn post(app: Router, uri: &str, body: impl Into<Body>) -> (StatusCode, ToolReply) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn body_json(reply: &ToolReply) -> Value {
        serde_json::from_str(&reply.joined_text()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = test_app(dir.path()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn models_route_lists_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/v1/models").body(Body::empty()).unwrap();
        let response = test_app(dir.path()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let reply: ToolReply = serde_json::from_slice(&bytes).unwrap();
        assert!(!reply.is_error);
        assert_eq!(body_json(&reply)["readyBackends"], json!(["ollama"]));
    }

    #[tokio::test]
    async fn state_round_trip_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let set = json!({"op": "set", "sessionId": "web", "key": "n", "value": "v"});
        let (status, reply) = post(app.clone(), "/v1/tools/state", set.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!reply.is_error);

        let get = json!({"name": "state", "arguments": {"op": "get", "sessionId": "web", "key": "n"}});
        let (_, reply) = post(app, "/v1/call", get.to_string()).await;
        assert_eq!(body_json(&reply)["value"], "v");
    }

    #[tokio::test]
    async fn failures_are_200_with_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let (status, reply) = post(app.clone(), "/v1/tools/state", "{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(reply.is_error);
        assert!(reply.joined_text().starts_with("validation error"));

        let process = json!({"mode": "process", "sessionId": "web", "prompt": "hi"});
        let (status, reply) = post(app, "/v1/tools/rlm", process.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(reply.is_error);
        assert!(reply.joined_text().starts_with("configuration error"));
        assert!(reply.joined_text().contains("ANTHROPIC_API_KEY"));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/v2/anything").body(Body::empty()).unwrap();
        let response = test_app(dir.path()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
