//! `/v1` routes.
//!
//! Every route answers HTTP 200 with the uniform `{content, isError}` reply;
//! failures are reported inside the body, never through the status code.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    response::Json,
    routing::{get, post},
};
use rlmgate_agent::{ToolCallRequest, ToolReply};
use rlmgate_core::Error;
use serde_json::{Value, json};
use tracing::info;

use crate::SharedState;

/// Build the `/v1` router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/models", get(models_handler))
        .route("/tools/{name}", post(tool_handler))
        .route("/call", post(call_handler))
        .with_state(state)
}

/// An empty body counts as `{}`; anything else must be JSON.
fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| Error::validation(format!("malformed request body: {e}")))
}

async fn models_handler(State(state): State<SharedState>) -> Json<ToolReply> {
    Json(state.handler.handle("rlm", json!({ "mode": "models" })).await)
}

async fn tool_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Json<ToolReply> {
    info!(tool = %name, bytes = body.len(), "Tool request");
    let reply = match parse_body::<Value>(&body) {
        Ok(arguments) => state.handler.handle(&name, arguments).await,
        Err(e) => ToolReply::failure(&e),
    };
    Json(reply)
}

async fn call_handler(State(state): State<SharedState>, body: Bytes) -> Json<ToolReply> {
    let reply = match parse_body::<ToolCallRequest>(&body) {
        Ok(request) => {
            info!(tool = %request.name, "Call request");
            state.handler.handle_call(request).await
        }
        Err(e) => ToolReply::failure(&e),
    };
    Json(reply)
}
