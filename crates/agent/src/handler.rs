//! The single outer request handler shared by every transport.
//!
//! Every failure is caught here and turned into an `isError` reply whose
//! text starts with the error's kind. Nothing propagates past this point.

use std::sync::Arc;

use rlmgate_core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::orchestrator::Orchestrator;
use crate::verbs::{RlmMode, StateOp, VerbTable, rlm_verbs, state_verbs};

/// A `{name, arguments}` request as read from stdio or `POST /v1/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// The uniform reply envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolReply {
    pub content: Vec<TextContent>,
    pub is_error: bool,
}

impl ToolReply {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![TextContent {
                kind: "text".into(),
                text,
            }],
            is_error,
        }
    }

    pub fn success(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(text, false)
    }

    pub fn failure(err: &Error) -> Self {
        Self::text(format!("{}: {err}", err.kind()), true)
    }

    /// Concatenated text of every content block.
    pub fn joined_text(&self) -> String {
        self.content.iter().map(|c| c.text.as_str()).collect()
    }
}

/// Routes `rlm` and `state` requests to their verbs.
pub struct RequestHandler {
    orchestrator: Arc<Orchestrator>,
    rlm: VerbTable<RlmMode>,
    state: VerbTable<StateOp>,
}

impl RequestHandler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            rlm: rlm_verbs(),
            state: state_verbs(),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn handle_call(&self, request: ToolCallRequest) -> ToolReply {
        self.handle(&request.name, request.arguments).await
    }

    /// Run one request to completion. Never fails.
    pub async fn handle(&self, name: &str, arguments: Value) -> ToolReply {
        match self.dispatch(name, arguments).await {
            Ok(value) => ToolReply::success(&value),
            Err(err) => {
                warn!(tool = name, kind = %err.kind(), error = %err, "Request failed");
                ToolReply::failure(&err)
            }
        }
    }

    async fn dispatch(&self, name: &str, arguments: Value) -> Result<Value> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            Value::Object(_) => arguments,
            _ => return Err(Error::validation("arguments must be an object")),
        };

        let (verb, selector) = match name {
            "rlm" => {
                let mode = selector_field(&arguments, "mode")?;
                (self.rlm.get(mode.parse::<RlmMode>()?)?, mode)
            }
            "state" => {
                let op = selector_field(&arguments, "op")?;
                (self.state.get(op.parse::<StateOp>()?)?, op)
            }
            other => {
                return Err(Error::validation(format!(
                    "unknown tool '{other}' (expected rlm or state)"
                )));
            }
        };

        let session_id = if verb.needs_session() {
            session_id(&arguments)?
        } else {
            String::new()
        };

        debug!(tool = name, verb = %selector, session = %session_id, "Dispatching");
        verb.run(&self.orchestrator, &session_id, arguments).await
    }
}

fn selector_field(arguments: &Value, field: &str) -> Result<String> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::validation(format!("{field} is required")))
}

fn session_id(arguments: &Value) -> Result<String> {
    arguments
        .get("sessionId")
        .or_else(|| arguments.get("session_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::validation("sessionId is required"))
}
