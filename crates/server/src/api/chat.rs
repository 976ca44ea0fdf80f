//! Single-turn chat endpoint.
//!
//! The model answers in the JSON response format. A requested tool runs once
//! and its (shortened) result becomes the reply; there is no multi-step loop.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use super::{api_error, ApiError};
use crate::state::AppState;

const RESULT_PREVIEW_CHARS: usize = 200;
const OFFLINE_REPLY: &str = "Offline mode.";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCallInfo {
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
    pub tool_call: Option<ToolCallInfo>,
}

fn preview(text: &str) -> String {
    text.chars().take(RESULT_PREVIEW_CHARS).collect()
}

/// Positional tool arguments from a `tool_args` field.
fn tool_args(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(scalar) => vec![scalar.clone()],
    }
}

pub async fn chat(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<ChatResponse>, ApiError> {
    let message = serde_json::from_slice::<ChatRequest>(&body)
        .ok()
        .and_then(|req| req.message)
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No message"))?;

    if state.offline {
        return Ok(Json(ChatResponse { response: OFFLINE_REPLY.to_string(), tool_call: None }));
    }

    let raw = state.gateway().try_send(&message).await.map_err(|e| {
        error!(error = %e, "Chat model call failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let obj = match serde_json::from_str::<Value>(keaa_agent::strip_code_fence(&raw)) {
        Ok(Value::Object(obj)) => obj,
        _ => {
            warn!("Chat reply is not a JSON object, returning it verbatim");
            return Ok(Json(ChatResponse { response: raw, tool_call: None }));
        }
    };

    if let Some(Value::String(name)) = obj.get("tool_name").filter(|v| v.as_str().is_some_and(|s| !s.is_empty())) {
        let args = tool_args(obj.get("tool_args"));
        info!(tool = %name, args = args.len(), "Chat tool call");

        let result = match state.dispatcher.dispatch_values(name, args.clone()).await {
            Ok(output) => output.content,
            Err(e) => {
                warn!(tool = %name, kind = e.kind(), error = %e, "Chat tool call failed");
                e.to_observation()
            }
        };

        return Ok(Json(ChatResponse {
            response: format!("Executed {name}. Result: {}...", preview(&result)),
            tool_call: Some(ToolCallInfo { name: name.clone(), args: Value::Array(args) }),
        }));
    }

    let response = match obj.get("final_answer") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    Ok(Json(ChatResponse { response, tool_call: None }))
}
