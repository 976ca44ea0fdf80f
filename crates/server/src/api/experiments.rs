//! Experiment log listing.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use super::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize, PartialEq)]
pub struct ExperimentSummary {
    pub name: String,
    pub status: String,
}

fn field_or(entry: &Value, key: &str, default: impl FnOnce() -> String) -> String {
    match entry.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default(),
        Some(other) => other.to_string(),
    }
}

/// `{name, status}` per logged entry; unnamed entries are numbered from 1.
pub fn summarize(entries: &[Value]) -> Vec<ExperimentSummary> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| ExperimentSummary {
            name: field_or(entry, "name", || format!("experiment-{}", i + 1)),
            status: field_or(entry, "status", || "logged".to_string()),
        })
        .collect()
}

pub async fn experiments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ExperimentSummary>>, ApiError> {
    let log = state.experiments.clone();
    let entries = tokio::task::spawn_blocking(move || log.read_entries())
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            error!(error = %e, "Failed to read experiment log");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok(Json(summarize(&entries)))
}
