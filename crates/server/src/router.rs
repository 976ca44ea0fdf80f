//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new().allow_origin(value).allow_methods(Any).allow_headers(Any),
        Err(_) => {
            warn!(origin, "Invalid CORS origin, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);
    Router::new()
        .route("/health", get(api::health))
        .route("/api/chat", post(api::chat))
        .route("/api/experiments", get(api::experiments))
        .layer(cors)
        .with_state(state)
}
