//! reqmon server library logic.

pub mod api;
pub mod api_logs;
pub mod config;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use reqmon_log::RequestMonitor;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The request log and its connection pool.
    pub monitor: RequestMonitor,
    /// Bearer token guarding `/api`. `None` leaves the routes open.
    pub admin_token: Option<String>,
}

/// Maximum request body size. Ingest payloads are a single request descriptor.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/ingest", post(api_logs::ingest_handler))
        .route(
            "/api/logs",
            get(api_logs::search_handler).delete(api_logs::clear_handler),
        )
        .route("/api/logs/{id}", get(api_logs::details_handler))
        .layer(axum::middleware::from_fn(middleware::admin_token_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
