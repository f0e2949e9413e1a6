//! Default routes for the standalone binary.
//!
//! Routing is the embedder's business; these exist so the binary serves
//! something observable while it waits for a signal.

use std::time::Duration;

use axum::{
    http::{Method, Uri},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::TimeoutConfig;

/// Build the router with tracing and request-timeout middleware.
#[allow(deprecated)]
pub fn build_router(timeouts: &TimeoutConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(echo)
        .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn echo(method: Method, uri: Uri) -> Json<Value> {
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
    }))
}
