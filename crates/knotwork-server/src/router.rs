//! Axum router setup for the knotwork server

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{
    handlers::{get_view, health_check, load_snapshot, process, save_snapshot},
    websocket::ws_handler,
    ServerState,
};

/// Candidate payloads from large crawls exceed axum's 2 MB default.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Live progress stream
        .route("/ws/logs", get(ws_handler))
        // REST API endpoints
        .route("/api/process", post(process))
        .route("/api/graph/:cache_id", get(get_view))
        .route("/api/snapshot", get(load_snapshot).post(save_snapshot))
        .route("/api/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
