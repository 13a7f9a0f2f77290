//! REST API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use knotwork_core::lenient;
use knotwork_core::selector::parse_limit_str;
use knotwork_core::{
    parse_limit, CandidateBatch, GraphError, GraphResponse, LinkCandidate, Node, ProcessInput,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snapshot::{self, SnapshotInfo};
use crate::ServerState;

/// Source label for candidates posted inline with a request.
const INLINE_SOURCE: &str = "request";

/// Error body is always `{"detail": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

impl From<GraphError> for ApiError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::CacheExpired(_) => ApiError::NotFound(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", e);
        ApiError::Internal(format!("{:#}", e))
    }
}

/// Body of `POST /api/process`. Limits are accepted loosely and clamped later.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    #[serde(default, deserialize_with = "lenient::list")]
    pub nodes: Vec<Node>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub links: Vec<LinkCandidate>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub batches: Vec<CandidateBatch>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub pinned_ids: Vec<String>,
    #[serde(default)]
    pub node_limit: Value,
    #[serde(default)]
    pub link_limit: Value,
}

impl ProcessRequest {
    pub fn into_input(self) -> ProcessInput {
        let mut batches = self.batches;
        if !self.nodes.is_empty() || !self.links.is_empty() {
            batches.push(CandidateBatch {
                source: INLINE_SOURCE.to_string(),
                nodes: self.nodes,
                links: self.links,
                error: None,
            });
        }
        ProcessInput {
            batches,
            pinned_ids: self.pinned_ids,
            node_limit: parse_limit(&self.node_limit),
            link_limit: parse_limit(&self.link_limit),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub node_limit: Option<String>,
    pub link_limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cached_graphs: usize,
    pub workers: usize,
}

/// Merge candidates, cache the canonical graph and return the first view.
pub async fn process(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<GraphResponse>, ApiError> {
    let input = request.into_input();
    let engine = Arc::clone(&state.engine);
    let progress = state.progress();
    let response = state
        .pool
        .submit(move || engine.process(input, &progress))
        .await?;
    Ok(Json(response))
}

/// Re-slice a cached graph with new limits.
pub async fn get_view(
    State(state): State<Arc<ServerState>>,
    Path(cache_id): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<GraphResponse>, ApiError> {
    let node_limit = query.node_limit.as_deref().and_then(parse_limit_str);
    let link_limit = query.link_limit.as_deref().and_then(parse_limit_str);
    let engine = Arc::clone(&state.engine);
    let response = state
        .pool
        .submit(move || engine.view(&cache_id, node_limit, link_limit))
        .await??;
    Ok(Json(response))
}

/// Persist a response verbatim.
pub async fn save_snapshot(
    State(state): State<Arc<ServerState>>,
    Json(response): Json<GraphResponse>,
) -> Result<Json<SnapshotInfo>, ApiError> {
    let info = snapshot::save_snapshot(&state.data_dir, &response)?;
    Ok(Json(info))
}

pub async fn load_snapshot(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<GraphResponse>, ApiError> {
    match snapshot::load_snapshot(&state.data_dir)? {
        Some(response) => Ok(Json(response)),
        None => Err(ApiError::NotFound("no snapshot saved".to_string())),
    }
}

pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_graphs: state.engine.cache().len(),
        workers: state.pool.workers(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_server, state_in};
    use serde_json::json;

    fn sample_body() -> Value {
        json!({
            "nodes": [
                {"id": "https://example.org", "type": "web", "title": "Example"},
                {"id": "ada lovelace", "type": "PERSON", "count": 2}
            ],
            "links": [
                {"source": "https://example.org", "target": "ada lovelace", "relation_type": "MENTIONS_ENTITY"},
                {"source": "https://example.org", "target": "engine", "relation_type": "HAS_CONCEPT", "weight": 2.5}
            ],
            "pinned_ids": ["https://example.org"],
            "node_limit": "150"
        })
    }

    #[test]
    fn test_process_request_folds_inline_candidates() {
        let request: ProcessRequest = serde_json::from_value(sample_body()).unwrap();
        let input = request.into_input();
        assert_eq!(input.batches.len(), 1);
        assert_eq!(input.batches[0].source, INLINE_SOURCE);
        assert_eq!(input.node_limit, Some(150));
        assert_eq!(input.link_limit, None);
    }

    #[tokio::test]
    async fn test_process_accepts_loosely_typed_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let addr = spawn_server(state_in(dir.path())).await;
        let body = json!({
            "nodes": [
                {"id": "ok", "type": "web"},
                {"id": "bad", "val": "10", "type": null},
                17
            ],
            "links": [
                {"source": "ok", "target": "bad", "occurrences": 2.0, "weight": "3"}
            ],
            "pinned_ids": "ok"
        });
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/api/process"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let processed: Value = response.json().await.unwrap();
        let nodes = processed["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["id"], "ok");
        let bad = nodes.iter().find(|n| n["id"] == "bad").unwrap();
        assert_eq!(bad["type"], "unknown");
        assert!(bad["val"].as_f64().unwrap() >= 10.0);
        assert_eq!(processed["links"][0]["occurrences"], 2);
    }

    #[test]
    fn test_cache_miss_maps_to_not_found() {
        let response = ApiError::from(GraphError::CacheExpired("abc".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_process_view_and_expired_view() {
        let dir = tempfile::tempdir().unwrap();
        let addr = spawn_server(state_in(dir.path())).await;
        let client = reqwest::Client::new();

        let processed: Value = client
            .post(format!("http://{addr}/api/process"))
            .json(&sample_body())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(processed["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(processed["meta"]["node_limit"], 150);
        let cache_id = processed["meta"]["cache_id"].as_str().unwrap().to_string();

        let view = client
            .get(format!("http://{addr}/api/graph/{cache_id}?node_limit=abc&link_limit=500"))
            .send()
            .await
            .unwrap();
        assert_eq!(view.status(), reqwest::StatusCode::OK);
        let view: Value = view.json().await.unwrap();
        assert_eq!(view["meta"]["node_limit"], 700);
        assert_eq!(view["meta"]["link_limit"], 500);

        let missing = client
            .get(format!("http://{addr}/api/graph/does-not-exist"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = missing.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("expired"));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let addr = spawn_server(state_in(dir.path())).await;
        let client = reqwest::Client::new();

        let empty = client.get(format!("http://{addr}/api/snapshot")).send().await.unwrap();
        assert_eq!(empty.status(), reqwest::StatusCode::NOT_FOUND);

        let graph = json!({"nodes": [{"id": "a", "title": "A", "type": "concept"}], "links": []});
        let saved: Value = client
            .post(format!("http://{addr}/api/snapshot"))
            .json(&graph)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(saved["node_count"], 1);

        let loaded: Value = client
            .get(format!("http://{addr}/api/snapshot"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(loaded, graph);
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let addr = spawn_server(state_in(dir.path())).await;
        let health: Value = reqwest::get(format!("http://{addr}/api/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["cached_graphs"], 0);
        assert_eq!(health["workers"], 2);
    }
}
