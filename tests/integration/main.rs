//! Integration tests for Knotwork
//!
//! These tests verify that the engine, server pieces and CLI work together.

use std::process::Command;
use std::sync::Arc;

use knotwork_core::{
    CandidateBatch, Engine, EngineConfig, GraphError, GraphResponse, LinkCandidate, Node, NoProgress,
    ProcessInput,
};
use knotwork_server::snapshot::{load_snapshot, save_snapshot};
use knotwork_server::sources::{gather, FactSource, JsonFileSource};
use knotwork_server::worker_pool::WorkerPool;
use serde_json::json;
use tempfile::TempDir;

/// A crawled page, a document, and entities both of them mention.
fn crawl_batches() -> Vec<CandidateBatch> {
    let page = CandidateBatch {
        source: "https://example.org/engines".into(),
        nodes: vec![
            Node::new("https://example.org/engines", "web").with_title("Analytical engines"),
            Node::new("ada lovelace", "PERSON").with_title("Ada Lovelace"),
            Node::new("charles babbage", "PERSON"),
        ],
        links: vec![
            LinkCandidate::new("https://example.org/engines", "ada lovelace", "MENTIONS_ENTITY"),
            LinkCandidate::new("https://example.org/engines", "charles babbage", "MENTIONS_ENTITY"),
            LinkCandidate::new("ada lovelace", "charles babbage", "CO_OCCURS_IN_SENTENCE"),
        ],
        error: None,
    };
    let document = CandidateBatch {
        source: "notes.pdf".into(),
        nodes: vec![Node::new("notes.pdf", "file"), Node::new("ada lovelace", "PERSON")],
        links: vec![
            LinkCandidate::new("notes.pdf", "ada lovelace", "MENTIONS_ENTITY"),
            LinkCandidate::new("ada lovelace", "charles babbage", "CO_OCCURS_IN_SENTENCE"),
            LinkCandidate::new("notes.pdf", "https://example.org/engines", "LINKS_TO_EXTERNAL"),
        ],
        error: None,
    };
    let failed = CandidateBatch {
        source: "https://example.org/timeout".into(),
        error: Some("request timed out".into()),
        ..CandidateBatch::default()
    };
    vec![page, document, failed]
}

fn crawl_input() -> ProcessInput {
    ProcessInput {
        batches: crawl_batches(),
        pinned_ids: vec!["https://example.org/engines".into(), "notes.pdf".into()],
        ..ProcessInput::default()
    }
}

#[test]
fn test_process_view_expire_flow() {
    let engine = Engine::new(EngineConfig::default());
    let response = engine.process(crawl_input(), &NoProgress);

    assert_eq!(response.nodes.len(), 4);
    // The repeated co-occurrence merged into one edge.
    assert_eq!(response.links.len(), 5);
    let co = response
        .links
        .iter()
        .find(|l| l.relation_type == "CO_OCCURS_IN_SENTENCE")
        .unwrap();
    assert_eq!(co.occurrences, 2);

    let babbage = response.nodes.iter().find(|n| n.id == "charles babbage").unwrap();
    assert_eq!(babbage.title, "charles babbage");
    assert!(babbage.val.unwrap() >= 1.0);

    let insights = response.insights.as_ref().unwrap();
    assert_eq!(insights.graph_stats.node_count, 4);
    assert_eq!(insights.relation_distribution[0].relation_type, "MENTIONS_ENTITY");
    assert_eq!(insights.relation_distribution[0].count, 3);

    let cache_id = response.meta.as_ref().unwrap().cache_id.clone();
    let view = engine.view(&cache_id, Some(200), Some(300)).unwrap();
    assert_eq!(view.nodes.len(), 4);
    assert_eq!(view.meta.unwrap().selection.link_limit, 300);

    for _ in 0..EngineConfig::default().cache.capacity {
        engine.process(crawl_input(), &NoProgress);
    }
    assert!(matches!(
        engine.view(&cache_id, None, None),
        Err(GraphError::CacheExpired(_))
    ));
}

#[tokio::test]
async fn test_sources_pool_and_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let mut paths = Vec::new();
    for (i, batch) in crawl_batches().into_iter().take(2).enumerate() {
        let path = temp_dir.path().join(format!("batch-{i}.json"));
        std::fs::write(&path, serde_json::to_string(&batch).unwrap()).unwrap();
        paths.push(path);
    }
    let mut sources: Vec<Box<dyn FactSource>> = paths
        .iter()
        .map(|p| Box::new(JsonFileSource::new(p)) as Box<dyn FactSource>)
        .collect();
    sources.push(Box::new(JsonFileSource::new(temp_dir.path().join("absent.json"))));

    let batches = gather(&sources, &NoProgress).await;
    assert_eq!(batches.iter().filter(|b| b.error.is_some()).count(), 1);

    let pool = WorkerPool::new(2, 4).unwrap();
    let engine = Arc::new(Engine::new(EngineConfig::default()));
    let input = ProcessInput {
        batches,
        ..ProcessInput::default()
    };
    let worker_engine = Arc::clone(&engine);
    let response = pool
        .submit(move || worker_engine.process(input, &NoProgress))
        .await
        .unwrap();
    assert_eq!(response.nodes.len(), 4);

    let data_dir = temp_dir.path().join("data");
    save_snapshot(&data_dir, &response).unwrap();
    let loaded: GraphResponse = load_snapshot(&data_dir).unwrap().unwrap();
    assert_eq!(loaded.meta, response.meta);
    assert_eq!(loaded.links.len(), response.links.len());
}

#[test]
fn test_cli_build_writes_response() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("facts.json");
    let output = temp_dir.path().join("graph.json");
    std::fs::write(
        &input,
        json!({
            "nodes": [{"id": "doc", "type": "file", "title": "Doc"}],
            "links": [
                {"source": "doc", "target": "alpha", "relation_type": "HAS_CONCEPT"},
                {"source": "doc", "target": "beta", "relation_type": "HAS_CONCEPT", "weight": 3}
            ]
        })
        .to_string(),
    )
    .unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_knotwork"))
        .current_dir(temp_dir.path())
        .arg("build")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .arg("--pin")
        .arg("doc")
        .status()
        .expect("Failed to run knotwork");
    assert!(status.success());

    let response: GraphResponse =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(response.nodes.len(), 3);
    assert_eq!(response.nodes[0].id, "doc");
    assert!(response.meta.is_some());
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_knotwork"))
        .arg("version")
        .output()
        .expect("Failed to run knotwork");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Knotwork v"));
}
