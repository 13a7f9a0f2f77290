//! Processing facade: merge → cache → select → analyze

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analytics::{analyze, Insights};
use crate::cache::{GraphCache, GraphCacheEntry};
use crate::config::EngineConfig;
use crate::error::GraphError;
use crate::merge::GraphIndex;
use crate::model::{CandidateBatch, Link, Node, NodeKind};
use crate::selector::{select_subset, SelectionSummary};

/// Receives human-readable progress lines while a request runs.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _message: &str) {}
}

/// One processing request: completed collaborator batches plus view limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessInput {
    #[serde(default)]
    pub batches: Vec<CandidateBatch>,
    /// Nodes that must stay visible; derived from the batches when empty.
    #[serde(default)]
    pub pinned_ids: Vec<String>,
    #[serde(default)]
    pub node_limit: Option<i64>,
    #[serde(default)]
    pub link_limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub cache_id: String,
    #[serde(flatten)]
    pub selection: SelectionSummary,
    pub node_step: usize,
    pub link_step: usize,
}

/// A decorated view, serializable verbatim to a snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphResponse {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<Insights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

/// Owns the process-wide graph cache. Construct once and share behind an `Arc`.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    cache: GraphCache,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = GraphCache::new(config.cache.capacity);
        Engine { config, cache }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &GraphCache {
        &self.cache
    }

    /// Merge every batch into a canonical graph, cache it and return the first view.
    pub fn process(&self, input: ProcessInput, progress: &dyn ProgressSink) -> GraphResponse {
        let started = Instant::now();
        progress.report(&format!("Merging {} candidate batches", input.batches.len()));

        let batch_sources: Vec<String> = input
            .batches
            .iter()
            .filter(|batch| batch.error.is_none())
            .map(|batch| batch.source.trim().to_string())
            .collect();
        let mut index = GraphIndex::new();
        let stats = index.ingest(input.batches);
        let graph = index.finalize();
        info!(
            "Merged {} nodes and {} links ({} batches, {} skipped, {} candidates dropped)",
            graph.nodes.len(),
            graph.links.len(),
            stats.batches,
            stats.skipped_batches,
            stats.nodes_dropped + stats.links_dropped
        );
        progress.report(&format!(
            "Merged {} nodes and {} links",
            graph.nodes.len(),
            graph.links.len()
        ));

        let pinned_ids = if input.pinned_ids.is_empty() {
            derive_pinned_ids(&batch_sources, &graph.nodes)
        } else {
            input.pinned_ids
        };
        let entry = Arc::new(GraphCacheEntry {
            nodes: graph.nodes,
            links: graph.links,
            pinned_ids,
        });
        let cache_id = self.cache.insert(Arc::clone(&entry));

        progress.report("Computing graph analytics");
        let response = self.render(&entry, cache_id, input.node_limit, input.link_limit);
        info!("Processed request in {:?}", started.elapsed());
        progress.report("Graph ready");
        response
    }

    /// Re-derive a view from a cached canonical graph.
    pub fn view(
        &self,
        cache_id: &str,
        node_limit: Option<i64>,
        link_limit: Option<i64>,
    ) -> Result<GraphResponse, GraphError> {
        let entry = self.cache.get(cache_id)?;
        Ok(self.render(&entry, cache_id.to_string(), node_limit, link_limit))
    }

    fn render(
        &self,
        entry: &GraphCacheEntry,
        cache_id: String,
        node_limit: Option<i64>,
        link_limit: Option<i64>,
    ) -> GraphResponse {
        let selection = &self.config.selection;
        let view = select_subset(
            &entry.nodes,
            &entry.links,
            &entry.pinned_ids,
            node_limit,
            link_limit,
            selection,
        );
        let mut nodes = view.nodes;
        let insights = analyze(&mut nodes, &view.links, &self.config.analytics);

        GraphResponse {
            nodes,
            links: view.links,
            insights: Some(insights),
            meta: Some(ResponseMeta {
                cache_id,
                selection: view.summary,
                node_step: selection.node_step,
                link_step: selection.link_step,
            }),
        }
    }
}

/// Pins for a request that named none: each successful batch's own source
/// node, then every source-document node, in first-seen order.
pub fn derive_pinned_ids(batch_sources: &[String], nodes: &[Node]) -> Vec<String> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let documents = nodes
        .iter()
        .filter(|n| n.kind() == NodeKind::SourceDocument)
        .map(|n| n.id.as_str());
    let mut seen = HashSet::new();
    batch_sources
        .iter()
        .map(String::as_str)
        .filter(|source| known.contains(source))
        .chain(documents)
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkCandidate;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ProgressSink for Recorder {
        fn report(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    fn input() -> ProcessInput {
        ProcessInput {
            batches: vec![CandidateBatch {
                source: "unit".into(),
                nodes: vec![Node::new("doc", "web").with_title("Doc")],
                links: vec![
                    LinkCandidate::new("doc", "alpha", "HAS_CONCEPT"),
                    LinkCandidate::new("doc", "beta", "HAS_CONCEPT"),
                ],
                error: None,
            }],
            pinned_ids: vec!["doc".into()],
            ..ProcessInput::default()
        }
    }

    #[test]
    fn test_process_then_view() {
        let engine = Engine::new(EngineConfig::default());
        let recorder = Recorder::default();
        let response = engine.process(input(), &recorder);

        assert_eq!(response.nodes.len(), 3);
        assert_eq!(response.links.len(), 2);
        let meta = response.meta.as_ref().unwrap();
        assert_eq!(meta.node_step, 300);
        assert_eq!(meta.selection.node_limit, 700);
        assert!(!meta.selection.truncated);
        assert!(recorder.0.lock().iter().any(|m| m == "Graph ready"));

        let again = engine.view(&meta.cache_id, Some(150), None).unwrap();
        assert_eq!(again.nodes.len(), 3);
        assert_eq!(again.meta.unwrap().selection.node_limit, 150);
    }

    #[test]
    fn test_pins_derived_from_sources_and_documents() {
        let nodes = vec![
            Node::new("topic", "concept"),
            Node::new("notes.pdf", "file"),
            Node::new("https://example.org", "web"),
        ];
        let sources = vec![
            "https://example.org".to_string(),
            "request".to_string(),
            "https://example.org".to_string(),
        ];
        assert_eq!(
            derive_pinned_ids(&sources, &nodes),
            vec!["https://example.org", "notes.pdf"]
        );
    }

    #[test]
    fn test_source_document_survives_tight_limit_without_pins() {
        let mut config = EngineConfig::default();
        config.selection.nodes.min = 1;
        let engine = Engine::new(config);

        let mut nodes = vec![Node::new("https://example.org/about", "web")];
        let mut links = Vec::new();
        // A dense block of people that outranks the page on interest.
        for i in 0..8 {
            let mut person = Node::new(format!("person {i}"), "PERSON");
            person.count = Some(50.0);
            nodes.push(person);
            for j in 0..i {
                let link = LinkCandidate::new(format!("person {i}"), format!("person {j}"), "CO_OCCURS_IN_SENTENCE");
                links.push(link.with_weight(5.0));
            }
        }
        links.push(LinkCandidate::new("https://example.org/about", "topic", "HAS_CONCEPT"));
        let input = ProcessInput {
            batches: vec![CandidateBatch {
                source: "request".into(),
                nodes,
                links,
                error: None,
            }],
            node_limit: Some(3),
            ..ProcessInput::default()
        };

        let response = engine.process(input, &NoProgress);
        assert!(response.nodes.iter().any(|n| n.id == "https://example.org/about"));
        let cache_id = response.meta.unwrap().cache_id;
        let entry = engine.cache().get(&cache_id).unwrap();
        assert_eq!(entry.pinned_ids, vec!["https://example.org/about"]);
    }

    #[test]
    fn test_view_of_unknown_id_expires() {
        let engine = Engine::new(EngineConfig::default());
        let err = engine.view("missing", None, None).unwrap_err();
        assert!(matches!(err, GraphError::CacheExpired(_)));
    }

    #[test]
    fn test_meta_flattens_selection_summary() {
        let engine = Engine::new(EngineConfig::default());
        let response = engine.process(input(), &NoProgress);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["meta"]["visible_nodes"], 3);
        assert_eq!(json["meta"]["link_step"], 1200);
        let back: GraphResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back.meta, response.meta);
        assert_eq!(back.nodes.len(), response.nodes.len());
    }
}
