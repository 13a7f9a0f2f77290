//! Core data structures for the knowledge graph

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relation tag used when a link candidate does not name one.
pub const DEFAULT_RELATION: &str = "RELATED_TO";

/// Type tag used when a node candidate does not name one.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Open extension attributes carried through merge and serialization.
pub type Extra = BTreeMap<String, Value>;

/// A single node in the knowledge graph.
///
/// Raw node candidates deserialize into this same shape; only `id` is
/// required to be non-empty, everything else is filled in by the merge engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub title: String,
    #[serde(rename = "type", default, deserialize_with = "crate::lenient::string")]
    pub node_type: String,

    // ── Numeric hints ───────────────────────────────────────
    #[serde(default, deserialize_with = "crate::lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub val: Option<f64>,
    #[serde(default, deserialize_with = "crate::lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "crate::lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub count: Option<f64>,

    // ── Analytics (set only by the analytics engine) ────────
    #[serde(default, deserialize_with = "crate::lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub degree_centrality: Option<f64>,
    #[serde(default, deserialize_with = "crate::lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub betweenness: Option<f64>,
    #[serde(default, deserialize_with = "crate::lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub pagerank: Option<f64>,
    #[serde(default, deserialize_with = "crate::lenient::opt_usize", skip_serializing_if = "Option::is_none")]
    pub community: Option<usize>,

    // ── Text ────────────────────────────────────────────────
    #[serde(default, deserialize_with = "crate::lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "crate::lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(default, deserialize_with = "crate::lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
    #[serde(default, deserialize_with = "crate::lenient::opt_usize", skip_serializing_if = "Option::is_none")]
    pub text_length: Option<usize>,

    #[serde(default, deserialize_with = "crate::lenient::string_list", skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Node {
    /// Minimal node with just an id and a type tag.
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            node_type: node_type.into(),
            ..Node::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::classify(&self.node_type)
    }

    /// Title for display, never empty.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() { &self.id } else { &self.title }
    }
}

/// Coarse classification of a node's open type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Scraped page, uploaded file or parsed document.
    SourceDocument,
    Person,
    Organization,
    /// Any other named-entity subtype (places, events, products, works).
    NamedEntity,
    Concept,
    ExternalReference,
    Unknown,
    Other,
}

impl NodeKind {
    pub fn classify(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "web" | "file" | "document" | "pdf" | "docx" | "xlsx" | "html" | "xml" => {
                NodeKind::SourceDocument
            }
            "person" => NodeKind::Person,
            "org" | "organization" => NodeKind::Organization,
            "gpe" | "loc" | "event" | "product" | "work_of_art" | "norp" | "fac" => {
                NodeKind::NamedEntity
            }
            "concept" => NodeKind::Concept,
            "external" => NodeKind::ExternalReference,
            "" | UNKNOWN_TYPE => NodeKind::Unknown,
            _ => NodeKind::Other,
        }
    }
}

/// A raw link candidate as produced by an extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkCandidate {
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub source: String,
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub target: String,
    #[serde(default, deserialize_with = "crate::lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
    #[serde(default, deserialize_with = "crate::lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default, deserialize_with = "crate::lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "crate::lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "crate::lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub occurrences: Option<u32>,
    #[serde(default, deserialize_with = "crate::lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub source_doc: Option<String>,
    #[serde(default, deserialize_with = "crate::lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub anchor_text: Option<String>,
    #[serde(default, deserialize_with = "crate::lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub evidence_sentence: Option<String>,
    #[serde(default, deserialize_with = "crate::lenient::string_list", skip_serializing_if = "Vec::is_empty")]
    pub evidence_sentences: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl LinkCandidate {
    pub fn new(source: impl Into<String>, target: impl Into<String>, relation: impl Into<String>) -> Self {
        LinkCandidate {
            source: source.into(),
            target: target.into(),
            relation_type: Some(relation.into()),
            ..LinkCandidate::default()
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Identity of a canonical link: (source, target, relation, predicate-or-empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkKey {
    pub source: String,
    pub target: String,
    pub relation_type: String,
    pub predicate: String,
}

/// A canonical, accumulated directed link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    #[serde(default = "default_relation")]
    pub relation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub occurrences: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_docs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_sentences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_sentence: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

fn default_relation() -> String {
    DEFAULT_RELATION.to_string()
}

impl Link {
    /// Bare link with identity fields set and accumulators at zero.
    pub fn new(source: impl Into<String>, target: impl Into<String>, relation: impl Into<String>) -> Self {
        Link {
            source: source.into(),
            target: target.into(),
            relation_type: relation.into(),
            predicate: None,
            weight: 0.0,
            confidence: 0.0,
            occurrences: 0,
            source_docs: Vec::new(),
            evidence_sentences: Vec::new(),
            anchor_text: None,
            evidence_sentence: None,
            extra: Extra::new(),
        }
    }

    pub fn key(&self) -> LinkKey {
        LinkKey {
            source: self.source.clone(),
            target: self.target.clone(),
            relation_type: self.relation_type.clone(),
            predicate: self.predicate.clone().unwrap_or_default(),
        }
    }
}

/// One collaborator's completed contribution of candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateBatch {
    /// Where the candidates came from (URL, file name, "request", ...).
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub source: String,
    #[serde(default, deserialize_with = "crate::lenient::list")]
    pub nodes: Vec<Node>,
    #[serde(default, deserialize_with = "crate::lenient::list")]
    pub links: Vec<LinkCandidate>,
    /// Set when the collaborator failed; the batch is then skipped.
    #[serde(default, deserialize_with = "crate::lenient::opt_message", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The fully merged, deduplicated node/link set of one processing request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalGraph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}
