//! Merge engine: reconciles repeated observations into canonical records
//!
//! Node fields are merged under a declarative field-name → policy table that
//! covers typed fields and open extension fields alike. Links are keyed by
//! (source, target, relation, predicate) and accumulate repeated observations.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::MergeError;
use crate::model::*;

pub const ALIAS_CAP: usize = 8;
pub const LIST_FIELD_CAP: usize = 8;
pub const LINK_SOURCE_DOC_CAP: usize = 10;
pub const LINK_EVIDENCE_CAP: usize = 6;
pub const EVIDENCE_CHAR_LIMIT: usize = 320;
pub const PREVIEW_CHAR_LIMIT: usize = 400;
pub const STORED_TEXT_CHAR_LIMIT: usize = 1200;

const DEFAULT_LINK_WEIGHT: f64 = 1.0;
const DEFAULT_LINK_CONFIDENCE: f64 = 0.5;
const MIN_LINK_WEIGHT: f64 = 0.1;

/// How a field reconciles an incoming value with the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Numeric addition, rounded to 5 decimals.
    Sum,
    /// Keep the larger value.
    Max,
    /// Case-insensitive, trimmed, order-preserving union.
    ListUnion { cap: usize },
    /// Keep the longer string.
    Longest,
    /// Longer wins unless the existing title is empty or the raw id.
    Title,
    /// Overwrite only when the existing value is missing, empty or zero.
    FirstWins,
}

/// Field policies for node records. Fields not listed are `FirstWins`.
pub const NODE_MERGE_POLICY: &[(&str, MergePolicy)] = &[
    ("count", MergePolicy::Sum),
    ("occurrences", MergePolicy::Sum),
    ("mentions", MergePolicy::Sum),
    ("val", MergePolicy::Max),
    ("confidence", MergePolicy::Max),
    ("relevance", MergePolicy::Max),
    ("degree_centrality", MergePolicy::Max),
    ("betweenness", MergePolicy::Max),
    ("pagerank", MergePolicy::Max),
    ("aliases", MergePolicy::ListUnion { cap: ALIAS_CAP }),
    ("source_docs", MergePolicy::ListUnion { cap: LIST_FIELD_CAP }),
    ("evidence_sentences", MergePolicy::ListUnion { cap: LIST_FIELD_CAP }),
    ("text", MergePolicy::Longest),
    ("full_text", MergePolicy::Longest),
    ("title", MergePolicy::Title),
];

pub fn policy_for(field: &str) -> MergePolicy {
    NODE_MERGE_POLICY
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, policy)| *policy)
        .unwrap_or(MergePolicy::FirstWins)
}

/// Per-request merge state: canonical node and link indexes in first-seen order.
#[derive(Debug, Default)]
pub struct GraphIndex {
    nodes: Vec<Node>,
    node_pos: HashMap<String, usize>,
    links: Vec<Link>,
    link_pos: HashMap<LinkKey, usize>,
}

/// Counts reported by [`GraphIndex::ingest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub batches: usize,
    pub skipped_batches: usize,
    pub nodes_accepted: usize,
    pub nodes_dropped: usize,
    pub links_accepted: usize,
    pub links_dropped: usize,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_pos.get(id).map(|&pos| &self.nodes[pos])
    }

    pub fn link(&self, key: &LinkKey) -> Option<&Link> {
        self.link_pos.get(key).map(|&pos| &self.links[pos])
    }

    /// Insert a node candidate or merge it into the existing record.
    pub fn upsert_node(&mut self, mut candidate: Node) -> Result<(), MergeError> {
        candidate.id = candidate.id.trim().to_string();
        if candidate.id.is_empty() {
            return Err(MergeError::MissingNodeId);
        }
        if candidate.title.trim().is_empty() {
            candidate.title = candidate.id.clone();
        }
        if candidate.node_type.trim().is_empty() {
            candidate.node_type = UNKNOWN_TYPE.to_string();
        }

        match self.node_pos.get(&candidate.id) {
            Some(&pos) => merge_node(&mut self.nodes[pos], candidate),
            None => {
                self.node_pos.insert(candidate.id.clone(), self.nodes.len());
                self.nodes.push(candidate);
            }
        }
        Ok(())
    }

    /// Accumulate a link candidate into its canonical edge.
    pub fn register_link(&mut self, candidate: LinkCandidate) -> Result<(), MergeError> {
        let source = candidate.source.trim();
        let target = candidate.target.trim();
        if source.is_empty() || target.is_empty() {
            return Err(MergeError::MissingEndpoint);
        }
        if source == target {
            return Err(MergeError::SelfLoop(source.to_string()));
        }

        let relation_type = candidate
            .relation_type
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_RELATION)
            .to_string();
        let predicate = candidate
            .predicate
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let key = LinkKey {
            source: source.to_string(),
            target: target.to_string(),
            relation_type: relation_type.clone(),
            predicate: predicate.clone().unwrap_or_default(),
        };
        let confidence = clamp_confidence(candidate.confidence.unwrap_or(DEFAULT_LINK_CONFIDENCE));

        let pos = match self.link_pos.get(&key) {
            Some(&pos) => pos,
            None => {
                let mut link = Link::new(source, target, relation_type);
                link.predicate = predicate;
                link.confidence = confidence;
                self.link_pos.insert(key, self.links.len());
                self.links.push(link);
                self.links.len() - 1
            }
        };
        let link = &mut self.links[pos];

        let weight = candidate.weight.filter(|w| w.is_finite()).unwrap_or(DEFAULT_LINK_WEIGHT);
        link.weight += weight.max(MIN_LINK_WEIGHT);
        link.occurrences = link
            .occurrences
            .saturating_add(candidate.occurrences.unwrap_or(1).max(1));
        link.confidence = link.confidence.max(confidence);

        if let Some(doc) = candidate.source_doc.as_deref() {
            push_unique(&mut link.source_docs, doc.trim(), LINK_SOURCE_DOC_CAP);
        }
        for sentence in candidate
            .evidence_sentences
            .iter()
            .chain(candidate.evidence_sentence.iter())
        {
            let trimmed = truncate_chars(sentence.trim(), EVIDENCE_CHAR_LIMIT);
            push_unique(&mut link.evidence_sentences, &trimmed, LINK_EVIDENCE_CAP);
        }
        if link.anchor_text.is_none() {
            link.anchor_text = candidate
                .anchor_text
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string);
        }
        for (field, value) in candidate.extra {
            let slot = link.extra.entry(field).or_insert(Value::Null);
            if is_blank(slot) {
                *slot = value;
            }
        }
        Ok(())
    }

    /// Merge every batch, skipping failed collaborators and invalid candidates.
    pub fn ingest<I>(&mut self, batches: I) -> IngestStats
    where
        I: IntoIterator<Item = CandidateBatch>,
    {
        let mut stats = IngestStats::default();
        for batch in batches {
            stats.batches += 1;
            if let Some(error) = &batch.error {
                tracing::warn!("Skipping candidates from {}: {}", batch.source, error);
                stats.skipped_batches += 1;
                continue;
            }
            for node in batch.nodes {
                match self.upsert_node(node) {
                    Ok(()) => stats.nodes_accepted += 1,
                    Err(e) => {
                        debug!("Dropping node candidate from {}: {}", batch.source, e);
                        stats.nodes_dropped += 1;
                    }
                }
            }
            for link in batch.links {
                match self.register_link(link) {
                    Ok(()) => stats.links_accepted += 1,
                    Err(e) => {
                        debug!("Dropping link candidate from {}: {}", batch.source, e);
                        stats.links_dropped += 1;
                    }
                }
            }
        }
        stats
    }

    /// Produce the canonical graph. Run once, on the completed indexes.
    pub fn finalize(mut self) -> CanonicalGraph {
        // Every link endpoint must resolve to a node.
        let mut dangling = Vec::new();
        for link in &self.links {
            for endpoint in [&link.source, &link.target] {
                if !self.node_pos.contains_key(endpoint.as_str()) && !dangling.contains(endpoint) {
                    dangling.push(endpoint.clone());
                }
            }
        }
        for id in dangling {
            let node = Node::new(id.clone(), UNKNOWN_TYPE).with_title(id.clone());
            self.node_pos.insert(id, self.nodes.len());
            self.nodes.push(node);
        }

        for node in &mut self.nodes {
            finalize_node(node);
        }
        for link in &mut self.links {
            finalize_link(link);
        }
        CanonicalGraph {
            nodes: self.nodes,
            links: self.links,
        }
    }
}

fn merge_node(existing: &mut Node, incoming: Node) {
    let id = existing.id.clone();
    merge_title(&mut existing.title, incoming.title, &id);
    merge_text(&mut existing.node_type, incoming.node_type, policy_for("type"));

    merge_number(&mut existing.val, incoming.val, policy_for("val"));
    merge_number(&mut existing.confidence, incoming.confidence, policy_for("confidence"));
    merge_number(&mut existing.count, incoming.count, policy_for("count"));
    merge_number(&mut existing.degree_centrality, incoming.degree_centrality, policy_for("degree_centrality"));
    merge_number(&mut existing.betweenness, incoming.betweenness, policy_for("betweenness"));
    merge_number(&mut existing.pagerank, incoming.pagerank, policy_for("pagerank"));
    if existing.community.is_none() {
        existing.community = incoming.community;
    }

    merge_optional_text(&mut existing.text, incoming.text, policy_for("text"));
    merge_optional_text(&mut existing.full_text, incoming.full_text, policy_for("full_text"));
    merge_optional_text(&mut existing.text_preview, incoming.text_preview, policy_for("text_preview"));
    if existing.text_length.is_none_or(|len| len == 0) {
        existing.text_length = incoming.text_length.or(existing.text_length);
    }

    if let MergePolicy::ListUnion { cap } = policy_for("aliases") {
        union_lists(&mut existing.aliases, &incoming.aliases, cap);
    }

    for (field, value) in incoming.extra {
        match existing.extra.get_mut(&field) {
            Some(slot) => merge_value(slot, value, policy_for(&field)),
            None => {
                existing.extra.insert(field, value);
            }
        }
    }
}

fn merge_title(existing: &mut String, incoming: String, id: &str) {
    if incoming.is_empty() || incoming == id {
        return;
    }
    if existing.is_empty() || existing == id || incoming.chars().count() > existing.chars().count() {
        *existing = incoming;
    }
}

fn merge_number(existing: &mut Option<f64>, incoming: Option<f64>, policy: MergePolicy) {
    let Some(incoming) = incoming.filter(|v| v.is_finite()) else {
        return;
    };
    *existing = Some(match (*existing, policy) {
        (None, _) => incoming,
        (Some(current), MergePolicy::Sum) => round_to(current + incoming, 5),
        (Some(current), MergePolicy::Max) => current.max(incoming),
        (Some(current), _) if current == 0.0 => incoming,
        (Some(current), _) => current,
    });
}

fn merge_text(existing: &mut String, incoming: String, policy: MergePolicy) {
    match policy {
        MergePolicy::Longest if incoming.chars().count() > existing.chars().count() => {
            *existing = incoming
        }
        MergePolicy::Longest => {}
        _ if existing.trim().is_empty() => *existing = incoming,
        _ => {}
    }
}

fn merge_optional_text(existing: &mut Option<String>, incoming: Option<String>, policy: MergePolicy) {
    let Some(incoming) = incoming else {
        return;
    };
    match existing {
        Some(current) => merge_text(current, incoming, policy),
        None => *existing = Some(incoming),
    }
}

/// Merge an extension value under `policy`, by JSON shape.
fn merge_value(existing: &mut Value, incoming: Value, policy: MergePolicy) {
    match (policy, &*existing, &incoming) {
        (MergePolicy::Sum, Value::Number(a), Value::Number(b)) => {
            let total = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
            *existing = number_value(round_to(total, 5));
        }
        (MergePolicy::Max, Value::Number(a), Value::Number(b)) => {
            if b.as_f64().unwrap_or_default() > a.as_f64().unwrap_or_default() {
                *existing = incoming;
            }
        }
        (MergePolicy::ListUnion { cap }, _, _) => {
            let mut items = value_strings(existing);
            union_lists(&mut items, &value_strings(&incoming), cap);
            *existing = Value::Array(items.into_iter().map(Value::String).collect());
        }
        (MergePolicy::Longest, Value::String(a), Value::String(b)) => {
            if b.chars().count() > a.chars().count() {
                *existing = incoming;
            }
        }
        _ => {
            if is_blank(existing) {
                *existing = incoming;
            }
        }
    }
}

fn value_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

fn number_value(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Missing, empty or zero.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(_) => false,
    }
}

/// Case-insensitive, trimmed, order-preserving union capped at `cap`.
pub fn union_lists(existing: &mut Vec<String>, incoming: &[String], cap: usize) {
    for item in incoming {
        if existing.len() >= cap {
            break;
        }
        push_unique(existing, item.trim(), cap);
    }
}

fn push_unique(list: &mut Vec<String>, item: &str, cap: usize) {
    if item.is_empty() || list.len() >= cap {
        return;
    }
    let folded = item.to_lowercase();
    if list.iter().any(|existing| existing.trim().to_lowercase() == folded) {
        return;
    }
    list.push(item.to_string());
}

fn finalize_node(node: &mut Node) {
    if node.title.trim().is_empty() {
        node.title = node.id.clone();
    }
    if let Some(full_text) = node.full_text.take() {
        node.text_length = Some(full_text.chars().count());
        node.text_preview = Some(preview(&full_text, PREVIEW_CHAR_LIMIT));
    }
    if let Some(text) = &mut node.text {
        if text.chars().count() > STORED_TEXT_CHAR_LIMIT {
            *text = truncate_chars(text, STORED_TEXT_CHAR_LIMIT);
        }
    }
    node.aliases.truncate(ALIAS_CAP);
}

fn finalize_link(link: &mut Link) {
    link.weight = round_to(link.weight, 3);
    link.confidence = round_to(link.confidence, 3);
    link.evidence_sentence = link
        .evidence_sentences
        .first()
        .cloned()
        .or_else(|| link.anchor_text.clone());
}

/// Whitespace-normalized, ellipsis-truncated preview of at most `limit` chars.
pub fn preview(text: &str, limit: usize) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= limit {
        return normalized;
    }
    let head: String = normalized.chars().take(limit.saturating_sub(3)).collect();
    format!("{}...", head.trim_end())
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.01;
    }
    value.clamp(0.01, 1.0)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> Node {
        Node { id: id.to_string(), ..Node::default() }
    }

    #[test]
    fn test_upsert_normalizes_defaults() {
        let mut index = GraphIndex::new();
        index.upsert_node(node("n1")).unwrap();
        let stored = index.node("n1").unwrap();
        assert_eq!(stored.title, "n1");
        assert_eq!(stored.node_type, "unknown");
    }

    #[test]
    fn test_upsert_rejects_blank_id() {
        let mut index = GraphIndex::new();
        assert!(matches!(index.upsert_node(node("  ")), Err(MergeError::MissingNodeId)));
        assert_eq!(index.node_count(), 0);
    }

    #[test]
    fn test_title_replaces_raw_id() {
        let mut index = GraphIndex::new();
        index.upsert_node(node("entity:acme")).unwrap();
        index.upsert_node(node("entity:acme").with_title("Acme")).unwrap();
        assert_eq!(index.node("entity:acme").unwrap().title, "Acme");

        index.upsert_node(node("entity:acme").with_title("Acme Corporation")).unwrap();
        index.upsert_node(node("entity:acme").with_title("ACME")).unwrap();
        assert_eq!(index.node("entity:acme").unwrap().title, "Acme Corporation");
    }

    #[test]
    fn test_longest_text_wins() {
        let mut index = GraphIndex::new();
        let mut a = node("doc");
        a.text = Some("short".into());
        let mut b = node("doc");
        b.text = Some("a much longer body".into());
        index.upsert_node(b).unwrap();
        index.upsert_node(a).unwrap();
        assert_eq!(index.node("doc").unwrap().text.as_deref(), Some("a much longer body"));
    }

    #[test]
    fn test_alias_union_is_case_insensitive_and_capped() {
        let mut index = GraphIndex::new();
        let mut a = node("p");
        a.aliases = vec!["Ada".into(), "Lovelace".into()];
        index.upsert_node(a).unwrap();
        let mut b = node("p");
        b.aliases = vec!["LOVELACE".into(), " ada ".into()];
        b.aliases.extend((0..20).map(|i| format!("alias{i}")));
        index.upsert_node(b).unwrap();

        let aliases = &index.node("p").unwrap().aliases;
        assert_eq!(aliases.len(), ALIAS_CAP);
        assert_eq!(aliases[0], "Ada");
        assert_eq!(aliases[1], "Lovelace");
        assert_eq!(aliases[2], "alias0");
    }

    #[test]
    fn test_extension_fields_follow_policy_table() {
        let mut index = GraphIndex::new();
        let mut a = node("c");
        a.extra.insert("relevance".into(), serde_json::json!(0.2));
        a.extra.insert("mentions".into(), serde_json::json!(2));
        a.extra.insert("source_domain".into(), serde_json::json!(""));
        let mut b = node("c");
        b.extra.insert("relevance".into(), serde_json::json!(0.7));
        b.extra.insert("mentions".into(), serde_json::json!(3));
        b.extra.insert("source_domain".into(), serde_json::json!("example.org"));
        index.upsert_node(a).unwrap();
        index.upsert_node(b).unwrap();

        let extra = &index.node("c").unwrap().extra;
        assert_eq!(extra["relevance"], serde_json::json!(0.7));
        assert_eq!(extra["mentions"].as_f64(), Some(5.0));
        assert_eq!(extra["source_domain"], serde_json::json!("example.org"));
    }

    #[test]
    fn test_register_link_rejects_invalid() {
        let mut index = GraphIndex::new();
        assert!(index.register_link(LinkCandidate::new("a", "", "X")).is_err());
        assert!(matches!(
            index.register_link(LinkCandidate::new("a", "a", "X")),
            Err(MergeError::SelfLoop(_))
        ));
        assert_eq!(index.link_count(), 0);
    }

    #[test]
    fn test_register_link_floors_weight_and_clamps_confidence() {
        let mut index = GraphIndex::new();
        let mut candidate = LinkCandidate::new("a", "b", "X").with_weight(0.0);
        candidate.confidence = Some(7.0);
        index.register_link(candidate).unwrap();
        let mut low = LinkCandidate::new("a", "b", "X").with_weight(-3.0);
        low.confidence = Some(-1.0);
        index.register_link(low).unwrap();

        let link = &index.finalize().links[0];
        assert!((link.weight - 0.2).abs() < 1e-9);
        assert_eq!(link.confidence, 1.0);
        assert_eq!(link.occurrences, 2);
    }

    #[test]
    fn test_predicate_is_part_of_identity() {
        let mut index = GraphIndex::new();
        let mut owns = LinkCandidate::new("a", "b", "VERB:OWN");
        owns.predicate = Some("own".into());
        index.register_link(owns).unwrap();
        index.register_link(LinkCandidate::new("a", "b", "VERB:OWN")).unwrap();
        assert_eq!(index.link_count(), 2);
    }

    #[test]
    fn test_evidence_lists_are_bounded() {
        let mut index = GraphIndex::new();
        for i in 0..12 {
            let mut candidate = LinkCandidate::new("a", "b", "CO_OCCURS_IN_SENTENCE");
            candidate.source_doc = Some(format!(" doc{i} "));
            candidate.evidence_sentence = Some(format!("sentence {i} {}", "x".repeat(400)));
            index.register_link(candidate).unwrap();
        }
        let graph = index.finalize();
        let link = &graph.links[0];
        assert_eq!(link.source_docs.len(), LINK_SOURCE_DOC_CAP);
        assert_eq!(link.source_docs[0], "doc0");
        assert_eq!(link.evidence_sentences.len(), LINK_EVIDENCE_CAP);
        assert!(link.evidence_sentences.iter().all(|s| s.chars().count() <= EVIDENCE_CHAR_LIMIT));
        assert_eq!(link.evidence_sentence.as_ref(), link.evidence_sentences.first());
    }

    #[test]
    fn test_anchor_text_first_contribution_wins() {
        let mut index = GraphIndex::new();
        let mut first = LinkCandidate::new("a", "b", "LINKS_TO_INTERNAL");
        first.anchor_text = Some("   ".into());
        index.register_link(first).unwrap();
        let mut second = LinkCandidate::new("a", "b", "LINKS_TO_INTERNAL");
        second.anchor_text = Some("About us".into());
        index.register_link(second).unwrap();
        let mut third = LinkCandidate::new("a", "b", "LINKS_TO_INTERNAL");
        third.anchor_text = Some("Team".into());
        index.register_link(third).unwrap();

        let graph = index.finalize();
        assert_eq!(graph.links[0].anchor_text.as_deref(), Some("About us"));
        assert_eq!(graph.links[0].evidence_sentence.as_deref(), Some("About us"));
    }

    #[test]
    fn test_finalize_builds_preview_and_truncates_text() {
        let mut index = GraphIndex::new();
        let mut doc = node("doc");
        doc.full_text = Some(format!("  Heading\n\n{}", "word ".repeat(300)));
        doc.text = Some("y".repeat(2000));
        index.upsert_node(doc).unwrap();

        let graph = index.finalize();
        let doc = &graph.nodes[0];
        assert!(doc.full_text.is_none());
        assert_eq!(doc.text_length, Some(11 + 1500));
        let preview = doc.text_preview.as_deref().unwrap();
        assert!(preview.starts_with("Heading word"));
        assert!(preview.ends_with("..."));
        assert!(preview.chars().count() <= PREVIEW_CHAR_LIMIT);
        assert_eq!(doc.text.as_ref().unwrap().chars().count(), STORED_TEXT_CHAR_LIMIT);
    }

    #[test]
    fn test_preview_only_comes_from_full_text() {
        let mut index = GraphIndex::new();
        let mut concept = node("engine");
        concept.text = Some("analytical engine".into());
        index.upsert_node(concept).unwrap();
        let mut page = node("page");
        page.text = Some("body".into());
        page.text_length = Some(4096);
        index.upsert_node(page).unwrap();

        let graph = index.finalize();
        assert!(graph.nodes[0].text_preview.is_none());
        assert!(graph.nodes[0].text_length.is_none());
        assert_eq!(graph.nodes[1].text_length, Some(4096));
        assert_eq!(graph.nodes[1].text.as_deref(), Some("body"));
    }

    #[test]
    fn test_occurrences_saturate() {
        let mut index = GraphIndex::new();
        for _ in 0..2 {
            let mut candidate = LinkCandidate::new("a", "b", "CO_OCCURS_IN_SENTENCE");
            candidate.occurrences = Some(u32::MAX);
            index.register_link(candidate).unwrap();
        }
        index.register_link(LinkCandidate::new("a", "b", "CO_OCCURS_IN_SENTENCE")).unwrap();
        assert_eq!(index.finalize().links[0].occurrences, u32::MAX);
    }

    #[test]
    fn test_loosely_typed_batch_keeps_every_candidate() {
        let batch: CandidateBatch = serde_json::from_value(serde_json::json!({
            "source": "crawl",
            "nodes": [
                {"id": "ok"},
                {"id": "bad", "val": "10", "type": null, "count": "many", "aliases": "Bad"},
                {"id": 42, "title": null, "confidence": "0.75"},
                "not a node"
            ],
            "links": [
                {"source": "ok", "target": "bad", "occurrences": 2.0, "weight": "2.5"},
                {"source": "ok", "target": 42, "relation_type": null, "confidence": [0.9]}
            ]
        }))
        .unwrap();
        assert_eq!(batch.nodes.len(), 3);
        assert_eq!(batch.links.len(), 2);

        let mut index = GraphIndex::new();
        let stats = index.ingest([batch]);
        assert_eq!(stats.nodes_accepted, 3);
        assert_eq!(stats.links_accepted, 2);

        let bad = index.node("bad").unwrap();
        assert_eq!(bad.val, Some(10.0));
        assert_eq!(bad.count, None);
        assert_eq!(bad.node_type, UNKNOWN_TYPE);
        assert_eq!(bad.aliases, vec!["Bad"]);
        let numeric = index.node("42").unwrap();
        assert_eq!(numeric.title, "42");
        assert_eq!(numeric.confidence, Some(0.75));

        let graph = index.finalize();
        assert_eq!(graph.links[0].occurrences, 2);
        assert_eq!(graph.links[0].weight, 2.5);
        assert_eq!(graph.links[1].relation_type, DEFAULT_RELATION);
        assert_eq!(graph.links[1].confidence, 0.5);
    }

    #[test]
    fn test_finalize_adds_placeholder_endpoints() {
        let mut index = GraphIndex::new();
        index.upsert_node(node("a")).unwrap();
        index.register_link(LinkCandidate::new("a", "https://example.org", "LINKS_TO_EXTERNAL")).unwrap();
        let graph = index.finalize();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[1].id, "https://example.org");
        assert_eq!(graph.nodes[1].title, "https://example.org");
        assert_eq!(graph.nodes[1].node_type, "unknown");
    }

    #[test]
    fn test_ingest_skips_failed_batches() {
        let mut index = GraphIndex::new();
        let good = CandidateBatch {
            source: "a.pdf".into(),
            nodes: vec![node("a.pdf"), node("")],
            links: vec![LinkCandidate::new("a.pdf", "a.pdf", "X")],
            error: None,
        };
        let bad = CandidateBatch {
            source: "broken.docx".into(),
            nodes: vec![node("broken.docx")],
            links: Vec::new(),
            error: Some("unreadable document".into()),
        };
        let stats = index.ingest([good, bad]);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.skipped_batches, 1);
        assert_eq!(stats.nodes_accepted, 1);
        assert_eq!(stats.nodes_dropped, 1);
        assert_eq!(stats.links_dropped, 1);
        assert!(index.node("broken.docx").is_none());
    }

    #[test]
    fn test_preview_keeps_short_text() {
        assert_eq!(preview("  a \n b  ", 400), "a b");
    }
}
