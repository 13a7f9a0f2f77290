//! Interest-ranked subset selection
//!
//! Squeezes a canonical graph into a bounded view: pinned nodes first, then
//! the highest-interest nodes, then the highest-interest links among them.
//! The final node set is repaired so every visible node is pinned or touched
//! by a visible link.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SelectionConfig;
use crate::model::{Link, Node, NodeKind};

/// Ranking weight per node kind.
pub const TYPE_PRIORITY: &[(NodeKind, f64)] = &[
    (NodeKind::SourceDocument, 40.0),
    (NodeKind::Person, 28.0),
    (NodeKind::Organization, 26.0),
    (NodeKind::NamedEntity, 20.0),
    (NodeKind::Concept, 12.0),
    (NodeKind::ExternalReference, 6.0),
    (NodeKind::Unknown, 4.0),
];
const DEFAULT_TYPE_PRIORITY: f64 = 10.0;

/// Relation boost by relation-type prefix. First match wins.
pub const RELATION_BOOST: &[(&str, f64)] = &[
    ("VERB:", 1.6),
    ("MENTIONS_ENTITY", 1.4),
    ("MENTIONS", 1.3),
    ("HAS_CONCEPT", 1.15),
    ("LINKS_TO_INTERNAL", 1.0),
    ("CO_OCCURS", 0.75),
    ("LINKS_TO_EXTERNAL", 0.6),
];
const DEFAULT_RELATION_BOOST: f64 = 1.0;

/// Floor applied to each incident link weight when ranking nodes.
const DEGREE_WEIGHT_FLOOR: f64 = 0.1;

/// Limits actually applied after sanitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedLimits {
    pub node_limit: usize,
    pub link_limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSummary {
    pub visible_nodes: usize,
    pub total_nodes: usize,
    pub visible_links: usize,
    pub total_links: usize,
    pub node_limit: usize,
    pub link_limit: usize,
    pub truncated: bool,
}

/// A bounded view of a canonical graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphView {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub summary: SelectionSummary,
}

/// Read a loosely typed limit: numbers and numeric strings pass, anything else is `None`.
pub fn parse_limit(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => parse_limit_str(s),
        _ => None,
    }
}

pub fn parse_limit_str(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
}

pub fn sanitize_limits(
    config: &SelectionConfig,
    pinned_count: usize,
    node_limit: Option<i64>,
    link_limit: Option<i64>,
) -> AppliedLimits {
    AppliedLimits {
        node_limit: config.nodes.clamp(node_limit).max(pinned_count),
        link_limit: config.links.clamp(link_limit),
    }
}

pub fn type_priority(node_type: &str) -> f64 {
    let kind = NodeKind::classify(node_type);
    TYPE_PRIORITY
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, p)| *p)
        .unwrap_or(DEFAULT_TYPE_PRIORITY)
}

pub fn relation_boost(relation_type: &str) -> f64 {
    RELATION_BOOST
        .iter()
        .find(|(prefix, _)| relation_type.starts_with(prefix))
        .map(|(_, b)| *b)
        .unwrap_or(DEFAULT_RELATION_BOOST)
}

pub fn node_interest(node: &Node, weighted_degree: f64) -> f64 {
    type_priority(&node.node_type)
        + (node.count.unwrap_or(0.0) * 0.22).min(16.0)
        + node.confidence.unwrap_or(0.0) * 1.8
        + (node.val.unwrap_or(0.0) * 0.18).min(12.0)
        + (weighted_degree * 0.14).min(12.0)
}

pub fn link_interest(link: &Link) -> f64 {
    relation_boost(&link.relation_type)
        * (link.weight * 0.95 + f64::from(link.occurrences) * 0.55 + link.confidence * 1.6)
}

fn weighted_degrees(links: &[Link]) -> HashMap<&str, f64> {
    let mut degrees: HashMap<&str, f64> = HashMap::new();
    for link in links {
        let weight = link.weight.max(DEGREE_WEIGHT_FLOOR);
        *degrees.entry(link.source.as_str()).or_default() += weight;
        *degrees.entry(link.target.as_str()).or_default() += weight;
    }
    degrees
}

/// Derive a bounded, connected, ranked view.
pub fn select_subset(
    nodes: &[Node],
    links: &[Link],
    pinned_ids: &[String],
    node_limit: Option<i64>,
    link_limit: Option<i64>,
    config: &SelectionConfig,
) -> GraphView {
    let known: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(pos, node)| (node.id.as_str(), pos))
        .collect();

    let mut seen = HashSet::new();
    let pinned: Vec<&str> = pinned_ids
        .iter()
        .map(|id| id.as_str())
        .filter(|id| seen.insert(*id))
        .collect();
    let limits = sanitize_limits(config, pinned.len(), node_limit, link_limit);

    // Pinned first, in given order, then by descending interest.
    let mut ranked: Vec<usize> = pinned.iter().filter_map(|id| known.get(id).copied()).collect();
    let pinned_set: HashSet<usize> = ranked.iter().copied().collect();

    let degrees = weighted_degrees(links);
    let mut candidates: Vec<(usize, f64)> = nodes
        .iter()
        .enumerate()
        .filter(|(pos, _)| !pinned_set.contains(pos))
        .map(|(pos, node)| {
            let degree = degrees.get(node.id.as_str()).copied().unwrap_or(0.0);
            (pos, node_interest(node, degree))
        })
        .collect();
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (pos, _) in candidates {
        if ranked.len() >= limits.node_limit {
            break;
        }
        ranked.push(pos);
    }

    let selected: HashSet<&str> = ranked.iter().map(|&pos| nodes[pos].id.as_str()).collect();
    let mut kept: Vec<usize> = links
        .iter()
        .enumerate()
        .filter(|(_, link)| selected.contains(link.source.as_str()) && selected.contains(link.target.as_str()))
        .map(|(pos, _)| pos)
        .collect();
    if kept.len() > limits.link_limit {
        kept.sort_by(|&a, &b| link_interest(&links[b]).total_cmp(&link_interest(&links[a])));
        kept.truncate(limits.link_limit);
        kept.sort_unstable();
    }

    // Connectivity repair.
    let mut touched: HashSet<&str> = pinned.iter().copied().collect();
    for &pos in &kept {
        touched.insert(links[pos].source.as_str());
        touched.insert(links[pos].target.as_str());
    }
    let visible: Vec<usize> = if ranked.iter().any(|&pos| touched.contains(nodes[pos].id.as_str())) {
        ranked
            .iter()
            .copied()
            .filter(|&pos| touched.contains(nodes[pos].id.as_str()))
            .collect()
    } else {
        ranked
    };

    let view_nodes: Vec<Node> = visible.iter().map(|&pos| nodes[pos].clone()).collect();
    let view_links: Vec<Link> = kept.iter().map(|&pos| links[pos].clone()).collect();
    let summary = SelectionSummary {
        visible_nodes: view_nodes.len(),
        total_nodes: nodes.len(),
        visible_links: view_links.len(),
        total_links: links.len(),
        node_limit: limits.node_limit,
        link_limit: limits.link_limit,
        truncated: view_nodes.len() < nodes.len() || view_links.len() < links.len(),
    };
    GraphView {
        nodes: view_nodes,
        links: view_links,
        summary,
    }
}
