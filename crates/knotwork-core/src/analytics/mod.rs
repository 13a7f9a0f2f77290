//! Graph analytics over a bounded view
//!
//! Strategies are picked per view size from [`AnalyticsTiers`]. Metrics are
//! computed into a scratch [`NodeMetrics`] and written onto nodes only when
//! every step succeeded, so a failure leaves the view as it was.

pub mod centrality;
pub mod community;

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::AnalyticsTiers;
use crate::error::AnalyticsError;
use crate::graph::ViewGraph;
use crate::merge::round_to;
use crate::model::{Link, Node};

pub const BRIDGE_LIMIT: usize = 8;
pub const COMMUNITY_LIMIT: usize = 5;
pub const COMMUNITY_SAMPLE: usize = 3;
pub const RELATION_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetweennessStrategy {
    Exact,
    Sampled { pivots: usize },
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityStrategy {
    GreedyModularity,
    LabelPropagation,
    Skipped,
}

/// Which algorithms run for a view of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsPlan {
    pub betweenness: BetweennessStrategy,
    pub communities: CommunityStrategy,
    pub pagerank: bool,
}

impl AnalyticsTiers {
    pub fn plan(&self, node_count: usize, edge_count: usize) -> AnalyticsPlan {
        AnalyticsPlan {
            betweenness: self.betweenness_strategy(node_count, edge_count),
            communities: self.community_strategy(node_count, edge_count),
            pagerank: self.pagerank_enabled(node_count, edge_count),
        }
    }

    pub fn betweenness_strategy(&self, node_count: usize, edge_count: usize) -> BetweennessStrategy {
        if edge_count == 0 || node_count <= 2 {
            BetweennessStrategy::Skipped
        } else if node_count <= self.betweenness_exact_max {
            BetweennessStrategy::Exact
        } else if node_count <= self.betweenness_approx_max {
            let scaled = (node_count as f64 * self.betweenness_pivot_ratio) as usize;
            let pivots = scaled
                .min(self.betweenness_pivot_max)
                .max(self.betweenness_pivot_min);
            BetweennessStrategy::Sampled { pivots }
        } else {
            BetweennessStrategy::Skipped
        }
    }

    pub fn community_strategy(&self, node_count: usize, edge_count: usize) -> CommunityStrategy {
        if edge_count == 0 || node_count < 3 {
            CommunityStrategy::Skipped
        } else if node_count <= self.community_greedy_max {
            CommunityStrategy::GreedyModularity
        } else if node_count <= self.community_lpa_max {
            CommunityStrategy::LabelPropagation
        } else {
            CommunityStrategy::Skipped
        }
    }

    pub fn pagerank_enabled(&self, node_count: usize, edge_count: usize) -> bool {
        edge_count > 0 && node_count <= self.pagerank_max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeNode {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySummary {
    pub id: usize,
    pub size: usize,
    pub sample_nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationCount {
    pub relation_type: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}

/// Summary of a view returned next to its nodes and links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub top_bridge_nodes: Vec<BridgeNode>,
    pub top_communities: Vec<CommunitySummary>,
    pub relation_distribution: Vec<RelationCount>,
    pub graph_stats: GraphStats,
}

/// Per-node results indexed by `NodeIndex::index()`.
#[derive(Debug, Default)]
struct NodeMetrics {
    degree_centrality: Vec<f64>,
    weighted_degree: Vec<f64>,
    betweenness: Option<Vec<f64>>,
    pagerank: Option<Vec<f64>>,
    /// Ordered largest first; position is the community id.
    communities: Vec<Vec<usize>>,
}

/// Decorate `nodes` with centrality and community fields and summarize the view.
///
/// Never fails: any analytics error is logged and the nodes are left untouched.
pub fn analyze(nodes: &mut [Node], links: &[Link], tiers: &AnalyticsTiers) -> Insights {
    let graph = ViewGraph::build(nodes, links);
    let graph_stats = GraphStats {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
    };
    if graph.node_count() == 0 {
        return Insights { graph_stats, ..Insights::default() };
    }

    let plan = tiers.plan(graph.node_count(), graph.undirected_edge_count());
    let started = Instant::now();
    let metrics = match compute_metrics(&graph, links, tiers, plan) {
        Ok(metrics) => metrics,
        Err(e) => {
            error!("analytics failed, returning view undecorated: {e}");
            return Insights { graph_stats, ..Insights::default() };
        }
    };
    debug!(
        nodes = graph_stats.node_count,
        edges = graph_stats.edge_count,
        betweenness = ?plan.betweenness,
        communities = ?plan.communities,
        pagerank = plan.pagerank,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "computed view analytics"
    );

    decorate(nodes, &graph, &metrics);

    Insights {
        top_bridge_nodes: bridge_nodes(nodes, &graph, &metrics),
        top_communities: community_summaries(nodes, &graph, &metrics),
        relation_distribution: relation_distribution(links, &graph),
        graph_stats,
    }
}

fn compute_metrics(
    graph: &ViewGraph,
    links: &[Link],
    tiers: &AnalyticsTiers,
    plan: AnalyticsPlan,
) -> Result<NodeMetrics, AnalyticsError> {
    for pos in graph.link_positions() {
        let link = &links[pos];
        if !link.weight.is_finite() {
            return Err(AnalyticsError::NonFiniteWeight {
                from: link.source.clone(),
                to: link.target.clone(),
            });
        }
    }

    let degrees: Vec<usize> = graph.node_indices().map(|i| graph.projected_degree(i)).collect();
    let weighted_degree: Vec<f64> = graph.node_indices().map(|i| graph.weighted_degree(i)).collect();
    let undirected = graph.undirected_adjacency();

    let betweenness = match plan.betweenness {
        BetweennessStrategy::Exact => Some(centrality::betweenness(&undirected, None, tiers.seed)),
        BetweennessStrategy::Sampled { pivots } => {
            Some(centrality::betweenness(&undirected, Some(pivots), tiers.seed))
        }
        BetweennessStrategy::Skipped => None,
    };

    let communities = match plan.communities {
        CommunityStrategy::GreedyModularity => community::greedy_modularity(&undirected),
        CommunityStrategy::LabelPropagation => community::label_propagation(
            &undirected,
            tiers.seed,
            tiers.label_propagation_max_rounds,
        ),
        CommunityStrategy::Skipped => Vec::new(),
    };

    let pagerank = if plan.pagerank {
        match centrality::pagerank(
            &graph.projected_out_adjacency(),
            tiers.pagerank_damping,
            tiers.pagerank_max_iter,
            tiers.pagerank_tolerance,
        ) {
            Ok(ranks) => Some(ranks),
            Err(e) => {
                warn!("{e}; pagerank left empty");
                None
            }
        }
    } else {
        None
    };

    Ok(NodeMetrics {
        degree_centrality: centrality::degree_centrality(&degrees),
        weighted_degree,
        betweenness,
        pagerank,
        communities: community::order_communities(communities),
    })
}

fn metric_at(values: Option<&Vec<f64>>, i: usize) -> f64 {
    values.and_then(|v| v.get(i)).copied().unwrap_or(0.0)
}

fn decorate(nodes: &mut [Node], graph: &ViewGraph, metrics: &NodeMetrics) {
    let mut community_of: HashMap<usize, usize> = HashMap::new();
    for (cid, members) in metrics.communities.iter().enumerate() {
        for &member in members {
            community_of.insert(member, cid);
        }
    }

    for idx in graph.node_indices() {
        let i = idx.index();
        let node = &mut nodes[graph.node_pos(idx)];
        let sized = 1.0 + metrics.weighted_degree[i] * 0.35;
        node.val = Some(round_to(node.val.unwrap_or(1.0).max(sized), 3));
        node.degree_centrality = Some(round_to(metric_at(Some(&metrics.degree_centrality), i), 5));
        node.betweenness = Some(round_to(metric_at(metrics.betweenness.as_ref(), i), 5));
        node.pagerank = Some(round_to(metric_at(metrics.pagerank.as_ref(), i), 7));
        if let Some(&cid) = community_of.get(&i) {
            node.community = Some(cid);
        }
    }
}

/// Highest betweenness, or weighted degree when betweenness did not run.
fn bridge_nodes(nodes: &[Node], graph: &ViewGraph, metrics: &NodeMetrics) -> Vec<BridgeNode> {
    let scores = metrics
        .betweenness
        .as_ref()
        .unwrap_or(&metrics.weighted_degree);
    let mut ranked: Vec<_> = graph.node_indices().collect();
    ranked.sort_by(|a, b| scores[b.index()].total_cmp(&scores[a.index()]));
    ranked
        .into_iter()
        .take(BRIDGE_LIMIT)
        .map(|idx| {
            let node = &nodes[graph.node_pos(idx)];
            BridgeNode {
                id: node.id.clone(),
                title: node.display_title().to_string(),
                node_type: node.node_type.clone(),
                score: round_to(scores[idx.index()], 5),
            }
        })
        .collect()
}

fn community_summaries(nodes: &[Node], graph: &ViewGraph, metrics: &NodeMetrics) -> Vec<CommunitySummary> {
    let indices: Vec<_> = graph.node_indices().collect();
    metrics
        .communities
        .iter()
        .take(COMMUNITY_LIMIT)
        .enumerate()
        .map(|(id, members)| CommunitySummary {
            id,
            size: members.len(),
            sample_nodes: members
                .iter()
                .take(COMMUNITY_SAMPLE)
                .map(|&m| nodes[graph.node_pos(indices[m])].display_title().to_string())
                .collect(),
        })
        .collect()
}

/// Relation counts over the view's links; ties keep first-appearance order.
fn relation_distribution(links: &[Link], graph: &ViewGraph) -> Vec<RelationCount> {
    let mut counts: Vec<RelationCount> = Vec::new();
    let mut slot: HashMap<&str, usize> = HashMap::new();
    for pos in graph.link_positions() {
        let relation = links[pos].relation_type.as_str();
        match slot.get(relation) {
            Some(&i) => counts[i].count += 1,
            None => {
                slot.insert(relation, counts.len());
                counts.push(RelationCount {
                    relation_type: relation.to_string(),
                    count: 1,
                });
            }
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(RELATION_LIMIT);
    counts
}
