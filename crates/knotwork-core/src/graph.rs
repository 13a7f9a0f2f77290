//! View graph built on petgraph: multigraph, weighted projection, undirected projection

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::model::{Link, Node};

/// The three graph shapes analytics reads from one bounded view.
///
/// Node weights are positions into the view's node slice, so every shape
/// shares the same `NodeIndex` numbering.
pub struct ViewGraph {
    /// Every link, attributes referenced by position into the link slice.
    multi: DiGraph<usize, usize>,
    /// Multi-edges between an ordered pair collapsed into one summed weight.
    projection: DiGraph<usize, f64>,
    /// Undirected version of the projection, both directions summed.
    undirected: UnGraph<usize, f64>,
    index: HashMap<String, NodeIndex>,
}

impl std::fmt::Debug for ViewGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewGraph")
            .field("node_count", &self.multi.node_count())
            .field("edge_count", &self.multi.edge_count())
            .field("projected_edge_count", &self.projection.edge_count())
            .finish()
    }
}

impl ViewGraph {
    /// Build from a view. Links with an endpoint outside `nodes` are ignored.
    pub fn build(nodes: &[Node], links: &[Link]) -> Self {
        let mut multi = DiGraph::with_capacity(nodes.len(), links.len());
        let mut projection = DiGraph::with_capacity(nodes.len(), links.len());
        let mut undirected = UnGraph::with_capacity(nodes.len(), links.len());
        let mut index = HashMap::with_capacity(nodes.len());

        for (pos, node) in nodes.iter().enumerate() {
            if index.contains_key(&node.id) {
                continue;
            }
            let idx = multi.add_node(pos);
            projection.add_node(pos);
            undirected.add_node(pos);
            index.insert(node.id.clone(), idx);
        }

        for (pos, link) in links.iter().enumerate() {
            let (Some(&a), Some(&b)) = (index.get(&link.source), index.get(&link.target)) else {
                continue;
            };
            if a == b {
                continue;
            }
            multi.add_edge(a, b, pos);
            match projection.find_edge(a, b) {
                Some(e) => projection[e] += link.weight,
                None => {
                    projection.add_edge(a, b, link.weight);
                }
            }
            // a->b and b->a share one undirected edge whose weight is their sum,
            // not the weight of whichever direction was seen last.
            match undirected.find_edge(a, b) {
                Some(e) => undirected[e] += link.weight,
                None => {
                    undirected.add_edge(a, b, link.weight);
                }
            }
        }

        ViewGraph {
            multi,
            projection,
            undirected,
            index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.multi.node_count()
    }

    /// Number of original (multi) edges.
    pub fn edge_count(&self) -> usize {
        self.multi.edge_count()
    }

    pub fn undirected_edge_count(&self) -> usize {
        self.undirected.edge_count()
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Position into the view's node slice.
    pub fn node_pos(&self, idx: NodeIndex) -> usize {
        self.multi[idx]
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.multi.node_indices()
    }

    /// Positions into the view's link slice, one per original edge.
    pub fn link_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.multi.edge_indices().map(move |e| self.multi[e])
    }

    /// Unweighted in + out degree in the projection.
    pub fn projected_degree(&self, idx: NodeIndex) -> usize {
        self.projection.edges_directed(idx, Direction::Outgoing).count()
            + self.projection.edges_directed(idx, Direction::Incoming).count()
    }

    /// Sum of weighted in + out degree in the projection.
    pub fn weighted_degree(&self, idx: NodeIndex) -> f64 {
        let out: f64 = self
            .projection
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| *e.weight())
            .sum();
        let inc: f64 = self
            .projection
            .edges_directed(idx, Direction::Incoming)
            .map(|e| *e.weight())
            .sum();
        out + inc
    }

    /// Outgoing weighted adjacency of the projection, indexed by `NodeIndex::index()`.
    pub fn projected_out_adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut adjacency = vec![Vec::new(); self.projection.node_count()];
        for edge in self.projection.edge_references() {
            adjacency[edge.source().index()].push((edge.target().index(), *edge.weight()));
        }
        adjacency
    }

    /// Symmetric weighted adjacency of the undirected projection, indexed by `NodeIndex::index()`.
    pub fn undirected_adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut adjacency = vec![Vec::new(); self.undirected.node_count()];
        for edge in self.undirected.edge_references() {
            let (a, b) = (edge.source().index(), edge.target().index());
            adjacency[a].push((b, *edge.weight()));
            adjacency[b].push((a, *edge.weight()));
        }
        adjacency
    }
}
