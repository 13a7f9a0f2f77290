//! Degree, betweenness and PageRank centrality over adjacency lists

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::error::AnalyticsError;

/// Weighted adjacency indexed by node position: `(neighbor, weight)` pairs.
pub type Adjacency = Vec<Vec<(usize, f64)>>;

/// `degree / (n - 1)`; empty when fewer than two nodes.
pub fn degree_centrality(degrees: &[usize]) -> Vec<f64> {
    let n = degrees.len();
    if n < 2 {
        return Vec::new();
    }
    let scale = 1.0 / (n - 1) as f64;
    degrees.iter().map(|&d| d as f64 * scale).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    dist: f64,
    node: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on distance, then node.
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Brandes dependency accumulation from one source, weights as distances.
fn single_source_dependency(adj: &Adjacency, source: usize) -> Vec<f64> {
    let n = adj.len();
    let mut dist = vec![f64::INFINITY; n];
    let mut sigma = vec![0.0f64; n];
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut settled = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut heap = BinaryHeap::new();

    dist[source] = 0.0;
    sigma[source] = 1.0;
    heap.push(Frontier { dist: 0.0, node: source });

    while let Some(Frontier { dist: d, node: v }) = heap.pop() {
        if settled[v] || d > dist[v] {
            continue;
        }
        settled[v] = true;
        order.push(v);
        for &(w, weight) in &adj[v] {
            if settled[w] {
                continue;
            }
            let candidate = d + weight;
            if candidate < dist[w] {
                dist[w] = candidate;
                sigma[w] = sigma[v];
                preds[w].clear();
                preds[w].push(v);
                heap.push(Frontier { dist: candidate, node: w });
            } else if candidate == dist[w] {
                sigma[w] += sigma[v];
                preds[w].push(v);
            }
        }
    }

    let mut delta = vec![0.0f64; n];
    let mut dependency = vec![0.0f64; n];
    while let Some(w) = order.pop() {
        for &v in &preds[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
        if w != source {
            dependency[w] += delta[w];
        }
    }
    dependency
}

/// Normalized betweenness on an undirected weighted graph.
///
/// With `pivots = Some(k)`, only `k` seeded random sources are used and the
/// result is scaled by `n / k`.
pub fn betweenness(adj: &Adjacency, pivots: Option<usize>, seed: u64) -> Vec<f64> {
    let n = adj.len();
    if n < 3 {
        return vec![0.0; n];
    }

    let sources: Vec<usize> = match pivots {
        Some(k) if k < n => {
            let mut rng = StdRng::seed_from_u64(seed);
            rand::seq::index::sample(&mut rng, n, k).into_vec()
        }
        _ => (0..n).collect(),
    };

    let partials: Vec<Vec<f64>> = sources
        .par_iter()
        .map(|&s| single_source_dependency(adj, s))
        .collect();

    // Summed in source order so the result does not depend on scheduling.
    let mut totals = vec![0.0f64; n];
    for partial in &partials {
        for (total, value) in totals.iter_mut().zip(partial) {
            *total += value;
        }
    }

    let mut scale = 1.0 / ((n - 1) * (n - 2)) as f64;
    if sources.len() < n {
        scale *= n as f64 / sources.len() as f64;
    }
    totals.iter_mut().for_each(|v| *v *= scale);
    totals
}

/// Weighted PageRank by power iteration; dangling mass is spread uniformly.
pub fn pagerank(
    out_adj: &Adjacency,
    damping: f64,
    max_iter: usize,
    tolerance: f64,
) -> Result<Vec<f64>, AnalyticsError> {
    let n = out_adj.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let nf = n as f64;
    let out_weight: Vec<f64> = out_adj
        .iter()
        .map(|edges| edges.iter().map(|(_, w)| *w).sum())
        .collect();
    let dangling: Vec<usize> = (0..n).filter(|&i| out_weight[i] <= 0.0).collect();

    let mut rank = vec![1.0 / nf; n];
    for _ in 0..max_iter {
        let last = rank;
        rank = vec![0.0; n];
        let dangle_sum: f64 = damping * dangling.iter().map(|&i| last[i]).sum::<f64>();
        for (u, edges) in out_adj.iter().enumerate() {
            if out_weight[u] <= 0.0 {
                continue;
            }
            for &(v, w) in edges {
                rank[v] += damping * last[u] * w / out_weight[u];
            }
        }
        let base = dangle_sum / nf + (1.0 - damping) / nf;
        rank.iter_mut().for_each(|r| *r += base);

        let err: f64 = rank.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if err < nf * tolerance {
            return Ok(rank);
        }
    }
    Err(AnalyticsError::PageRankDiverged(max_iter))
}
