//! Community detection: greedy modularity merging and label propagation

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::centrality::Adjacency;

/// Clauset-Newman-Moore agglomeration on an unweighted view of `adj`.
///
/// Starts from singletons and repeatedly merges the adjacent pair with the
/// largest modularity gain until no merge improves modularity. Ties go to
/// the lowest community indices.
pub fn greedy_modularity(adj: &Adjacency) -> Vec<Vec<usize>> {
    let n = adj.len();
    let degree_sum: usize = adj.iter().map(Vec::len).sum();
    if degree_sum == 0 {
        return (0..n).map(|i| vec![i]).collect();
    }
    let two_m = degree_sum as f64;

    // e[i][j]: fraction of edge ends joining community i to j; a[i]: fraction on i.
    let mut e: Vec<BTreeMap<usize, f64>> = adj
        .iter()
        .map(|neighbors| {
            let mut row = BTreeMap::new();
            for &(j, _) in neighbors {
                *row.entry(j).or_insert(0.0) += 1.0 / two_m;
            }
            row
        })
        .collect();
    let mut a: Vec<f64> = adj.iter().map(|nb| nb.len() as f64 / two_m).collect();
    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    let mut alive = vec![true; n];

    loop {
        let mut best: Option<(f64, usize, usize)> = None;
        for i in (0..n).filter(|&i| alive[i]) {
            for (&j, &eij) in e[i].range(i + 1..) {
                let gain = 2.0 * (eij - a[i] * a[j]);
                if best.is_none_or(|(b, _, _)| gain > b) {
                    best = Some((gain, i, j));
                }
            }
        }
        let Some((gain, i, j)) = best else { break };
        if gain <= 0.0 {
            break;
        }

        let absorbed = std::mem::take(&mut e[j]);
        for (k, ejk) in absorbed {
            if k == i || k == j {
                continue;
            }
            *e[i].entry(k).or_insert(0.0) += ejk;
            e[k].remove(&j);
            *e[k].entry(i).or_insert(0.0) += ejk;
        }
        e[i].remove(&j);
        a[i] += a[j];
        a[j] = 0.0;
        alive[j] = false;
        let moved = std::mem::take(&mut members[j]);
        members[i].extend(moved);
        members[i].sort_unstable();
    }

    members.into_iter().filter(|m| !m.is_empty()).collect()
}

/// Asynchronous weighted label propagation with a seeded visit order.
///
/// Each round visits nodes in shuffled order and moves a node to a label of
/// maximal neighbor weight when its current label is not one of them. Stops
/// when a round changes nothing or after `max_rounds`.
pub fn label_propagation(adj: &Adjacency, seed: u64, max_rounds: usize) -> Vec<Vec<usize>> {
    let n = adj.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut labels: Vec<usize> = (0..n).collect();
    let mut order: Vec<usize> = (0..n).collect();

    for _ in 0..max_rounds {
        order.shuffle(&mut rng);
        let mut changed = false;
        for &v in &order {
            if adj[v].is_empty() {
                continue;
            }
            let mut weight_by_label: BTreeMap<usize, f64> = BTreeMap::new();
            for &(u, w) in &adj[v] {
                *weight_by_label.entry(labels[u]).or_insert(0.0) += w;
            }
            let max = weight_by_label
                .values()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            let best: Vec<usize> = weight_by_label
                .iter()
                .filter(|(_, w)| **w == max)
                .map(|(label, _)| *label)
                .collect();
            if best.contains(&labels[v]) {
                continue;
            }
            if let Some(&label) = best.choose(&mut rng) {
                labels[v] = label;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (v, label) in labels.into_iter().enumerate() {
        groups.entry(label).or_default().push(v);
    }
    groups.into_values().collect()
}

/// Largest first; equal sizes ordered by their lowest member.
pub fn order_communities(mut communities: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    communities.retain(|c| !c.is_empty());
    communities.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
    communities
}
