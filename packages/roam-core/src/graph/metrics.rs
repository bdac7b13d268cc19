//! PageRank, centrality, closeness, eigenvector centrality, local
//! clustering coefficient, and a composite debt score, one row per
//! symbol.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use roam_storage::{GraphMetricsRecord, SymbolId};

use super::SymbolGraph;

const PAGERANK_MAX_ITERATIONS: usize = 100;
const PAGERANK_TOLERANCE: f64 = 1e-8;

/// Standard PageRank with uniform teleportation and uniform dangling
/// redistribution, matching `networkx.pagerank`'s default behavior:
/// scores form a probability distribution that sums to 1, not one
/// normalized by its max.
pub fn pagerank(g: &SymbolGraph, damping: f64) -> HashMap<SymbolId, f64> {
    let n = g.len();
    if n == 0 {
        return HashMap::new();
    }
    let indices: Vec<NodeIndex> = g.graph.node_indices().collect();
    let base = (1.0 - damping) / n as f64;
    let out_degree: HashMap<NodeIndex, usize> = indices
        .iter()
        .map(|&i| (i, g.graph.edges_directed(i, Direction::Outgoing).count()))
        .collect();
    let dangling: Vec<NodeIndex> = indices
        .iter()
        .copied()
        .filter(|i| out_degree[i] == 0)
        .collect();

    let mut scores: HashMap<NodeIndex, f64> =
        indices.iter().map(|&i| (i, 1.0 / n as f64)).collect();

    for _ in 0..PAGERANK_MAX_ITERATIONS {
        let dangling_mass: f64 = dangling.iter().map(|i| scores[i]).sum();
        let mut next = HashMap::with_capacity(n);
        let mut max_delta: f64 = 0.0;
        for &idx in &indices {
            let incoming_sum: f64 = g
                .graph
                .edges_directed(idx, Direction::Incoming)
                .map(|e| scores[&e.source()] / out_degree[&e.source()] as f64)
                .sum();
            let new_score = base + damping * (incoming_sum + dangling_mass / n as f64);
            max_delta = max_delta.max((new_score - scores[&idx]).abs());
            next.insert(idx, new_score);
        }
        scores = next;
        if max_delta < PAGERANK_TOLERANCE {
            break;
        }
    }

    indices.into_iter().map(|i| (g.symbol_of(i), scores[&i])).collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Centrality {
    pub in_degree: i64,
    pub out_degree: i64,
    pub betweenness: f64,
    pub closeness: f64,
    pub eigenvector: f64,
    pub clustering_coefficient: f64,
}

/// Degree, betweenness (sampled at `sample_k` pivots), closeness, and
/// clustering coefficient for every node. Betweenness sampling follows
/// `graph/pagerank.py`'s `compute_centrality`: at most `sample_k`
/// pivot sources are used so cost stays `O(k * m)` on large graphs
/// instead of `O(n * m)`.
pub fn centrality(g: &SymbolGraph, sample_k: usize) -> HashMap<SymbolId, Centrality> {
    let mut out: HashMap<SymbolId, Centrality> = g
        .graph
        .node_indices()
        .map(|idx| {
            let in_degree = g.graph.edges_directed(idx, Direction::Incoming).count() as i64;
            let out_degree = g.graph.edges_directed(idx, Direction::Outgoing).count() as i64;
            (g.symbol_of(idx), Centrality { in_degree, out_degree, ..Default::default() })
        })
        .collect();

    if g.is_empty() {
        return out;
    }

    let betweenness = betweenness_centrality(g, sample_k);
    let closeness = closeness_centrality(g);
    let eigenvector = eigenvector_centrality(g);
    let clustering = clustering_coefficient(g);

    for (idx, c) in out.iter_mut() {
        c.betweenness = betweenness.get(idx).copied().unwrap_or(0.0);
        c.closeness = closeness.get(idx).copied().unwrap_or(0.0);
        c.eigenvector = eigenvector.get(idx).copied().unwrap_or(0.0);
        c.clustering_coefficient = clustering.get(idx).copied().unwrap_or(0.0);
    }
    out
}

/// Unnormalized Brandes betweenness centrality, sampled from at most
/// `sample_k` pivot sources (all nodes when the graph is smaller).
/// Edges are treated as undirected for the shortest-path search, since
/// "is this symbol on the path between two others" doesn't care about
/// call direction.
fn betweenness_centrality(g: &SymbolGraph, sample_k: usize) -> HashMap<SymbolId, f64> {
    let indices: Vec<NodeIndex> = g.graph.node_indices().collect();
    let n = indices.len();
    let k = sample_k.min(n);
    let pivots = &indices[..k];

    let neighbors = g.undirected_adjacency();
    let mut scores: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, 0.0)).collect();

    for &s in pivots {
        let mut stack = Vec::new();
        let mut preds: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        let mut sigma: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, 0.0)).collect();
        let mut dist: HashMap<NodeIndex, i64> = indices.iter().map(|&i| (i, -1)).collect();
        sigma.insert(s, 1.0);
        dist.insert(s, 0);
        let mut queue = VecDeque::new();
        queue.push_back(s);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in neighbors.get(&v).into_iter().flatten() {
                if dist[&w] < 0 {
                    dist.insert(w, dist[&v] + 1);
                    queue.push_back(w);
                }
                if dist[&w] == dist[&v] + 1 {
                    *sigma.get_mut(&w).unwrap() += sigma[&v];
                    preds.entry(w).or_default().push(v);
                }
            }
        }

        let mut delta: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, 0.0)).collect();
        while let Some(w) = stack.pop() {
            for &v in preds.get(&w).into_iter().flatten() {
                let contrib = (sigma[&v] / sigma[&w]) * (1.0 + delta[&w]);
                *delta.get_mut(&v).unwrap() += contrib;
            }
            if w != s {
                *scores.get_mut(&w).unwrap() += delta[&w];
            }
        }
    }

    // Every pair is counted twice (once from each endpoint) in the
    // undirected accumulation; halve to match single-count convention.
    indices.into_iter().map(|i| (g.symbol_of(i), scores[&i] / 2.0)).collect()
}

/// Closeness centrality over the undirected projection:
/// `(reachable - 1) / sum(distances)`, Wasserman-Faust normalized by
/// `(reachable - 1) / (n - 1)` for graphs with unreachable nodes.
fn closeness_centrality(g: &SymbolGraph) -> HashMap<SymbolId, f64> {
    let adj = g.undirected_adjacency();
    let n = g.len();
    let mut out = HashMap::new();
    for &start in adj.keys() {
        let mut dist: HashMap<NodeIndex, i64> = HashMap::new();
        dist.insert(start, 0);
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(v) = queue.pop_front() {
            for &w in adj.get(&v).into_iter().flatten() {
                if !dist.contains_key(&w) {
                    dist.insert(w, dist[&v] + 1);
                    queue.push_back(w);
                }
            }
        }
        let reachable = dist.len();
        let total: i64 = dist.values().sum();
        let score = if reachable > 1 && total > 0 {
            let base = (reachable - 1) as f64 / total as f64;
            base * (reachable - 1) as f64 / (n - 1).max(1) as f64
        } else {
            0.0
        };
        out.insert(g.symbol_of(start), score);
    }
    out
}

/// Eigenvector centrality via power iteration on the undirected
/// adjacency matrix, normalized to unit L2 norm each step.
fn eigenvector_centrality(g: &SymbolGraph) -> HashMap<SymbolId, f64> {
    let adj = g.undirected_adjacency();
    let indices: Vec<NodeIndex> = g.graph.node_indices().collect();
    let n = indices.len();
    if n == 0 {
        return HashMap::new();
    }
    let mut x: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, 1.0 / (n as f64).sqrt())).collect();

    for _ in 0..200 {
        let mut next: HashMap<NodeIndex, f64> = indices.iter().map(|&i| (i, 0.0)).collect();
        for &i in &indices {
            let sum: f64 = adj.get(&i).into_iter().flatten().map(|w| x[w]).sum();
            next.insert(i, sum);
        }
        let norm = next.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm < 1e-12 {
            // Disconnected/edgeless graph: fall back to a uniform
            // vector rather than dividing by zero.
            return indices
                .into_iter()
                .map(|i| (g.symbol_of(i), 1.0 / (n as f64).sqrt()))
                .collect();
        }
        let mut max_delta: f64 = 0.0;
        for v in next.values_mut() {
            *v /= norm;
        }
        for &i in &indices {
            max_delta = max_delta.max((next[&i] - x[&i]).abs());
        }
        x = next;
        if max_delta < 1e-10 {
            break;
        }
    }
    x.into_iter().map(|(i, v)| (g.symbol_of(i), v)).collect()
}

/// Local clustering coefficient over the undirected projection:
/// fraction of a node's neighbor pairs that are themselves connected.
fn clustering_coefficient(g: &SymbolGraph) -> HashMap<SymbolId, f64> {
    let adj = g.undirected_adjacency();
    let sets: HashMap<NodeIndex, HashSet<NodeIndex>> =
        adj.iter().map(|(&k, v)| (k, v.iter().copied().collect())).collect();
    let mut out = HashMap::new();
    for (&node, neighbors) in &sets {
        let distinct: HashSet<NodeIndex> = neighbors.iter().copied().filter(|&n| n != node).collect();
        let k = distinct.len();
        if k < 2 {
            out.insert(g.symbol_of(node), 0.0);
            continue;
        }
        let mut links = 0usize;
        let neighbor_vec: Vec<NodeIndex> = distinct.into_iter().collect();
        for i in 0..neighbor_vec.len() {
            for j in (i + 1)..neighbor_vec.len() {
                if sets.get(&neighbor_vec[i]).is_some_and(|s| s.contains(&neighbor_vec[j])) {
                    links += 1;
                }
            }
        }
        let possible = k * (k - 1) / 2;
        out.insert(g.symbol_of(node), links as f64 / possible as f64);
    }
    out
}

/// Composite structural-debt signal: a symbol scores high when it is
/// both heavily relied upon (betweenness, in-degree) and poorly
/// modularized around (low clustering coefficient) — the combination
/// that makes a symbol expensive to change safely. Weights and shape
/// are this system's own; see DESIGN.md.
pub fn debt_score(pagerank: f64, c: &Centrality, max_betweenness: f64) -> f64 {
    let betweenness_norm = if max_betweenness > 0.0 { c.betweenness / max_betweenness } else { 0.0 };
    let coupling = (c.in_degree + c.out_degree) as f64;
    let coupling_norm = coupling / (coupling + 10.0);
    let isolation = 1.0 - c.clustering_coefficient;
    (0.4 * betweenness_norm + 0.3 * coupling_norm + 0.2 * pagerank + 0.1 * isolation).clamp(0.0, 1.0)
}

/// Compute every `graph_metrics` row for the whole graph in one pass.
pub fn compute_all(g: &SymbolGraph, damping: f64, sample_k: usize) -> Vec<GraphMetricsRecord> {
    if g.is_empty() {
        return Vec::new();
    }
    let pr = pagerank(g, damping);
    let cent = centrality(g, sample_k);
    let max_betweenness = cent.values().map(|c| c.betweenness).fold(0.0, f64::max);

    g.ordered_ids()
        .into_iter()
        .map(|id| {
            let c = cent.get(&id).copied().unwrap_or_default();
            let pr_score = pr.get(&id).copied().unwrap_or(0.0);
            GraphMetricsRecord {
                symbol_id: id,
                pagerank: pr_score,
                in_degree: c.in_degree,
                out_degree: c.out_degree,
                betweenness: c.betweenness,
                closeness: c.closeness,
                eigenvector: c.eigenvector,
                clustering_coefficient: c.clustering_coefficient,
                debt_score: debt_score(pr_score, &c, max_betweenness),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use roam_storage::{EdgeRecord, SymbolRecord, Visibility};

    fn sym(id: SymbolId, name: &str) -> SymbolRecord {
        SymbolRecord {
            id,
            file_id: 1,
            name: name.to_string(),
            qualified_name: format!("m::{name}"),
            kind: "function".into(),
            signature: None,
            line_start: 1,
            line_end: 2,
            docstring: None,
            visibility: Visibility::Public,
            is_exported: true,
            parent_id: None,
            default_value: None,
        }
    }

    fn edge(id: i64, src: SymbolId, tgt: SymbolId) -> EdgeRecord {
        EdgeRecord { id, source_id: src, target_id: tgt, kind: "calls".into(), line: None }
    }

    fn linear_graph() -> SymbolGraph {
        let symbols = vec![sym(1, "a"), sym(2, "b"), sym(3, "c")];
        let edges = vec![edge(1, 1, 2), edge(2, 2, 3)];
        SymbolGraph::from_records(symbols, edges)
    }

    #[test]
    fn pagerank_sums_to_one() {
        let g = linear_graph();
        let scores = pagerank(&g, 0.85);
        let total: f64 = scores.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn pagerank_ranks_sink_highest_in_a_chain() {
        let g = linear_graph();
        let scores = pagerank(&g, 0.85);
        assert!(scores[&3] > scores[&2]);
        assert!(scores[&2] > scores[&1]);
    }

    #[test]
    fn empty_graph_has_no_pagerank() {
        let g = SymbolGraph::from_records(vec![], vec![]);
        assert!(pagerank(&g, 0.85).is_empty());
    }

    #[test]
    fn degree_centrality_matches_edges() {
        let g = linear_graph();
        let c = centrality(&g, 500);
        assert_eq!(c[&1].out_degree, 1);
        assert_eq!(c[&1].in_degree, 0);
        assert_eq!(c[&2].in_degree, 1);
        assert_eq!(c[&2].out_degree, 1);
    }

    #[test]
    fn middle_node_has_highest_betweenness_in_a_chain() {
        let g = linear_graph();
        let c = centrality(&g, 500);
        assert!(c[&2].betweenness >= c[&1].betweenness);
        assert!(c[&2].betweenness >= c[&3].betweenness);
    }

    #[test]
    fn triangle_has_full_clustering_coefficient() {
        let symbols = vec![sym(1, "a"), sym(2, "b"), sym(3, "c")];
        let edges = vec![edge(1, 1, 2), edge(2, 2, 3), edge(3, 3, 1)];
        let g = SymbolGraph::from_records(symbols, edges);
        let c = centrality(&g, 500);
        assert!((c[&1].clustering_coefficient - 1.0).abs() < 1e-9);
    }

    #[test]
    fn debt_score_is_bounded() {
        let g = linear_graph();
        let rows = compute_all(&g, 0.85, 500);
        for row in rows {
            assert!(row.debt_score >= 0.0 && row.debt_score <= 1.0);
        }
    }
}
