//! Strongly-connected-component cycle detection, weakest-edge
//! heuristics, and the propagation-cost coupling metric.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use roam_storage::SymbolId;

use super::spectral::algebraic_connectivity;
use super::SymbolGraph;

/// Strongly connected components with at least `min_size` members,
/// sorted by size descending, each component's members sorted by
/// symbol id for deterministic output.
pub fn find_cycles(g: &SymbolGraph, min_size: usize) -> Vec<Vec<SymbolId>> {
    if g.is_empty() {
        return Vec::new();
    }
    let mut sccs: Vec<Vec<SymbolId>> = tarjan_scc(&g.graph)
        .into_iter()
        .map(|comp| {
            let mut ids: Vec<SymbolId> = comp.into_iter().map(|idx| g.symbol_of(idx)).collect();
            ids.sort_unstable();
            ids
        })
        .filter(|comp| comp.len() >= min_size)
        .collect();
    sccs.sort_by_key(|b| std::cmp::Reverse(b.len()));
    sccs
}

/// Fraction of the system potentially affected by a change to any
/// single component: `transitive_closure_edges / (n * (n - 1))`.
pub fn propagation_cost(g: &SymbolGraph) -> f64 {
    let n = g.len();
    if n <= 1 {
        return 0.0;
    }
    let mut reachable_pairs = 0u64;
    for start in g.graph.node_indices() {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        seen.insert(start);
        while let Some(v) = queue.pop_front() {
            for edge in g.graph.edges_directed(v, Direction::Outgoing) {
                let w = edge.target();
                if seen.insert(w) {
                    queue.push_back(w);
                }
            }
        }
        seen.remove(&start);
        reachable_pairs += seen.len() as u64;
    }
    let denom = n as u64 * (n as u64 - 1);
    (reachable_pairs as f64 / denom as f64 * 10_000.0).round() / 10_000.0
}

/// The single edge in a cycle whose removal is most likely to break
/// it, via edge-betweenness centrality on the SCC subgraph (falling
/// back to a degree heuristic above 500 members).
pub fn find_weakest_edge(g: &SymbolGraph, scc_members: &[SymbolId]) -> Option<(SymbolId, SymbolId, String)> {
    let member_set: HashSet<SymbolId> = scc_members.iter().copied().collect();
    if member_set.len() < 2 {
        return None;
    }
    let internal_edges: Vec<(NodeIndex, NodeIndex)> = g
        .graph
        .edge_references()
        .filter(|e| {
            member_set.contains(&g.symbol_of(e.source())) && member_set.contains(&g.symbol_of(e.target()))
        })
        .map(|e| (e.source(), e.target()))
        .collect();
    if internal_edges.is_empty() {
        return None;
    }

    if member_set.len() <= 500 {
        if let Some((u, v, bw)) = edge_betweenness_best(g, &member_set, &internal_edges) {
            let reason = format!("highest edge betweenness in cycle ({bw:.3})");
            return Some((g.symbol_of(u), g.symbol_of(v), reason));
        }
    }

    let mut out_deg: HashMap<NodeIndex, i64> = HashMap::new();
    let mut in_deg: HashMap<NodeIndex, i64> = HashMap::new();
    for &(u, v) in &internal_edges {
        *out_deg.entry(u).or_insert(0) += 1;
        *in_deg.entry(v).or_insert(0) += 1;
    }
    let mut best: Option<(NodeIndex, NodeIndex)> = None;
    let mut best_score = (-1i64, -1i64);
    for &(u, v) in &internal_edges {
        let score = (out_deg[&u], in_deg[&v]);
        if score > best_score {
            best_score = score;
            best = Some((u, v));
        }
    }
    let (u, v) = best?;
    let src_out = out_deg[&u];
    let tgt_in = in_deg[&v];
    let reason = format!(
        "source has {src_out} outgoing edge{} in cycle, target has {tgt_in} incoming",
        if src_out != 1 { "s" } else { "" }
    );
    Some((g.symbol_of(u), g.symbol_of(v), reason))
}

/// Directed edge-betweenness (Brandes) restricted to an SCC subgraph:
/// shortest paths are counted along the induced directed edges only.
fn edge_betweenness_best(
    g: &SymbolGraph,
    members: &HashSet<SymbolId>,
    internal_edges: &[(NodeIndex, NodeIndex)],
) -> Option<(NodeIndex, NodeIndex, f64)> {
    let nodes: Vec<NodeIndex> =
        g.graph.node_indices().filter(|&i| members.contains(&g.symbol_of(i))).collect();
    let adj: HashMap<NodeIndex, Vec<NodeIndex>> = nodes
        .iter()
        .map(|&n| {
            let outs = g
                .graph
                .edges_directed(n, Direction::Outgoing)
                .map(|e| e.target())
                .filter(|t| members.contains(&g.symbol_of(*t)))
                .collect();
            (n, outs)
        })
        .collect();

    let mut edge_scores: HashMap<(NodeIndex, NodeIndex), f64> =
        internal_edges.iter().map(|&e| (e, 0.0)).collect();

    for &s in &nodes {
        let mut stack = Vec::new();
        let mut preds: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        let mut sigma: HashMap<NodeIndex, f64> = nodes.iter().map(|&n| (n, 0.0)).collect();
        let mut dist: HashMap<NodeIndex, i64> = nodes.iter().map(|&n| (n, -1)).collect();
        sigma.insert(s, 1.0);
        dist.insert(s, 0);
        let mut queue = VecDeque::new();
        queue.push_back(s);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in adj.get(&v).into_iter().flatten() {
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
        let mut delta: HashMap<NodeIndex, f64> = nodes.iter().map(|&n| (n, 0.0)).collect();
        while let Some(w) = stack.pop() {
            for &v in preds.get(&w).into_iter().flatten() {
                let contrib = (sigma[&v] / sigma[&w]) * (1.0 + delta[&w]);
                if let Some(score) = edge_scores.get_mut(&(v, w)) {
                    *score += contrib;
                }
                *delta.get_mut(&v).unwrap() += contrib;
            }
        }
    }

    edge_scores
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|((u, v), bw)| (u, v, bw))
}

/// Algebraic connectivity of the whole symbol graph, re-exported here
/// since `cycles.py` and `pagerank.py` both surface it as a topology
/// statistic alongside SCCs and propagation cost.
pub fn connectivity(g: &SymbolGraph) -> f64 {
    algebraic_connectivity(g).0
}
