//! Context propagation through the call graph: BFS outward from seed
//! symbols with exponentially decaying weights, blended with PageRank
//! into a single ranking.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use roam_storage::SymbolId;

use super::SymbolGraph;

/// BFS from `seed_nodes` through callee edges (downstream, weight
/// `decay^depth`) and caller edges (upstream, weight `(decay*0.5)^depth`).
/// Seeds score `1.0`; a node keeps the higher of the two directions'
/// scores if reached by both, and is only re-expanded through a given
/// direction if reached at a shallower depth than previously recorded.
pub fn propagate_context(
    g: &SymbolGraph,
    seed_nodes: &[SymbolId],
    max_depth: u32,
    decay: f64,
) -> HashMap<SymbolId, f64> {
    let seeds: HashSet<SymbolId> = seed_nodes.iter().copied().collect();
    if seeds.is_empty() {
        return HashMap::new();
    }
    let seed_indices: Vec<NodeIndex> = seeds.iter().filter_map(|&s| g.node_of(s)).collect();

    let mut scores: HashMap<NodeIndex, f64> = seed_indices.iter().map(|&i| (i, 1.0)).collect();

    bfs_direction(g, &seed_indices, &seeds, max_depth, decay, Direction::Outgoing, &mut scores);
    bfs_direction(g, &seed_indices, &seeds, max_depth, decay * 0.5, Direction::Incoming, &mut scores);

    scores.into_iter().map(|(idx, score)| (g.symbol_of(idx), score)).collect()
}

fn bfs_direction(
    g: &SymbolGraph,
    seed_indices: &[NodeIndex],
    seeds: &HashSet<SymbolId>,
    max_depth: u32,
    decay: f64,
    direction: Direction,
    scores: &mut HashMap<NodeIndex, f64>,
) {
    let mut visited: HashMap<NodeIndex, u32> = seed_indices.iter().map(|&i| (i, 0)).collect();
    let mut queue: VecDeque<(NodeIndex, u32)> = seed_indices.iter().map(|&i| (i, 0)).collect();

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let next_depth = depth + 1;
        let weight = decay.powi(next_depth as i32);
        for edge in g.graph.edges_directed(node, direction) {
            let neighbor = if direction == Direction::Outgoing { edge.target() } else { edge.source() };
            if seeds.contains(&g.symbol_of(neighbor)) {
                continue;
            }
            let improve = match visited.get(&neighbor) {
                None => true,
                Some(&prev) => prev > next_depth,
            };
            if improve {
                visited.insert(neighbor, next_depth);
                let prev_score = scores.get(&neighbor).copied().unwrap_or(0.0);
                scores.insert(neighbor, prev_score.max(weight));
                queue.push_back((neighbor, next_depth));
            }
        }
    }
}

/// Blend propagation scores with PageRank: both are normalized to
/// `[0, 1]` first so PageRank's tiny floats don't get drowned out by
/// propagation's already-bounded decay weights.
pub fn merge_rankings(
    pagerank_scores: &HashMap<SymbolId, f64>,
    propagation_scores: &HashMap<SymbolId, f64>,
    alpha: f64,
) -> HashMap<SymbolId, f64> {
    if pagerank_scores.is_empty() && propagation_scores.is_empty() {
        return HashMap::new();
    }

    let max_pr = pagerank_scores.values().copied().fold(0.0, f64::max);
    let norm_pr: HashMap<SymbolId, f64> = pagerank_scores
        .iter()
        .map(|(&k, &v)| (k, if max_pr > 0.0 { v / max_pr } else { 0.0 }))
        .collect();

    let max_prop = propagation_scores.values().copied().fold(0.0, f64::max);
    let norm_prop: HashMap<SymbolId, f64> = propagation_scores
        .iter()
        .map(|(&k, &v)| (k, if max_prop > 0.0 { v / max_prop } else { 0.0 }))
        .collect();

    let all_nodes: HashSet<SymbolId> = norm_pr.keys().chain(norm_prop.keys()).copied().collect();
    all_nodes
        .into_iter()
        .map(|node| {
            let pr_val = norm_pr.get(&node).copied().unwrap_or(0.0);
            let prop_val = norm_prop.get(&node).copied().unwrap_or(0.0);
            (node, alpha * prop_val + (1.0 - alpha) * pr_val)
        })
        .collect()
}

/// Transitive callees of `node` up to `max_depth`, ordered by BFS
/// depth then symbol id; the seed itself is excluded. Successors are
/// visited in sorted order at each level so ties resolve
/// deterministically.
pub fn callee_chain(g: &SymbolGraph, node: SymbolId, max_depth: u32) -> Vec<(SymbolId, u32)> {
    let Some(start) = g.node_of(node) else { return Vec::new() };
    let mut visited: HashMap<NodeIndex, u32> = HashMap::from([(start, 0)]);
    let mut queue: VecDeque<(NodeIndex, u32)> = VecDeque::from([(start, 0)]);
    let mut result = Vec::new();

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let next_depth = depth + 1;
        let mut successors: Vec<NodeIndex> =
            g.graph.edges_directed(current, Direction::Outgoing).map(|e| e.target()).collect();
        successors.sort_by_key(|&idx| g.symbol_of(idx));
        for neighbor in successors {
            if !visited.contains_key(&neighbor) {
                visited.insert(neighbor, next_depth);
                result.push((g.symbol_of(neighbor), next_depth));
                queue.push_back((neighbor, next_depth));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use roam_storage::{EdgeRecord, SymbolRecord, Visibility};

    fn sym(id: SymbolId) -> SymbolRecord {
        SymbolRecord {
            id,
            file_id: 1,
            name: format!("s{id}"),
            qualified_name: format!("m::s{id}"),
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

    fn edge(id: i64, a: SymbolId, b: SymbolId) -> EdgeRecord {
        EdgeRecord { id, source_id: a, target_id: b, kind: "calls".into(), line: None }
    }

    #[test]
    fn seed_node_scores_one() {
        let g = SymbolGraph::from_records(vec![sym(1), sym(2)], vec![edge(1, 1, 2)]);
        let scores = propagate_context(&g, &[1], 3, 0.5);
        assert_eq!(scores[&1], 1.0);
    }

    #[test]
    fn callee_decays_by_depth() {
        let g = SymbolGraph::from_records(vec![sym(1), sym(2), sym(3)], vec![edge(1, 1, 2), edge(2, 2, 3)]);
        let scores = propagate_context(&g, &[1], 3, 0.5);
        assert!((scores[&2] - 0.5).abs() < 1e-9);
        assert!((scores[&3] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn caller_direction_uses_half_decay() {
        let g = SymbolGraph::from_records(vec![sym(1), sym(2)], vec![edge(1, 1, 2)]);
        let scores = propagate_context(&g, &[2], 3, 0.5);
        assert!((scores[&1] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn empty_seeds_produce_no_scores() {
        let g = SymbolGraph::from_records(vec![sym(1)], vec![]);
        assert!(propagate_context(&g, &[], 3, 0.5).is_empty());
    }

    #[test]
    fn merge_rankings_blends_normalized_scores() {
        let pagerank = HashMap::from([(1, 0.1), (2, 0.2)]);
        let propagation = HashMap::from([(1, 1.0), (2, 0.5)]);
        let merged = merge_rankings(&pagerank, &propagation, 0.6);
        assert!(merged[&1] > merged[&2]);
    }

    #[test]
    fn callee_chain_orders_by_depth_then_id() {
        let g = SymbolGraph::from_records(
            vec![sym(1), sym(2), sym(3), sym(4)],
            vec![edge(1, 1, 3), edge(2, 1, 2), edge(3, 2, 4)],
        );
        let chain = callee_chain(&g, 1, 3);
        assert_eq!(chain, vec![(2, 1), (3, 1), (4, 2)]);
    }

    #[test]
    fn callee_chain_excludes_the_seed() {
        let g = SymbolGraph::from_records(vec![sym(1), sym(2)], vec![edge(1, 1, 2), edge(2, 2, 1)]);
        let chain = callee_chain(&g, 1, 3);
        assert!(!chain.iter().any(|(id, _)| *id == 1));
    }
}
