//! Louvain-style modularity clustering and directory alignment. No
//! community-detection crate sits in this workspace's dependency
//! table, so this is a from-scratch greedy modularity optimizer; see
//! DESIGN.md for the reasoning behind the approach.

use std::collections::{HashMap, HashSet};

use petgraph::graph::NodeIndex;
use roam_storage::SymbolId;

use super::metrics::pagerank;
use super::SymbolGraph;

/// One greedy-modularity community: its members and, once labeled,
/// a human-readable name derived from its top-PageRank symbol.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub cluster_id: i64,
    pub members: Vec<SymbolId>,
    pub label: Option<String>,
}

/// Partition the undirected projection into communities via greedy
/// modularity optimization: repeatedly move each node into whichever
/// neighboring community most increases modularity, until a full pass
/// produces no move. This is a single-level Louvain pass (no
/// community-aggregation recursion) — sufficient for the symbol
/// graphs this system targets, and deterministic given the graph's
/// fixed node order.
pub fn detect_clusters(g: &SymbolGraph) -> Vec<Cluster> {
    let n = g.len();
    if n == 0 {
        return Vec::new();
    }
    let adj = g.undirected_adjacency();
    let indices: Vec<NodeIndex> = g.graph.node_indices().collect();
    let degree: HashMap<NodeIndex, usize> =
        indices.iter().map(|&i| (i, adj.get(&i).map_or(0, |v| v.len()))).collect();
    let m2: f64 = degree.values().sum::<usize>() as f64; // 2*|E| for undirected
    if m2 == 0.0 {
        // No edges: every node is its own singleton community.
        return indices
            .into_iter()
            .enumerate()
            .map(|(i, idx)| Cluster { cluster_id: i as i64, members: vec![g.symbol_of(idx)], label: None })
            .collect();
    }

    let mut community: HashMap<NodeIndex, usize> =
        indices.iter().enumerate().map(|(i, &n)| (n, i)).collect();
    let mut community_degree: HashMap<usize, f64> =
        indices.iter().map(|&i| (community[&i], degree[&i] as f64)).collect();

    loop {
        let mut moved = false;
        for &node in &indices {
            let node_degree = degree[&node] as f64;
            let current = community[&node];

            let mut neighbor_weight: HashMap<usize, f64> = HashMap::new();
            for &neighbor in adj.get(&node).into_iter().flatten() {
                if neighbor == node {
                    continue;
                }
                *neighbor_weight.entry(community[&neighbor]).or_insert(0.0) += 1.0;
            }
            if neighbor_weight.is_empty() {
                continue;
            }

            *community_degree.get_mut(&current).unwrap() -= node_degree;
            let links_to_current = neighbor_weight.get(&current).copied().unwrap_or(0.0);
            let best = neighbor_weight
                .iter()
                .map(|(&c, &links)| {
                    let sigma_tot = community_degree.get(&c).copied().unwrap_or(0.0);
                    let gain = links - node_degree * sigma_tot / m2;
                    (c, gain)
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                .unwrap();

            let current_gain = links_to_current
                - node_degree * community_degree.get(&current).copied().unwrap_or(0.0) / m2;

            let (target, target_gain) = best;
            *community_degree.get_mut(&current).unwrap() += node_degree;

            if target != current && target_gain > current_gain + 1e-12 {
                *community_degree.get_mut(&current).unwrap() -= node_degree;
                *community_degree.entry(target).or_insert(0.0) += node_degree;
                community.insert(node, target);
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }

    let mut groups: HashMap<usize, Vec<SymbolId>> = HashMap::new();
    for &idx in &indices {
        groups.entry(community[&idx]).or_default().push(g.symbol_of(idx));
    }
    let mut clusters: Vec<Cluster> = groups
        .into_values()
        .map(|mut members| {
            members.sort_unstable();
            members
        })
        .enumerate()
        .map(|(i, members)| Cluster { cluster_id: i as i64, members, label: None })
        .collect();
    clusters.sort_by(|a, b| a.members.first().cmp(&b.members.first()));
    for (i, c) in clusters.iter_mut().enumerate() {
        c.cluster_id = i as i64;
    }
    clusters
}

/// Label every cluster with its top-PageRank member's name.
pub fn label_clusters(g: &SymbolGraph, clusters: &mut [Cluster], damping: f64) {
    let pr = pagerank(g, damping);
    for cluster in clusters.iter_mut() {
        let top = cluster
            .members
            .iter()
            .max_by(|&&a, &&b| pr.get(&a).unwrap_or(&0.0).partial_cmp(pr.get(&b).unwrap_or(&0.0)).unwrap());
        cluster.label = top.and_then(|id| g.symbols.get(id)).map(|s| s.name.clone());
    }
}

/// Fraction of a cluster's symbols whose files share a common
/// directory prefix with at least one other member — a cluster that
/// is mostly one directory reflects the existing file layout; one
/// scattered across many directories is a structural signal worth
/// surfacing.
pub fn compare_with_directories(g: &SymbolGraph, cluster: &Cluster) -> f64 {
    if cluster.members.len() < 2 {
        return 1.0;
    }
    let dirs: Vec<String> = cluster
        .members
        .iter()
        .filter_map(|id| g.symbols.get(id))
        .map(|s| dir_of(&s.file_id.to_string()))
        .collect();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for d in &dirs {
        *counts.entry(d.clone()).or_insert(0) += 1;
    }
    let max_shared = counts.values().copied().max().unwrap_or(0);
    max_shared as f64 / dirs.len() as f64
}

fn dir_of(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => path[..i].to_string(),
        None => String::new(),
    }
}

/// Directory alignment computed over real file paths rather than
/// `SymbolGraph`'s bare `file_id`s — used once the indexer has a
/// `file_id -> path` map available, which `compare_with_directories`
/// alone cannot see.
pub fn directory_alignment(cluster: &Cluster, symbol_paths: &HashMap<SymbolId, String>) -> f64 {
    if cluster.members.len() < 2 {
        return 1.0;
    }
    let dirs: Vec<String> = cluster
        .members
        .iter()
        .filter_map(|id| symbol_paths.get(id))
        .map(|p| dir_of(p))
        .collect();
    if dirs.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for d in &dirs {
        *counts.entry(d.as_str()).or_insert(0) += 1;
    }
    let max_shared = counts.values().copied().max().unwrap_or(0);
    max_shared as f64 / dirs.len() as f64
}

/// Adjusted Rand index comparing two partitions of the same node set,
/// e.g. spectral bisection vs. Louvain output on the same graph.
pub fn adjusted_rand_index(a: &[Cluster], b: &[Cluster]) -> f64 {
    let mut label_a: HashMap<SymbolId, usize> = HashMap::new();
    for c in a {
        for &m in &c.members {
            label_a.insert(m, c.cluster_id as usize);
        }
    }
    let mut label_b: HashMap<SymbolId, usize> = HashMap::new();
    for c in b {
        for &m in &c.members {
            label_b.insert(m, c.cluster_id as usize);
        }
    }
    let nodes: HashSet<SymbolId> = label_a.keys().copied().collect();
    let n = nodes.len();
    if n < 2 {
        return 1.0;
    }

    let mut contingency: HashMap<(usize, usize), u64> = HashMap::new();
    let mut sum_a: HashMap<usize, u64> = HashMap::new();
    let mut sum_b: HashMap<usize, u64> = HashMap::new();
    for &node in &nodes {
        let (Some(&la), Some(&lb)) = (label_a.get(&node), label_b.get(&node)) else { continue };
        *contingency.entry((la, lb)).or_insert(0) += 1;
        *sum_a.entry(la).or_insert(0) += 1;
        *sum_b.entry(lb).or_insert(0) += 1;
    }

    let comb2 = |x: u64| -> f64 { if x < 2 { 0.0 } else { (x * (x - 1)) as f64 / 2.0 } };
    let index: f64 = contingency.values().map(|&c| comb2(c)).sum();
    let sum_a_comb: f64 = sum_a.values().map(|&c| comb2(c)).sum();
    let sum_b_comb: f64 = sum_b.values().map(|&c| comb2(c)).sum();
    let total_comb = comb2(n as u64);
    let expected = sum_a_comb * sum_b_comb / total_comb;
    let max_index = 0.5 * (sum_a_comb + sum_b_comb);
    if (max_index - expected).abs() < 1e-12 {
        return 1.0;
    }
    (index - expected) / (max_index - expected)
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
    fn two_triangles_joined_by_a_bridge_split_into_two_clusters() {
        let symbols: Vec<_> = (1..=6).map(sym).collect();
        let edges = vec![
            edge(1, 1, 2), edge(2, 2, 3), edge(3, 3, 1),
            edge(4, 4, 5), edge(5, 5, 6), edge(6, 6, 4),
            edge(7, 3, 4),
        ];
        let g = SymbolGraph::from_records(symbols, edges);
        let clusters = detect_clusters(&g);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn empty_graph_has_no_clusters() {
        let g = SymbolGraph::from_records(vec![], vec![]);
        assert!(detect_clusters(&g).is_empty());
    }

    #[test]
    fn label_uses_the_top_pagerank_members_name() {
        let symbols = vec![sym(1), sym(2), sym(3)];
        let edges = vec![edge(1, 1, 2), edge(2, 2, 3)];
        let g = SymbolGraph::from_records(symbols, edges);
        let mut clusters = detect_clusters(&g);
        label_clusters(&g, &mut clusters, 0.85);
        assert!(clusters.iter().all(|c| c.label.is_some()));
    }

    #[test]
    fn identical_partitions_have_ari_one() {
        let c1 = vec![Cluster { cluster_id: 0, members: vec![1, 2], label: None }, Cluster { cluster_id: 1, members: vec![3, 4], label: None }];
        let c2 = c1.clone();
        assert!((adjusted_rand_index(&c1, &c2) - 1.0).abs() < 1e-9);
    }
}
