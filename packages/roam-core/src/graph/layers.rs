//! Topological layer assignment and layering violations. Cycles are
//! condensed into supernodes first so the layer DAG is well-defined
//! even over a graph that itself has cycles.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use roam_storage::SymbolId;

use super::SymbolGraph;

/// `{symbol_id: layer}`. Source SCCs (no incoming cross-SCC edges) sit
/// at layer 0; every other SCC's layer is `1 + max(predecessor
/// layers)`.
pub fn detect_layers(g: &SymbolGraph) -> HashMap<SymbolId, i64> {
    if g.is_empty() {
        return HashMap::new();
    }
    let sccs = tarjan_scc(&g.graph);
    let scc_of: HashMap<_, usize> = sccs
        .iter()
        .enumerate()
        .flat_map(|(i, members)| members.iter().map(move |&n| (n, i)))
        .collect();

    let mut condensed_edges: HashSet<(usize, usize)> = HashSet::new();
    for edge in g.graph.edge_references() {
        let a = scc_of[&edge.source()];
        let b = scc_of[&edge.target()];
        if a != b {
            condensed_edges.insert((a, b));
        }
    }

    let mut preds: HashMap<usize, Vec<usize>> = (0..sccs.len()).map(|i| (i, Vec::new())).collect();
    let mut indegree: HashMap<usize, usize> = (0..sccs.len()).map(|i| (i, 0)).collect();
    for &(a, b) in &condensed_edges {
        preds.get_mut(&b).unwrap().push(a);
        *indegree.get_mut(&b).unwrap() += 1;
    }

    let mut queue: VecDeque<usize> =
        indegree.iter().filter(|(_, &d)| d == 0).map(|(&i, _)| i).collect();
    let mut remaining = indegree.clone();
    let mut topo_order = Vec::new();
    let mut out_edges: HashMap<usize, Vec<usize>> = (0..sccs.len()).map(|i| (i, Vec::new())).collect();
    for &(a, b) in &condensed_edges {
        out_edges.get_mut(&a).unwrap().push(b);
    }
    while let Some(n) = queue.pop_front() {
        topo_order.push(n);
        for &succ in &out_edges[&n] {
            let d = remaining.get_mut(&succ).unwrap();
            *d -= 1;
            if *d == 0 {
                queue.push_back(succ);
            }
        }
    }

    let mut scc_layer: HashMap<usize, i64> = HashMap::new();
    for &scc in &topo_order {
        let layer = preds[&scc].iter().map(|p| scc_layer[p]).max().map(|m| m + 1).unwrap_or(0);
        scc_layer.insert(scc, layer);
    }

    g.graph
        .node_indices()
        .map(|idx| (g.symbol_of(idx), scc_layer.get(&scc_of[&idx]).copied().unwrap_or(0)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerViolation {
    pub source: SymbolId,
    pub target: SymbolId,
    pub source_layer: i64,
    pub target_layer: i64,
    pub layer_distance: i64,
    pub severity: f64,
}

/// Edges that run against the grain of the layering.
///
/// Cross-SCC edges can never violate `detect_layers`'s condensation: by
/// construction a successor SCC's layer is always `1 + max(predecessor
/// layers)`, so every cross-SCC edge points strictly forward. The only
/// edges that can run backward are the ones condensation absorbed —
/// the edges internal to a cycle. This walks the raw graph depth-first
/// and flags every edge whose target is still an ancestor on the
/// current path (a back edge in the classic DFS sense); those are
/// exactly the edges that close a cycle. `layer_distance` is the
/// DFS-depth gap between the edge and the ancestor it closes on, not a
/// cross-layer gap, since both endpoints of a back edge share one SCC
/// and therefore one layer.
pub fn find_violations(g: &SymbolGraph, layers: &HashMap<SymbolId, i64>) -> Vec<LayerViolation> {
    let node_count = g.graph.node_count().max(1) as f64;
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut on_path: HashMap<NodeIndex, i64> = HashMap::new();
    let mut out = Vec::new();

    for start in g.graph.node_indices() {
        if !visited.contains(&start) {
            walk(g, start, 0, &mut visited, &mut on_path, layers, node_count, &mut out);
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn walk(
    g: &SymbolGraph,
    node: NodeIndex,
    depth: i64,
    visited: &mut HashSet<NodeIndex>,
    on_path: &mut HashMap<NodeIndex, i64>,
    layers: &HashMap<SymbolId, i64>,
    node_count: f64,
    out: &mut Vec<LayerViolation>,
) {
    visited.insert(node);
    on_path.insert(node, depth);

    for edge in g.graph.edges_directed(node, Direction::Outgoing) {
        let succ = edge.target();
        if let Some(&ancestor_depth) = on_path.get(&succ) {
            let src = g.symbol_of(node);
            let tgt = g.symbol_of(succ);
            let source_layer = layers.get(&src).copied().unwrap_or(0);
            let target_layer = layers.get(&tgt).copied().unwrap_or(0);
            let distance = depth - ancestor_depth;
            let severity = (distance as f64 / node_count * 1000.0).round() / 1000.0;
            out.push(LayerViolation {
                source: src,
                target: tgt,
                source_layer,
                target_layer,
                layer_distance: distance,
                severity,
            });
        } else if !visited.contains(&succ) {
            walk(g, succ, depth + 1, visited, on_path, layers, node_count, out);
        }
    }

    on_path.remove(&node);
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
    fn linear_chain_gets_increasing_layers() {
        let symbols = vec![sym(1), sym(2), sym(3)];
        let edges = vec![edge(1, 1, 2), edge(2, 2, 3)];
        let g = SymbolGraph::from_records(symbols, edges);
        let layers = detect_layers(&g);
        assert_eq!(layers[&1], 0);
        assert_eq!(layers[&2], 1);
        assert_eq!(layers[&3], 2);
    }

    #[test]
    fn a_cycle_condenses_into_one_layer() {
        let symbols = vec![sym(1), sym(2), sym(3)];
        let edges = vec![edge(1, 1, 2), edge(2, 2, 1), edge(3, 1, 3)];
        let g = SymbolGraph::from_records(symbols, edges);
        let layers = detect_layers(&g);
        assert_eq!(layers[&1], layers[&2]);
        assert!(layers[&3] > layers[&1]);
    }

    #[test]
    fn backward_edge_is_flagged_as_a_violation() {
        // 2 -> 3 -> 2 forms a cycle, condensing {2, 3} into one SCC;
        // 3 -> 2 is the edge that closes it and is flagged as a back
        // edge regardless of condensation.
        let symbols = vec![sym(1), sym(2), sym(3)];
        let edges = vec![edge(1, 1, 2), edge(2, 2, 3), edge(3, 3, 2)];
        let g = SymbolGraph::from_records(symbols, edges);
        let layers = detect_layers(&g);
        let violations = find_violations(&g, &layers);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].source, 3);
        assert_eq!(violations[0].target, 2);
        assert_eq!(violations[0].source_layer, violations[0].target_layer);
        assert!(violations[0].layer_distance > 0);
    }

    #[test]
    fn acyclic_graph_has_no_violations() {
        let symbols = vec![sym(1), sym(2), sym(3)];
        let edges = vec![edge(1, 1, 2), edge(2, 2, 3)];
        let g = SymbolGraph::from_records(symbols, edges);
        let layers = detect_layers(&g);
        assert!(find_violations(&g, &layers).is_empty());
    }

    #[test]
    fn no_nodes_means_no_layers() {
        let g = SymbolGraph::from_records(vec![], vec![]);
        assert!(detect_layers(&g).is_empty());
    }
}
