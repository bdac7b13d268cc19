//! Fiedler vector / algebraic connectivity via matrix-free power
//! iteration, and recursive spectral bisection on top of it.
//!
//! The workspace has no linear-algebra crate (`nalgebra`/`ndarray` are
//! not part of this system's dependency table — see DESIGN.md), so the
//! second-smallest Laplacian eigenpair is approximated with deflated
//! power iteration: the graph's largest eigenvalue bounds a shift that
//! turns "smallest nonzero" into "largest" of a shifted operator, and
//! projecting out the all-ones vector removes the trivial eigenvalue-0
//! component at every step.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use roam_storage::SymbolId;

use super::SymbolGraph;

const POWER_ITERATIONS: usize = 500;
const POWER_TOLERANCE: f64 = 1e-9;

/// One connected component of the undirected projection, as node
/// indices into the owning `SymbolGraph`.
fn connected_components(g: &SymbolGraph) -> Vec<Vec<NodeIndex>> {
    let adj = g.undirected_adjacency();
    let mut seen = std::collections::HashSet::new();
    let mut components = Vec::new();
    for &start in adj.keys() {
        if seen.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start);
        seen.insert(start);
        while let Some(v) = queue.pop_front() {
            component.push(v);
            for &w in adj.get(&v).into_iter().flatten() {
                if seen.insert(w) {
                    queue.push_back(w);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Laplacian-vector product `L*x = D*x - A*x` restricted to `nodes`,
/// computed without ever materializing the matrix.
fn laplacian_multiply(
    adj: &HashMap<NodeIndex, Vec<NodeIndex>>,
    index: &HashMap<NodeIndex, usize>,
    x: &[f64],
) -> Vec<f64> {
    let mut out = vec![0.0; x.len()];
    for (&node, neighbors) in adj {
        let i = index[&node];
        let degree = neighbors.len() as f64;
        let neighbor_sum: f64 = neighbors.iter().map(|n| x[index[n]]).sum();
        out[i] = degree * x[i] - neighbor_sum;
    }
    out
}

/// Fiedler value (second-smallest Laplacian eigenvalue) and its
/// eigenvector on the largest connected component of the undirected
/// projection, per `graph/cycles.py`'s `algebraic_connectivity`.
/// Returns `(0.0, vec![])` for graphs with fewer than 3 nodes in their
/// largest component.
pub fn algebraic_connectivity(g: &SymbolGraph) -> (f64, Vec<SymbolId>) {
    if g.len() < 3 {
        return (0.0, Vec::new());
    }
    let components = connected_components(g);
    let Some(largest) = components.into_iter().max_by_key(|c| c.len()) else {
        return (0.0, Vec::new());
    };
    if largest.len() < 3 {
        return (0.0, Vec::new());
    }
    fiedler_on_component(g, &largest)
}

fn fiedler_on_component(g: &SymbolGraph, nodes: &[NodeIndex]) -> (f64, Vec<SymbolId>) {
    let full_adj = g.undirected_adjacency();
    let member_set: std::collections::HashSet<NodeIndex> = nodes.iter().copied().collect();
    let index: HashMap<NodeIndex, usize> =
        nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();
    let adj: HashMap<NodeIndex, Vec<NodeIndex>> = nodes
        .iter()
        .map(|&n| {
            let neighbors = full_adj
                .get(&n)
                .into_iter()
                .flatten()
                .copied()
                .filter(|w| member_set.contains(w))
                .collect();
            (n, neighbors)
        })
        .collect();
    let n = nodes.len();
    let max_degree = adj.values().map(|v| v.len()).max().unwrap_or(1) as f64;
    // Shift so the dominant eigenvalue of (shift*I - L) corresponds to
    // the smallest eigenvalue of L; deflate against the all-ones
    // vector (the known eigenvalue-0 eigenvector) every iteration so
    // power iteration converges to the second-smallest instead.
    let shift = 2.0 * max_degree + 1.0;

    let mut x: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    deflate_mean(&mut x);
    normalize(&mut x);

    for _ in 0..POWER_ITERATIONS {
        let lx = laplacian_multiply(&adj, &index, &x);
        let mut y: Vec<f64> = x.iter().zip(&lx).map(|(&xi, &lxi)| shift * xi - lxi).collect();
        deflate_mean(&mut y);
        normalize(&mut y);
        let delta: f64 = x.iter().zip(&y).map(|(a, b)| (a - b).abs()).sum();
        x = y;
        if delta < POWER_TOLERANCE {
            break;
        }
    }
    // Recover the actual Laplacian eigenvalue via the Rayleigh
    // quotient x^T L x (x has unit norm), since the power-iteration
    // loop above tracks the shifted operator's eigenvalue instead.
    let lx = laplacian_multiply(&adj, &index, &x);
    let fiedler_value = x.iter().zip(&lx).map(|(a, b)| a * b).sum::<f64>();

    let mut ids: Vec<(f64, SymbolId)> =
        nodes.iter().enumerate().map(|(i, &idx)| (x[i], g.symbol_of(idx))).collect();
    ids.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    (fiedler_value.max(0.0), ids.into_iter().map(|(_, id)| id).collect())
}

fn deflate_mean(v: &mut [f64]) {
    let mean: f64 = v.iter().sum::<f64>() / v.len() as f64;
    for x in v.iter_mut() {
        *x -= mean;
    }
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModularityClass {
    WellModularized,
    ModeratelyModularized,
    TightlyCoupled,
}

/// Classify a spectral gap (Fiedler value relative to the component's
/// max degree) into the three-bucket label the envelope reports.
/// Thresholds are this system's own; see DESIGN.md.
pub fn classify_gap(fiedler_value: f64, node_count: usize) -> ModularityClass {
    if node_count < 3 {
        return ModularityClass::WellModularized;
    }
    let normalized = fiedler_value / node_count as f64;
    if normalized > 0.1 {
        ModularityClass::TightlyCoupled
    } else if normalized > 0.02 {
        ModularityClass::ModeratelyModularized
    } else {
        ModularityClass::WellModularized
    }
}

/// One level of the recursive bisection tree: a node set split into
/// two halves along the sign of the Fiedler vector, down to
/// `max_depth` or until a half drops below 3 members.
#[derive(Debug, Clone)]
pub struct Bisection {
    pub members: Vec<SymbolId>,
    pub fiedler_value: f64,
    pub class: ModularityClass,
    pub children: Vec<Bisection>,
}

pub fn bisect(g: &SymbolGraph, max_depth: u32) -> Vec<Bisection> {
    connected_components(g)
        .into_iter()
        .map(|component| bisect_component(g, &component, max_depth))
        .collect()
}

fn bisect_component(g: &SymbolGraph, nodes: &[NodeIndex], depth_remaining: u32) -> Bisection {
    let members: Vec<SymbolId> = nodes.iter().map(|&n| g.symbol_of(n)).collect();
    if nodes.len() < 3 || depth_remaining == 0 {
        return Bisection { members, fiedler_value: 0.0, class: ModularityClass::WellModularized, children: Vec::new() };
    }
    let (fiedler_value, ordered) = fiedler_on_component(g, nodes);
    let class = classify_gap(fiedler_value, nodes.len());
    if fiedler_value <= 0.0 || ordered.is_empty() {
        return Bisection { members, fiedler_value, class, children: Vec::new() };
    }

    let mid = ordered.len() / 2;
    let left_ids: std::collections::HashSet<SymbolId> = ordered[..mid].iter().copied().collect();
    let (left, right): (Vec<NodeIndex>, Vec<NodeIndex>) =
        nodes.iter().partition(|&&n| left_ids.contains(&g.symbol_of(n)));
    if left.is_empty() || right.is_empty() {
        return Bisection { members, fiedler_value, class, children: Vec::new() };
    }

    let children = vec![
        bisect_component(g, &left, depth_remaining - 1),
        bisect_component(g, &right, depth_remaining - 1),
    ];
    Bisection { members, fiedler_value, class, children }
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
    fn two_node_graph_has_zero_connectivity() {
        let g = SymbolGraph::from_records(vec![sym(1), sym(2)], vec![edge(1, 1, 2)]);
        let (value, _) = algebraic_connectivity(&g);
        assert_eq!(value, 0.0);
    }

    #[test]
    fn two_disjoint_triangles_are_weakly_connected_overall() {
        // Two separate triangles joined by a single bridge edge: cutting
        // the bridge disconnects the graph, so the Fiedler value should
        // be small relative to a single well-knit triangle.
        let symbols: Vec<_> = (1..=6).map(sym).collect();
        let edges = vec![
            edge(1, 1, 2), edge(2, 2, 3), edge(3, 3, 1),
            edge(4, 4, 5), edge(5, 5, 6), edge(6, 6, 4),
            edge(7, 3, 4),
        ];
        let g = SymbolGraph::from_records(symbols, edges);
        let (value, ordered) = algebraic_connectivity(&g);
        assert!(value >= 0.0);
        assert_eq!(ordered.len(), 6);
    }

    #[test]
    fn complete_graph_has_high_connectivity_class() {
        let symbols: Vec<_> = (1..=4).map(sym).collect();
        let mut edges = Vec::new();
        let mut id = 1;
        for a in 1..=4 {
            for b in 1..=4 {
                if a != b {
                    edges.push(edge(id, a, b));
                    id += 1;
                }
            }
        }
        let g = SymbolGraph::from_records(symbols, edges);
        let (value, _) = algebraic_connectivity(&g);
        assert!(value > 0.5, "expected a tightly connected complete graph, got {value}");
    }

    #[test]
    fn bisect_splits_two_triangles_along_the_bridge() {
        let symbols: Vec<_> = (1..=6).map(sym).collect();
        let edges = vec![
            edge(1, 1, 2), edge(2, 2, 3), edge(3, 3, 1),
            edge(4, 4, 5), edge(5, 5, 6), edge(6, 6, 4),
            edge(7, 3, 4),
        ];
        let g = SymbolGraph::from_records(symbols, edges);
        let trees = bisect(&g, 2);
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].members.len(), 6);
    }
}
