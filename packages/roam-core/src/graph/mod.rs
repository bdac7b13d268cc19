//! The in-memory symbol graph every analysis in this module family
//! runs over, plus the submodules that compute derived metrics,
//! topology, clustering, and context propagation on top of it.
//!
//! Nodes are petgraph node indices; `SymbolGraph` keeps the mapping
//! back to `SymbolId` so algorithms can report results keyed by the
//! stable database id rather than the transient graph index.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use roam_storage::{EdgeRecord, Result as StorageResult, Store, SymbolId, SymbolRecord};

pub mod clusters;
pub mod cycles;
pub mod dark_matter;
pub mod layers;
pub mod metrics;
pub mod propagation;
pub mod spectral;

/// A directed multigraph of symbols and the edges between them,
/// loaded once per analysis pass from the store. Edge weights carry
/// the edge kind string (`"calls"`, `"imports"`, ...) so algorithms
/// that only care about certain kinds can filter without a second
/// store round-trip.
pub struct SymbolGraph {
    pub graph: DiGraph<SymbolId, String>,
    pub symbols: HashMap<SymbolId, SymbolRecord>,
    index_of: HashMap<SymbolId, NodeIndex>,
}

impl SymbolGraph {
    /// Build the graph from every symbol and edge currently in the
    /// store. Node order follows symbol id ascending so any algorithm
    /// that iterates `graph.node_indices()` produces a deterministic
    /// order, and ties in ranked output are broken by id.
    pub fn load(store: &Store) -> StorageResult<Self> {
        let mut symbols = store.all_symbols()?;
        symbols.sort_by_key(|s| s.id);
        let edges = store.all_edges()?;
        Ok(Self::from_records(symbols, edges))
    }

    pub fn from_records(symbols: Vec<SymbolRecord>, edges: Vec<EdgeRecord>) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::with_capacity(symbols.len());
        let mut by_id = HashMap::with_capacity(symbols.len());
        for sym in symbols {
            let id = sym.id;
            let idx = graph.add_node(id);
            index_of.insert(id, idx);
            by_id.insert(id, sym);
        }
        for edge in edges {
            let (Some(&src), Some(&tgt)) =
                (index_of.get(&edge.source_id), index_of.get(&edge.target_id))
            else {
                continue;
            };
            graph.add_edge(src, tgt, edge.kind);
        }
        Self { graph, symbols: by_id, index_of }
    }

    pub fn node_of(&self, symbol_id: SymbolId) -> Option<NodeIndex> {
        self.index_of.get(&symbol_id).copied()
    }

    pub fn symbol_of(&self, idx: NodeIndex) -> SymbolId {
        self.graph[idx]
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Node ids in the deterministic order established at load time.
    pub fn ordered_ids(&self) -> Vec<SymbolId> {
        self.graph.node_indices().map(|idx| self.graph[idx]).collect()
    }

    /// Adjacency list of the undirected projection: every directed
    /// edge contributes a link in both directions. Shared by every
    /// submodule that treats "connected" rather than "calls" as the
    /// relation of interest (clustering, closeness, spectral, cycle
    /// connectivity).
    pub fn undirected_adjacency(&self) -> HashMap<NodeIndex, Vec<NodeIndex>> {
        let mut adj: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        for idx in self.graph.node_indices() {
            adj.entry(idx).or_default();
        }
        for edge in self.graph.edge_references() {
            adj.entry(edge.source()).or_default().push(edge.target());
            adj.entry(edge.target()).or_default().push(edge.source());
        }
        adj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roam_storage::Visibility;

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

    #[test]
    fn builds_deterministic_node_order_from_symbol_id() {
        let symbols = vec![sym(3, "c"), sym(1, "a"), sym(2, "b")];
        let g = SymbolGraph::from_records(symbols, vec![]);
        assert_eq!(g.ordered_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn dangling_edges_are_dropped_not_panicked_on() {
        let symbols = vec![sym(1, "a")];
        let edges = vec![EdgeRecord { id: 1, source_id: 1, target_id: 99, kind: "calls".into(), line: None }];
        let g = SymbolGraph::from_records(symbols, edges);
        assert_eq!(g.graph.edge_count(), 0);
    }
}
