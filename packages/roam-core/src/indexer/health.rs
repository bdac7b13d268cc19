//! Health snapshots: a point-in-time rollup of the whole graph's
//! condition, grounded on `commands/cmd_snapshot.py`'s reported fields
//! and `commands/cmd_dead.py`'s dead-export detection. The composite
//! `health_score` has no reference formula anywhere in the material
//! available to build from — its weights are this crate's own choice,
//! fixed here once so a snapshot is at least reproducible against
//! itself.

use std::collections::HashSet;

use roam_storage::{Result as StorageResult, SnapshotRecord, Store};

use crate::graph::{cycles, layers, metrics, SymbolGraph};

/// A component of `cycles::find_cycles` output counts as a "god
/// component" once it swallows more than 5% of the graph — or at
/// least 10 symbols, so small graphs don't flag on a trivial 3-node
/// cycle.
const GOD_COMPONENT_FRACTION: f64 = 0.05;
const GOD_COMPONENT_MIN: usize = 10;

/// `debt_score` threshold past which a symbol counts as a bottleneck.
const BOTTLENECK_DEBT_THRESHOLD: f64 = 0.7;

/// A symbol heavy enough in both complexity and parameter count to be
/// a "brain method" — the classic sign of a function that grew past
/// the point anyone can hold its whole behavior in their head at once.
const BRAIN_METHOD_COMPLEXITY: i64 = 15;
const BRAIN_METHOD_PARAMS: i64 = 4;

/// Compute and persist a snapshot of the store's current state.
/// `tag`/`source`/`git_branch`/`git_commit` are caller-supplied
/// labels, stored verbatim, never inferred from the store itself.
pub fn snapshot(
    store: &Store,
    tag: Option<String>,
    source: Option<String>,
    git_branch: Option<String>,
    git_commit: Option<String>,
    timestamp: i64,
    pagerank_damping: f64,
) -> StorageResult<SnapshotRecord> {
    let graph = SymbolGraph::load(store)?;
    let file_count = store.file_count()?;
    let symbol_count = store.symbol_count()?;
    let edge_count = store.all_edges()?.len() as i64;

    let cycle_components = cycles::find_cycles(&graph, 2);
    let cycles_found = cycle_components.len() as i64;
    let god_threshold = (graph.len() as f64 * GOD_COMPONENT_FRACTION).ceil().max(GOD_COMPONENT_MIN as f64) as usize;
    let god_components = cycle_components.iter().filter(|c| c.len() >= god_threshold).count() as i64;

    let layer_map = layers::detect_layers(&graph);
    let layer_violations = layers::find_violations(&graph, &layer_map).len() as i64;

    let all_metrics = store.all_symbol_metrics()?;
    let avg_complexity = if all_metrics.is_empty() {
        None
    } else {
        Some(all_metrics.iter().map(|m| m.cognitive_complexity as f64).sum::<f64>() / all_metrics.len() as f64)
    };
    let brain_methods = all_metrics
        .iter()
        .filter(|m| m.cognitive_complexity > BRAIN_METHOD_COMPLEXITY && m.param_count > BRAIN_METHOD_PARAMS)
        .count() as i64;

    let graph_rows = metrics::compute_all(&graph, pagerank_damping, 500);
    let bottlenecks = graph_rows.iter().filter(|r| r.debt_score > BOTTLENECK_DEBT_THRESHOLD).count() as i64;

    let dead_exports = count_dead_exports(store)?;

    let tangle_ratio = if edge_count > 0 { layer_violations as f64 / edge_count as f64 } else { 0.0 };

    let health_score = compute_health_score(HealthInputs {
        cycles: cycles_found,
        god_components,
        bottlenecks,
        dead_exports,
        tangle_ratio,
        avg_complexity: avg_complexity.unwrap_or(0.0),
        symbol_count,
    });

    let record = SnapshotRecord {
        id: 0,
        timestamp,
        tag,
        source,
        git_branch,
        git_commit,
        files: file_count,
        symbols: symbol_count,
        edges: edge_count,
        cycles: cycles_found,
        god_components,
        bottlenecks,
        dead_exports,
        layer_violations,
        health_score: Some(health_score),
        tangle_ratio: Some(tangle_ratio),
        avg_complexity,
        brain_methods,
    };
    let id = store.insert_snapshot(&record)?;
    Ok(SnapshotRecord { id, ..record })
}

/// An exported symbol with no incoming edge is "dead". Per
/// `cmd_dead.py`, a dead export inside a file that is never itself
/// imported by anything is counted as low-confidence noise (the whole
/// file may just be an entry point); only exports living in an
/// imported file are solid hits. This function returns the solid
/// count — callers wanting the low-confidence figure can re-derive it
/// from `all_symbols` + `all_file_edges` directly.
fn count_dead_exports(store: &Store) -> StorageResult<i64> {
    let imported_files: HashSet<_> = store.all_file_edges()?.into_iter().map(|e| e.target_file_id).collect();
    let mut dead = 0;
    for sym in store.all_symbols()? {
        if !sym.is_exported {
            continue;
        }
        if !imported_files.contains(&sym.file_id) {
            continue;
        }
        if store.edges_to(sym.id)?.is_empty() {
            dead += 1;
        }
    }
    Ok(dead)
}

struct HealthInputs {
    cycles: i64,
    god_components: i64,
    bottlenecks: i64,
    dead_exports: i64,
    tangle_ratio: f64,
    avg_complexity: f64,
    symbol_count: i64,
}

/// 100 minus a weighted, capped penalty per dimension. Each penalty is
/// normalized against the symbol count so the score stays comparable
/// across codebases of different sizes, then capped so one runaway
/// dimension can't single-handedly zero the score.
fn compute_health_score(inputs: HealthInputs) -> f64 {
    let n = inputs.symbol_count.max(1) as f64;
    let cycle_penalty = (inputs.cycles as f64 / n * 100.0).min(20.0);
    let god_penalty = (inputs.god_components as f64 * 4.0).min(20.0);
    let bottleneck_penalty = (inputs.bottlenecks as f64 / n * 100.0).min(20.0);
    let dead_penalty = (inputs.dead_exports as f64 / n * 100.0).min(15.0);
    let tangle_penalty = (inputs.tangle_ratio * 15.0).min(15.0);
    let complexity_penalty = ((inputs.avg_complexity - 5.0).max(0.0)).min(10.0);

    (100.0 - cycle_penalty - god_penalty - bottleneck_penalty - dead_penalty - tangle_penalty - complexity_penalty)
        .clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roam_storage::{NewEdge, NewSymbol, Visibility};

    fn sym(name: &str, exported: bool) -> NewSymbol {
        NewSymbol {
            name: name.into(),
            qualified_name: name.into(),
            kind: "function".into(),
            signature: None,
            line_start: 1,
            line_end: 2,
            docstring: None,
            visibility: Visibility::Public,
            is_exported: exported,
            parent_id: None,
            default_value: None,
        }
    }

    #[test]
    fn snapshot_on_empty_store_has_perfect_health() {
        let store = Store::open_in_memory().unwrap();
        let snap = snapshot(&store, None, None, None, None, 1000, 0.85).unwrap();
        assert_eq!(snap.files, 0);
        assert_eq!(snap.health_score, Some(100.0));
    }

    #[test]
    fn unreferenced_export_in_an_imported_file_counts_as_dead() {
        let store = Store::open_in_memory().unwrap();
        let consumer = store.upsert_file("consumer.rs", Some("rust"), "h1", None, 1).unwrap();
        let lib = store.upsert_file("lib.rs", Some("rust"), "h2", None, 1).unwrap();
        let caller = store.insert_symbol(consumer, &sym("caller", true)).unwrap();
        let used = store.insert_symbol(lib, &sym("used_export", true)).unwrap();
        store.insert_symbol(lib, &sym("unused_export", true)).unwrap();
        store
            .insert_edge("calls", &NewEdge { source_id: caller, target_id: used, line: None })
            .unwrap();
        store.rebuild_file_edges().unwrap();

        let dead = count_dead_exports(&store).unwrap();
        assert_eq!(dead, 1);
    }

    #[test]
    fn health_score_is_clamped_to_zero_for_pathological_inputs() {
        let score = compute_health_score(HealthInputs {
            cycles: 1000,
            god_components: 50,
            bottlenecks: 1000,
            dead_exports: 1000,
            tangle_ratio: 10.0,
            avg_complexity: 500.0,
            symbol_count: 10,
        });
        assert_eq!(score, 0.0);
    }
}
