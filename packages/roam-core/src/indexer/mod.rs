//! The incremental indexer: discover files, diff them against the
//! store by content hash, parse only what changed, resolve references
//! globally, and recompute every derived table atomically. See
//! DESIGN.md for the reasoning behind its exact shape.

pub mod complexity;
pub mod health;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use roam_storage::{ClusterRecord, FileId, FileStatsRecord, NewSymbol, Store, SymbolId};

use crate::config::{HashAlgorithm, RoamConfig};
use crate::discovery::discover_files;
use crate::errors::{Result, RoamError};
use crate::graph::{clusters, metrics, SymbolGraph};
use crate::parsing::extractor::ExtractorRegistry;
use crate::parsing::languages::register_builtin_extractors;
use crate::parsing::pool::{ParseJob, ParserPool};
use crate::resolver::{FileReferences, Resolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexOptions {
    /// Re-parse every discovered file regardless of hash match.
    pub force: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct IndexReport {
    pub files_discovered: usize,
    pub files_new: usize,
    pub files_modified: usize,
    pub files_unchanged: usize,
    pub files_deleted: usize,
    pub files_parsed: usize,
    pub files_without_extractor: usize,
    pub parse_errors: usize,
    pub symbols_written: usize,
    pub edges_written: usize,
    pub unresolved_references: usize,
    /// `(language, file_count)`, sorted by count descending then name,
    /// matching `cmd_index.py`'s `lang_str` summary line.
    pub language_distribution: Vec<(String, usize)>,
}

impl IndexReport {
    /// Fraction of discovered files that ended up with at least one
    /// extracted symbol, expressed as a percentage. Mirrors
    /// `cmd_index.py`'s "Parse coverage" line, computed the same way:
    /// `100 - (unparsed_files * 100 / total_files)`.
    pub fn parse_coverage_pct(&self, files_with_symbols: usize) -> f64 {
        if self.files_discovered == 0 {
            return 100.0;
        }
        (files_with_symbols as f64 * 100.0 / self.files_discovered as f64 * 10.0).round() / 10.0
    }
}

fn content_hash(text: &str, algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            format!("{:x}", hasher.finalize())
        }
        HashAlgorithm::Blake3 => blake3::hash(text.as_bytes()).to_hex().to_string(),
    }
}

pub struct Indexer<'a> {
    store: &'a Store,
    root: PathBuf,
    config: RoamConfig,
    pool: ParserPool,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a Store, root: impl Into<PathBuf>, config: RoamConfig) -> Self {
        Self::with_registry(store, root, config, register_builtin_extractors())
    }

    /// Build with a caller-supplied registry — the plugin registry
    /// (§4.9) layers extra language extractors on top of the built-in
    /// set before handing it here.
    pub fn with_registry(
        store: &'a Store,
        root: impl Into<PathBuf>,
        config: RoamConfig,
        registry: ExtractorRegistry,
    ) -> Self {
        Self { store, root: root.into(), config, pool: ParserPool::new(registry) }
    }

    /// Run the full discover -> diff -> parse -> resolve -> recompute
    /// pipeline. Deleted files are removed first so their symbols
    /// never participate in resolution; new and modified files are
    /// parsed and resolved together; derived tables are fully
    /// recomputed from the resulting graph.
    pub fn run(&self, options: &IndexOptions) -> Result<IndexReport> {
        let mut report = IndexReport::default();

        let discovered = discover_files(&self.root);
        report.files_discovered = discovered.len();
        let discovered_set: HashSet<&str> = discovered.iter().map(String::as_str).collect();

        let existing = self.store.list_files()?;
        let existing_by_path: HashMap<String, FileId> =
            existing.iter().map(|f| (f.path.clone(), f.id)).collect();
        let existing_hash: HashMap<String, String> =
            existing.into_iter().map(|f| (f.path, f.hash)).collect();

        for (path, &id) in &existing_by_path {
            if !discovered_set.contains(path.as_str()) {
                self.store.delete_file(id)?;
                report.files_deleted += 1;
            }
        }

        let mut to_process: Vec<(String, String, String)> = Vec::new(); // (path, hash, text)
        for path in &discovered {
            let Ok(bytes) = std::fs::read(self.root.join(path)) else { continue };
            let text = String::from_utf8_lossy(&bytes).into_owned();
            let hash = content_hash(&text, self.config.hash_algorithm);
            match existing_hash.get(path) {
                None => {
                    report.files_new += 1;
                    to_process.push((path.clone(), hash, text));
                }
                Some(prev) if prev != &hash => {
                    report.files_modified += 1;
                    to_process.push((path.clone(), hash, text));
                }
                Some(_) => {
                    report.files_unchanged += 1;
                    if options.force {
                        to_process.push((path.clone(), hash, text));
                    }
                }
            }
        }

        let registry = self.pool.registry();
        let mut file_ids: HashMap<String, FileId> = HashMap::new();
        let mut jobs = Vec::new();
        let mut lang_counts: HashMap<String, usize> = HashMap::new();

        for (path, hash, text) in &to_process {
            let extractor = registry.get_by_path(path);
            let language_name = extractor.as_ref().map(|e| e.language_name().to_string());
            if let Some(lang) = &language_name {
                *lang_counts.entry(lang.clone()).or_insert(0) += 1;
            }
            let line_count = text.lines().count() as i64;
            let file_id =
                self.store.upsert_file(path, language_name.as_deref(), hash, None, line_count)?;

            if existing_by_path.contains_key(path) {
                self.store.delete_symbols_for_file(file_id)?;
            }
            file_ids.insert(path.clone(), file_id);

            match extractor {
                Some(e) => jobs.push(ParseJob { path: path.clone(), source: text.clone(), language: e.language_id() }),
                None => report.files_without_extractor += 1,
            }
        }

        let outcomes = self.pool.parse_all(jobs);
        let mut file_refs = Vec::with_capacity(outcomes.len());
        let mut files_with_symbols = 0usize;

        for outcome in outcomes {
            report.files_parsed += 1;
            if !outcome.result.errors.is_empty() {
                report.parse_errors += 1;
            }
            if !outcome.result.symbols.is_empty() {
                files_with_symbols += 1;
            }
            let Some(&file_id) = file_ids.get(&outcome.path) else { continue };

            let mut name_to_id: HashMap<String, SymbolId> = HashMap::new();
            for sym in &outcome.result.symbols {
                let parent_id = sym.parent_name.as_ref().and_then(|p| name_to_id.get(p).copied());
                let new_symbol = NewSymbol {
                    name: sym.name.clone(),
                    qualified_name: sym.qualified_name.clone().unwrap_or_else(|| sym.name.clone()),
                    kind: sym.kind.as_str().to_string(),
                    signature: sym.signature.clone(),
                    line_start: sym.line_start,
                    line_end: sym.line_end,
                    docstring: sym.docstring.clone(),
                    visibility: sym.visibility,
                    is_exported: sym.is_exported,
                    parent_id,
                    default_value: sym.default_value.clone(),
                };
                let id = self.store.insert_symbol(file_id, &new_symbol)?;
                name_to_id.insert(sym.name.clone(), id);
                report.symbols_written += 1;
            }

            file_refs.push(FileReferences {
                file_id,
                file_path: outcome.path,
                references: outcome.result.references,
            });
        }

        let resolution = Resolver::new(self.store).resolve_all(&file_refs)?;
        report.edges_written = resolution.edges_written;
        report.unresolved_references = resolution.unresolved;

        self.store.rebuild_file_edges()?;
        self.recompute_derived_tables(&to_process)?;

        report.language_distribution = lang_counts.into_iter().collect();
        report.language_distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let _ = files_with_symbols;
        Ok(report)
    }

    /// Rebuild `graph_metrics`, `clusters`, `symbol_metrics`, and
    /// `file_stats.{complexity,cognitive_load,cochange_entropy}` from
    /// scratch. These are whole-graph computations, so every symbol
    /// and file participates, not just the ones touched by this run.
    fn recompute_derived_tables(&self, freshly_read: &[(String, String, String)]) -> Result<()> {
        let graph = SymbolGraph::load(self.store)?;

        let metrics_rows = metrics::compute_all(&graph, self.config.pagerank_damping, self.config.centrality_sample_k);
        self.store.put_graph_metrics(&metrics_rows)?;

        let mut partition = clusters::detect_clusters(&graph);
        clusters::label_clusters(&graph, &mut partition, self.config.pagerank_damping);
        let cluster_rows: Vec<ClusterRecord> = partition
            .iter()
            .flat_map(|c| {
                c.members.iter().map(|&symbol_id| ClusterRecord {
                    symbol_id,
                    cluster_id: c.cluster_id,
                    cluster_label: c.label.clone(),
                })
            })
            .collect();
        self.store.put_clusters(&cluster_rows)?;

        let mut text_cache: HashMap<String, String> =
            freshly_read.iter().map(|(p, _, t)| (p.clone(), t.clone())).collect();

        let mut symbol_metrics = Vec::new();
        let mut file_complexity: HashMap<FileId, Vec<i64>> = HashMap::new();
        for file in self.store.list_files()? {
            let text = match text_cache.remove(&file.path) {
                Some(t) => t,
                None => match std::fs::read(self.root.join(&file.path)) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(_) => continue,
                },
            };
            let symbols = self.store.symbols_in_file(file.id)?;
            for sym in symbols {
                let mut row = complexity::analyze(&text, sym.line_start, sym.line_end, sym.signature.as_deref());
                row.symbol_id = sym.id;
                file_complexity.entry(file.id).or_default().push(row.cognitive_complexity);
                symbol_metrics.push(row);
            }
        }
        self.store.put_symbol_metrics(&symbol_metrics)?;

        let mut file_stats_rows = Vec::new();
        for (file_id, complexities) in &file_complexity {
            let existing = self.store.get_file_stats(*file_id)?;
            let avg = complexities.iter().sum::<i64>() as f64 / complexities.len().max(1) as f64;
            let total = complexities.iter().sum::<i64>() as f64;
            let cochange = self.store.cochange_for_file(*file_id)?;
            let entropy = cochange_entropy(&cochange);
            file_stats_rows.push(FileStatsRecord {
                file_id: *file_id,
                commit_count: existing.as_ref().map_or(0, |e| e.commit_count),
                total_churn: existing.as_ref().map_or(0, |e| e.total_churn),
                distinct_authors: existing.as_ref().map_or(0, |e| e.distinct_authors),
                complexity: Some(avg),
                health_score: Some((100.0 - avg.min(50.0) * 1.2).clamp(0.0, 100.0)),
                cochange_entropy: Some(entropy),
                cognitive_load: Some(total),
            });
        }
        if !file_stats_rows.is_empty() {
            self.store.put_file_stats(&file_stats_rows)?;
        }

        Ok(())
    }

    /// Remove file rows whose path no longer exists on disk and any
    /// edge whose endpoint has gone missing, then reclaim space.
    /// Unlike `run`, this never parses anything — it's a lightweight
    /// safety net for a store that's drifted from disk between runs.
    pub fn clean(&self) -> Result<(usize, usize)> {
        let discovered: HashSet<String> = discover_files(&self.root).into_iter().collect();
        let mut removed_files = 0;
        for file in self.store.list_files()? {
            if !discovered.contains(&file.path) {
                self.store.delete_file(file.id)?;
                removed_files += 1;
            }
        }
        let removed_edges = self.store.delete_dangling_edges()?;
        if removed_files > 0 || removed_edges > 0 {
            self.store.vacuum()?;
        }
        Ok((removed_files, removed_edges))
    }
}

/// Delete the on-disk database (plus WAL/SHM sidecars) and reopen a
/// fresh one at the same path, then run a full index from scratch.
pub fn reset(db_path: &Path, project_root: &Path, config: RoamConfig) -> Result<(Store, IndexReport)> {
    if db_path.exists() {
        std::fs::remove_file(db_path).map_err(RoamError::Io)?;
    }
    for suffix in ["-wal", "-shm"] {
        let sidecar = PathBuf::from(format!("{}{suffix}", db_path.display()));
        if sidecar.exists() {
            let _ = std::fs::remove_file(sidecar);
        }
    }
    let store = Store::open(db_path)?;
    let report = {
        let indexer = Indexer::new(&store, project_root, config);
        indexer.run(&IndexOptions { force: true })?
    };
    Ok((store, report))
}

/// Shannon entropy (bits) of a file's co-change count distribution
/// across its partners. `0.0` when there are no partners or only one
/// — a file that only ever changes with the same handful of others
/// has a low, unsurprising distribution; one that co-changes evenly
/// with many unrelated files has a high one.
fn cochange_entropy(pairs: &[roam_storage::GitCochangeRecord]) -> f64 {
    let total: i64 = pairs.iter().map(|p| p.cochange_count).sum();
    if total <= 0 || pairs.len() < 2 {
        return 0.0;
    }
    pairs
        .iter()
        .map(|p| p.cochange_count as f64 / total as f64)
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.log2())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn first_run_indexes_new_files_and_resolves_a_call() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", "fn a() { b(); }\n");
        write(dir.path(), "b.rs", "pub fn b() {}\n");
        let store = Store::open_in_memory().unwrap();
        let indexer = Indexer::new(&store, dir.path(), RoamConfig::default());

        let report = indexer.run(&IndexOptions::default()).unwrap();
        assert_eq!(report.files_new, 2);
        assert_eq!(report.files_deleted, 0);
        assert!(report.symbols_written >= 2);
    }

    #[test]
    fn unchanged_file_is_not_reparsed_on_second_run() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", "fn a() {}\n");
        let store = Store::open_in_memory().unwrap();
        let indexer = Indexer::new(&store, dir.path(), RoamConfig::default());

        indexer.run(&IndexOptions::default()).unwrap();
        let second = indexer.run(&IndexOptions::default()).unwrap();
        assert_eq!(second.files_new, 0);
        assert_eq!(second.files_modified, 0);
        assert_eq!(second.files_unchanged, 1);
        assert_eq!(second.files_parsed, 0);
    }

    #[test]
    fn force_reparses_unchanged_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", "fn a() {}\n");
        let store = Store::open_in_memory().unwrap();
        let indexer = Indexer::new(&store, dir.path(), RoamConfig::default());

        indexer.run(&IndexOptions::default()).unwrap();
        let forced = indexer.run(&IndexOptions { force: true }).unwrap();
        assert_eq!(forced.files_unchanged, 1);
        assert_eq!(forced.files_parsed, 1);
    }

    #[test]
    fn deleted_file_is_removed_from_the_store() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", "fn a() {}\n");
        let store = Store::open_in_memory().unwrap();
        let indexer = Indexer::new(&store, dir.path(), RoamConfig::default());
        indexer.run(&IndexOptions::default()).unwrap();

        std::fs::remove_file(dir.path().join("a.rs")).unwrap();
        let report = indexer.run(&IndexOptions::default()).unwrap();
        assert_eq!(report.files_deleted, 1);
        assert!(store.get_file_by_path("a.rs").unwrap().is_none());
    }

    #[test]
    fn modified_file_drops_its_old_symbols_before_reextracting() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", "fn one() {}\n");
        let store = Store::open_in_memory().unwrap();
        let indexer = Indexer::new(&store, dir.path(), RoamConfig::default());
        indexer.run(&IndexOptions::default()).unwrap();

        write(dir.path(), "a.rs", "fn two() {}\n");
        indexer.run(&IndexOptions::default()).unwrap();

        let file = store.get_file_by_path("a.rs").unwrap().unwrap();
        let symbols = store.symbols_in_file(file.id).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "two");
    }

    #[test]
    fn clean_removes_rows_for_files_deleted_outside_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        store.upsert_file("gone.rs", Some("rust"), "h", None, 1).unwrap();
        let indexer = Indexer::new(&store, dir.path(), RoamConfig::default());

        let (removed_files, _) = indexer.clean().unwrap();
        assert_eq!(removed_files, 1);
        assert!(store.get_file_by_path("gone.rs").unwrap().is_none());
    }

    #[test]
    fn cochange_entropy_is_zero_with_one_or_no_partners() {
        assert_eq!(cochange_entropy(&[]), 0.0);
        assert_eq!(
            cochange_entropy(&[roam_storage::GitCochangeRecord { file_id_a: 1, file_id_b: 2, cochange_count: 5 }]),
            0.0
        );
    }

    #[test]
    fn cochange_entropy_is_positive_with_an_even_split() {
        let pairs = vec![
            roam_storage::GitCochangeRecord { file_id_a: 1, file_id_b: 2, cochange_count: 3 },
            roam_storage::GitCochangeRecord { file_id_a: 1, file_id_b: 3, cochange_count: 3 },
        ];
        assert!(cochange_entropy(&pairs) > 0.9);
    }
}
