//! Reference resolver & edge builder. Joins the local references
//! collected by every extractor against the whole symbol universe and
//! turns them into store-persisted `edges` rows.
//!
//! Resolution priority (highest first):
//! 1. exact `qualified_name` match within the same file
//! 2. exact `qualified_name` match within a transitively-imported file
//! 3. best-effort `name` match across the index, tie-broken by
//!    exported > not-exported, same-language > cross-language, then
//!    shorter qualified name > longer
//!
//! Unresolved references are dropped — never produce a dangling edge —
//! and counted.

use std::collections::{HashMap, HashSet};

use roam_storage::{FileId, NewEdge, Result as StorageResult, Store, SymbolId};

use crate::shared::models::ReferenceRecord;

/// One file's still-local reference set, collected right after its
/// symbols were written (so `file_id` is store-assigned).
pub struct FileReferences {
    pub file_id: FileId,
    pub file_path: String,
    pub references: Vec<ReferenceRecord>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionReport {
    pub edges_written: usize,
    pub unresolved: usize,
}

struct Candidate {
    id: SymbolId,
    file_id: FileId,
    qualified_name: String,
    is_exported: bool,
    language: Option<String>,
}

/// In-memory view of the whole symbol index, built once per resolver
/// run from `Store::all_symbols` + `Store::list_files`.
struct SymbolIndex {
    by_qualified_name: HashMap<String, Vec<Candidate>>,
    by_name: HashMap<String, Vec<Candidate>>,
    file_language: HashMap<FileId, Option<String>>,
    file_path: HashMap<FileId, String>,
}

impl SymbolIndex {
    fn build(store: &Store) -> StorageResult<Self> {
        let files = store.list_files()?;
        let mut file_language = HashMap::new();
        let mut file_path = HashMap::new();
        for f in &files {
            file_language.insert(f.id, f.language.clone());
            file_path.insert(f.id, f.path.clone());
        }

        let mut by_qualified_name: HashMap<String, Vec<Candidate>> = HashMap::new();
        let mut by_name: HashMap<String, Vec<Candidate>> = HashMap::new();
        for sym in store.all_symbols()? {
            let language = file_language.get(&sym.file_id).cloned().flatten();
            let candidate = Candidate {
                id: sym.id,
                file_id: sym.file_id,
                qualified_name: sym.qualified_name.clone(),
                is_exported: sym.is_exported,
                language,
            };
            by_qualified_name
                .entry(sym.qualified_name.clone())
                .or_default()
                .push(clone_candidate(&candidate));
            by_name.entry(sym.name.clone()).or_default().push(candidate);
        }

        Ok(Self { by_qualified_name, by_name, file_language, file_path })
    }

    /// Every other file whose path, once import syntax is stripped
    /// down to a bare module reference, matches one of this file's
    /// recorded `import_path`s. There is no language-agnostic import
    /// resolver in the wild to ground this on, so candidate paths are
    /// generated from both dotted (Python-style) and slashed
    /// (JS/Go-style) conventions and matched by path suffix.
    fn imported_files(&self, source_file_id: FileId, import_paths: &[String]) -> HashSet<FileId> {
        let mut result = HashSet::new();
        let source_dir = self
            .file_path
            .get(&source_file_id)
            .and_then(|p| p.rsplit_once('/'))
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();

        for raw in import_paths {
            for candidate_suffix in import_candidate_suffixes(raw, &source_dir) {
                for (file_id, path) in &self.file_path {
                    if *file_id == source_file_id {
                        continue;
                    }
                    if path_matches_suffix(path, &candidate_suffix) {
                        result.insert(*file_id);
                    }
                }
            }
        }
        result
    }
}

fn clone_candidate(c: &Candidate) -> Candidate {
    Candidate {
        id: c.id,
        file_id: c.file_id,
        qualified_name: c.qualified_name.clone(),
        is_exported: c.is_exported,
        language: c.language.clone(),
    }
}

/// Turn one raw `import_path` string into plausible file-path suffixes
/// to search for, without extensions (matched loosely against stored
/// paths). Handles Python dotted modules, JS/TS relative specifiers,
/// and bare `a/b/c`-style paths uniformly.
fn import_candidate_suffixes(raw: &str, source_dir: &str) -> Vec<String> {
    let cleaned = raw
        .trim()
        .trim_start_matches("from ")
        .split(" import ")
        .next()
        .unwrap_or(raw)
        .trim_matches(['"', '\''].as_ref())
        .trim();

    let mut out = Vec::new();
    if cleaned.contains('.') && !cleaned.contains('/') {
        out.push(cleaned.replace('.', "/"));
    }
    if let Some(rel) = cleaned.strip_prefix("./") {
        out.push(format!("{source_dir}/{rel}"));
    } else if let Some(rel) = cleaned.strip_prefix("../") {
        let parent = source_dir.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        out.push(format!("{parent}/{rel}"));
    } else {
        out.push(cleaned.to_string());
    }
    out
}

fn path_matches_suffix(path: &str, suffix: &str) -> bool {
    let stem = path.rsplit_once('.').map(|(s, _)| s).unwrap_or(path);
    stem == suffix || stem.ends_with(&format!("/{suffix}")) || path.ends_with(suffix)
}

pub struct Resolver<'a> {
    store: &'a Store,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Resolve every reference across every changed file and persist
    /// the resulting edges. Must run after all symbol writes for this
    /// indexing pass are visible, since resolution looks symbols up by
    /// name across the whole store.
    pub fn resolve_all(&self, file_refs: &[FileReferences]) -> StorageResult<ResolutionReport> {
        let index = SymbolIndex::build(self.store)?;
        let mut report = ResolutionReport::default();

        for fr in file_refs {
            let import_paths: Vec<String> =
                fr.references.iter().filter_map(|r| r.import_path.clone()).collect();
            let imported = index.imported_files(fr.file_id, &import_paths);
            let language = index.file_language.get(&fr.file_id).cloned().flatten();

            // Reference source names are symbol *names*, not ids (the
            // extractor never sees assigned ids); resolve the edge's
            // source the same best-effort way as the target, scoped to
            // this file first.
            for reference in &fr.references {
                let Some(source_id) = resolve_source(&index, fr.file_id, &reference.source_name) else {
                    report.unresolved += 1;
                    continue;
                };
                let Some(target_id) = resolve_target(
                    &index,
                    fr.file_id,
                    &imported,
                    language.as_deref(),
                    &reference.target_name,
                ) else {
                    report.unresolved += 1;
                    continue;
                };
                if source_id == target_id {
                    continue;
                }
                self.store.insert_edge(
                    reference.kind.as_str(),
                    &NewEdge { source_id, target_id, line: reference.line },
                )?;
                report.edges_written += 1;
            }
        }

        self.store.rebuild_file_edges()?;
        Ok(report)
    }
}

fn resolve_source(index: &SymbolIndex, file_id: FileId, name: &str) -> Option<SymbolId> {
    if name.is_empty() {
        return None;
    }
    index
        .by_name
        .get(name)
        .into_iter()
        .flatten()
        .find(|c| c.file_id == file_id)
        .map(|c| c.id)
        .or_else(|| index.by_name.get(name).and_then(|cands| cands.first()).map(|c| c.id))
}

fn resolve_target(
    index: &SymbolIndex,
    file_id: FileId,
    imported: &HashSet<FileId>,
    language: Option<&str>,
    target_name: &str,
) -> Option<SymbolId> {
    if target_name.is_empty() {
        return None;
    }

    // Rule 1: exact qualified_name match in the same file.
    if let Some(cands) = index.by_qualified_name.get(target_name) {
        if let Some(hit) = cands.iter().find(|c| c.file_id == file_id) {
            return Some(hit.id);
        }
        // Rule 2: exact qualified_name match in a transitively-imported file.
        if let Some(hit) = cands.iter().find(|c| imported.contains(&c.file_id)) {
            return Some(hit.id);
        }
    }

    // Rule 3: best-effort name match, ambiguity broken by
    // exported > not-exported, same-language > cross-language,
    // shorter qualified name > longer.
    let bare = target_name.rsplit(['.', ':']).next().unwrap_or(target_name);
    let candidates = index.by_name.get(bare)?;
    candidates
        .iter()
        .min_by(|a, b| rank(a, language).cmp(&rank(b, language)).then(a.id.cmp(&b.id)))
        .map(|c| c.id)
}

/// Lower is better. Mirrors the priority order: exported beats
/// not-exported, same-language beats cross-language, shorter
/// qualified name beats longer.
fn rank(c: &Candidate, language: Option<&str>) -> (u8, u8, usize) {
    let exported_rank = if c.is_exported { 0 } else { 1 };
    let language_rank = match (language, c.language.as_deref()) {
        (Some(a), Some(b)) if a == b => 0,
        _ => 1,
    };
    (exported_rank, language_rank, c.qualified_name.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::ReferenceKind;
    use roam_storage::{NewSymbol, Visibility};

    fn sym(name: &str, qualified: &str, exported: bool) -> NewSymbol {
        NewSymbol {
            name: name.to_string(),
            qualified_name: qualified.to_string(),
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
    fn resolves_call_within_same_file() {
        let store = Store::open_in_memory().unwrap();
        let f = store.upsert_file("a.py", Some("python"), "h", None, 5).unwrap();
        store.insert_symbol(f, &sym("caller", "caller", true)).unwrap();
        store.insert_symbol(f, &sym("callee", "callee", true)).unwrap();

        let refs = vec![FileReferences {
            file_id: f,
            file_path: "a.py".into(),
            references: vec![ReferenceRecord {
                source_name: "caller".into(),
                target_name: "callee".into(),
                kind: ReferenceKind::Call,
                line: Some(3),
                import_path: None,
            }],
        }];

        let report = Resolver::new(&store).resolve_all(&refs).unwrap();
        assert_eq!(report.edges_written, 1);
        assert_eq!(report.unresolved, 0);
    }

    #[test]
    fn unresolved_reference_is_dropped_and_counted() {
        let store = Store::open_in_memory().unwrap();
        let f = store.upsert_file("a.py", Some("python"), "h", None, 5).unwrap();
        store.insert_symbol(f, &sym("caller", "caller", true)).unwrap();

        let refs = vec![FileReferences {
            file_id: f,
            file_path: "a.py".into(),
            references: vec![ReferenceRecord {
                source_name: "caller".into(),
                target_name: "nonexistent".into(),
                kind: ReferenceKind::Call,
                line: Some(3),
                import_path: None,
            }],
        }];

        let report = Resolver::new(&store).resolve_all(&refs).unwrap();
        assert_eq!(report.edges_written, 0);
        assert_eq!(report.unresolved, 1);
    }

    #[test]
    fn ambiguous_name_prefers_exported_symbol() {
        let store = Store::open_in_memory().unwrap();
        let f1 = store.upsert_file("a.py", Some("python"), "h", None, 5).unwrap();
        let f2 = store.upsert_file("b.py", Some("python"), "h", None, 5).unwrap();
        let f3 = store.upsert_file("c.py", Some("python"), "h", None, 5).unwrap();
        store.insert_symbol(f1, &sym("caller", "a.caller", true)).unwrap();
        let hidden = store.insert_symbol(f2, &sym("helper", "b.helper", false)).unwrap();
        let exported = store.insert_symbol(f3, &sym("helper", "c.helper", true)).unwrap();

        let refs = vec![FileReferences {
            file_id: f1,
            file_path: "a.py".into(),
            references: vec![ReferenceRecord {
                source_name: "caller".into(),
                target_name: "helper".into(),
                kind: ReferenceKind::Call,
                line: Some(1),
                import_path: None,
            }],
        }];

        Resolver::new(&store).resolve_all(&refs).unwrap();
        let edges = store.all_edges().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_id, exported);
        assert_ne!(edges[0].target_id, hidden);
    }

    #[test]
    fn import_resolves_across_files_via_relative_path() {
        let store = Store::open_in_memory().unwrap();
        let caller_file = store.upsert_file("src/app.js", Some("javascript"), "h", None, 5).unwrap();
        let target_file = store.upsert_file("src/util.js", Some("javascript"), "h", None, 5).unwrap();
        store.insert_symbol(caller_file, &sym("main", "main", true)).unwrap();
        store.insert_symbol(target_file, &sym("helper", "helper", true)).unwrap();

        let refs = vec![FileReferences {
            file_id: caller_file,
            file_path: "src/app.js".into(),
            references: vec![
                ReferenceRecord {
                    source_name: "main".into(),
                    target_name: "./util".into(),
                    kind: ReferenceKind::Import,
                    line: Some(1),
                    import_path: Some("./util".into()),
                },
                ReferenceRecord {
                    source_name: "main".into(),
                    target_name: "helper".into(),
                    kind: ReferenceKind::Call,
                    line: Some(2),
                    import_path: None,
                },
            ],
        }];

        let report = Resolver::new(&store).resolve_all(&refs).unwrap();
        assert_eq!(report.edges_written, 2);
    }

    #[test]
    fn rebuilds_file_edges_after_resolution() {
        let store = Store::open_in_memory().unwrap();
        let f1 = store.upsert_file("a.py", Some("python"), "h", None, 5).unwrap();
        let f2 = store.upsert_file("b.py", Some("python"), "h", None, 5).unwrap();
        store.insert_symbol(f1, &sym("caller", "caller", true)).unwrap();
        store.insert_symbol(f2, &sym("callee", "callee", true)).unwrap();

        let refs = vec![FileReferences {
            file_id: f1,
            file_path: "a.py".into(),
            references: vec![ReferenceRecord {
                source_name: "caller".into(),
                target_name: "callee".into(),
                kind: ReferenceKind::Call,
                line: Some(1),
                import_path: None,
            }],
        }];

        Resolver::new(&store).resolve_all(&refs).unwrap();
        assert_eq!(store.file_edges_from(f1).unwrap().len(), 1);
    }
}
