//! Git history ingestion: commit metadata, per-file change counts,
//! and commit-hyperedge signatures for co-change tracking.
//!
//! Unlike `discovery`'s `git ls-files` subprocess (a light probe with
//! a bounded timeout), history ingestion reads objects directly
//! through `git2` since it needs the full commit graph and tree diffs
//! rather than a single shallow listing.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use roam_storage::{FileId, Result as StorageResult, Store};
use sha2::{Digest, Sha256};

use crate::errors::Result;

pub struct GitIngestOptions {
    /// Stop after this many commits from `HEAD`, oldest-first bound.
    pub max_commits: usize,
    /// A commit touching more than this many tracked files produces
    /// no hyperedge or co-change bump — a mass-rename or vendoring
    /// commit is noise, not a coupling signal.
    pub cochange_max_files: i64,
}

impl Default for GitIngestOptions {
    fn default() -> Self {
        Self { max_commits: 5000, cochange_max_files: 20 }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GitIngestReport {
    pub commits_seen: usize,
    pub commits_ingested: usize,
    pub commits_already_known: usize,
    pub hyperedges_written: usize,
}

struct FileAggregate {
    commit_count: i64,
    total_churn: i64,
    authors: HashSet<String>,
}

/// Walk commit history from `HEAD`, recording commit rows, per-file
/// change rows, and (for commits touching 2..=`cochange_max_files`
/// tracked files) a co-change hyperedge plus pairwise counter bumps.
/// Already-known commit hashes are skipped entirely so re-running
/// ingestion never double-counts churn or co-change.
pub fn ingest_history(
    store: &Store,
    repo_root: &Path,
    options: &GitIngestOptions,
) -> Result<GitIngestReport> {
    let repo = git2::Repository::open(repo_root)?;
    let mut revwalk = repo.revwalk()?;
    revwalk.set_sorting(git2::Sort::TIME)?;
    revwalk.push_head()?;

    let path_to_file_id: HashMap<String, FileId> =
        store.list_files()?.into_iter().map(|f| (f.path, f.id)).collect();

    let mut report = GitIngestReport::default();
    let mut aggregates: HashMap<FileId, FileAggregate> = HashMap::new();

    for oid in revwalk.take(options.max_commits) {
        let oid = oid?;
        report.commits_seen += 1;
        let commit = repo.find_commit(oid)?;
        let hash = oid.to_string();

        if store.get_commit_by_hash(&hash)?.is_some() {
            report.commits_already_known += 1;
            continue;
        }

        let author = commit.author();
        let author_name = author.name().map(|s| s.to_string());
        let commit_id = store.upsert_commit(
            &hash,
            author_name.as_deref(),
            commit.time().seconds(),
            commit.message(),
        )?;

        let tree = commit.tree()?;
        let parent_tree = commit.parents().next().map(|p| p.tree()).transpose()?;
        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

        let mut touched_file_ids: Vec<FileId> = Vec::new();
        let delta_count = diff.deltas().count();
        for idx in 0..delta_count {
            let Some(delta) = diff.get_delta(idx) else { continue };
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            if path.is_empty() {
                continue;
            }
            let (added, removed) = match git2::Patch::from_diff(&diff, idx) {
                Ok(Some(patch)) => {
                    let (_, a, d) = patch.line_stats()?;
                    (a as i64, d as i64)
                }
                _ => (0, 0),
            };
            let file_id = path_to_file_id.get(&path).copied();
            store.insert_file_change(commit_id, file_id, &path, added, removed)?;

            if let Some(fid) = file_id {
                touched_file_ids.push(fid);
                let entry = aggregates.entry(fid).or_insert_with(|| FileAggregate {
                    commit_count: 0,
                    total_churn: 0,
                    authors: HashSet::new(),
                });
                entry.commit_count += 1;
                entry.total_churn += added + removed;
                if let Some(name) = &author_name {
                    entry.authors.insert(name.clone());
                }
            }
        }

        touched_file_ids.sort_unstable();
        touched_file_ids.dedup();
        if touched_file_ids.len() >= 2 && (touched_file_ids.len() as i64) <= options.cochange_max_files {
            let sig_hash = hyperedge_signature(&touched_file_ids);
            store.insert_hyperedge(commit_id, &sig_hash, &touched_file_ids)?;
            report.hyperedges_written += 1;
            for i in 0..touched_file_ids.len() {
                for j in (i + 1)..touched_file_ids.len() {
                    store.bump_cochange(touched_file_ids[i], touched_file_ids[j])?;
                }
            }
        }

        report.commits_ingested += 1;
    }

    write_file_stats(store, &aggregates)?;
    Ok(report)
}

fn hyperedge_signature(file_ids: &[FileId]) -> String {
    let mut hasher = Sha256::new();
    for id in file_ids {
        hasher.update(id.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn write_file_stats(store: &Store, aggregates: &HashMap<FileId, FileAggregate>) -> StorageResult<()> {
    if aggregates.is_empty() {
        return Ok(());
    }
    let mut rows = Vec::with_capacity(aggregates.len());
    for (&file_id, agg) in aggregates {
        let existing = store.get_file_stats(file_id)?;
        rows.push(roam_storage::FileStatsRecord {
            file_id,
            commit_count: existing.as_ref().map_or(0, |e| e.commit_count) + agg.commit_count,
            total_churn: existing.as_ref().map_or(0, |e| e.total_churn) + agg.total_churn,
            distinct_authors: agg.authors.len() as i64,
            complexity: existing.as_ref().and_then(|e| e.complexity),
            health_score: existing.as_ref().and_then(|e| e.health_score),
            cochange_entropy: existing.as_ref().and_then(|e| e.cochange_entropy),
            cognitive_load: existing.as_ref().and_then(|e| e.cognitive_load),
        });
    }
    store.put_file_stats(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(dir: &Path) -> git2::Repository {
        let repo = git2::Repository::init(dir).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        repo
    }

    fn commit_all(repo: &git2::Repository, message: &str) -> git2::Oid {
        let mut index = repo.index().unwrap();
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = repo.signature().unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap()
    }

    #[test]
    fn ingests_a_single_commit_and_records_churn() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        commit_all(&repo, "add a");
        drop(repo);

        let db_path = dir.path().join("index.db");
        let store = Store::open(&db_path).unwrap();
        store.upsert_file("a.rs", Some("rust"), "hash1", None, 1).unwrap();

        let report = ingest_history(&store, dir.path(), &GitIngestOptions::default()).unwrap();
        assert_eq!(report.commits_ingested, 1);
        assert_eq!(report.commits_already_known, 0);

        let file = store.get_file_by_path("a.rs").unwrap().unwrap();
        let stats = store.get_file_stats(file.id).unwrap().unwrap();
        assert_eq!(stats.commit_count, 1);
        assert!(stats.total_churn >= 1);
    }

    #[test]
    fn re_ingesting_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        commit_all(&repo, "add a");
        drop(repo);

        let db_path = dir.path().join("index.db");
        let store = Store::open(&db_path).unwrap();
        store.upsert_file("a.rs", Some("rust"), "hash1", None, 1).unwrap();

        ingest_history(&store, dir.path(), &GitIngestOptions::default()).unwrap();
        let report = ingest_history(&store, dir.path(), &GitIngestOptions::default()).unwrap();
        assert_eq!(report.commits_ingested, 0);
        assert_eq!(report.commits_already_known, 1);

        let file = store.get_file_by_path("a.rs").unwrap().unwrap();
        let stats = store.get_file_stats(file.id).unwrap().unwrap();
        assert_eq!(stats.commit_count, 1);
    }

    #[test]
    fn two_file_commit_creates_a_hyperedge_and_bumps_cochange() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        std::fs::write(dir.path().join("b.rs"), "fn b() {}\n").unwrap();
        commit_all(&repo, "add a and b together");
        drop(repo);

        let db_path = dir.path().join("index.db");
        let store = Store::open(&db_path).unwrap();
        let fa = store.upsert_file("a.rs", Some("rust"), "hash1", None, 1).unwrap();
        let fb = store.upsert_file("b.rs", Some("rust"), "hash2", None, 1).unwrap();

        let report = ingest_history(&store, dir.path(), &GitIngestOptions::default()).unwrap();
        assert_eq!(report.hyperedges_written, 1);

        let pairs = store.cochange_pairs(1).unwrap();
        assert!(pairs.iter().any(|p| {
            (p.file_id_a == fa.min(fb) && p.file_id_b == fa.max(fb)) && p.cochange_count == 1
        }));
    }
}
