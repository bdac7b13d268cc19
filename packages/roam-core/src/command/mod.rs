//! The command surface every subcommand implements: build an
//! `Envelope` over the store, let the caller choose how to render it.
//! Scoped to the three commands the bundled binary demos — `index`,
//! `deps`, `health` — each a variant of the same store-query-then-
//! envelope shape a much larger command set would share. See
//! DESIGN.md for how each command's output fields were chosen.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use roam_storage::{FileEdgeRecord, Store};

use crate::config::RoamConfig;
use crate::errors::{Result, RoamError};
use crate::indexer::{self, health, IndexOptions};
use crate::query::envelope::Envelope;

const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct CommandContext<'a> {
    pub store: &'a Store,
    pub root: PathBuf,
    pub config: RoamConfig,
    pub json_mode: bool,
    pub detail: bool,
    pub budget_tokens: usize,
}

pub trait Command {
    fn name(&self) -> &'static str;
    fn run(&self, ctx: &CommandContext) -> Result<Envelope>;
}

fn finish(mut envelope: Envelope, ctx: &CommandContext) -> Envelope {
    if ctx.budget_tokens > 0 {
        envelope.apply_budget(ctx.budget_tokens);
    }
    envelope
}

pub struct IndexCommand {
    pub force: bool,
}

impl Command for IndexCommand {
    fn name(&self) -> &'static str {
        "index"
    }

    fn run(&self, ctx: &CommandContext) -> Result<Envelope> {
        let report = indexer::Indexer::new(ctx.store, ctx.root.clone(), ctx.config.clone())
            .run(&IndexOptions { force: self.force })?;

        let languages: Vec<Value> =
            report.language_distribution.iter().map(|(lang, count)| json!({"language": lang, "count": count})).collect();

        let envelope = Envelope::new("index", TOOL_VERSION, format!("indexed {} files", report.files_discovered))
            .summary_field("files", report.files_discovered as i64)
            .summary_field("symbols", report.symbols_written as i64)
            .summary_field("edges", report.edges_written as i64)
            .field("files_new", report.files_new as i64)
            .field("files_modified", report.files_modified as i64)
            .field("files_unchanged", report.files_unchanged as i64)
            .field("files_deleted", report.files_deleted as i64)
            .field("parse_errors", report.parse_errors as i64)
            .field("unresolved_references", report.unresolved_references as i64)
            .field("languages", languages);
        Ok(finish(envelope, ctx))
    }
}

pub struct DepsCommand {
    pub path: String,
}

fn find_file(store: &Store, path: &str) -> Result<roam_storage::FileRecord> {
    let normalized = path.replace('\\', "/");
    if let Some(file) = store.get_file_by_path(&normalized)? {
        return Ok(file);
    }
    store
        .list_files()?
        .into_iter()
        .find(|f| f.path.ends_with(&normalized))
        .ok_or_else(|| RoamError::Usage(format!("no indexed file matches '{path}'; run `roam index` first")))
}

fn edge_json(edge: &FileEdgeRecord, other_path: &str) -> Value {
    json!({"path": other_path, "symbol_count": edge.symbol_count, "kind": edge.kind})
}

impl Command for DepsCommand {
    fn name(&self) -> &'static str {
        "deps"
    }

    fn run(&self, ctx: &CommandContext) -> Result<Envelope> {
        let file = find_file(ctx.store, &self.path)?;
        let files_by_id: HashMap<_, _> = ctx.store.list_files()?.into_iter().map(|f| (f.id, f)).collect();
        let all_edges = ctx.store.all_file_edges()?;

        let mut imports: Vec<Value> = all_edges
            .iter()
            .filter(|e| e.source_file_id == file.id)
            .filter_map(|e| files_by_id.get(&e.target_file_id).map(|f| edge_json(e, &f.path)))
            .collect();
        let mut imported_by: Vec<Value> = all_edges
            .iter()
            .filter(|e| e.target_file_id == file.id)
            .filter_map(|e| files_by_id.get(&e.source_file_id).map(|f| edge_json(e, &f.path)))
            .collect();

        let total_imports = imports.len();
        let total_imported_by = imported_by.len();
        if !ctx.detail {
            imports.truncate(5);
            imported_by.truncate(5);
        }

        let envelope = Envelope::new("deps", TOOL_VERSION, format!("{total_imports} imports, {total_imported_by} imported by"))
            .summary_field("imports", total_imports as i64)
            .summary_field("imported_by", total_imported_by as i64)
            .field("path", file.path.clone())
            .field("imports", imports)
            .field("imported_by", imported_by);
        Ok(finish(envelope, ctx))
    }
}

pub struct HealthCommand {
    pub tag: Option<String>,
}

fn current_git_head(root: &Path) -> (Option<String>, Option<String>) {
    let Ok(repo) = git2::Repository::discover(root) else { return (None, None) };
    let Ok(head) = repo.head() else { return (None, None) };
    let branch = head.shorthand().map(str::to_string);
    let commit = head.peel_to_commit().ok().map(|c| c.id().to_string()[..12.min(c.id().to_string().len())].to_string());
    (branch, commit)
}

impl Command for HealthCommand {
    fn name(&self) -> &'static str {
        "health"
    }

    fn run(&self, ctx: &CommandContext) -> Result<Envelope> {
        let (git_branch, git_commit) = current_git_head(&ctx.root);
        let timestamp = chrono::Utc::now().timestamp();
        let snapshot = health::snapshot(
            ctx.store,
            self.tag.clone(),
            Some("health".to_string()),
            git_branch.clone(),
            git_commit.clone(),
            timestamp,
            ctx.config.pagerank_damping,
        )?;

        let mut envelope = Envelope::new(
            "health",
            TOOL_VERSION,
            format!("health {}/100", snapshot.health_score.unwrap_or(0.0).round() as i64),
        )
        .summary_field("health_score", snapshot.health_score.unwrap_or(0.0))
        .summary_field("files", snapshot.files)
        .summary_field("symbols", snapshot.symbols)
        .field("edges", snapshot.edges)
        .field("cycles", snapshot.cycles)
        .field("god_components", snapshot.god_components)
        .field("bottlenecks", snapshot.bottlenecks)
        .field("dead_exports", snapshot.dead_exports)
        .field("layer_violations", snapshot.layer_violations)
        .field("tangle_ratio", snapshot.tangle_ratio.unwrap_or(0.0))
        .field("avg_complexity", snapshot.avg_complexity.unwrap_or(0.0))
        .field("brain_methods", snapshot.brain_methods);
        if let Some(branch) = &git_branch {
            envelope = envelope.field("git_branch", branch.clone());
        }
        if let Some(commit) = &git_commit {
            envelope = envelope.field("git_commit", commit.clone());
        }
        Ok(finish(envelope, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn ctx(store: &Store, root: PathBuf) -> CommandContext<'_> {
        CommandContext { store, root, config: RoamConfig::default(), json_mode: true, detail: false, budget_tokens: 0 }
    }

    #[test]
    fn index_command_reports_discovered_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def f():\n    return 1\n").unwrap();
        let store = Store::open_in_memory().unwrap();
        let envelope = IndexCommand { force: false }.run(&ctx(&store, dir.path().to_path_buf())).unwrap();
        let rendered: Value = serde_json::from_str(&envelope.render(crate::query::envelope::EnvelopeMode::Full)).unwrap();
        assert_eq!(rendered["summary"]["files"], 1);
    }

    #[test]
    fn deps_command_errors_on_an_unindexed_path() {
        let store = Store::open_in_memory().unwrap();
        let err = DepsCommand { path: "missing.py".to_string() }.run(&ctx(&store, PathBuf::from("."))).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn health_command_reports_perfect_score_on_an_empty_store() {
        let store = Store::open_in_memory().unwrap();
        let envelope = HealthCommand { tag: None }.run(&ctx(&store, PathBuf::from("."))).unwrap();
        let rendered: Value = serde_json::from_str(&envelope.render(crate::query::envelope::EnvelopeMode::Full)).unwrap();
        assert_eq!(rendered["summary"]["health_score"], 100.0);
    }
}
