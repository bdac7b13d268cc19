//! File discovery: prefer a git listing, fall back to a filesystem
//! walk, filter by size/extension/name, return a deterministic,
//! forward-slash-normalized, sorted path list.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use once_cell::sync::Lazy;

const GIT_LS_FILES_TIMEOUT: Duration = Duration::from_secs(30);

static SKIP_DIRS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        ".git", ".hg", ".svn", "node_modules", "__pycache__", ".tox", ".mypy_cache",
        ".pytest_cache", ".ruff_cache", "venv", ".venv", "env", ".env", "dist", "build",
        ".eggs", ".next", ".nuxt", ".output", "target", "bin", "obj", ".roam",
    ]
    .into_iter()
    .collect()
});

static SKIP_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "package-lock.json",
        "yarn.lock",
        "pnpm-lock.yaml",
        "Cargo.lock",
        "poetry.lock",
        "composer.lock",
        "Gemfile.lock",
        "Pipfile.lock",
    ]
    .into_iter()
    .collect()
});

static SKIP_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        ".lock", ".min.js", ".min.css", ".map", ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico",
        ".svg", ".webp", ".woff", ".woff2", ".ttf", ".otf", ".eot", ".zip", ".tar", ".gz",
        ".bz2", ".xz", ".7z", ".rar", ".exe", ".dll", ".so", ".dylib", ".pyc", ".pyo", ".class",
        ".jar", ".db", ".sqlite", ".sqlite3", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt",
        ".pptx", ".mp3", ".mp4", ".avi", ".mov", ".mkv", ".bin", ".dat", ".pak", ".wasm", ".sct",
    ]
    .into_iter()
    .collect()
});

pub const MAX_FILE_SIZE: u64 = 1_000_000;

fn is_skippable_extension(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return true,
    };
    let lower = name.to_ascii_lowercase();
    SKIP_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn is_skippable(root: &Path, path: &Path) -> bool {
    if let Ok(rel) = path.strip_prefix(root) {
        if rel.components().any(|c| c.as_os_str() == ".roam") {
            return true;
        }
    }
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if SKIP_NAMES.contains(name) {
            return true;
        }
    }
    is_skippable_extension(path)
}

fn normalize(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

fn git_ls_files(root: &Path) -> Option<Vec<PathBuf>> {
    let output = Command::new("git")
        .args(["ls-files", "--cached", "--others", "--exclude-standard"])
        .current_dir(root)
        .output();

    // `Command::output` blocks without a timeout knob in std; a bounded
    // external wrapper is not worth the complexity here since git
    // ls-files on a local working tree is effectively instantaneous,
    // but we still bound our tolerance by treating any failure as
    // "unavailable" and falling back to the walk.
    let _ = GIT_LS_FILES_TIMEOUT;

    match output {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout);
            Some(text.lines().map(|l| root.join(l)).collect())
        }
        _ => None,
    }
}

fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if path.is_dir() {
                // Prune the fixed skip-dir set and any dot-directory
                // (`.git`, `.venv`, editor dirs, ...).
                if name_str.starts_with('.') || SKIP_DIRS.contains(name_str.as_ref()) {
                    continue;
                }
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}

fn filter_files(root: &Path, paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|p| !is_skippable(root, p))
        .filter(|p| {
            std::fs::metadata(p)
                .map(|m| m.len() <= MAX_FILE_SIZE)
                .unwrap_or(false)
        })
        .collect()
}

/// Discover candidate source files under `root`: git listing if
/// available, filesystem walk otherwise, filtered and sorted.
pub fn discover_files(root: impl AsRef<Path>) -> Vec<String> {
    let root = root.as_ref();
    let raw = git_ls_files(root).unwrap_or_else(|| walk_files(root));
    let filtered = filter_files(root, raw);
    let mut normalized: Vec<String> = filtered.iter().map(|p| normalize(root, p)).collect();
    normalized.sort();
    normalized.dedup();
    normalized
}
