//! Schema DDL and migration runner.
//!
//! files/symbols/edges form the core AST graph, file_edges is a
//! pre-aggregated file-level projection of edges, the git_* tables
//! carry commit/churn/co-change history, and graph_metrics/clusters/
//! symbol_metrics/snapshots hold derived analysis output.

use rusqlite::Connection;

use crate::error::{ErrorKind, Result, StorageError};

/// Current schema version. Bump when DDL changes; add a migration step
/// in `migrate` for every version between an existing index's stamped
/// version and this one.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id         INTEGER PRIMARY KEY,
    path       TEXT NOT NULL UNIQUE,
    language   TEXT,
    hash       TEXT NOT NULL,
    mtime      REAL,
    line_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS symbols (
    id             INTEGER PRIMARY KEY,
    file_id        INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    name           TEXT NOT NULL,
    qualified_name TEXT NOT NULL,
    kind           TEXT NOT NULL,
    signature      TEXT,
    line_start     INTEGER NOT NULL,
    line_end       INTEGER NOT NULL,
    docstring      TEXT,
    visibility     TEXT NOT NULL DEFAULT 'public',
    is_exported    INTEGER NOT NULL DEFAULT 1,
    parent_id      INTEGER REFERENCES symbols(id) ON DELETE SET NULL,
    default_value  TEXT
);

CREATE TABLE IF NOT EXISTS edges (
    id        INTEGER PRIMARY KEY,
    source_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    target_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    kind      TEXT NOT NULL,
    line      INTEGER
);

CREATE TABLE IF NOT EXISTS file_edges (
    id              INTEGER PRIMARY KEY,
    source_file_id  INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    target_file_id  INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    kind            TEXT NOT NULL DEFAULT 'imports',
    symbol_count    INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS git_commits (
    id        INTEGER PRIMARY KEY,
    hash      TEXT NOT NULL UNIQUE,
    author    TEXT,
    timestamp INTEGER NOT NULL,
    message   TEXT
);

CREATE TABLE IF NOT EXISTS git_file_changes (
    id            INTEGER PRIMARY KEY,
    commit_id     INTEGER NOT NULL REFERENCES git_commits(id) ON DELETE CASCADE,
    file_id       INTEGER REFERENCES files(id) ON DELETE SET NULL,
    path          TEXT NOT NULL,
    lines_added   INTEGER NOT NULL DEFAULT 0,
    lines_removed INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS git_cochange (
    file_id_a      INTEGER NOT NULL,
    file_id_b      INTEGER NOT NULL,
    cochange_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (file_id_a, file_id_b)
);

CREATE TABLE IF NOT EXISTS git_hyperedges (
    id        INTEGER PRIMARY KEY,
    commit_id INTEGER NOT NULL REFERENCES git_commits(id) ON DELETE CASCADE,
    file_count INTEGER NOT NULL,
    sig_hash  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS git_hyperedge_members (
    hyperedge_id INTEGER NOT NULL REFERENCES git_hyperedges(id) ON DELETE CASCADE,
    file_id      INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    ordinal      INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS file_stats (
    file_id          INTEGER PRIMARY KEY REFERENCES files(id) ON DELETE CASCADE,
    commit_count     INTEGER NOT NULL DEFAULT 0,
    total_churn      INTEGER NOT NULL DEFAULT 0,
    distinct_authors INTEGER NOT NULL DEFAULT 0,
    complexity       REAL,
    health_score     REAL,
    cochange_entropy REAL,
    cognitive_load   REAL
);

CREATE TABLE IF NOT EXISTS graph_metrics (
    symbol_id    INTEGER PRIMARY KEY REFERENCES symbols(id) ON DELETE CASCADE,
    pagerank     REAL NOT NULL DEFAULT 0.0,
    in_degree    INTEGER NOT NULL DEFAULT 0,
    out_degree   INTEGER NOT NULL DEFAULT 0,
    betweenness  REAL NOT NULL DEFAULT 0.0,
    closeness    REAL NOT NULL DEFAULT 0.0,
    eigenvector  REAL NOT NULL DEFAULT 0.0,
    clustering_coefficient REAL NOT NULL DEFAULT 0.0,
    debt_score   REAL NOT NULL DEFAULT 0.0
);

CREATE TABLE IF NOT EXISTS symbol_metrics (
    symbol_id          INTEGER PRIMARY KEY REFERENCES symbols(id) ON DELETE CASCADE,
    cognitive_complexity INTEGER NOT NULL DEFAULT 0,
    nesting_depth        INTEGER NOT NULL DEFAULT 0,
    param_count          INTEGER NOT NULL DEFAULT 0,
    line_count           INTEGER NOT NULL DEFAULT 0,
    return_count         INTEGER NOT NULL DEFAULT 0,
    bool_op_count        INTEGER NOT NULL DEFAULT 0,
    callback_depth       INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS clusters (
    symbol_id    INTEGER PRIMARY KEY REFERENCES symbols(id) ON DELETE CASCADE,
    cluster_id   INTEGER NOT NULL,
    cluster_label TEXT
);

CREATE TABLE IF NOT EXISTS snapshots (
    id             INTEGER PRIMARY KEY,
    timestamp      INTEGER NOT NULL,
    tag            TEXT,
    source         TEXT,
    git_branch     TEXT,
    git_commit     TEXT,
    files          INTEGER NOT NULL DEFAULT 0,
    symbols        INTEGER NOT NULL DEFAULT 0,
    edges          INTEGER NOT NULL DEFAULT 0,
    cycles         INTEGER NOT NULL DEFAULT 0,
    god_components INTEGER NOT NULL DEFAULT 0,
    bottlenecks    INTEGER NOT NULL DEFAULT 0,
    dead_exports   INTEGER NOT NULL DEFAULT 0,
    layer_violations INTEGER NOT NULL DEFAULT 0,
    health_score   REAL,
    tangle_ratio   REAL,
    avg_complexity REAL,
    brain_methods  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_symbols_file_id        ON symbols(file_id);
CREATE INDEX IF NOT EXISTS idx_symbols_name            ON symbols(name);
CREATE INDEX IF NOT EXISTS idx_symbols_qualified_name  ON symbols(qualified_name);
CREATE INDEX IF NOT EXISTS idx_symbols_kind            ON symbols(kind);
CREATE INDEX IF NOT EXISTS idx_symbols_parent_id       ON symbols(parent_id);

CREATE INDEX IF NOT EXISTS idx_edges_source_id       ON edges(source_id);
CREATE INDEX IF NOT EXISTS idx_edges_target_id       ON edges(target_id);
CREATE INDEX IF NOT EXISTS idx_edges_kind            ON edges(kind);
CREATE INDEX IF NOT EXISTS idx_edges_kind_target_id  ON edges(kind, target_id);

CREATE INDEX IF NOT EXISTS idx_file_edges_source ON file_edges(source_file_id);
CREATE INDEX IF NOT EXISTS idx_file_edges_target ON file_edges(target_file_id);

CREATE INDEX IF NOT EXISTS idx_git_file_changes_file_id   ON git_file_changes(file_id);
CREATE INDEX IF NOT EXISTS idx_git_file_changes_commit_id ON git_file_changes(commit_id);

CREATE INDEX IF NOT EXISTS idx_hyperedge_members_hyperedge ON git_hyperedge_members(hyperedge_id);
CREATE INDEX IF NOT EXISTS idx_hyperedge_members_file      ON git_hyperedge_members(file_id);

CREATE INDEX IF NOT EXISTS idx_graph_metrics_pagerank ON graph_metrics(pagerank DESC);
CREATE INDEX IF NOT EXISTS idx_file_stats_churn       ON file_stats(total_churn DESC);
CREATE INDEX IF NOT EXISTS idx_symbol_metrics_cognitive ON symbol_metrics(cognitive_complexity DESC);
"#;

/// Apply the schema to a fresh or existing connection, running any
/// migrations needed to reach `CURRENT_SCHEMA_VERSION`.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(DDL)?;

    let stamped: Option<i64> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .ok()
        .and_then(|s| s.parse().ok());

    match stamped {
        None => {
            conn.execute(
                "INSERT INTO schema_meta(key, value) VALUES ('schema_version', ?1)",
                [CURRENT_SCHEMA_VERSION.to_string()],
            )?;
        }
        Some(v) if v == CURRENT_SCHEMA_VERSION => {}
        Some(v) if v < CURRENT_SCHEMA_VERSION => {
            // No deltas defined yet; a version gap here means the on-disk
            // schema predates a DDL change this binary doesn't know how
            // to reconcile.
            return Err(StorageError::new(
                ErrorKind::SchemaError,
                format!(
                    "schema at version {v} has no migration path to {CURRENT_SCHEMA_VERSION}"
                ),
            ));
        }
        Some(v) => {
            return Err(StorageError::index_stale(v, CURRENT_SCHEMA_VERSION));
        }
    }

    Ok(())
}

/// Read the schema version stamped on an already-open connection.
pub fn schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0),
    )
    .map_err(|e| StorageError::with_source(ErrorKind::SchemaError, "schema_meta unreadable", e))?
    .parse::<i64>()
    .map_err(|e| StorageError::new(ErrorKind::SchemaError, format!("bad schema_version: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_memory() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn migrate_stamps_current_version() {
        let conn = open_memory();
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = open_memory();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn core_tables_exist() {
        let conn = open_memory();
        migrate(&conn).unwrap();
        for table in [
            "files",
            "symbols",
            "edges",
            "file_edges",
            "git_commits",
            "git_file_changes",
            "git_cochange",
            "git_hyperedges",
            "git_hyperedge_members",
            "file_stats",
            "graph_metrics",
            "symbol_metrics",
            "clusters",
            "snapshots",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn newer_stamped_version_is_rejected() {
        let conn = open_memory();
        migrate(&conn).unwrap();
        conn.execute(
            "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
            [(CURRENT_SCHEMA_VERSION + 1).to_string()],
        )
        .unwrap();
        let err = migrate(&conn).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexStale);
    }
}
