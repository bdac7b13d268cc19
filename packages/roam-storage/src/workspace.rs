//! The optional multi-repo overlay store at
//! `<workspace>/.roam-workspace/workspace.db`.
//!
//! This is a second, independent SQLite file from the per-repo index
//! (`Store`/`schema.rs`): it tracks which repos participate in a
//! workspace, which of their symbols are reachable as cross-repo route
//! endpoints, and the edges that connect those endpoints across repo
//! boundaries. It never stores symbol bodies or file content, only
//! pointers back into each repo's own index.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const WORKSPACE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS ws_repos (
    id        INTEGER PRIMARY KEY,
    name      TEXT NOT NULL UNIQUE,
    root_path TEXT NOT NULL,
    index_path TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ws_route_symbols (
    id            INTEGER PRIMARY KEY,
    repo_id       INTEGER NOT NULL REFERENCES ws_repos(id) ON DELETE CASCADE,
    symbol_id     INTEGER NOT NULL,
    route         TEXT NOT NULL,
    method        TEXT,
    qualified_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ws_cross_edges (
    id              INTEGER PRIMARY KEY,
    source_repo_id  INTEGER NOT NULL REFERENCES ws_repos(id) ON DELETE CASCADE,
    source_route_id INTEGER NOT NULL REFERENCES ws_route_symbols(id) ON DELETE CASCADE,
    target_repo_id  INTEGER NOT NULL REFERENCES ws_repos(id) ON DELETE CASCADE,
    target_route_id INTEGER NOT NULL REFERENCES ws_route_symbols(id) ON DELETE CASCADE,
    kind            TEXT NOT NULL,
    confidence      REAL NOT NULL DEFAULT 1.0
);

CREATE INDEX IF NOT EXISTS idx_ws_route_symbols_repo  ON ws_route_symbols(repo_id);
CREATE INDEX IF NOT EXISTS idx_ws_route_symbols_route ON ws_route_symbols(route);
CREATE INDEX IF NOT EXISTS idx_ws_cross_edges_source  ON ws_cross_edges(source_repo_id);
CREATE INDEX IF NOT EXISTS idx_ws_cross_edges_target  ON ws_cross_edges(target_repo_id);
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsRepo {
    pub id: i64,
    pub name: String,
    pub root_path: String,
    pub index_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsRouteSymbol {
    pub id: i64,
    pub repo_id: i64,
    pub symbol_id: i64,
    pub route: String,
    pub method: Option<String>,
    pub qualified_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsCrossEdge {
    pub id: i64,
    pub source_repo_id: i64,
    pub source_route_id: i64,
    pub target_repo_id: i64,
    pub target_route_id: i64,
    pub kind: String,
    pub confidence: f64,
}

/// Handle on the workspace overlay database. Unlike `Store`, this is
/// small enough and infrequent enough in its write pattern (one
/// rebuild per `roam workspace sync`) that it doesn't need the
/// mutex/transaction ceremony — callers own a `&mut` handle instead.
pub struct WorkspaceStore {
    conn: Connection,
    path: PathBuf,
}

impl WorkspaceStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(WORKSPACE_DDL)?;
        Ok(Self { conn, path })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(WORKSPACE_DDL)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn register_repo(&self, name: &str, root_path: &str, index_path: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO ws_repos(name, root_path, index_path) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET root_path = excluded.root_path, index_path = excluded.index_path",
            params![name, root_path, index_path],
        )?;
        Ok(self.conn.query_row(
            "SELECT id FROM ws_repos WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?)
    }

    pub fn list_repos(&self) -> Result<Vec<WsRepo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, root_path, index_path FROM ws_repos ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(WsRepo {
                id: row.get(0)?,
                name: row.get(1)?,
                root_path: row.get(2)?,
                index_path: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn add_route_symbol(
        &self,
        repo_id: i64,
        symbol_id: i64,
        route: &str,
        method: Option<&str>,
        qualified_name: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO ws_route_symbols(repo_id, symbol_id, route, method, qualified_name) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![repo_id, symbol_id, route, method, qualified_name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn route_symbols_for_repo(&self, repo_id: i64) -> Result<Vec<WsRouteSymbol>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, repo_id, symbol_id, route, method, qualified_name \
             FROM ws_route_symbols WHERE repo_id = ?1",
        )?;
        let rows = stmt.query_map(params![repo_id], |row| {
            Ok(WsRouteSymbol {
                id: row.get(0)?,
                repo_id: row.get(1)?,
                symbol_id: row.get(2)?,
                route: row.get(3)?,
                method: row.get(4)?,
                qualified_name: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn find_route(&self, route: &str) -> Result<Vec<WsRouteSymbol>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, repo_id, symbol_id, route, method, qualified_name \
             FROM ws_route_symbols WHERE route = ?1",
        )?;
        let rows = stmt.query_map(params![route], |row| {
            Ok(WsRouteSymbol {
                id: row.get(0)?,
                repo_id: row.get(1)?,
                symbol_id: row.get(2)?,
                route: row.get(3)?,
                method: row.get(4)?,
                qualified_name: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn add_cross_edge(
        &self,
        source_route_id: i64,
        target_route_id: i64,
        kind: &str,
        confidence: f64,
    ) -> Result<()> {
        let source_repo_id: i64 = self.conn.query_row(
            "SELECT repo_id FROM ws_route_symbols WHERE id = ?1",
            params![source_route_id],
            |row| row.get(0),
        )?;
        let target_repo_id: i64 = self.conn.query_row(
            "SELECT repo_id FROM ws_route_symbols WHERE id = ?1",
            params![target_route_id],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO ws_cross_edges(source_repo_id, source_route_id, target_repo_id, target_route_id, kind, confidence) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![source_repo_id, source_route_id, target_repo_id, target_route_id, kind, confidence],
        )?;
        Ok(())
    }

    pub fn cross_edges_for_repo(&self, repo_id: i64) -> Result<Vec<WsCrossEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_repo_id, source_route_id, target_repo_id, target_route_id, kind, confidence \
             FROM ws_cross_edges WHERE source_repo_id = ?1 OR target_repo_id = ?1",
        )?;
        let rows = stmt.query_map(params![repo_id], |row| {
            Ok(WsCrossEdge {
                id: row.get(0)?,
                source_repo_id: row.get(1)?,
                source_route_id: row.get(2)?,
                target_repo_id: row.get(3)?,
                target_route_id: row.get(4)?,
                kind: row.get(5)?,
                confidence: row.get(6)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Drop every route symbol and cross edge belonging to `repo_id`,
    /// e.g. before a re-sync of that repo's route table.
    pub fn clear_repo_routes(&self, repo_id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM ws_route_symbols WHERE repo_id = ?1", params![repo_id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_repo_is_idempotent_on_name() {
        let ws = WorkspaceStore::open_in_memory().unwrap();
        let id1 = ws.register_repo("api", "/repos/api", "/repos/api/.roam/index.db").unwrap();
        let id2 = ws.register_repo("api", "/repos/api-renamed", "/repos/api/.roam/index.db").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(ws.list_repos().unwrap()[0].root_path, "/repos/api-renamed");
    }

    #[test]
    fn cross_edge_derives_repo_ids_from_route_symbols() {
        let ws = WorkspaceStore::open_in_memory().unwrap();
        let api = ws.register_repo("api", "/api", "/api/.roam/index.db").unwrap();
        let web = ws.register_repo("web", "/web", "/web/.roam/index.db").unwrap();
        let src = ws
            .add_route_symbol(web, 1, "/users/:id", Some("GET"), "web::fetch_user")
            .unwrap();
        let dst = ws
            .add_route_symbol(api, 2, "/users/:id", Some("GET"), "api::get_user")
            .unwrap();
        ws.add_cross_edge(src, dst, "rest_api", 0.9).unwrap();
        let edges = ws.cross_edges_for_repo(api).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_repo_id, api);
        assert_eq!(edges[0].source_repo_id, web);
    }

    #[test]
    fn find_route_matches_across_repos() {
        let ws = WorkspaceStore::open_in_memory().unwrap();
        let api = ws.register_repo("api", "/api", "/api/.roam/index.db").unwrap();
        let web = ws.register_repo("web", "/web", "/web/.roam/index.db").unwrap();
        ws.add_route_symbol(api, 1, "/health", None, "api::health").unwrap();
        ws.add_route_symbol(web, 2, "/health", None, "web::health_proxy").unwrap();
        assert_eq!(ws.find_route("/health").unwrap().len(), 2);
    }

    #[test]
    fn clear_repo_routes_cascades_cross_edges() {
        let ws = WorkspaceStore::open_in_memory().unwrap();
        let api = ws.register_repo("api", "/api", "/api/.roam/index.db").unwrap();
        let web = ws.register_repo("web", "/web", "/web/.roam/index.db").unwrap();
        let src = ws.add_route_symbol(web, 1, "/r", None, "web::r").unwrap();
        let dst = ws.add_route_symbol(api, 2, "/r", None, "api::r").unwrap();
        ws.add_cross_edge(src, dst, "rest_api", 1.0).unwrap();
        ws.clear_repo_routes(api).unwrap();
        assert!(ws.cross_edges_for_repo(api).unwrap().is_empty());
    }
}
