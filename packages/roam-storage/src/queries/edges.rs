//! Symbol-level edges and their file-level aggregate projection.

use std::collections::HashMap;

use rusqlite::params;

use crate::entities::{EdgeId, EdgeRecord, FileEdgeRecord, FileId, NewEdge, SymbolId};
use crate::error::Result;
use crate::store::Store;

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<EdgeRecord> {
    Ok(EdgeRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        target_id: row.get(2)?,
        kind: row.get(3)?,
        line: row.get(4)?,
    })
}

impl Store {
    pub fn insert_edge(&self, kind: &str, edge: &NewEdge) -> Result<EdgeId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO edges(source_id, target_id, kind, line) VALUES (?1, ?2, ?3, ?4)",
                params![edge.source_id, edge.target_id, kind, edge.line],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn edges_from(&self, symbol_id: SymbolId) -> Result<Vec<EdgeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, source_id, target_id, kind, line FROM edges WHERE source_id = ?1",
            )?;
            let rows = stmt.query_map(params![symbol_id], row_to_edge)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn edges_to(&self, symbol_id: SymbolId) -> Result<Vec<EdgeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, source_id, target_id, kind, line FROM edges WHERE target_id = ?1",
            )?;
            let rows = stmt.query_map(params![symbol_id], row_to_edge)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn edges_of_kind(&self, kind: &str) -> Result<Vec<EdgeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, source_id, target_id, kind, line FROM edges WHERE kind = ?1",
            )?;
            let rows = stmt.query_map(params![kind], row_to_edge)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn all_edges(&self) -> Result<Vec<EdgeRecord>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, source_id, target_id, kind, line FROM edges")?;
            let rows = stmt.query_map([], row_to_edge)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Recompute `file_edges` from the current `edges` + `symbols`
    /// tables: for every symbol-level edge, attribute it to the pair of
    /// files its endpoints live in and tally how many distinct symbol
    /// edges realize that file pair, grouped by edge kind.
    pub fn rebuild_file_edges(&self) -> Result<()> {
        self.with_transaction(|tx| {
            tx.execute("DELETE FROM file_edges", [])?;

            let mut stmt = tx.prepare(
                "SELECT e.kind, sa.file_id, sb.file_id
                 FROM edges e
                 JOIN symbols sa ON sa.id = e.source_id
                 JOIN symbols sb ON sb.id = e.target_id
                 WHERE sa.file_id != sb.file_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, FileId>(1)?,
                    row.get::<_, FileId>(2)?,
                ))
            })?;

            let mut counts: HashMap<(String, FileId, FileId), i64> = HashMap::new();
            for row in rows {
                let (kind, src, tgt) = row?;
                *counts.entry((kind, src, tgt)).or_insert(0) += 1;
            }
            drop(stmt);

            for ((kind, src, tgt), count) in counts {
                tx.execute(
                    "INSERT INTO file_edges(source_file_id, target_file_id, kind, symbol_count) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![src, tgt, kind, count],
                )?;
            }
            Ok(())
        })
    }

    pub fn file_edges_from(&self, file_id: FileId) -> Result<Vec<FileEdgeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, source_file_id, target_file_id, kind, symbol_count \
                 FROM file_edges WHERE source_file_id = ?1",
            )?;
            let rows = stmt.query_map(params![file_id], |row| {
                Ok(FileEdgeRecord {
                    id: row.get(0)?,
                    source_file_id: row.get(1)?,
                    target_file_id: row.get(2)?,
                    kind: row.get(3)?,
                    symbol_count: row.get(4)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Every file-level aggregate edge with at least one realizing
    /// symbol edge, regardless of direction or kind.
    pub fn all_file_edges(&self) -> Result<Vec<FileEdgeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, source_file_id, target_file_id, kind, symbol_count FROM file_edges",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(FileEdgeRecord {
                    id: row.get(0)?,
                    source_file_id: row.get(1)?,
                    target_file_id: row.get(2)?,
                    kind: row.get(3)?,
                    symbol_count: row.get(4)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Remove any `edges` row whose endpoint no longer exists. With
    /// `PRAGMA foreign_keys = ON` this should always find nothing —
    /// `ON DELETE CASCADE` keeps `edges` clean as symbols disappear —
    /// but `clean` runs it anyway as a defensive sweep. Returns the
    /// number of rows removed.
    pub fn delete_dangling_edges(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM edges WHERE source_id NOT IN (SELECT id FROM symbols) \
                 OR target_id NOT IN (SELECT id FROM symbols)",
                [],
            )?;
            Ok(n)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{NewSymbol, Visibility};

    fn sample(name: &str) -> NewSymbol {
        NewSymbol {
            name: name.to_string(),
            qualified_name: format!("mod::{name}"),
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
    fn insert_edge_then_lookup_both_directions() {
        let store = Store::open_in_memory().unwrap();
        let f = store.upsert_file("a.rs", None, "h", None, 1).unwrap();
        let a = store.insert_symbol(f, &sample("a")).unwrap();
        let b = store.insert_symbol(f, &sample("b")).unwrap();
        store
            .insert_edge(
                "calls",
                &NewEdge {
                    source_id: a,
                    target_id: b,
                    line: Some(3),
                },
            )
            .unwrap();
        assert_eq!(store.edges_from(a).unwrap().len(), 1);
        assert_eq!(store.edges_to(b).unwrap().len(), 1);
        assert_eq!(store.edges_to(a).unwrap().len(), 0);
    }

    #[test]
    fn rebuild_file_edges_aggregates_cross_file_calls() {
        let store = Store::open_in_memory().unwrap();
        let f1 = store.upsert_file("a.rs", None, "h", None, 1).unwrap();
        let f2 = store.upsert_file("b.rs", None, "h", None, 1).unwrap();
        let a1 = store.insert_symbol(f1, &sample("a1")).unwrap();
        let a2 = store.insert_symbol(f1, &sample("a2")).unwrap();
        let b1 = store.insert_symbol(f2, &sample("b1")).unwrap();
        store
            .insert_edge("calls", &NewEdge { source_id: a1, target_id: b1, line: None })
            .unwrap();
        store
            .insert_edge("calls", &NewEdge { source_id: a2, target_id: b1, line: None })
            .unwrap();
        store.rebuild_file_edges().unwrap();
        let edges = store.file_edges_from(f1).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].symbol_count, 2);
        assert_eq!(edges[0].target_file_id, f2);
    }

    #[test]
    fn rebuild_file_edges_ignores_same_file_calls() {
        let store = Store::open_in_memory().unwrap();
        let f1 = store.upsert_file("a.rs", None, "h", None, 1).unwrap();
        let a1 = store.insert_symbol(f1, &sample("a1")).unwrap();
        let a2 = store.insert_symbol(f1, &sample("a2")).unwrap();
        store
            .insert_edge("calls", &NewEdge { source_id: a1, target_id: a2, line: None })
            .unwrap();
        store.rebuild_file_edges().unwrap();
        assert!(store.file_edges_from(f1).unwrap().is_empty());
    }
}
