//! File table CRUD and the batched lookups other query modules build on.

use rusqlite::{params, OptionalExtension};

use crate::entities::{FileId, FileRecord};
use crate::error::{ErrorKind, Result};
use crate::store::{batched, not_found, placeholders, Store};

fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        language: row.get(2)?,
        hash: row.get(3)?,
        mtime: row.get(4)?,
        line_count: row.get(5)?,
    })
}

const SELECT_COLS: &str = "id, path, language, hash, mtime, line_count";

impl Store {
    /// Insert a new file row, or update `hash`/`mtime`/`line_count` if
    /// `path` already exists. Returns the file's id either way.
    pub fn upsert_file(
        &self,
        path: &str,
        language: Option<&str>,
        hash: &str,
        mtime: Option<f64>,
        line_count: i64,
    ) -> Result<FileId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO files(path, language, hash, mtime, line_count)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(path) DO UPDATE SET
                   language = excluded.language,
                   hash = excluded.hash,
                   mtime = excluded.mtime,
                   line_count = excluded.line_count",
                params![path, language, hash, mtime, line_count],
            )?;
            let id = conn.query_row(
                "SELECT id FROM files WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    pub fn get_file(&self, id: FileId) -> Result<FileRecord> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLS} FROM files WHERE id = ?1"),
                params![id],
                row_to_file,
            )
            .optional()?
            .ok_or_else(|| not_found(ErrorKind::FileNotFound, "file", id))
        })
    }

    pub fn get_file_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {SELECT_COLS} FROM files WHERE path = ?1"),
                    params![path],
                    row_to_file,
                )
                .optional()?)
        })
    }

    pub fn list_files(&self) -> Result<Vec<FileRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLS} FROM files ORDER BY path"))?;
            let rows = stmt.query_map([], row_to_file)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Fetch many files by id in `BATCH_CHUNK_SIZE`-sized `IN (...)`
    /// queries rather than one row at a time.
    pub fn get_files(&self, ids: &[FileId]) -> Result<Vec<FileRecord>> {
        self.with_conn(|conn| {
            let mut out = Vec::with_capacity(ids.len());
            for chunk in batched(ids) {
                if chunk.is_empty() {
                    continue;
                }
                let sql = format!(
                    "SELECT {SELECT_COLS} FROM files WHERE id IN ({})",
                    placeholders(chunk.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let params: Vec<&dyn rusqlite::ToSql> =
                    chunk.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
                let rows = stmt.query_map(params.as_slice(), row_to_file)?;
                for row in rows {
                    out.push(row?);
                }
            }
            Ok(out)
        })
    }

    /// Delete a file and everything that cascades from it (symbols,
    /// edges, file_edges, git_file_changes, file_stats...).
    pub fn delete_file(&self, id: FileId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM files WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    pub fn file_count(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT count(*) FROM files", [], |r| r.get(0))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_get_roundtrips() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .upsert_file("src/a.rs", Some("rust"), "hash1", Some(1.0), 42)
            .unwrap();
        let rec = store.get_file(id).unwrap();
        assert_eq!(rec.path, "src/a.rs");
        assert_eq!(rec.line_count, 42);
    }

    #[test]
    fn upsert_on_existing_path_updates_in_place() {
        let store = Store::open_in_memory().unwrap();
        let id1 = store
            .upsert_file("src/a.rs", Some("rust"), "hash1", None, 10)
            .unwrap();
        let id2 = store
            .upsert_file("src/a.rs", Some("rust"), "hash2", None, 20)
            .unwrap();
        assert_eq!(id1, id2);
        let rec = store.get_file(id1).unwrap();
        assert_eq!(rec.hash, "hash2");
        assert_eq!(rec.line_count, 20);
    }

    #[test]
    fn get_missing_file_errors() {
        let store = Store::open_in_memory().unwrap();
        let err = store.get_file(999).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileNotFound);
    }

    #[test]
    fn get_files_batches_across_chunk_boundary() {
        let store = Store::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for i in 0..850 {
            ids.push(
                store
                    .upsert_file(&format!("f{i}.rs"), None, "h", None, 1)
                    .unwrap(),
            );
        }
        let recs = store.get_files(&ids).unwrap();
        assert_eq!(recs.len(), 850);
    }

    #[test]
    fn delete_file_removes_row() {
        let store = Store::open_in_memory().unwrap();
        let id = store.upsert_file("a.rs", None, "h", None, 1).unwrap();
        store.delete_file(id).unwrap();
        assert!(store.get_file_by_path("a.rs").unwrap().is_none());
    }
}
