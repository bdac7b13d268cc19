//! The embedded store handle.
//!
//! A single SQLite file backs the index. Writers take an internal
//! `Mutex` so only one write transaction is open at a time (a
//! single-writer/many-reader discipline); readers go through the
//! same connection since rusqlite connections aren't `Sync` on their
//! own, but callers that only ever read can open with `OpenMode::ReadOnly`
//! to get SQLite's own read-only guarantees on top.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::{ErrorKind, Result, StorageError};
use crate::schema;

/// Maximum number of placeholders batched into a single `IN (?,?,...)`
/// clause; SQLite's default limit is 999 bound parameters, staying well
/// under that keeps room for any other parameters in the same query.
pub const BATCH_CHUNK_SIZE: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the database if missing, apply migrations, allow writes.
    ReadWrite,
    /// Fail with `IndexMissing` if the database file doesn't exist;
    /// no migrations are attempted.
    ReadOnly,
}

/// How long to wait on SQLite's `busy_timeout` before surfacing
/// `ErrorKind::DbLocked` to the caller.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

pub struct Store {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Store {
    /// Open (or create) the store at `path` in read-write mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_mode(path, OpenMode::ReadWrite)
    }

    pub fn open_with_mode(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if mode == OpenMode::ReadOnly && !path.exists() {
            return Err(StorageError::index_missing(path.display().to_string()));
        }

        let conn = if mode == OpenMode::ReadOnly {
            Connection::open_with_flags(
                &path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            Connection::open(&path)?
        };

        conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        if mode == OpenMode::ReadWrite {
            schema::migrate(&conn)?;
        } else {
            let found = schema::schema_version(&conn)?;
            if found < schema::CURRENT_SCHEMA_VERSION {
                return Err(StorageError::index_stale(found, schema::CURRENT_SCHEMA_VERSION));
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Open a private in-memory store; used by tests and by any caller
    /// that wants a scratch index with no on-disk footprint.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with exclusive access to the connection, translating a
    /// mutex-poison (a prior panic while holding the lock) into a
    /// `DbLocked` error rather than propagating the panic.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| StorageError::db_locked(DEFAULT_BUSY_TIMEOUT_MS))?;
        f(&guard)
    }

    /// Run `f` inside a single write transaction, committing on `Ok`
    /// and rolling back on `Err`.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StorageError::db_locked(DEFAULT_BUSY_TIMEOUT_MS))?;
        let tx = guard.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Reclaim space after a `clean` pass removed meaningful data.
    /// `VACUUM` rebuilds the whole file, so callers only run it when
    /// rows were actually deleted.
    pub fn vacuum(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("VACUUM", [])?;
            Ok(())
        })
    }
}

/// Split `items` into chunks no larger than [`BATCH_CHUNK_SIZE`], the
/// shape every `IN (?,?,...)` batched query builds its placeholder list
/// from.
pub fn batched<T: Copy>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(BATCH_CHUNK_SIZE)
}

/// Build a `?,?,...` placeholder list for `n` items.
pub fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(",")
}

pub fn not_found(kind: ErrorKind, what: &str, id: i64) -> StorageError {
    StorageError::new(kind, format!("{what} {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_migrates() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| Ok(schema::schema_version(conn)?))
            .unwrap();
    }

    #[test]
    fn read_only_open_on_missing_path_is_index_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.db");
        let err = Store::open_with_mode(&path, OpenMode::ReadOnly).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexMissing);
    }

    #[test]
    fn read_write_then_read_only_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx.db");
        {
            let store = Store::open_with_mode(&path, OpenMode::ReadWrite).unwrap();
            store
                .with_conn(|conn| {
                    conn.execute(
                        "INSERT INTO files(path, language, hash, line_count) VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params!["a.rs", "rust", "abc123", 10],
                    )?;
                    Ok(())
                })
                .unwrap();
        }
        let store = Store::open_with_mode(&path, OpenMode::ReadOnly).unwrap();
        let count: i64 = store
            .with_conn(|conn| Ok(conn.query_row("SELECT count(*) FROM files", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = Store::open_in_memory().unwrap();
        let result: Result<()> = store.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO files(path, hash, line_count) VALUES ('x.rs', 'h', 1)",
                [],
            )?;
            Err(StorageError::new(ErrorKind::Database, "forced rollback"))
        });
        assert!(result.is_err());
        let count: i64 = store
            .with_conn(|conn| Ok(conn.query_row("SELECT count(*) FROM files", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn placeholders_builds_correct_count() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?,?,?");
    }

    #[test]
    fn batched_splits_at_chunk_size() {
        let items: Vec<i64> = (0..850).collect();
        let chunks: Vec<&[i64]> = batched(&items).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), BATCH_CHUNK_SIZE);
        assert_eq!(chunks[2].len(), 850 - 2 * BATCH_CHUNK_SIZE);
    }
}
