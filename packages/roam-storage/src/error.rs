//! Error types for roam-storage

use std::fmt;
use thiserror::Error;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Database errors (SQLite)
    Database,
    /// Index file does not exist
    IndexMissing,
    /// Index schema version is older than this binary expects
    IndexStale,
    /// Lock contention exceeded the bounded wait
    DbLocked,
    /// Schema migration failed (structural drift)
    SchemaError,
    /// File row not found
    FileNotFound,
    /// Symbol row not found
    SymbolNotFound,
    /// Snapshot row not found
    SnapshotNotFound,
    /// Serialization/deserialization errors
    Serialization,
    /// I/O errors
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::IndexMissing => "index_missing",
            ErrorKind::IndexStale => "index_stale",
            ErrorKind::DbLocked => "db_locked",
            ErrorKind::SchemaError => "schema_error",
            ErrorKind::FileNotFound => "file_not_found",
            ErrorKind::SymbolNotFound => "symbol_not_found",
            ErrorKind::SnapshotNotFound => "snapshot_not_found",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            source: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            kind,
            message: message.into(),
        }
    }

    pub fn index_missing(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorKind::IndexMissing,
            format!("no index found at {path}; run `roam index` first"),
        )
    }

    pub fn index_stale(found: i64, expected: i64) -> Self {
        Self::new(
            ErrorKind::IndexStale,
            format!(
                "index schema version {found} is older than expected {expected}; run `roam reset` then `roam index`"
            ),
        )
    }

    pub fn db_locked(timeout_ms: u64) -> Self {
        Self::new(
            ErrorKind::DbLocked,
            format!("store lock not acquired within {timeout_ms}ms"),
        )
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::with_source(ErrorKind::Database, err.to_string(), err)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::with_source(ErrorKind::Io, err.to_string(), err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::with_source(ErrorKind::Serialization, err.to_string(), err)
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
