//! Embedded persistence for the code-intelligence index: a single
//! SQLite file per repository (`Store`) plus an optional multi-repo
//! overlay database (`WorkspaceStore`).
//!
//! Callers open a [`Store`] against `<project>/.roam/index.db`, write
//! through the `queries` submodules' per-entity helpers, and read back
//! typed rows from `entities`. The store enforces the single-writer
//! discipline internally; there is no separate connection pool.

pub mod entities;
pub mod error;
pub mod schema;
pub mod store;
pub mod workspace;

mod queries {
    pub mod edges;
    pub mod files;
    pub mod git;
    pub mod metrics;
    pub mod snapshots;
    pub mod symbols;
}

pub use entities::*;
pub use error::{ErrorKind, Result, StorageError};
pub use schema::CURRENT_SCHEMA_VERSION;
pub use store::{OpenMode, Store, BATCH_CHUNK_SIZE};
pub use workspace::{WorkspaceStore, WsCrossEdge, WsRepo, WsRouteSymbol};
