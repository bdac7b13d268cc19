//! The error taxonomy commands classify into, each variant carrying
//! the process exit code it maps to.

use thiserror::Error;

/// Exit codes a command-invocation surface returns to the process
/// boundary: `0` success, `1` unexpected error, `2` invalid usage,
/// `3` index missing, `4` index stale, `5` quality-gate failure,
/// `6` partial success with warnings.
pub type ExitCode = i32;

#[derive(Debug, Error)]
pub enum RoamError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("index missing at {path}; run `roam index` first")]
    IndexMissing { path: String },

    #[error("index stale: schema version {found} < {expected}; run `roam reset && roam index`")]
    IndexStale { found: i64, expected: i64 },

    #[error("not a git repository: {hint}")]
    Environment { hint: String },

    #[error("parser error in {file}: {message}")]
    Parser { file: String, message: String },

    #[error("resolver: {0} references could not be resolved")]
    Resolver(usize),

    #[error("quality gate failed: {reason}")]
    Gate { reason: String },

    #[error("partial success: {warnings} warning(s)")]
    Partial { warnings: usize },

    #[error("storage error: {0}")]
    Storage(#[from] roam_storage::StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

impl RoamError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RoamError::Usage(_) => 2,
            RoamError::IndexMissing { .. } => 3,
            RoamError::IndexStale { .. } => 4,
            RoamError::Gate { .. } => 5,
            RoamError::Partial { .. } => 6,
            RoamError::Storage(e) => match e.kind {
                roam_storage::ErrorKind::IndexMissing => 3,
                roam_storage::ErrorKind::IndexStale => 4,
                _ => 1,
            },
            RoamError::Environment { .. }
            | RoamError::Parser { .. }
            | RoamError::Resolver(_)
            | RoamError::Io(_)
            | RoamError::Git(_)
            | RoamError::Config(_)
            | RoamError::Internal(_) => 1,
        }
    }

    /// A short human-readable remediation hint for text-mode output.
    pub fn hint(&self) -> Option<&str> {
        match self {
            RoamError::IndexMissing { .. } => Some("run `roam index` to build the store first"),
            RoamError::IndexStale { .. } => Some("run `roam reset` then `roam index`"),
            RoamError::Environment { .. } => Some("this command requires a git repository"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RoamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_taxonomy() {
        assert_eq!(RoamError::Usage("bad flag".into()).exit_code(), 2);
        assert_eq!(
            RoamError::IndexMissing { path: "x".into() }.exit_code(),
            3
        );
        assert_eq!(
            RoamError::IndexStale { found: 1, expected: 2 }.exit_code(),
            4
        );
        assert_eq!(RoamError::Gate { reason: "r".into() }.exit_code(), 5);
        assert_eq!(RoamError::Partial { warnings: 2 }.exit_code(), 6);
        assert_eq!(RoamError::Internal("boom".into()).exit_code(), 1);
    }

    #[test]
    fn storage_error_kind_maps_through() {
        let storage_err = roam_storage::StorageError::index_missing("/tmp/x");
        let err: RoamError = storage_err.into();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn index_missing_has_a_hint() {
        let err = RoamError::IndexMissing { path: "x".into() };
        assert!(err.hint().is_some());
    }
}
