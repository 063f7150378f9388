//! Database error types for case-db and their mapping onto `CaseError`.

use case_core::errors::CaseError;
use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed or returned data that could not be decoded.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A domain rule rejected the operation inside a unit of work.
    #[error(transparent)]
    Case(#[from] CaseError),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Query(format!("JSON column: {err}"))
    }
}

/// How a SQLite failure should be reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classified {
    Conflict,
    Validation,
    Unavailable,
    Unknown,
}

/// Classify a libSQL error by the SQLite message it carries.
fn classify(message: &str) -> Classified {
    let lower = message.to_ascii_lowercase();
    if lower.contains("unique constraint failed") || lower.contains("primary key") {
        Classified::Conflict
    } else if lower.contains("check constraint failed")
        || lower.contains("not null constraint failed")
        || lower.contains("foreign key constraint failed")
        || lower.contains("constraint failed")
    {
        Classified::Validation
    } else if lower.contains("database is locked")
        || lower.contains("database table is locked")
        || lower.contains("busy")
        || lower.contains("unable to open")
        || lower.contains("disk i/o")
        || lower.contains("connection")
    {
        Classified::Unavailable
    } else {
        Classified::Unknown
    }
}

impl From<DatabaseError> for CaseError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Case(inner) => inner,
            DatabaseError::NoResult => Self::NotFound {
                entity_type: "record".to_string(),
                id: String::new(),
            },
            DatabaseError::LibSql(source) => map_libsql(source),
            DatabaseError::Migration(message) => Self::StorageUnavailable(message),
            DatabaseError::Query(_) | DatabaseError::InvalidState(_) => {
                Self::Other(anyhow::Error::new(err))
            }
            DatabaseError::Other(inner) => Self::Other(inner),
        }
    }
}

fn map_libsql(source: libsql::Error) -> CaseError {
    let message = source.to_string();
    if matches!(source, libsql::Error::ConnectionFailed(_)) {
        return CaseError::StorageUnavailable(message);
    }
    match classify(&message) {
        Classified::Conflict => CaseError::Conflict(message),
        Classified::Validation => CaseError::Validation(message),
        Classified::Unavailable => CaseError::StorageUnavailable(message),
        Classified::Unknown => CaseError::Other(anyhow::Error::new(DatabaseError::LibSql(source))),
    }
}
