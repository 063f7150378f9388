//! Error taxonomy shared by every Casebook layer.
//!
//! Storage-specific failures (e.g. `DatabaseError` in `case-db`) are mapped
//! into `CaseError` at the repository boundary so callers only ever match on
//! the five variants below.

use thiserror::Error;

/// Errors surfaced to callers of the repository and the case manager.
#[derive(Debug, Error)]
pub enum CaseError {
    /// Malformed input: empty required string, out-of-range score, unknown
    /// enum value. Raised before any storage write is attempted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity lookup returned no result. Ownership mismatches are reported
    /// through this variant as well.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// Duplicate identifier or a concurrent write detected by the store.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connection or transaction failure. Fatal for the current request.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CaseError {
    /// Build a `NotFound` for a case identifier.
    #[must_use]
    pub fn case_not_found(case_id: &str) -> Self {
        Self::NotFound {
            entity_type: "case".to_string(),
            id: case_id.to_string(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
