//! Field-level validation shared by all entities.
//!
//! Each check mirrors a CHECK constraint in the schema so invalid input is
//! rejected before a write is attempted, with the store as the backstop.

use crate::errors::CaseError;

/// Reject empty or whitespace-only strings.
///
/// # Errors
///
/// Returns `CaseError::Validation` naming the field.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), CaseError> {
    if value.trim().is_empty() {
        return Err(CaseError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Reject scores outside `[0, 1]` (and NaN).
///
/// # Errors
///
/// Returns `CaseError::Validation` naming the field and value.
pub fn require_unit_interval(field: &str, value: Option<f64>) -> Result<(), CaseError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(CaseError::Validation(format!(
            "{field} must be within [0, 1], got {v}"
        ))),
        _ => Ok(()),
    }
}

/// Phase documents and metadata bags must be JSON objects.
///
/// # Errors
///
/// Returns `CaseError::Validation` if `value` is not an object.
pub fn require_object(field: &str, value: &serde_json::Value) -> Result<(), CaseError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(CaseError::Validation(format!("{field} must be a JSON object")))
    }
}

/// Reject a child whose `case_id` does not match the owning case.
///
/// # Errors
///
/// Returns `CaseError::Validation` naming the child.
pub fn require_same_case(child: &str, child_case_id: &str, case_id: &str) -> Result<(), CaseError> {
    if child_case_id == case_id {
        Ok(())
    } else {
        Err(CaseError::Validation(format!(
            "{child} belongs to case {child_case_id}, not {case_id}"
        )))
    }
}
