//! Schema-flexible phase documents.
//!
//! Each phase of an investigation keeps its state as an opaque JSON object on
//! the case row. Shape is validated only here (must be an object; required
//! phases can't be cleared), never at the storage layer, so the content can
//! evolve without a migration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::enums::PhaseKind;
use crate::errors::CaseError;
use crate::validation::require_object;

/// Default content of the `consulting` phase.
#[must_use]
pub fn default_consulting() -> Value {
    json!({ "initial_description": "", "context": {}, "user_goals": [] })
}

/// Default content of the `documentation` phase.
#[must_use]
pub fn default_documentation() -> Value {
    json!({ "summary": "", "timeline": [], "lessons_learned": [] })
}

/// Default content of the `progress` phase.
#[must_use]
pub fn default_progress() -> Value {
    json!({ "current_phase": "consulting", "completion_percentage": 0, "milestones": [] })
}

/// All phase documents of one case.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PhaseDocuments {
    #[serde(default = "default_consulting")]
    pub consulting: Value,
    #[serde(default)]
    pub problem_verification: Option<Value>,
    #[serde(default)]
    pub working_conclusion: Option<Value>,
    #[serde(default)]
    pub root_cause_conclusion: Option<Value>,
    #[serde(default)]
    pub path_selection: Option<Value>,
    #[serde(default)]
    pub degraded_mode: Option<Value>,
    #[serde(default)]
    pub escalation_state: Option<Value>,
    #[serde(default = "default_documentation")]
    pub documentation: Value,
    #[serde(default = "default_progress")]
    pub progress: Value,
}

impl Default for PhaseDocuments {
    fn default() -> Self {
        Self {
            consulting: default_consulting(),
            problem_verification: None,
            working_conclusion: None,
            root_cause_conclusion: None,
            path_selection: None,
            degraded_mode: None,
            escalation_state: None,
            documentation: default_documentation(),
            progress: default_progress(),
        }
    }
}

impl PhaseDocuments {
    /// Read one phase document.
    #[must_use]
    pub const fn get(&self, kind: PhaseKind) -> Option<&Value> {
        match kind {
            PhaseKind::Consulting => Some(&self.consulting),
            PhaseKind::ProblemVerification => self.problem_verification.as_ref(),
            PhaseKind::WorkingConclusion => self.working_conclusion.as_ref(),
            PhaseKind::RootCauseConclusion => self.root_cause_conclusion.as_ref(),
            PhaseKind::PathSelection => self.path_selection.as_ref(),
            PhaseKind::DegradedMode => self.degraded_mode.as_ref(),
            PhaseKind::EscalationState => self.escalation_state.as_ref(),
            PhaseKind::Documentation => Some(&self.documentation),
            PhaseKind::Progress => Some(&self.progress),
        }
    }

    /// Replace one phase document. `None` clears an optional phase.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` if the document is not a JSON object or
    /// if `None` is passed for a required phase.
    pub fn set(&mut self, kind: PhaseKind, document: Option<Value>) -> Result<(), CaseError> {
        check_phase(kind, document.as_ref())?;
        match (kind, document) {
            (PhaseKind::Consulting, Some(doc)) => self.consulting = doc,
            (PhaseKind::Documentation, Some(doc)) => self.documentation = doc,
            (PhaseKind::Progress, Some(doc)) => self.progress = doc,
            (PhaseKind::ProblemVerification, doc) => self.problem_verification = doc,
            (PhaseKind::WorkingConclusion, doc) => self.working_conclusion = doc,
            (PhaseKind::RootCauseConclusion, doc) => self.root_cause_conclusion = doc,
            (PhaseKind::PathSelection, doc) => self.path_selection = doc,
            (PhaseKind::DegradedMode, doc) => self.degraded_mode = doc,
            (PhaseKind::EscalationState, doc) => self.escalation_state = doc,
            // Rejected by check_phase above.
            (PhaseKind::Consulting | PhaseKind::Documentation | PhaseKind::Progress, None) => {}
        }
        Ok(())
    }

    /// Validate every document.
    ///
    /// # Errors
    ///
    /// Returns the first `CaseError::Validation` encountered.
    pub fn validate(&self) -> Result<(), CaseError> {
        for kind in PhaseKind::ALL {
            check_phase(kind, self.get(kind))?;
        }
        Ok(())
    }
}

/// Validate a single phase document against its kind.
///
/// # Errors
///
/// Returns `CaseError::Validation` for non-object documents or a cleared
/// required phase.
pub fn check_phase(kind: PhaseKind, document: Option<&Value>) -> Result<(), CaseError> {
    match document {
        Some(doc) => require_object(kind.as_str(), doc),
        None if kind.is_required() => Err(CaseError::Validation(format!(
            "phase '{kind}' is required and cannot be cleared"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_have_required_phases() {
        let phases = PhaseDocuments::default();
        assert_eq!(phases.get(PhaseKind::Consulting), Some(&default_consulting()));
        assert_eq!(phases.get(PhaseKind::Progress), Some(&default_progress()));
        assert_eq!(phases.get(PhaseKind::Documentation), Some(&default_documentation()));
        assert_eq!(phases.get(PhaseKind::WorkingConclusion), None);
        phases.validate().unwrap();
    }

    #[test]
    fn set_and_clear_optional_phase() {
        let mut phases = PhaseDocuments::default();
        let doc = json!({ "statement": "pool exhaustion", "confidence": 0.7 });
        phases.set(PhaseKind::WorkingConclusion, Some(doc.clone())).unwrap();
        assert_eq!(phases.get(PhaseKind::WorkingConclusion), Some(&doc));

        phases.set(PhaseKind::WorkingConclusion, None).unwrap();
        assert_eq!(phases.get(PhaseKind::WorkingConclusion), None);
    }

    #[test]
    fn required_phase_cannot_be_cleared() {
        let mut phases = PhaseDocuments::default();
        let err = phases.set(PhaseKind::Progress, None).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(phases.get(PhaseKind::Progress), Some(&default_progress()));
    }

    #[test]
    fn non_object_rejected() {
        let mut phases = PhaseDocuments::default();
        assert!(phases.set(PhaseKind::DegradedMode, Some(json!("degraded"))).is_err());
        assert_eq!(phases.degraded_mode, None);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let phases: PhaseDocuments = serde_json::from_value(json!({})).unwrap();
        assert_eq!(phases, PhaseDocuments::default());
    }
}
