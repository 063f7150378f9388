//! Case update builder.
//!
//! Covers the mutable core fields. Status is deliberately absent: it only
//! changes through a recorded transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use case_core::entities::{Case, Metadata};
use case_core::enums::PhaseKind;
use case_core::errors::CaseError;
use case_core::legacy::LegacyClassification;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CaseUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Keys merged into the existing metadata; a `null` value removes the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<(PhaseKind, Option<Value>)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<LegacyClassification>,
}

impl CaseUpdate {
    /// Apply to a loaded case and re-validate it.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` for a blank title, a malformed phase
    /// document, or an attempt to clear a required phase.
    pub fn apply(&self, case: &mut Case, now: DateTime<Utc>) -> Result<(), CaseError> {
        if let Some(ref title) = self.title {
            case.title = title.trim().to_string();
        }
        if let Some(ref description) = self.description {
            case.description.clone_from(description);
        }
        if let Some(ref metadata) = self.metadata {
            for (key, value) in metadata {
                if value.is_null() {
                    case.metadata.remove(key);
                } else {
                    case.metadata.insert(key.clone(), value.clone());
                }
            }
        }
        for (kind, document) in &self.phases {
            case.phases.set(*kind, document.clone())?;
        }
        if let Some(classification) = self.classification {
            classification.apply_to(&mut case.metadata);
        }
        case.updated_at = now;
        case.last_activity_at = now;
        case.validate()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.metadata.is_none()
            && self.phases.is_empty()
            && self.classification.is_none()
    }
}

pub struct CaseUpdateBuilder(CaseUpdate);

impl CaseUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(CaseUpdate::default())
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.0.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.0.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.0.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn phase(mut self, kind: PhaseKind, document: Option<Value>) -> Self {
        self.0.phases.push((kind, document));
        self
    }

    #[must_use]
    pub const fn classification(mut self, classification: LegacyClassification) -> Self {
        self.0.classification = Some(classification);
        self
    }

    #[must_use]
    pub fn build(self) -> CaseUpdate {
        self.0
    }
}

impl Default for CaseUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use case_core::legacy::{LegacyCategory, Severity};
    use case_core::timestamps::now;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn case() -> Case {
        let mut case = Case::new("case_1", "u1", "default", "Slow checkout", "", now()).unwrap();
        case.metadata.insert("source".into(), json!("pagerduty"));
        case
    }

    #[test]
    fn merges_metadata_and_removes_null_keys() {
        let mut case = case();
        let mut patch = Metadata::new();
        patch.insert("source".into(), Value::Null);
        patch.insert("region".into(), json!("eu-west-1"));

        CaseUpdateBuilder::new()
            .metadata(patch)
            .build()
            .apply(&mut case, now())
            .unwrap();

        assert_eq!(case.metadata.get("source"), None);
        assert_eq!(case.metadata.get("region"), Some(&json!("eu-west-1")));
    }

    #[test]
    fn classification_lands_in_metadata() {
        let mut case = case();
        CaseUpdateBuilder::new()
            .classification(LegacyClassification {
                severity: Severity::High,
                category: LegacyCategory::Performance,
            })
            .build()
            .apply(&mut case, now())
            .unwrap();
        assert_eq!(case.metadata.get("severity"), Some(&json!("high")));
        assert_eq!(case.metadata.get("category"), Some(&json!("performance")));
    }

    #[test]
    fn blank_title_rejected() {
        let mut case = case();
        let err = CaseUpdateBuilder::new()
            .title("  ")
            .build()
            .apply(&mut case, now())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn clearing_required_phase_rejected() {
        let mut case = case();
        let err = CaseUpdateBuilder::new()
            .phase(PhaseKind::Consulting, None)
            .build()
            .apply(&mut case, now())
            .unwrap_err();
        assert!(err.is_validation());
    }
}
