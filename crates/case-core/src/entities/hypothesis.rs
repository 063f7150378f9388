use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Metadata;
use crate::enums::HypothesisStatus;
use crate::errors::CaseError;
use crate::ids::{PREFIX_HYPOTHESIS, generate_id};
use crate::validation::{require_non_empty, require_unit_interval};

/// A candidate explanation for the observed problem.
///
/// `supporting_evidence_ids` are weak references: each must name evidence of
/// the same case, but deleting that evidence only prunes the reference.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Hypothesis {
    pub id: String,
    pub case_id: String,
    pub description: String,
    pub status: HypothesisStatus,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub supporting_evidence_ids: Vec<String>,
    pub validation_result: Option<String>,
    pub validated_at: Option<DateTime<Utc>>,
    pub proposed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Hypothesis {
    /// Build a `proposed` hypothesis with a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` if the description is empty.
    pub fn new(
        case_id: &str,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CaseError> {
        let hypothesis = Self {
            id: generate_id(PREFIX_HYPOTHESIS)?,
            case_id: case_id.to_string(),
            description: description.into(),
            status: HypothesisStatus::Proposed,
            confidence: None,
            supporting_evidence_ids: Vec::new(),
            validation_result: None,
            validated_at: None,
            proposed_at: now,
            updated_at: now,
            metadata: Metadata::new(),
        };
        hypothesis.validate()?;
        Ok(hypothesis)
    }

    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    #[must_use]
    pub fn with_supporting_evidence(mut self, evidence_ids: Vec<String>) -> Self {
        self.supporting_evidence_ids = evidence_ids;
        self
    }

    /// # Errors
    ///
    /// Returns `CaseError::Validation` for an empty description, a confidence
    /// outside `[0, 1]`, or a duplicated evidence reference.
    pub fn validate(&self) -> Result<(), CaseError> {
        require_non_empty("hypothesis description", &self.description)?;
        require_unit_interval("hypothesis confidence", self.confidence)?;
        for (i, id) in self.supporting_evidence_ids.iter().enumerate() {
            if self.supporting_evidence_ids[..i].contains(id) {
                return Err(CaseError::Validation(format!(
                    "hypothesis {} lists evidence {id} twice",
                    self.id
                )));
            }
        }
        Ok(())
    }
}
