use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Metadata;
use crate::enums::{RiskLevel, SolutionStatus};
use crate::errors::CaseError;
use crate::ids::{PREFIX_SOLUTION, generate_id};
use crate::validation::require_non_empty;

/// A candidate or applied remediation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Solution {
    pub id: String,
    pub case_id: String,
    pub description: String,
    pub status: SolutionStatus,
    #[serde(default)]
    pub implementation_steps: Vec<String>,
    pub risk_level: Option<RiskLevel>,
    pub estimated_effort: Option<String>,
    pub verification_result: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub proposed_at: DateTime<Utc>,
    pub implemented_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Solution {
    /// Build a `proposed` solution with a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` if the description is empty.
    pub fn new(
        case_id: &str,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CaseError> {
        let solution = Self {
            id: generate_id(PREFIX_SOLUTION)?,
            case_id: case_id.to_string(),
            description: description.into(),
            status: SolutionStatus::Proposed,
            implementation_steps: Vec::new(),
            risk_level: None,
            estimated_effort: None,
            verification_result: None,
            verified_at: None,
            proposed_at: now,
            implemented_at: None,
            updated_at: now,
            metadata: Metadata::new(),
        };
        solution.validate()?;
        Ok(solution)
    }

    #[must_use]
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.implementation_steps = steps;
        self
    }

    #[must_use]
    pub const fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk_level = Some(risk);
        self
    }

    /// # Errors
    ///
    /// Returns `CaseError::Validation` for an empty description or step.
    pub fn validate(&self) -> Result<(), CaseError> {
        require_non_empty("solution description", &self.description)?;
        for step in &self.implementation_steps {
            require_non_empty("solution implementation step", step)?;
        }
        Ok(())
    }
}
