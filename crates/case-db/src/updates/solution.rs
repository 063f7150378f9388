//! Solution update builder.

use chrono::{DateTime, Utc};
use serde::Serialize;

use case_core::entities::Solution;
use case_core::enums::{RiskLevel, SolutionStatus};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SolutionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SolutionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_steps: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<Option<RiskLevel>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_effort: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_result: Option<Option<String>>,
}

impl SolutionUpdate {
    pub(crate) fn apply(&self, solution: &mut Solution, now: DateTime<Utc>) {
        if let Some(ref description) = self.description {
            solution.description.clone_from(description);
        }
        if let Some(status) = self.status {
            solution.status = status;
            match status {
                SolutionStatus::Implemented => {
                    solution.implemented_at.get_or_insert(now);
                }
                SolutionStatus::Verified => {
                    solution.implemented_at.get_or_insert(now);
                    solution.verified_at.get_or_insert(now);
                }
                SolutionStatus::Proposed | SolutionStatus::InProgress | SolutionStatus::Rejected => {}
            }
        }
        if let Some(ref steps) = self.implementation_steps {
            solution.implementation_steps.clone_from(steps);
        }
        if let Some(risk) = self.risk_level {
            solution.risk_level = risk;
        }
        if let Some(ref effort) = self.estimated_effort {
            solution.estimated_effort.clone_from(effort);
        }
        if let Some(ref result) = self.verification_result {
            solution.verification_result.clone_from(result);
        }
        solution.updated_at = now;
    }
}

pub struct SolutionUpdateBuilder(SolutionUpdate);

impl SolutionUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(SolutionUpdate::default())
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.0.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn status(mut self, status: SolutionStatus) -> Self {
        self.0.status = Some(status);
        self
    }

    #[must_use]
    pub fn implementation_steps(mut self, steps: Vec<String>) -> Self {
        self.0.implementation_steps = Some(steps);
        self
    }

    #[must_use]
    pub const fn risk_level(mut self, risk: Option<RiskLevel>) -> Self {
        self.0.risk_level = Some(risk);
        self
    }

    #[must_use]
    pub fn estimated_effort(mut self, effort: Option<String>) -> Self {
        self.0.estimated_effort = Some(effort);
        self
    }

    #[must_use]
    pub fn verification_result(mut self, result: Option<String>) -> Self {
        self.0.verification_result = Some(result);
        self
    }

    #[must_use]
    pub fn build(self) -> SolutionUpdate {
        self.0
    }
}

impl Default for SolutionUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
