//! Hypothesis update builder.

use chrono::{DateTime, Utc};
use serde::Serialize;

use case_core::entities::Hypothesis;
use case_core::enums::HypothesisStatus;

#[derive(Debug, Clone, Default, Serialize)]
pub struct HypothesisUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<HypothesisStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supporting_evidence_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_result: Option<Option<String>>,
}

impl HypothesisUpdate {
    /// Concluding a hypothesis (validated/invalidated) stamps `validated_at`
    /// the first time.
    pub(crate) fn apply(&self, hypothesis: &mut Hypothesis, now: DateTime<Utc>) {
        if let Some(ref description) = self.description {
            hypothesis.description.clone_from(description);
        }
        if let Some(status) = self.status {
            hypothesis.status = status;
            if status.is_concluded() && hypothesis.validated_at.is_none() {
                hypothesis.validated_at = Some(now);
            }
        }
        if let Some(confidence) = self.confidence {
            hypothesis.confidence = confidence;
        }
        if let Some(ref ids) = self.supporting_evidence_ids {
            hypothesis.supporting_evidence_ids.clone_from(ids);
        }
        if let Some(ref result) = self.validation_result {
            hypothesis.validation_result.clone_from(result);
        }
        hypothesis.updated_at = now;
    }
}

pub struct HypothesisUpdateBuilder(HypothesisUpdate);

impl HypothesisUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(HypothesisUpdate::default())
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.0.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn status(mut self, status: HypothesisStatus) -> Self {
        self.0.status = Some(status);
        self
    }

    #[must_use]
    pub const fn confidence(mut self, confidence: Option<f64>) -> Self {
        self.0.confidence = Some(confidence);
        self
    }

    #[must_use]
    pub fn supporting_evidence(mut self, ids: Vec<String>) -> Self {
        self.0.supporting_evidence_ids = Some(ids);
        self
    }

    #[must_use]
    pub fn validation_result(mut self, result: Option<String>) -> Self {
        self.0.validation_result = Some(result);
        self
    }

    #[must_use]
    pub fn build(self) -> HypothesisUpdate {
        self.0
    }
}

impl Default for HypothesisUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
