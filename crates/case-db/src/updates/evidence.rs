//! Evidence update builder.

use serde::Serialize;

use case_core::entities::{Evidence, Metadata};
use case_core::enums::EvidenceCategory;

#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidenceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<EvidenceCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocessed_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl EvidenceUpdate {
    pub(crate) fn apply(&self, evidence: &mut Evidence) {
        if let Some(category) = self.category {
            evidence.category = category;
        }
        if let Some(ref summary) = self.summary {
            evidence.summary.clone_from(summary);
        }
        if let Some(ref content) = self.preprocessed_content {
            evidence.preprocessed_content.clone_from(content);
        }
        if let Some(ref content_ref) = self.content_ref {
            evidence.content_ref.clone_from(content_ref);
        }
        if let Some(ref metadata) = self.metadata {
            evidence.metadata.clone_from(metadata);
        }
    }
}

pub struct EvidenceUpdateBuilder(EvidenceUpdate);

impl EvidenceUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(EvidenceUpdate::default())
    }

    #[must_use]
    pub const fn category(mut self, category: EvidenceCategory) -> Self {
        self.0.category = Some(category);
        self
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.0.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn preprocessed_content(mut self, content: impl Into<String>) -> Self {
        self.0.preprocessed_content = Some(content.into());
        self
    }

    #[must_use]
    pub fn content_ref(mut self, content_ref: Option<String>) -> Self {
        self.0.content_ref = Some(content_ref);
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.0.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn build(self) -> EvidenceUpdate {
        self.0
    }
}

impl Default for EvidenceUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
