use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Metadata;
use crate::enums::EvidenceCategory;
use crate::errors::CaseError;
use crate::ids::{PREFIX_EVIDENCE, generate_id};
use crate::validation::require_non_empty;

/// A discrete artifact or observation attached to a case.
///
/// Only the preprocessed (summarized, sanitized) text is stored here; raw
/// content lives elsewhere and is referenced by `content_ref`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Evidence {
    pub id: String,
    pub case_id: String,
    pub category: EvidenceCategory,
    pub summary: String,
    pub preprocessed_content: String,
    pub content_ref: Option<String>,
    pub filename: Option<String>,
    pub file_size: Option<u64>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Evidence {
    /// Build evidence with a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` if summary or content are empty.
    pub fn new(
        case_id: &str,
        category: EvidenceCategory,
        summary: impl Into<String>,
        preprocessed_content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CaseError> {
        let evidence = Self {
            id: generate_id(PREFIX_EVIDENCE)?,
            case_id: case_id.to_string(),
            category,
            summary: summary.into(),
            preprocessed_content: preprocessed_content.into(),
            content_ref: None,
            filename: None,
            file_size: None,
            uploaded_at: now,
            metadata: Metadata::new(),
        };
        evidence.validate()?;
        Ok(evidence)
    }

    /// Attach file metadata for evidence extracted from an upload.
    #[must_use]
    pub fn with_file(mut self, filename: impl Into<String>, file_size: u64) -> Self {
        self.filename = Some(filename.into());
        self.file_size = Some(file_size);
        self
    }

    /// Point at raw content stored outside this subsystem.
    #[must_use]
    pub fn with_content_ref(mut self, content_ref: impl Into<String>) -> Self {
        self.content_ref = Some(content_ref.into());
        self
    }

    /// # Errors
    ///
    /// Returns `CaseError::Validation` if summary or content are empty.
    pub fn validate(&self) -> Result<(), CaseError> {
        require_non_empty("evidence summary", &self.summary)?;
        require_non_empty("evidence preprocessed_content", &self.preprocessed_content)
    }
}
