use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Metadata;
use crate::enums::FileProcessingStatus;
use crate::errors::CaseError;
use crate::ids::{PREFIX_FILE, generate_id};
use crate::validation::require_non_empty;

/// Metadata of a file uploaded to a case. The bytes live in external storage.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub case_id: String,
    pub filename: String,
    pub file_size: u64,
    pub content_type: Option<String>,
    pub storage_path: Option<String>,
    pub processing_status: FileProcessingStatus,
    pub processing_error: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl UploadedFile {
    /// Build a `pending` file record with a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` for an empty filename or zero size.
    pub fn new(
        case_id: &str,
        filename: impl Into<String>,
        file_size: u64,
        now: DateTime<Utc>,
    ) -> Result<Self, CaseError> {
        let file = Self {
            id: generate_id(PREFIX_FILE)?,
            case_id: case_id.to_string(),
            filename: filename.into(),
            file_size,
            content_type: None,
            storage_path: None,
            processing_status: FileProcessingStatus::Pending,
            processing_error: None,
            uploaded_at: now,
            processed_at: None,
            metadata: Metadata::new(),
        };
        file.validate()?;
        Ok(file)
    }

    /// # Errors
    ///
    /// Returns `CaseError::Validation` for an empty filename or zero size.
    pub fn validate(&self) -> Result<(), CaseError> {
        require_non_empty("filename", &self.filename)?;
        if self.file_size == 0 {
            return Err(CaseError::Validation(format!(
                "file {} must have a positive size",
                self.filename
            )));
        }
        Ok(())
    }
}
