//! Uploaded file update builder.

use chrono::{DateTime, Utc};
use serde::Serialize;

use case_core::entities::UploadedFile;
use case_core::enums::FileProcessingStatus;

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadedFileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_status: Option<FileProcessingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<Option<String>>,
}

impl UploadedFileUpdate {
    pub(crate) fn apply(&self, file: &mut UploadedFile, now: DateTime<Utc>) {
        if let Some(status) = self.processing_status {
            file.processing_status = status;
            if matches!(
                status,
                FileProcessingStatus::Completed | FileProcessingStatus::Failed
            ) {
                file.processed_at = Some(now);
            }
        }
        if let Some(ref error) = self.processing_error {
            file.processing_error.clone_from(error);
        }
        if let Some(ref path) = self.storage_path {
            file.storage_path.clone_from(path);
        }
        if let Some(ref content_type) = self.content_type {
            file.content_type.clone_from(content_type);
        }
    }
}

pub struct UploadedFileUpdateBuilder(UploadedFileUpdate);

impl UploadedFileUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(UploadedFileUpdate::default())
    }

    #[must_use]
    pub const fn processing_status(mut self, status: FileProcessingStatus) -> Self {
        self.0.processing_status = Some(status);
        self
    }

    #[must_use]
    pub fn processing_error(mut self, error: Option<String>) -> Self {
        self.0.processing_error = Some(error);
        self
    }

    #[must_use]
    pub fn storage_path(mut self, path: Option<String>) -> Self {
        self.0.storage_path = Some(path);
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: Option<String>) -> Self {
        self.0.content_type = Some(content_type);
        self
    }

    #[must_use]
    pub fn build(self) -> UploadedFileUpdate {
        self.0
    }
}

impl Default for UploadedFileUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
