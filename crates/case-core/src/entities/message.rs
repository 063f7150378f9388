use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Metadata;
use crate::enums::MessageRole;
use crate::errors::CaseError;
use crate::ids::{PREFIX_MESSAGE, generate_id};
use crate::validation::require_non_empty;

/// One turn of conversational history. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CaseMessage {
    pub id: String,
    pub case_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl CaseMessage {
    /// # Errors
    ///
    /// Returns `CaseError::Validation` if the content is empty.
    pub fn new(
        case_id: &str,
        role: MessageRole,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CaseError> {
        let message = Self {
            id: generate_id(PREFIX_MESSAGE)?,
            case_id: case_id.to_string(),
            role,
            content: content.into(),
            timestamp: now,
            metadata: Metadata::new(),
        };
        message.validate()?;
        Ok(message)
    }

    /// # Errors
    ///
    /// Returns `CaseError::Validation` if the content is empty.
    pub fn validate(&self) -> Result<(), CaseError> {
        require_non_empty("message content", &self.content)
    }
}
