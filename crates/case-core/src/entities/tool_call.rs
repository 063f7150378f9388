use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Metadata;
use crate::enums::ToolCallStatus;
use crate::errors::CaseError;
use crate::ids::{PREFIX_TOOL_CALL, generate_id};
use crate::validation::require_non_empty;

/// Observability record of one agent tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub case_id: String,
    pub tool_name: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub status: ToolCallStatus,
    pub error_message: Option<String>,
    pub duration_ms: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ToolCall {
    /// Build a `pending` tool call with a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` if the tool name is empty.
    pub fn new(
        case_id: &str,
        tool_name: impl Into<String>,
        input: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Self, CaseError> {
        let call = Self {
            id: generate_id(PREFIX_TOOL_CALL)?,
            case_id: case_id.to_string(),
            tool_name: tool_name.into(),
            input,
            output: None,
            status: ToolCallStatus::Pending,
            error_message: None,
            duration_ms: None,
            started_at: now,
            completed_at: None,
            metadata: Metadata::new(),
        };
        call.validate()?;
        Ok(call)
    }

    /// # Errors
    ///
    /// Returns `CaseError::Validation` if the tool name is empty.
    pub fn validate(&self) -> Result<(), CaseError> {
        require_non_empty("tool name", &self.tool_name)
    }
}
