//! Legacy severity/category classification.
//!
//! Older API clients treat severity and category as first-class case fields.
//! The case model keeps them only in its `metadata` bag; this module is the
//! projection between the two shapes and never a second source of truth.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::{Case, Metadata};
use crate::enums::{CaseStatus, parse_value};
use crate::errors::CaseError;

pub const SEVERITY_KEY: &str = "severity";
pub const CATEGORY_KEY: &str = "category";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum LegacyCategory {
    Performance,
    Error,
    Configuration,
    Infrastructure,
    Security,
    #[default]
    Other,
}

/// Severity and category as seen by legacy clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LegacyClassification {
    pub severity: Severity,
    pub category: LegacyCategory,
}

impl LegacyClassification {
    /// Read the classification out of case metadata.
    ///
    /// Absent keys fall back to defaults; present but unrecognized values are
    /// rejected so a corrupt bag does not silently read as `medium`/`other`.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Validation` for a non-string or unknown value.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, CaseError> {
        Ok(Self {
            severity: read_key(metadata, SEVERITY_KEY)?.unwrap_or_default(),
            category: read_key(metadata, CATEGORY_KEY)?.unwrap_or_default(),
        })
    }

    /// Write the classification into case metadata, leaving other keys alone.
    pub fn apply_to(&self, metadata: &mut Metadata) {
        metadata.insert(
            SEVERITY_KEY.to_string(),
            serde_json::to_value(self.severity).unwrap_or(Value::Null),
        );
        metadata.insert(
            CATEGORY_KEY.to_string(),
            serde_json::to_value(self.category).unwrap_or(Value::Null),
        );
    }
}

fn read_key<T: serde::de::DeserializeOwned>(
    metadata: &Metadata,
    key: &str,
) -> Result<Option<T>, CaseError> {
    match metadata.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => parse_value(key, s).map(Some),
        Some(other) => Err(CaseError::Validation(format!(
            "metadata '{key}' must be a string, got {other}"
        ))),
    }
}

/// Flattened case view for API-facing listings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CaseSummaryView {
    pub case_id: String,
    pub owner_id: String,
    pub title: String,
    pub status: CaseStatus,
    pub severity: Severity,
    pub category: LegacyCategory,
    pub evidence_count: usize,
    pub hypothesis_count: usize,
    pub message_count: usize,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl CaseSummaryView {
    /// # Errors
    ///
    /// Returns `CaseError::Validation` if the legacy metadata keys are corrupt.
    pub fn from_case(case: &Case) -> Result<Self, CaseError> {
        let classification = LegacyClassification::from_metadata(&case.metadata)?;
        Ok(Self {
            case_id: case.id.clone(),
            owner_id: case.owner_id.clone(),
            title: case.title.clone(),
            status: case.status,
            severity: classification.severity,
            category: classification.category,
            evidence_count: case.evidence.len(),
            hypothesis_count: case.hypotheses.len(),
            message_count: case.messages.len(),
            tags: case.tags.clone(),
            created_at: case.created_at,
            updated_at: case.updated_at,
            last_activity_at: case.last_activity_at,
        })
    }
}
