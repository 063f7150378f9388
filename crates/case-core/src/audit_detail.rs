//! Typed payloads for status transition metadata.
//!
//! A transition's `metadata` is a free-form JSON object. The shapes written
//! by this workspace are described here so they can be schema-checked.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Metadata;
use crate::errors::CaseError;

/// Written by the case manager on every caller-initiated transition.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TransitionDetail {
    /// User that requested the change.
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl TransitionDetail {
    #[must_use]
    pub fn by(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            source: None,
        }
    }

    /// Render as a transition metadata object.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Other` if serialization fails.
    pub fn to_metadata(&self) -> Result<Metadata, CaseError> {
        match serde_json::to_value(self).map_err(anyhow::Error::from)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(CaseError::Other(anyhow::anyhow!(
                "transition detail serialized to non-object: {other}"
            ))),
        }
    }

    /// Read the detail back from a recorded transition, if present.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        serde_json::from_value(serde_json::Value::Object(metadata.clone())).ok()
    }
}
