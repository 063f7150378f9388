use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Metadata;
use crate::enums::CaseStatus;

/// An immutable audit record of a lifecycle change.
///
/// `id` is assigned by the store and strictly increases within a case, so the
/// history replays deterministically. `from_status` is `None` only for the
/// record written at creation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct StatusTransition {
    pub id: i64,
    pub case_id: String,
    pub from_status: Option<CaseStatus>,
    pub to_status: CaseStatus,
    pub reason: Option<String>,
    pub transitioned_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A transition applied to an in-memory case that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransition {
    pub case_id: String,
    pub from_status: Option<CaseStatus>,
    pub to_status: CaseStatus,
    pub reason: Option<String>,
    pub transitioned_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl PendingTransition {
    /// Attach the store-assigned sequence number.
    #[must_use]
    pub fn into_recorded(self, id: i64) -> StatusTransition {
        StatusTransition {
            id,
            case_id: self.case_id,
            from_status: self.from_status,
            to_status: self.to_status,
            reason: self.reason,
            transitioned_at: self.transitioned_at,
            metadata: self.metadata,
        }
    }
}
