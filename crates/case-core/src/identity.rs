use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Caller identity supplied by the upstream gateway.
///
/// Already verified by the time it reaches this crate; nothing here checks it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub org_id: String,
}

impl CallerIdentity {
    #[must_use]
    pub fn new(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            org_id: org_id.into(),
        }
    }
}
