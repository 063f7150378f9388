//! General application configuration.

use serde::{Deserialize, Serialize};

fn default_org_id() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Organization assigned to new cases when the caller supplies none.
    #[serde(default = "default_org_id")]
    pub default_org_id: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_org_id: default_org_id(),
        }
    }
}
