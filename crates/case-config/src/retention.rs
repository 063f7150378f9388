//! Retention policy for closed cases.

use serde::{Deserialize, Serialize};

const fn default_closed_max_age_days() -> u32 {
    90
}

const fn default_cleanup_batch_size() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Closed cases older than this are eligible for cleanup.
    #[serde(default = "default_closed_max_age_days")]
    pub closed_max_age_days: u32,

    /// Maximum number of cases removed per cleanup call.
    #[serde(default = "default_cleanup_batch_size")]
    pub cleanup_batch_size: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            closed_max_age_days: default_closed_max_age_days(),
            cleanup_batch_size: default_cleanup_batch_size(),
        }
    }
}
