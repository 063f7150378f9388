//! Pagination bounds for case listing and search.

use serde::{Deserialize, Serialize};

const fn default_page_size() -> u32 {
    50
}

const fn default_max_page_size() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingConfig {
    /// Limit used when the caller does not pass one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Upper bound on any caller-supplied limit.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl ListingConfig {
    /// Resolve a caller-supplied limit against the configured bounds.
    #[must_use]
    pub fn clamp(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}
