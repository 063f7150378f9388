//! Case store location and connection settings.

use serde::{Deserialize, Serialize};

/// In-process database that disappears with the connection.
pub const IN_MEMORY_PATH: &str = ":memory:";

fn default_path() -> String {
    ".casebook/cases.db".to_string()
}

const fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL file, or `:memory:`.
    #[serde(default = "default_path")]
    pub path: String,

    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    /// Settings for a private in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: IN_MEMORY_PATH.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY_PATH
    }

    /// Check if a usable path is set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.path.trim().is_empty()
    }
}
