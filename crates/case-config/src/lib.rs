//! # case-config
//!
//! Layered configuration loading for Casebook using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`CASEBOOK_*` prefix, `__` as separator)
//! 2. Project-level `.casebook/config.toml`
//! 3. User-level `~/.config/casebook/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `CASEBOOK_DATABASE__PATH` -> `database.path`,
//! `CASEBOOK_LISTING__MAX_PAGE_SIZE` -> `listing.max_page_size`, etc.
//! The `__` (double underscore) separates nested config sections.
//!
//! # Usage
//!
//! ```no_run
//! use case_config::CasebookConfig;
//!
//! let config = CasebookConfig::load_with_dotenv().expect("config");
//! println!("cases stored at {}", config.database.path);
//! ```

mod database;
mod error;
mod general;
mod listing;
mod retention;

pub use database::{DatabaseConfig, IN_MEMORY_PATH};
pub use error::ConfigError;
pub use general::GeneralConfig;
pub use listing::ListingConfig;
pub use retention::RetentionConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CasebookConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

impl CasebookConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] if you need
    /// `.env` file loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if a source cannot be parsed, or a
    /// validation error from [`Self::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Extract and validate from an arbitrary provider chain.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the figment provider chain.
    ///
    /// This is public so tests can inspect the figment directly or add
    /// additional providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".casebook/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("CASEBOOK_").split("__"))
    }

    /// Reject values that would make the store unusable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` for a blank database path and
    /// `ConfigError::InvalidValue` for zero or inverted bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.database.is_configured() {
            return Err(ConfigError::NotConfigured {
                section: "database".into(),
            });
        }
        if self.listing.max_page_size == 0 {
            return Err(invalid("listing.max_page_size", "must be at least 1"));
        }
        if self.listing.default_page_size == 0 {
            return Err(invalid("listing.default_page_size", "must be at least 1"));
        }
        if self.listing.default_page_size > self.listing.max_page_size {
            return Err(invalid(
                "listing.default_page_size",
                "must not exceed listing.max_page_size",
            ));
        }
        if self.retention.cleanup_batch_size == 0 {
            return Err(invalid("retention.cleanup_batch_size", "must be at least 1"));
        }
        if self.general.default_org_id.trim().is_empty() {
            return Err(invalid("general.default_org_id", "must not be empty"));
        }
        Ok(())
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("casebook").join("config.toml"))
    }

    /// Load `.env` from the workspace root.
    ///
    /// Walks up from `CARGO_MANIFEST_DIR` (if available) looking for a `.env`
    /// file, then falls back to the current directory. Silently does nothing
    /// if none is found.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
