//! Errors raised while loading or validating Casebook configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A TOML file or environment variable could not be parsed.
    #[error("casebook configuration: {0}")]
    Figment(Box<figment::Error>),

    /// A section is missing the fields it needs to be usable.
    #[error("casebook section '{section}' is not configured")]
    NotConfigured { section: String },

    /// A field parsed but holds an unusable value.
    #[error("invalid casebook setting '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}
