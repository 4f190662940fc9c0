//! # Configuration Errors

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(String),

    #[error("invalid config JSON: {0}")]
    Parse(String),

    #[error("configuration property {0} is not set")]
    MissingProperty(&'static str),

    #[error("invalid value for {property}: {reason}")]
    InvalidValue {
        property: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(property: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            property,
            reason: reason.into(),
        }
    }
}
