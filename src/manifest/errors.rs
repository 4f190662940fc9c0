//! # Manifest Errors

use thiserror::Error;

pub type ManifestResult<T> = Result<T, ManifestError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("failed to download manifest {key}: {reason}")]
    Download { key: String, reason: String },

    #[error("malformed manifest: {0}")]
    Parse(String),
}
