//! # Object Store Errors

use thiserror::Error;

use crate::retry::Retryable;

/// Result type for object store operations
pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Object store errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObjectStoreError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Transient failure (throttling, connection reset, 5xx)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl Retryable for ObjectStoreError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ObjectStoreError::Unavailable(_) | ObjectStoreError::IoError(_)
        )
    }
}
