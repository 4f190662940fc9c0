//! # Cluster Errors

use thiserror::Error;

use crate::retry::Retryable;

/// Result type for cluster RPCs
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Request-level failures of a cluster RPC.
///
/// Per-topic outcomes are reported through [`super::Errc`] instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    /// The request did not complete within its timeout
    #[error("request timed out")]
    Timeout,

    /// No controller leader or peer unreachable; the request was not applied
    #[error("cluster unavailable: {0}")]
    Unavailable(String),

    /// The controller refused the request as a whole
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl Retryable for ClusterError {
    fn is_retryable(&self) -> bool {
        matches!(self, ClusterError::Unavailable(_))
    }
}
