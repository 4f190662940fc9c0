//! Recovery Error Types
//!
//! Every pipeline failure carries one of four codes. The code is what callers
//! and operators act on; the context string says which call failed and why.

use std::fmt;

use serde::Serialize;

/// Closed set of recovery failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryErrorCode {
    /// Another recovery is active locally or elsewhere in the cluster, or
    /// the cluster-wide check could not be completed
    RecoveryAlreadyRunning,

    /// The bucket listing failed
    ErrorListingItems,

    /// A topic manifest could not be downloaded or parsed
    ErrorDownloadingManifest,

    /// The topic creation request failed as a whole
    ErrorCreatingTopics,
}

impl RecoveryErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecoveryAlreadyRunning => "recovery_already_running",
            Self::ErrorListingItems => "error_listing_items",
            Self::ErrorDownloadingManifest => "error_downloading_manifest",
            Self::ErrorCreatingTopics => "error_creating_topics",
        }
    }
}

impl fmt::Display for RecoveryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recovery failure with context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryError {
    pub code: RecoveryErrorCode,
    pub context: String,
}

impl RecoveryError {
    pub fn new(code: RecoveryErrorCode, context: impl Into<String>) -> Self {
        Self {
            code,
            context: context.into(),
        }
    }

    pub fn already_running(context: impl Into<String>) -> Self {
        Self::new(RecoveryErrorCode::RecoveryAlreadyRunning, context)
    }

    pub fn listing_items(context: impl Into<String>) -> Self {
        Self::new(RecoveryErrorCode::ErrorListingItems, context)
    }

    pub fn downloading_manifest(context: impl Into<String>) -> Self {
        Self::new(RecoveryErrorCode::ErrorDownloadingManifest, context)
    }

    pub fn creating_topics(context: impl Into<String>) -> Self {
        Self::new(RecoveryErrorCode::ErrorCreatingTopics, context)
    }
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.context, self.code)
    }
}

impl std::error::Error for RecoveryError {}

/// Result type for recovery operations
pub type RecoveryResult<T> = Result<T, RecoveryError>;
