//! Recovery State Machine
//!
//! One forward pass per attempt:
//!
//! ```text
//! Inactive -> Starting -> ScanningBucket -> CreatingTopics -> RecoveringData -> Inactive
//! ```
//!
//! Any active state may fall back to `Inactive` on failure. Nothing else is
//! legal, and an illegal transition is rejected without being applied.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Phase of a topic recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    /// No attempt in progress
    #[default]
    Inactive,
    /// Attempt claimed, cluster-wide check pending
    Starting,
    /// Listing the bucket and downloading manifests
    ScanningBucket,
    /// Topic creation request in flight
    CreatingTopics,
    /// Topics created, waiting for partition downloads
    RecoveringData,
}

/// Rejected state change
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("forbidden recovery state transition: {from} -> {to}")]
pub struct StateTransitionError {
    pub from: RecoveryState,
    pub to: RecoveryState,
}

impl RecoveryState {
    /// Get the state name for observability.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Starting => "starting",
            Self::ScanningBucket => "scanning_bucket",
            Self::CreatingTopics => "creating_topics",
            Self::RecoveringData => "recovering_data",
        }
    }

    /// Whether an attempt is in progress
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Inactive)
    }

    pub fn can_transition_to(&self, next: RecoveryState) -> bool {
        use RecoveryState::*;
        matches!(
            (self, next),
            (Inactive, Starting)
                | (Starting, ScanningBucket)
                | (ScanningBucket, CreatingTopics)
                | (CreatingTopics, RecoveringData)
                | (Starting | ScanningBucket | CreatingTopics | RecoveringData, Inactive)
        )
    }

    /// Validated transition
    pub fn transition(self, next: RecoveryState) -> Result<RecoveryState, StateTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StateTransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
