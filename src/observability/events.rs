//! Recovery lifecycle events
//!
//! Milestones are logged with a stable `event` field so that operators can
//! grep for them regardless of the message text.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryEvent {
    // Service lifecycle
    ServiceStart,
    Serving,
    ShutdownStart,
    ShutdownComplete,

    // Attempt lifecycle
    /// Request accepted, pipeline spawned
    RecoveryStart,
    /// Another recovery holds the cluster
    RecoveryConflict,
    /// Bucket listed
    BucketScanned,
    /// No manifest matched, attempt ended early
    NothingToRecover,
    /// Topic creation request answered
    TopicsCreated,
    /// Download tracker armed
    DownloadTrackingStart,
    /// Markers consumed by one check
    DownloadsProgress,
    /// Every download accounted for, topics reset
    RecoveryComplete,
    /// Pipeline failed, state reverted
    RecoveryFailed,
}

impl RecoveryEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryEvent::ServiceStart => "SERVICE_START",
            RecoveryEvent::Serving => "SERVING",
            RecoveryEvent::ShutdownStart => "SHUTDOWN_START",
            RecoveryEvent::ShutdownComplete => "SHUTDOWN_COMPLETE",

            RecoveryEvent::RecoveryStart => "RECOVERY_START",
            RecoveryEvent::RecoveryConflict => "RECOVERY_CONFLICT",
            RecoveryEvent::BucketScanned => "BUCKET_SCANNED",
            RecoveryEvent::NothingToRecover => "NOTHING_TO_RECOVER",
            RecoveryEvent::TopicsCreated => "TOPICS_CREATED",
            RecoveryEvent::DownloadTrackingStart => "DOWNLOAD_TRACKING_START",
            RecoveryEvent::DownloadsProgress => "DOWNLOADS_PROGRESS",
            RecoveryEvent::RecoveryComplete => "RECOVERY_COMPLETE",
            RecoveryEvent::RecoveryFailed => "RECOVERY_FAILED",
        }
    }

    /// Whether the event ends an attempt
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecoveryEvent::NothingToRecover
                | RecoveryEvent::RecoveryComplete
                | RecoveryEvent::RecoveryFailed
        )
    }
}

impl fmt::Display for RecoveryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
