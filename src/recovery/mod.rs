//! # Topic Recovery
//!
//! Restores topics from tiered storage onto the cluster.
//!
//! The [`TopicRecoveryService`] drives one attempt at a time through
//! [`RecoveryState`], replicated to every shard by [`ShardStates`]. Once topics
//! are created, the [`DownloadTracker`] polls marker objects until every
//! partition replica has reported its download, then restores steady-state
//! retention and ends the attempt.

pub mod errors;
pub mod markers;
pub mod materializer;
pub mod request;
pub mod service;
pub mod shards;
pub mod state;
pub mod status;
pub mod tracker;

pub use errors::{RecoveryError, RecoveryErrorCode, RecoveryResult};
pub use markers::{
    clear_recovery_results, gather_recovery_results, marker_key, parse_marker_key,
    write_recovery_result, DownloadMarker, RECOVERY_RESULTS_PREFIX,
};
pub use materializer::{make_reset_updates, make_topic_config, make_topic_configs, RetentionDefaults};
pub use request::{RecoveryRequest, RequestError};
pub use service::{
    AttemptReport, AttemptResult, ClusterHandles, InitRecoveryResult, InitRecoveryStatus,
    RecoveryOutcome, RecoverySettings, RecoveryStatusReport, TopicRecoveryService,
    LIST_API_TIMEOUT_MULTIPLIER,
};
pub use shards::{ShardStates, StateSnapshot};
pub use state::{RecoveryState, StateTransitionError};
pub use status::{Applied, RecoveryStatus, TopicDownloadStatus};
pub use tracker::{CheckOutcome, DownloadCheck, DownloadTracker};
