//! # Cluster Collaborators
//!
//! Topic table, topic creation/update RPCs and the cross-node recovery
//! check, expressed as traits plus an in-process single-node implementation.

pub mod errors;
pub mod frontend;
pub mod local;
pub mod types;

pub use errors::{ClusterError, ClusterResult};
pub use frontend::{RecoveryStatusFrontend, SkipThisNode, TopicTable, TopicsFrontend};
pub use local::LocalCluster;
pub use types::{
    CleanupPolicy, CompactionStrategy, CompressionType, Errc, PropertyUpdate,
    ShadowIndexingMode, TimestampType, TopicConfiguration, TopicNamespace, TopicProperties,
    TopicPropertiesUpdate, TopicResult, KAFKA_NAMESPACE,
};
