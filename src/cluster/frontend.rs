//! Cluster collaborator traits
//!
//! The recovery service never talks to the controller directly; it goes
//! through these seams so that tests and single-node deployments can plug in
//! [`super::LocalCluster`].

use std::time::Duration;

use async_trait::async_trait;

use super::errors::ClusterResult;
use super::types::{TopicConfiguration, TopicNamespace, TopicPropertiesUpdate, TopicResult};

/// Whether the local node is left out of a cluster-wide query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipThisNode {
    Yes,
    No,
}

/// Read-only view of the replicated topic table
pub trait TopicTable: Send + Sync {
    fn all_topics(&self) -> Vec<TopicNamespace>;
}

/// Topic management RPCs routed to the controller
#[async_trait]
pub trait TopicsFrontend: Send + Sync {
    /// Create a batch of topics. One result per requested topic.
    async fn autocreate_topics(
        &self,
        topics: Vec<TopicConfiguration>,
        timeout: Duration,
    ) -> ClusterResult<Vec<TopicResult>>;

    /// Apply incremental property updates. `None` waits without a deadline.
    async fn update_topic_properties(
        &self,
        updates: Vec<TopicPropertiesUpdate>,
        timeout: Option<Duration>,
    ) -> ClusterResult<Vec<TopicResult>>;
}

/// Cross-node query for an active topic recovery
#[async_trait]
pub trait RecoveryStatusFrontend: Send + Sync {
    async fn is_recovery_running(&self, skip_this_node: SkipThisNode) -> ClusterResult<bool>;
}
