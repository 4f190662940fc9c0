//! # Single-Node Cluster
//!
//! In-process implementation of every cluster collaborator. The binary uses it
//! when running standalone, and the tests use its fault injection hooks to
//! drive per-topic and request-level failures.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::errors::{ClusterError, ClusterResult};
use super::frontend::{RecoveryStatusFrontend, SkipThisNode, TopicTable, TopicsFrontend};
use super::types::{
    Errc, TopicConfiguration, TopicNamespace, TopicPropertiesUpdate, TopicResult,
};
use crate::recovery::ShardStates;

#[derive(Debug, Default)]
struct Faults {
    /// Per-topic creation result overrides
    create_errors: HashMap<TopicNamespace, Errc>,
    /// Artificial controller latency for topic creation
    create_delay: Option<Duration>,
    /// Request-level error for the next creation requests
    create_request_error: Option<ClusterError>,
    /// Request-level error for the running check
    running_check_error: Option<ClusterError>,
    /// Artificial latency for the running check
    running_check_delay: Option<Duration>,
    /// Remaining property update requests to fail, with their error
    update_failures: Option<(usize, ClusterError)>,
}

/// In-process single-node cluster
#[derive(Debug, Default)]
pub struct LocalCluster {
    topics: RwLock<BTreeMap<TopicNamespace, TopicConfiguration>>,
    property_updates: RwLock<Vec<TopicPropertiesUpdate>>,
    /// Recovery activity reported by other nodes, keyed by node id
    peers: RwLock<BTreeMap<u32, bool>>,
    local_states: RwLock<Option<ShardStates>>,
    faults: RwLock<Faults>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LocalCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the local node's recovery state for non-skipping checks
    pub fn attach_local_states(&self, states: ShardStates) {
        *write(&self.local_states) = Some(states);
    }

    /// Create a topic directly, as if it already existed before recovery
    pub fn insert_topic(&self, config: TopicConfiguration) {
        write(&self.topics).insert(config.tp_ns.clone(), config);
    }

    /// Current configuration of a topic
    pub fn topic(&self, tp_ns: &TopicNamespace) -> Option<TopicConfiguration> {
        read(&self.topics).get(tp_ns).cloned()
    }

    /// Every property update received so far
    pub fn property_updates(&self) -> Vec<TopicPropertiesUpdate> {
        read(&self.property_updates).clone()
    }

    /// Report whether a peer node is running a recovery
    pub fn set_peer_recovering(&self, node_id: u32, recovering: bool) {
        write(&self.peers).insert(node_id, recovering);
    }

    /// Make creation of `tp_ns` fail with `ec`
    pub fn fail_topic_creation(&self, tp_ns: TopicNamespace, ec: Errc) {
        write(&self.faults).create_errors.insert(tp_ns, ec);
    }

    /// Delay topic creation by `delay`
    pub fn set_create_delay(&self, delay: Option<Duration>) {
        write(&self.faults).create_delay = delay;
    }

    /// Fail topic creation requests as a whole
    pub fn set_create_request_error(&self, error: Option<ClusterError>) {
        write(&self.faults).create_request_error = error;
    }

    /// Fail the cross-node running check
    pub fn set_running_check_error(&self, error: Option<ClusterError>) {
        write(&self.faults).running_check_error = error;
    }

    /// Delay the cross-node running check
    pub fn set_running_check_delay(&self, delay: Option<Duration>) {
        write(&self.faults).running_check_delay = delay;
    }

    /// Fail the next `times` property update requests as a whole
    pub fn fail_property_updates(&self, times: usize, error: ClusterError) {
        write(&self.faults).update_failures = Some((times, error));
    }

    fn take_update_failure(&self) -> Option<ClusterError> {
        let mut faults = write(&self.faults);
        let (remaining, error) = faults.update_failures.as_mut()?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(error.clone())
    }

    fn create_one(&self, config: TopicConfiguration) -> TopicResult {
        let tp_ns = config.tp_ns.clone();

        if let Some(ec) = read(&self.faults).create_errors.get(&tp_ns).copied() {
            return TopicResult::new(tp_ns, ec);
        }
        if config.partition_count == 0 || config.replication_factor == 0 {
            return TopicResult::new(tp_ns, Errc::InvalidConfiguration);
        }

        let mut topics = write(&self.topics);
        if topics.contains_key(&tp_ns) {
            return TopicResult::new(tp_ns, Errc::TopicAlreadyExists);
        }
        topics.insert(tp_ns.clone(), config);
        TopicResult::new(tp_ns, Errc::Success)
    }
}

impl TopicTable for LocalCluster {
    fn all_topics(&self) -> Vec<TopicNamespace> {
        read(&self.topics).keys().cloned().collect()
    }
}

#[async_trait]
impl TopicsFrontend for LocalCluster {
    async fn autocreate_topics(
        &self,
        topics: Vec<TopicConfiguration>,
        timeout: Duration,
    ) -> ClusterResult<Vec<TopicResult>> {
        let (delay, request_error) = {
            let faults = read(&self.faults);
            (faults.create_delay, faults.create_request_error.clone())
        };

        if let Some(delay) = delay {
            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                return Err(ClusterError::Timeout);
            }
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = request_error {
            return Err(error);
        }

        Ok(topics.into_iter().map(|t| self.create_one(t)).collect())
    }

    async fn update_topic_properties(
        &self,
        updates: Vec<TopicPropertiesUpdate>,
        _timeout: Option<Duration>,
    ) -> ClusterResult<Vec<TopicResult>> {
        if let Some(error) = self.take_update_failure() {
            return Err(error);
        }

        let mut results = Vec::with_capacity(updates.len());
        let mut topics = write(&self.topics);

        for update in updates {
            let ec = match topics.get_mut(&update.tp_ns) {
                Some(config) => {
                    let props = &mut config.properties;
                    update
                        .retention_local_target_ms
                        .apply(&mut props.retention_local_target_ms);
                    update
                        .retention_local_target_bytes
                        .apply(&mut props.retention_local_target_bytes);
                    Errc::Success
                }
                None => Errc::TopicNotExists,
            };
            results.push(TopicResult::new(update.tp_ns.clone(), ec));
            write(&self.property_updates).push(update);
        }

        Ok(results)
    }
}

#[async_trait]
impl RecoveryStatusFrontend for LocalCluster {
    async fn is_recovery_running(&self, skip_this_node: SkipThisNode) -> ClusterResult<bool> {
        let (delay, error) = {
            let faults = read(&self.faults);
            (faults.running_check_delay, faults.running_check_error.clone())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = error {
            return Err(error);
        }

        if read(&self.peers).values().any(|running| *running) {
            return Ok(true);
        }

        if skip_this_node == SkipThisNode::No {
            if let Some(states) = read(&self.local_states).as_ref() {
                return Ok(states.local().is_active());
            }
        }

        Ok(false)
    }
}
