//! Cluster-side topic types
//!
//! These mirror what the controller accepts for topic creation and
//! incremental property updates.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default namespace for user topics
pub const KAFKA_NAMESPACE: &str = "kafka";

/// Topic identity: namespace plus topic name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicNamespace {
    pub ns: String,
    pub topic: String,
}

impl TopicNamespace {
    pub fn new(ns: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            ns: ns.into(),
            topic: topic.into(),
        }
    }

    /// Topic in the `kafka` namespace
    pub fn kafka(topic: impl Into<String>) -> Self {
        Self::new(KAFKA_NAMESPACE, topic)
    }
}

impl fmt::Display for TopicNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ns, self.topic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
    Producer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanupPolicy {
    #[serde(rename = "delete")]
    Delete,
    #[serde(rename = "compact")]
    Compact,
    #[serde(rename = "compact,delete", alias = "delete,compact")]
    CompactDelete,
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompactionStrategy {
    Offset,
    Timestamp,
    Header,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampType {
    CreateTime,
    LogAppendTime,
}

/// Tiered-storage mode of a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowIndexingMode {
    Disabled,
    Archival,
    Fetch,
    /// Both archival upload and remote fetch
    Full,
}

/// Topic-level properties. `None` means "use the cluster default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicProperties {
    pub compression: Option<CompressionType>,
    pub cleanup_policy: Option<CleanupPolicy>,
    pub compaction_strategy: Option<CompactionStrategy>,
    pub timestamp_type: Option<TimestampType>,
    pub segment_size: Option<u64>,
    pub retention_bytes: Option<u64>,
    pub retention_duration: Option<Duration>,
    pub retention_local_target_bytes: Option<u64>,
    pub retention_local_target_ms: Option<Duration>,
    pub shadow_indexing: Option<ShadowIndexingMode>,
    /// Set while the topic's data is being restored from the bucket
    pub recovery: bool,
}

/// Topic creation specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfiguration {
    pub tp_ns: TopicNamespace,
    pub partition_count: u32,
    pub replication_factor: u16,
    pub properties: TopicProperties,
}

impl TopicConfiguration {
    pub fn new(tp_ns: TopicNamespace, partition_count: u32, replication_factor: u16) -> Self {
        Self {
            tp_ns,
            partition_count,
            replication_factor,
            properties: TopicProperties::default(),
        }
    }
}

/// One incremental property change
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PropertyUpdate<T> {
    /// Leave the property untouched
    #[default]
    Keep,
    /// Set an explicit value
    Set(T),
    /// Drop the override and fall back to the cluster default
    Remove,
}

impl<T: Clone> PropertyUpdate<T> {
    /// Apply this update to a stored property
    pub fn apply(&self, target: &mut Option<T>) {
        match self {
            PropertyUpdate::Keep => {}
            PropertyUpdate::Set(v) => *target = Some(v.clone()),
            PropertyUpdate::Remove => *target = None,
        }
    }
}

/// Incremental topic property update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPropertiesUpdate {
    pub tp_ns: TopicNamespace,
    pub retention_local_target_ms: PropertyUpdate<Duration>,
    pub retention_local_target_bytes: PropertyUpdate<u64>,
}

impl TopicPropertiesUpdate {
    pub fn new(tp_ns: TopicNamespace) -> Self {
        Self {
            tp_ns,
            retention_local_target_ms: PropertyUpdate::Keep,
            retention_local_target_bytes: PropertyUpdate::Keep,
        }
    }
}

impl fmt::Display for TopicPropertiesUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{tp_ns: {}, retention_local_target_ms: {:?}, retention_local_target_bytes: {:?}}}",
            self.tp_ns, self.retention_local_target_ms, self.retention_local_target_bytes
        )
    }
}

/// Per-topic result code from the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Errc {
    Success,
    TopicAlreadyExists,
    TopicNotExists,
    InvalidConfiguration,
    Timeout,
    NotLeaderController,
}

impl fmt::Display for Errc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Errc::Success => "success",
            Errc::TopicAlreadyExists => "topic_already_exists",
            Errc::TopicNotExists => "topic_not_exists",
            Errc::InvalidConfiguration => "invalid_configuration",
            Errc::Timeout => "timeout",
            Errc::NotLeaderController => "not_leader_controller",
        };
        f.write_str(s)
    }
}

/// Result of one topic in a batch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicResult {
    pub tp_ns: TopicNamespace,
    pub ec: Errc,
}

impl TopicResult {
    pub fn new(tp_ns: TopicNamespace, ec: Errc) -> Self {
        Self { tp_ns, ec }
    }

    pub fn is_success(&self) -> bool {
        self.ec == Errc::Success
    }
}

impl fmt::Display for TopicResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{topic: {}, result: {}}}", self.tp_ns, self.ec)
    }
}
