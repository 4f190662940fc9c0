//! # Topic Manifest
//!
//! JSON document uploaded next to a topic's partition data. It carries the
//! topic configuration at the time of the last upload; recovery recreates the
//! topic from it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{ManifestError, ManifestResult};
use crate::cluster::{
    CleanupPolicy, CompactionStrategy, CompressionType, TimestampType, TopicConfiguration,
    TopicNamespace,
};
use crate::object_store::Remote;
use crate::retry::RetryChain;

/// Manifest format version written by this crate
pub const TOPIC_MANIFEST_VERSION: u32 = 1;

/// Parsed topic manifest.
///
/// Every field is optional on the wire. Older or truncated manifests may lack
/// the topic configuration, in which case [`TopicManifest::topic_config`]
/// returns `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicManifest {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub partition_count: Option<u32>,
    #[serde(default)]
    pub replication_factor: Option<u16>,
    #[serde(default)]
    pub revision_id: Option<i64>,
    #[serde(default)]
    pub compression: Option<CompressionType>,
    #[serde(default)]
    pub cleanup_policy_bitflags: Option<CleanupPolicy>,
    #[serde(default)]
    pub compaction_strategy: Option<CompactionStrategy>,
    #[serde(default)]
    pub timestamp_type: Option<TimestampType>,
    #[serde(default)]
    pub segment_size: Option<u64>,
    #[serde(default)]
    pub retention_bytes: Option<u64>,
    /// Retention time in milliseconds
    #[serde(default)]
    pub retention_duration: Option<u64>,
}

impl TopicManifest {
    /// Manifest describing a topic with the given shape
    pub fn new(tp_ns: &TopicNamespace, partition_count: u32, replication_factor: u16) -> Self {
        Self {
            version: Some(TOPIC_MANIFEST_VERSION),
            namespace: Some(tp_ns.ns.clone()),
            topic: Some(tp_ns.topic.clone()),
            partition_count: Some(partition_count),
            replication_factor: Some(replication_factor),
            ..Self::default()
        }
    }

    pub fn from_json(bytes: &[u8]) -> ManifestResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> ManifestResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Topic identity, if both namespace and name are present
    pub fn tp_ns(&self) -> Option<TopicNamespace> {
        match (&self.namespace, &self.topic) {
            (Some(ns), Some(topic)) if !ns.is_empty() && !topic.is_empty() => {
                Some(TopicNamespace::new(ns.clone(), topic.clone()))
            }
            _ => None,
        }
    }

    /// Topic configuration carried by the manifest.
    ///
    /// `None` unless identity, a non-zero partition count and a non-zero
    /// replication factor are all present.
    pub fn topic_config(&self) -> Option<TopicConfiguration> {
        let tp_ns = self.tp_ns()?;
        let partition_count = self.partition_count.filter(|n| *n > 0)?;
        let replication_factor = self.replication_factor.filter(|n| *n > 0)?;

        let mut config = TopicConfiguration::new(tp_ns, partition_count, replication_factor);
        let props = &mut config.properties;
        props.compression = self.compression;
        props.cleanup_policy = self.cleanup_policy_bitflags;
        props.compaction_strategy = self.compaction_strategy;
        props.timestamp_type = self.timestamp_type;
        props.segment_size = self.segment_size;
        props.retention_bytes = self.retention_bytes;
        props.retention_duration = self.retention_duration.map(Duration::from_millis);
        Some(config)
    }
}

/// Download and parse one manifest through the retry envelope
pub async fn download_manifest(
    remote: &Remote,
    bucket: &str,
    key: &str,
    retry: &RetryChain,
) -> ManifestResult<TopicManifest> {
    let bytes = remote
        .download_object(bucket, key, retry)
        .await
        .map_err(|e| ManifestError::Download {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

    TopicManifest::from_json(&bytes)
}
