//! Download progress per topic
//!
//! Seeded with one expected download per partition replica. Every consumed
//! marker moves one unit from `pending` to `successful` or `failed`. Marker
//! keys are remembered so a marker whose deletion failed is not counted twice
//! when it shows up in the next listing.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::cluster::TopicNamespace;
use crate::manifest::TopicManifest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TopicDownloadStatus {
    pub pending: u32,
    pub successful: u32,
    pub failed: u32,
}

impl TopicDownloadStatus {
    pub fn new(pending: u32) -> Self {
        Self {
            pending,
            successful: 0,
            failed: 0,
        }
    }

    /// Record one finished download. `pending` never goes below zero.
    pub fn record(&mut self, success: bool) {
        self.pending = self.pending.saturating_sub(1);
        if success {
            self.successful = self.successful.saturating_add(1);
        } else {
            self.failed = self.failed.saturating_add(1);
        }
    }
}

/// Outcome of applying one marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Counted,
    /// Marker for a topic this attempt does not track
    UnknownTopic,
    /// Marker already consumed earlier in this attempt
    Duplicate,
}

#[derive(Debug, Default)]
pub struct RecoveryStatus {
    topics: BTreeMap<TopicNamespace, TopicDownloadStatus>,
    consumed: HashSet<String>,
}

impl RecoveryStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `partition_count * replication_factor` downloads per manifest.
    /// Manifests without a topic configuration are ignored.
    pub fn seed(&mut self, manifests: &[TopicManifest]) {
        for config in manifests.iter().filter_map(TopicManifest::topic_config) {
            let expected = config
                .partition_count
                .saturating_mul(u32::from(config.replication_factor));
            self.topics
                .insert(config.tp_ns, TopicDownloadStatus::new(expected));
        }
    }

    /// Stop tracking a topic, e.g. after its creation failed
    pub fn erase(&mut self, tp_ns: &TopicNamespace) -> bool {
        self.topics.remove(tp_ns).is_some()
    }

    pub fn apply(&mut self, key: &str, tp_ns: &TopicNamespace, success: bool) -> Applied {
        if self.consumed.contains(key) {
            return Applied::Duplicate;
        }
        match self.topics.get_mut(tp_ns) {
            Some(status) => {
                status.record(success);
                self.consumed.insert(key.to_string());
                Applied::Counted
            }
            None => Applied::UnknownTopic,
        }
    }

    pub fn is_consumed(&self, key: &str) -> bool {
        self.consumed.contains(key)
    }

    pub fn has_pending(&self) -> bool {
        self.topics.values().any(|s| s.pending > 0)
    }

    pub fn get(&self, tp_ns: &TopicNamespace) -> Option<TopicDownloadStatus> {
        self.topics.get(tp_ns).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn clear(&mut self) {
        self.topics.clear();
        self.consumed.clear();
    }

    pub fn snapshot(&self) -> BTreeMap<TopicNamespace, TopicDownloadStatus> {
        self.topics.clone()
    }
}
