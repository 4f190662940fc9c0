//! Topic materialization
//!
//! Pure mapping from downloaded manifests to topic creation specs, and from
//! recovered manifests to the property updates applied once recovery ends.

use std::time::Duration;

use tracing::{debug, warn};

use super::request::RecoveryRequest;
use crate::cluster::{
    PropertyUpdate, ShadowIndexingMode, TopicConfiguration, TopicPropertiesUpdate,
};
use crate::manifest::TopicManifest;

/// Local retention targets restored on recovered topics after completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionDefaults {
    pub local_target_ms: Duration,
    /// `None` leaves local retention unbounded by size
    pub local_target_bytes: Option<u64>,
}

/// Topic spec for one manifest, or `None` if the manifest lacks a topic
/// configuration.
pub fn make_topic_config(
    manifest: &TopicManifest,
    request: &RecoveryRequest,
    temporary_retention_bytes: u64,
) -> Option<TopicConfiguration> {
    let Some(mut config) = manifest.topic_config() else {
        warn!(
            namespace = manifest.namespace.as_deref().unwrap_or_default(),
            topic = manifest.topic.as_deref().unwrap_or_default(),
            "skipping topic creation, missing values in manifest"
        );
        return None;
    };

    let props = &mut config.properties;
    props.retention_local_target_bytes = Some(temporary_retention_bytes);
    props.shadow_indexing = Some(ShadowIndexingMode::Full);
    props.recovery = true;

    if let Some(bytes) = request.retention_bytes() {
        props.retention_local_target_bytes = Some(bytes);
        props.retention_local_target_ms = None;
    } else if let Some(ms) = request.retention_ms() {
        props.retention_local_target_ms = Some(ms);
        props.retention_local_target_bytes = None;
    }

    Some(config)
}

/// Topic specs for every usable manifest, in manifest order
pub fn make_topic_configs(
    manifests: &[TopicManifest],
    request: &RecoveryRequest,
    temporary_retention_bytes: u64,
) -> Vec<TopicConfiguration> {
    manifests
        .iter()
        .filter_map(|m| make_topic_config(m, request, temporary_retention_bytes))
        .collect()
}

/// Updates restoring steady-state local retention on recovered topics
pub fn make_reset_updates(
    manifests: &[TopicManifest],
    defaults: RetentionDefaults,
) -> Vec<TopicPropertiesUpdate> {
    manifests
        .iter()
        .filter_map(|m| m.topic_config())
        .map(|config| {
            let mut update = TopicPropertiesUpdate::new(config.tp_ns);
            update.retention_local_target_ms = PropertyUpdate::Set(defaults.local_target_ms);
            update.retention_local_target_bytes = match defaults.local_target_bytes {
                Some(bytes) => PropertyUpdate::Set(bytes),
                None => PropertyUpdate::Remove,
            };
            debug!(update = %update, "resetting topic properties");
            update
        })
        .collect()
}
