//! Download result markers
//!
//! Partition download paths report completion by writing an empty object:
//!
//! ```text
//! recovery_state/<ns>/<topic>/<partition>_<uuid>.<true|false>
//! ```
//!
//! The suffix is the outcome. The uuid keeps keys unique when a partition is
//! downloaded by several replicas.

use std::sync::OnceLock;

use futures_util::stream::{self, StreamExt};
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cluster::TopicNamespace;
use crate::object_store::{Remote, RemoteError};
use crate::retry::{RetryChain, RetryPolicy};

/// Key prefix of all marker objects
pub const RECOVERY_RESULTS_PREFIX: &str = "recovery_state/";

/// Marker deletions kept in flight at once
const DELETE_CONCURRENCY: usize = 16;

/// One parsed marker object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadMarker {
    pub key: String,
    pub tp_ns: TopicNamespace,
    pub partition: u32,
    pub uuid: Uuid,
    pub success: bool,
}

fn marker_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^recovery_state/([^/]+)/([^/]+)/(\d+)_([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\.(true|false)$",
        )
        .unwrap_or_else(|e| unreachable!("static marker regex is valid: {e}"))
    })
}

/// Parse a marker key. `None` for anything that is not a marker.
pub fn parse_marker_key(key: &str) -> Option<DownloadMarker> {
    let caps = marker_key_regex().captures(key)?;
    Some(DownloadMarker {
        key: key.to_string(),
        tp_ns: TopicNamespace::new(&caps[1], &caps[2]),
        partition: caps[3].parse().ok()?,
        uuid: Uuid::parse_str(&caps[4]).ok()?,
        success: &caps[5] == "true",
    })
}

pub fn marker_key(tp_ns: &TopicNamespace, partition: u32, uuid: Uuid, success: bool) -> String {
    format!(
        "{}{}/{}/{}_{}.{}",
        RECOVERY_RESULTS_PREFIX, tp_ns.ns, tp_ns.topic, partition, uuid, success
    )
}

/// Report the outcome of one partition download
pub async fn write_recovery_result(
    remote: &Remote,
    bucket: &str,
    tp_ns: &TopicNamespace,
    partition: u32,
    success: bool,
    retry: &RetryChain,
) -> Result<String, RemoteError> {
    let key = marker_key(tp_ns, partition, Uuid::new_v4(), success);
    remote.upload_object(bucket, &key, Vec::new(), retry).await?;
    Ok(key)
}

/// List and parse all markers. Unparsable keys under the prefix are skipped.
pub async fn gather_recovery_results(
    remote: &Remote,
    bucket: &str,
    retry: &RetryChain,
) -> Result<Vec<DownloadMarker>, RemoteError> {
    let items = remote
        .list_objects(bucket, Some(RECOVERY_RESULTS_PREFIX), retry)
        .await?;

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let marker = parse_marker_key(&item.key);
            if marker.is_none() {
                warn!(key = %item.key, "ignoring malformed recovery result key");
            }
            marker
        })
        .collect())
}

/// Delete markers. With `keys == None`, every object under the marker prefix
/// is removed.
///
/// Failures are logged; the number of keys that could not be deleted is
/// returned.
pub async fn clear_recovery_results(
    remote: &Remote,
    bucket: &str,
    retry: &RetryPolicy,
    keys: Option<Vec<String>>,
) -> usize {
    let keys = match keys {
        Some(keys) => keys,
        None => {
            match remote
                .list_objects(bucket, Some(RECOVERY_RESULTS_PREFIX), &retry.chain())
                .await
            {
                Ok(items) => items.into_iter().map(|i| i.key).collect(),
                Err(e) => {
                    warn!(error = %e, "failed to list recovery results for cleanup");
                    return 0;
                }
            }
        }
    };

    if keys.is_empty() {
        return 0;
    }
    debug!(count = keys.len(), "deleting recovery results");

    stream::iter(keys)
        .map(|key| async move {
            let chain = retry.chain();
            match remote.delete_object(bucket, &key, &chain).await {
                Ok(()) => 0,
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to delete recovery result");
                    1
                }
            }
        })
        .buffer_unordered(DELETE_CONCURRENCY)
        .fold(0usize, |failed, f| async move { failed + f })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::{MemoryObjectStore, ObjectStoreError, StoreOpKind};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(
            CancellationToken::new(),
            Duration::from_secs(1),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn test_key_roundtrip() {
        let tp_ns = TopicNamespace::kafka("orders");
        let uuid = Uuid::new_v4();
        let key = marker_key(&tp_ns, 7, uuid, false);

        let marker = parse_marker_key(&key).unwrap();
        assert_eq!(marker.tp_ns, tp_ns);
        assert_eq!(marker.partition, 7);
        assert_eq!(marker.uuid, uuid);
        assert!(!marker.success);
    }

    #[test]
    fn test_rejects_malformed_keys() {
        for key in [
            "recovery_state/kafka/orders/0_notauuid.true",
            "recovery_state/kafka/orders/x_00000000-0000-0000-0000-000000000000.true",
            "recovery_state/kafka/orders/0_00000000-0000-0000-0000-000000000000.maybe",
            "recovery_state/kafka/0_00000000-0000-0000-0000-000000000000.true",
            "a0000000/meta/kafka/orders/topic_manifest.json",
        ] {
            assert!(parse_marker_key(key).is_none(), "{key}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gather_and_clear() {
        let store = MemoryObjectStore::with_bucket("b");
        store.insert("b", "recovery_state/garbage", "");
        let remote = Remote::new(Arc::new(store.clone()));
        let tp_ns = TopicNamespace::kafka("t");

        for p in 0..3 {
            write_recovery_result(&remote, "b", &tp_ns, p, p != 1, &policy().chain())
                .await
                .unwrap();
        }

        let markers = gather_recovery_results(&remote, "b", &policy().chain())
            .await
            .unwrap();
        assert_eq!(markers.len(), 3);
        assert_eq!(markers.iter().filter(|m| m.success).count(), 2);

        let failed = clear_recovery_results(&remote, "b", &policy(), None).await;
        assert_eq!(failed, 0);
        assert!(store.keys("b").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_reports_failures() {
        let store = MemoryObjectStore::with_bucket("b");
        store.insert("b", "recovery_state/x", "");
        store.insert("b", "recovery_state/y", "");
        store.fail_always(
            StoreOpKind::Delete,
            "recovery_state/x",
            ObjectStoreError::InvalidKey("x".into()),
        );
        let remote = Remote::new(Arc::new(store.clone()));

        let keys = vec!["recovery_state/x".to_string(), "recovery_state/y".to_string()];
        let failed = clear_recovery_results(&remote, "b", &policy(), Some(keys)).await;

        assert_eq!(failed, 1);
        assert_eq!(store.keys("b"), vec!["recovery_state/x"]);
    }
}
