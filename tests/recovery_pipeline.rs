//! Recovery Pipeline Tests
//!
//! End-to-end attempts against an in-memory bucket and a single-node cluster:
//! - one attempt at a time, with concurrent starts rejected
//! - expected downloads seeded per partition replica
//! - every marker counted exactly once, even when deletion fails
//! - completion restores retention and returns every shard to Inactive

use std::sync::Arc;
use std::time::Duration;

use tiered_recovery::cluster::{ClusterError, LocalCluster, TopicConfiguration, TopicNamespace};
use tiered_recovery::config::RecoveryTaskConfig;
use tiered_recovery::manifest::{manifest_path_for, TopicManifest};
use tiered_recovery::object_store::{MemoryObjectStore, ObjectStoreError, StoreOpKind};
use tiered_recovery::recovery::{
    marker_key, AttemptResult, CheckOutcome, ClusterHandles, InitRecoveryStatus, RecoveryErrorCode,
    RecoveryOutcome, RecoveryRequest, RecoverySettings, RecoveryState, RetentionDefaults,
    ShardStates, TopicRecoveryService, RECOVERY_RESULTS_PREFIX,
};
use uuid::Uuid;

const BUCKET: &str = "archive";

struct Harness {
    store: MemoryObjectStore,
    cluster: Arc<LocalCluster>,
    states: ShardStates,
    service: TopicRecoveryService,
}

fn harness_with(retention_defaults: RetentionDefaults) -> Harness {
    let store = MemoryObjectStore::with_bucket(BUCKET);
    let cluster = Arc::new(LocalCluster::new());
    let states = ShardStates::new(4);
    cluster.attach_local_states(states.clone());

    let config = RecoveryTaskConfig {
        bucket: BUCKET.to_string(),
        operation_timeout: Duration::from_secs(1),
        backoff: Duration::from_millis(10),
    };
    let settings = RecoverySettings {
        create_topic_timeout: Duration::from_secs(1),
        temporary_retention_bytes: 4096,
        retention_defaults,
        downloads_check_interval: Duration::from_secs(30),
    };
    let service = TopicRecoveryService::new(
        config,
        settings,
        Arc::new(store.clone()),
        ClusterHandles::from_single(cluster.clone()),
        states.clone(),
    );

    Harness {
        store,
        cluster,
        states,
        service,
    }
}

fn harness() -> Harness {
    harness_with(RetentionDefaults {
        local_target_ms: Duration::from_secs(86_400),
        local_target_bytes: None,
    })
}

fn put_manifest(store: &MemoryObjectStore, topic: &str, partitions: u32, replicas: u16) {
    let tp_ns = TopicNamespace::kafka(topic);
    let manifest = TopicManifest::new(&tp_ns, partitions, replicas);
    store.insert(BUCKET, &manifest_path_for(&tp_ns), manifest.to_json().unwrap());
}

fn put_marker(store: &MemoryObjectStore, topic: &str, partition: u32, success: bool) -> String {
    let key = marker_key(&TopicNamespace::kafka(topic), partition, Uuid::new_v4(), success);
    store.insert(BUCKET, &key, "");
    key
}

fn marker_count(store: &MemoryObjectStore) -> usize {
    store
        .keys(BUCKET)
        .iter()
        .filter(|k| k.starts_with(RECOVERY_RESULTS_PREFIX))
        .count()
}

// =============================================================================
// Attempt exclusivity
// =============================================================================

/// A second start while the first attempt is still checking the cluster is a
/// conflict; once the first attempt ends a new one is accepted.
#[tokio::test(start_paused = true)]
async fn test_concurrent_start_is_conflict() {
    let h = harness();
    h.cluster
        .set_running_check_delay(Some(Duration::from_millis(200)));
    let mut outcomes = h.service.subscribe_outcomes();

    let first = h.service.start_recovery(b"");
    assert_eq!(first.status_code, InitRecoveryStatus::Accepted);
    assert_eq!(h.service.state(), RecoveryState::Starting);

    let second = h.service.start_recovery(b"{}");
    assert_eq!(second.status_code, InitRecoveryStatus::Conflict);
    assert_eq!(second.status_code.http_status(), 409);

    outcomes.changed().await.unwrap();
    let report = outcomes.borrow().clone().unwrap();
    assert_eq!(report.result, AttemptResult::NothingToRecover);
    assert_eq!(h.service.state(), RecoveryState::Inactive);

    let third = h.service.start_recovery(b"");
    assert_eq!(third.status_code, InitRecoveryStatus::Accepted);
    h.service.stop().await;
}

/// Another node reporting an active recovery blocks the attempt.
#[tokio::test(start_paused = true)]
async fn test_peer_recovery_blocks_attempt() {
    let h = harness();
    put_manifest(&h.store, "orders", 1, 1);
    h.cluster.set_peer_recovering(2, true);

    let err = h
        .service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap_err();

    assert_eq!(err.code.as_str(), "recovery_already_running");
    assert_eq!(h.service.state(), RecoveryState::Inactive);
    assert!(h.cluster.topic(&TopicNamespace::kafka("orders")).is_none());
}

/// Conflicts are rejected before the body is looked at.
#[tokio::test(start_paused = true)]
async fn test_conflict_takes_precedence_over_bad_payload() {
    let h = harness();
    h.states.try_begin().unwrap();

    let result = h.service.start_recovery(b"not json");
    assert_eq!(result.status_code, InitRecoveryStatus::Conflict);
}

#[tokio::test(start_paused = true)]
async fn test_bad_payload_leaves_state_untouched() {
    let h = harness();

    let result = h.service.start_recovery(br#"{"topic_names_pattern": "("}"#);
    assert_eq!(result.status_code, InitRecoveryStatus::BadRequest);
    assert_eq!(result.status_code.http_status(), 400);
    assert_eq!(h.service.state(), RecoveryState::Inactive);
    assert_eq!(h.states.snapshot().version, 0);
}

// =============================================================================
// Scanning and creation
// =============================================================================

/// An empty bucket walks Starting -> ScanningBucket -> Inactive.
#[tokio::test(start_paused = true)]
async fn test_empty_bucket_state_sequence() {
    let h = harness();
    let mut updates = h.states.subscribe();

    h.service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(snapshot) = updates.try_recv() {
        seen.push(snapshot.state);
    }
    assert_eq!(
        seen,
        vec![
            RecoveryState::Starting,
            RecoveryState::ScanningBucket,
            RecoveryState::Inactive
        ]
    );
    assert!(h.states.all().iter().all(|s| *s == RecoveryState::Inactive));
}

/// Expected downloads are partitions times replicas.
#[tokio::test(start_paused = true)]
async fn test_status_seeded_per_replica() {
    let h = harness();
    put_manifest(&h.store, "orders", 3, 2);
    put_manifest(&h.store, "audit", 1, 3);

    h.service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap();

    let status = h.service.current_status().await;
    assert_eq!(status.state, RecoveryState::RecoveringData);
    assert_eq!(status.topics["kafka/orders"].pending, 6);
    assert_eq!(status.topics["kafka/audit"].pending, 3);
    assert!(h.states.all().iter().all(|s| *s == RecoveryState::RecoveringData));
    h.service.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_pattern_selects_topics() {
    let h = harness();
    put_manifest(&h.store, "orders", 1, 1);
    put_manifest(&h.store, "orders-dlq", 1, 1);
    put_manifest(&h.store, "payments", 1, 1);

    let request = RecoveryRequest::parse(br#"{"topic_names_pattern": "^orders$"}"#).unwrap();
    h.service.run_recovery(request).await.unwrap();

    assert!(h.cluster.topic(&TopicNamespace::kafka("orders")).is_some());
    assert!(h.cluster.topic(&TopicNamespace::kafka("orders-dlq")).is_none());
    assert!(h.cluster.topic(&TopicNamespace::kafka("payments")).is_none());
    h.service.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_existing_topics_are_not_recreated() {
    let h = harness();
    put_manifest(&h.store, "orders", 2, 1);
    put_manifest(&h.store, "payments", 2, 1);
    h.cluster
        .insert_topic(TopicConfiguration::new(TopicNamespace::kafka("orders"), 8, 3));

    h.service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap();

    let orders = h.cluster.topic(&TopicNamespace::kafka("orders")).unwrap();
    assert_eq!(orders.partition_count, 8);
    assert!(!orders.properties.recovery);

    let status = h.service.current_status().await;
    assert_eq!(status.topics.keys().collect::<Vec<_>>(), vec!["kafka/payments"]);
    h.service.stop().await;
}

/// Request bytes win over request ms; both replace the temporary default.
#[tokio::test(start_paused = true)]
async fn test_retention_precedence() {
    let h = harness();
    put_manifest(&h.store, "orders", 1, 1);

    let request =
        RecoveryRequest::parse(br#"{"retention_bytes": 777, "retention_ms": 5000}"#).unwrap();
    h.service.run_recovery(request).await.unwrap();

    let props = h
        .cluster
        .topic(&TopicNamespace::kafka("orders"))
        .unwrap()
        .properties;
    assert_eq!(props.retention_local_target_bytes, Some(777));
    assert_eq!(props.retention_local_target_ms, None);
    h.service.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_retention_ms_only() {
    let h = harness();
    put_manifest(&h.store, "orders", 1, 1);

    let request = RecoveryRequest::parse(br#"{"retention_ms": 5000}"#).unwrap();
    h.service.run_recovery(request).await.unwrap();

    let props = h
        .cluster
        .topic(&TopicNamespace::kafka("orders"))
        .unwrap()
        .properties;
    assert_eq!(props.retention_local_target_ms, Some(Duration::from_millis(5000)));
    assert_eq!(props.retention_local_target_bytes, None);
    h.service.stop().await;
}

/// A manifest that cannot be parsed is dropped; the rest of the attempt
/// proceeds.
#[tokio::test(start_paused = true)]
async fn test_corrupt_manifest_is_skipped() {
    let h = harness();
    put_manifest(&h.store, "orders", 2, 1);
    put_manifest(&h.store, "existing", 1, 1);
    h.cluster
        .insert_topic(TopicConfiguration::new(TopicNamespace::kafka("existing"), 1, 1));
    h.store.insert(
        BUCKET,
        &manifest_path_for(&TopicNamespace::kafka("broken")),
        "not json",
    );

    let outcome = h.service.run_recovery(RecoveryRequest::default()).await;

    assert_eq!(outcome, Ok(RecoveryOutcome::Tracking { topics: 1 }));
    assert!(h.cluster.topic(&TopicNamespace::kafka("orders")).is_some());
    assert!(h.cluster.topic(&TopicNamespace::kafka("broken")).is_none());

    let status = h.service.current_status().await;
    assert_eq!(status.topics.keys().collect::<Vec<_>>(), vec!["kafka/orders"]);
    assert_eq!(status.topics["kafka/orders"].pending, 2);
    h.service.stop().await;
}

/// A creation request that outlives its timeout fails the attempt and
/// clears it.
#[tokio::test(start_paused = true)]
async fn test_create_timeout_fails_attempt() {
    let h = harness();
    put_manifest(&h.store, "orders", 3, 1);
    h.cluster.set_create_delay(Some(Duration::from_secs(5)));

    let err = h
        .service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap_err();

    assert_eq!(err.code, RecoveryErrorCode::ErrorCreatingTopics);
    assert!(h.states.all().iter().all(|s| *s == RecoveryState::Inactive));
    assert!(!h.service.is_tracking_downloads());

    let status = h.service.current_status().await;
    assert!(status.topics.is_empty());
    assert!(status.request.is_none());
    assert!(h.cluster.topic(&TopicNamespace::kafka("orders")).is_none());
}

/// Markers left by an earlier attempt are removed before topics are created.
#[tokio::test(start_paused = true)]
async fn test_stale_markers_cleared_on_start() {
    let h = harness();
    put_manifest(&h.store, "orders", 1, 1);
    put_marker(&h.store, "orders", 0, true);
    assert_eq!(marker_count(&h.store), 1);

    h.service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap();

    assert_eq!(marker_count(&h.store), 0);
    let status = h.service.current_status().await;
    assert_eq!(status.topics["kafka/orders"].pending, 1);
    h.service.stop().await;
}

// =============================================================================
// Download tracking
// =============================================================================

/// A marker whose deletion fails is seen again but only counted once.
#[tokio::test(start_paused = true)]
async fn test_marker_counted_once_when_delete_fails() {
    let h = harness();
    put_manifest(&h.store, "orders", 2, 1);
    h.service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap();

    h.store.fail_always(
        StoreOpKind::Delete,
        RECOVERY_RESULTS_PREFIX,
        ObjectStoreError::Unavailable("throttled".into()),
    );
    put_marker(&h.store, "orders", 0, true);

    assert_eq!(h.service.check_downloads_now().await, CheckOutcome::Pending);
    assert_eq!(h.service.check_downloads_now().await, CheckOutcome::Pending);
    assert_eq!(marker_count(&h.store), 1);

    let status = h.service.current_status().await;
    assert_eq!(status.topics["kafka/orders"].pending, 1);
    assert_eq!(status.topics["kafka/orders"].successful, 1);

    h.store.clear_failures();
    put_marker(&h.store, "orders", 1, true);
    assert_eq!(h.service.check_downloads_now().await, CheckOutcome::Complete);
    assert_eq!(marker_count(&h.store), 0);
}

/// Failed downloads still count towards completion.
#[tokio::test(start_paused = true)]
async fn test_failed_downloads_complete_the_attempt() {
    let h = harness();
    put_manifest(&h.store, "orders", 1, 2);
    h.service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap();

    put_marker(&h.store, "orders", 0, false);
    put_marker(&h.store, "orders", 0, true);

    assert_eq!(h.service.check_downloads_now().await, CheckOutcome::Complete);
    let report = h.service.subscribe_outcomes().borrow().clone().unwrap();
    assert_eq!(report.result, AttemptResult::Completed);
}

/// Completion resets retention, clears the attempt and frees every shard.
#[tokio::test(start_paused = true)]
async fn test_completion_restores_retention_and_clears_attempt() {
    let h = harness_with(RetentionDefaults {
        local_target_ms: Duration::from_secs(7200),
        local_target_bytes: Some(1 << 20),
    });
    put_manifest(&h.store, "orders", 1, 1);
    h.service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap();
    assert!(h.service.is_tracking_downloads());

    put_marker(&h.store, "orders", 0, true);
    assert_eq!(h.service.check_downloads_now().await, CheckOutcome::Complete);

    let props = h
        .cluster
        .topic(&TopicNamespace::kafka("orders"))
        .unwrap()
        .properties;
    assert_eq!(props.retention_local_target_ms, Some(Duration::from_secs(7200)));
    assert_eq!(props.retention_local_target_bytes, Some(1 << 20));

    let status = h.service.current_status().await;
    assert_eq!(status.state, RecoveryState::Inactive);
    assert!(status.topics.is_empty());
    assert!(status.request.is_none());
    assert!(h.states.all().iter().all(|s| *s == RecoveryState::Inactive));
    assert_eq!(h.service.check_downloads_now().await, CheckOutcome::Idle);
}

/// Several topics finishing in the same check end the attempt together.
#[tokio::test(start_paused = true)]
async fn test_two_topics_complete_in_one_check() {
    let h = harness();
    put_manifest(&h.store, "orders", 1, 1);
    put_manifest(&h.store, "payments", 1, 1);
    let request = RecoveryRequest::parse(br#"{"retention_bytes": 512}"#).unwrap();
    h.service.run_recovery(request).await.unwrap();
    assert!(h.service.current_status().await.request.is_some());

    put_marker(&h.store, "orders", 0, true);
    put_marker(&h.store, "payments", 0, true);
    assert_eq!(h.service.check_downloads_now().await, CheckOutcome::Complete);

    let status = h.service.current_status().await;
    assert!(status.topics.is_empty());
    assert!(status.request.is_none());
    assert_eq!(h.states.all(), vec![RecoveryState::Inactive; 4]);
    assert_eq!(marker_count(&h.store), 0);

    for topic in ["orders", "payments"] {
        let props = h
            .cluster
            .topic(&TopicNamespace::kafka(topic))
            .unwrap()
            .properties;
        assert_eq!(props.retention_local_target_ms, Some(Duration::from_secs(86_400)));
        assert_eq!(props.retention_local_target_bytes, None);
    }
}

/// Transient failures of the retention reset are retried.
#[tokio::test(start_paused = true)]
async fn test_retention_reset_retries_transient_failures() {
    let h = harness();
    put_manifest(&h.store, "orders", 1, 1);
    h.service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap();

    h.cluster
        .fail_property_updates(2, ClusterError::Unavailable("no leader".into()));
    put_marker(&h.store, "orders", 0, true);
    assert_eq!(h.service.check_downloads_now().await, CheckOutcome::Complete);

    let props = h
        .cluster
        .topic(&TopicNamespace::kafka("orders"))
        .unwrap()
        .properties;
    assert_eq!(props.retention_local_target_ms, Some(Duration::from_secs(86_400)));
    assert_eq!(props.retention_local_target_bytes, None);
    assert_eq!(h.cluster.property_updates().len(), 1);
}

/// The armed timer drives the attempt to completion without manual checks.
#[tokio::test(start_paused = true)]
async fn test_timer_completes_attempt() {
    let h = harness();
    put_manifest(&h.store, "orders", 1, 1);
    let mut outcomes = h.service.subscribe_outcomes();

    h.service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap();
    outcomes.borrow_and_update();
    put_marker(&h.store, "orders", 0, true);

    outcomes.changed().await.unwrap();
    let report = outcomes.borrow().clone().unwrap();
    assert_eq!(report.result, AttemptResult::Completed);
    assert_eq!(h.service.state(), RecoveryState::Inactive);
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_tracking() {
    let h = harness();
    put_manifest(&h.store, "orders", 1, 1);
    h.service
        .run_recovery(RecoveryRequest::default())
        .await
        .unwrap();
    assert!(h.service.is_tracking_downloads());

    h.service.shutdown_recovery();
    h.service.stop().await;

    assert!(!h.service.is_tracking_downloads());
    assert_eq!(h.service.state(), RecoveryState::RecoveringData);
}

/// Shutdown while the cluster check is in flight cancels the attempt.
#[tokio::test(start_paused = true)]
async fn test_shutdown_mid_flight_returns_to_inactive() {
    let h = harness();
    put_manifest(&h.store, "orders", 1, 1);
    h.cluster
        .set_running_check_delay(Some(Duration::from_millis(500)));
    let mut outcomes = h.service.subscribe_outcomes();

    let started = h.service.start_recovery(b"");
    assert_eq!(started.status_code, InitRecoveryStatus::Accepted);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.service.state(), RecoveryState::Starting);

    h.service.shutdown_recovery();
    outcomes.changed().await.unwrap();

    let report = outcomes.borrow().clone().unwrap();
    match report.result {
        AttemptResult::Failed { error } => {
            assert_eq!(error.code, RecoveryErrorCode::RecoveryAlreadyRunning);
        }
        other => panic!("expected a failed attempt, got {:?}", other),
    }
    assert!(h.states.all().iter().all(|s| *s == RecoveryState::Inactive));
    assert!(h.cluster.topic(&TopicNamespace::kafka("orders")).is_none());
    h.service.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_after_shutdown_is_rejected() {
    let h = harness();
    h.service.shutdown_recovery();

    let result = h.service.start_recovery(b"");
    assert_eq!(result.status_code, InitRecoveryStatus::InternalServerError);
    assert_eq!(h.service.state(), RecoveryState::Inactive);
}
