//! Admin API Tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use tiered_recovery::cluster::{LocalCluster, TopicNamespace};
use tiered_recovery::config::RecoveryTaskConfig;
use tiered_recovery::http_server::{HttpServer, HttpServerConfig, AUTOMATED_RECOVERY_PATH};
use tiered_recovery::manifest::{manifest_path_for, TopicManifest};
use tiered_recovery::object_store::MemoryObjectStore;
use tiered_recovery::recovery::{
    ClusterHandles, RecoverySettings, RecoveryState, RetentionDefaults, ShardStates,
    TopicRecoveryService,
};

const BUCKET: &str = "archive";

struct TestApp {
    store: MemoryObjectStore,
    cluster: Arc<LocalCluster>,
    service: TopicRecoveryService,
}

impl TestApp {
    fn new() -> Self {
        let store = MemoryObjectStore::with_bucket(BUCKET);
        let cluster = Arc::new(LocalCluster::new());
        let states = ShardStates::new(2);
        cluster.attach_local_states(states.clone());

        let service = TopicRecoveryService::new(
            RecoveryTaskConfig {
                bucket: BUCKET.to_string(),
                operation_timeout: Duration::from_secs(5),
                backoff: Duration::from_millis(10),
            },
            RecoverySettings {
                create_topic_timeout: Duration::from_secs(5),
                temporary_retention_bytes: 4096,
                retention_defaults: RetentionDefaults {
                    local_target_ms: Duration::from_secs(3600),
                    local_target_bytes: None,
                },
                downloads_check_interval: Duration::from_secs(60),
            },
            Arc::new(store.clone()),
            ClusterHandles::from_single(cluster.clone()),
            states,
        );

        Self {
            store,
            cluster,
            service,
        }
    }

    fn router(&self) -> Router {
        HttpServer::new(HttpServerConfig::default(), self.service.clone()).router()
    }

    async fn send(&self, method: Method, uri: &str, body: &'static str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/health", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_when_idle() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, AUTOMATED_RECOVERY_PATH, "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "inactive");
    assert_eq!(body["version"], 0);
    assert!(body["topics"].as_object().unwrap().is_empty());
    assert!(body["last_result"].is_null());
}

#[tokio::test]
async fn test_start_accepted_then_conflict() {
    let app = TestApp::new();
    app.cluster
        .set_running_check_delay(Some(Duration::from_millis(500)));

    let (status, body) = app.send(Method::POST, AUTOMATED_RECOVERY_PATH, "").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status_code"], 202);

    let (status, body) = app
        .send(Method::POST, AUTOMATED_RECOVERY_PATH, r#"{"retention_bytes": 10}"#)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status_code"], 409);
    assert!(body["message"].as_str().unwrap().contains("already active"));

    let (_, body) = app.send(Method::GET, AUTOMATED_RECOVERY_PATH, "").await;
    assert_ne!(body["state"], "inactive");

    app.service.shutdown_recovery();
    app.service.stop().await;
}

#[tokio::test]
async fn test_unknown_field_is_bad_request() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Method::POST, AUTOMATED_RECOVERY_PATH, r#"{"retention": 10}"#)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status_code"], 400);
    assert_eq!(app.service.state(), RecoveryState::Inactive);
}

#[tokio::test]
async fn test_invalid_pattern_is_bad_request() {
    let app = TestApp::new();

    let (status, _) = app
        .send(
            Method::POST,
            AUTOMATED_RECOVERY_PATH,
            r#"{"topic_names_pattern": "[unclosed"}"#,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// A started recovery shows up in the status report with its expected
/// download counts.
#[tokio::test]
async fn test_status_reports_tracked_topics() {
    let app = TestApp::new();
    let tp_ns = TopicNamespace::kafka("orders");
    let manifest = TopicManifest::new(&tp_ns, 2, 3);
    app.store
        .insert(BUCKET, &manifest_path_for(&tp_ns), manifest.to_json().unwrap());
    let mut outcomes = app.service.subscribe_outcomes();

    let (status, _) = app
        .send(Method::POST, AUTOMATED_RECOVERY_PATH, r#"{"retention_ms": 60000}"#)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    outcomes.changed().await.unwrap();

    let (status, body) = app.send(Method::GET, AUTOMATED_RECOVERY_PATH, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "recovering_data");
    assert_eq!(body["topics"]["kafka/orders"]["pending"], 6);
    assert_eq!(body["last_result"]["result"], "tracking_downloads");
    assert_eq!(body["metrics"]["topics_created"], 1);

    app.service.shutdown_recovery();
    app.service.stop().await;
}
