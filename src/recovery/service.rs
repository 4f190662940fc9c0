//! Topic Recovery Service
//!
//! Orchestrates one recovery attempt at a time:
//!
//! 1. claim the attempt locally (`Inactive -> Starting`) and check that no
//!    other node is recovering
//! 2. list the bucket and download the manifests of missing topics
//! 3. create the topics with recovery-friendly retention
//! 4. hand over to the download tracker, which finalizes the attempt once
//!    every partition download has reported back
//!
//! The pipeline runs detached on the service's task tracker. Its result is
//! logged once at the task boundary and published on a watch channel; HTTP
//! callers only see whether the attempt was accepted.
//!
//! Whenever an attempt fails, the state returns to `Inactive` together with
//! the attempt data and the tracker timer, so the service never reports an
//! attempt that nothing is driving.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use super::errors::{RecoveryError, RecoveryResult};
use super::markers::{clear_recovery_results, gather_recovery_results};
use super::materializer::{make_reset_updates, make_topic_configs, RetentionDefaults};
use super::request::RecoveryRequest;
use super::shards::ShardStates;
use super::state::RecoveryState;
use super::status::{Applied, RecoveryStatus, TopicDownloadStatus};
use super::tracker::{CheckOutcome, DownloadCheck, DownloadTracker};
use crate::cluster::{
    RecoveryStatusFrontend, SkipThisNode, TopicNamespace, TopicTable, TopicsFrontend,
    KAFKA_NAMESPACE,
};
use crate::config::{ConfigResult, RecoveryTaskConfig, ServiceConfig};
use crate::manifest::{filter_existing_topics, TopicManifest};
use crate::object_store::{ObjectStore, Remote};
use crate::observability::{MetricsSnapshot, RecoveryEvent, RecoveryMetrics};
use crate::retry::RetryPolicy;

/// Listing calls page through the whole bucket and get a longer deadline
pub const LIST_API_TIMEOUT_MULTIPLIER: u32 = 10;

/// Tunables that are not part of the retry envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySettings {
    pub create_topic_timeout: Duration,
    /// Local retention applied to topics while their data is restored
    pub temporary_retention_bytes: u64,
    pub retention_defaults: RetentionDefaults,
    pub downloads_check_interval: Duration,
}

impl RecoverySettings {
    pub fn from_service_config(config: &ServiceConfig) -> Self {
        Self {
            create_topic_timeout: config.create_topic_timeout(),
            temporary_retention_bytes: config
                .cloud_storage_recovery_temporary_retention_bytes_default,
            retention_defaults: config.retention_defaults(),
            downloads_check_interval: config.downloads_check_interval(),
        }
    }
}

/// Cluster collaborators used by the service
#[derive(Clone)]
pub struct ClusterHandles {
    pub topics: Arc<dyn TopicTable>,
    pub frontend: Arc<dyn TopicsFrontend>,
    pub recovery_status: Arc<dyn RecoveryStatusFrontend>,
}

impl ClusterHandles {
    /// Use one implementation for every collaborator
    pub fn from_single<C>(cluster: Arc<C>) -> Self
    where
        C: TopicTable + TopicsFrontend + RecoveryStatusFrontend + 'static,
    {
        Self {
            topics: cluster.clone(),
            frontend: cluster.clone(),
            recovery_status: cluster,
        }
    }
}

/// Outcome category of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitRecoveryStatus {
    Accepted,
    Conflict,
    BadRequest,
    InternalServerError,
}

impl InitRecoveryStatus {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Accepted => 202,
            Self::Conflict => 409,
            Self::BadRequest => 400,
            Self::InternalServerError => 500,
        }
    }
}

/// Answer to a start request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitRecoveryResult {
    pub status_code: InitRecoveryStatus,
    pub message: String,
}

impl InitRecoveryResult {
    fn new(status_code: InitRecoveryStatus, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

/// How a pipeline run ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No manifest matched; the attempt ended immediately
    NothingToRecover,
    /// Topics created, the download tracker owns the attempt now
    Tracking { topics: usize },
}

/// Terminal or hand-over result of an attempt, as published to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptResult {
    NothingToRecover,
    TrackingDownloads { topics: usize },
    Completed,
    Failed { error: RecoveryError },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptReport {
    #[serde(flatten)]
    pub result: AttemptResult,
    pub finished_at: DateTime<Utc>,
}

/// Snapshot backing the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryStatusReport {
    pub state: RecoveryState,
    pub version: u64,
    /// Keyed by `ns/topic`
    pub topics: BTreeMap<String, TopicDownloadStatus>,
    pub request: Option<String>,
    pub last_result: Option<AttemptReport>,
    pub metrics: MetricsSnapshot,
}

/// Data owned by the in-progress attempt
#[derive(Debug, Default)]
struct RecoveryAttempt {
    manifests: Option<Vec<TopicManifest>>,
    status: RecoveryStatus,
    request: Option<RecoveryRequest>,
}

impl RecoveryAttempt {
    fn clear(&mut self) {
        self.manifests = None;
        self.status.clear();
        self.request = None;
    }
}

struct ServiceContext {
    config: RecoveryTaskConfig,
    settings: RecoverySettings,
    remote: Remote,
    cluster: ClusterHandles,
    states: ShardStates,
    attempt: Mutex<RecoveryAttempt>,
    abort: CancellationToken,
    tasks: TaskTracker,
    tracker: DownloadTracker,
    outcomes: watch::Sender<Option<AttemptReport>>,
    metrics: RecoveryMetrics,
}

/// Cluster-wide topic recovery from tiered storage
#[derive(Clone)]
pub struct TopicRecoveryService {
    ctx: Arc<ServiceContext>,
}

impl TopicRecoveryService {
    pub fn new(
        config: RecoveryTaskConfig,
        settings: RecoverySettings,
        store: Arc<dyn ObjectStore>,
        cluster: ClusterHandles,
        states: ShardStates,
    ) -> Self {
        let abort = CancellationToken::new();
        let tasks = TaskTracker::new();
        let tracker = DownloadTracker::new(
            settings.downloads_check_interval,
            tasks.clone(),
            abort.clone(),
        );
        let (outcomes, _) = watch::channel(None);

        Self {
            ctx: Arc::new(ServiceContext {
                config,
                settings,
                remote: Remote::new(store),
                cluster,
                states,
                attempt: Mutex::new(RecoveryAttempt::default()),
                abort,
                tasks,
                tracker,
                outcomes,
                metrics: RecoveryMetrics::new(),
            }),
        }
    }

    /// Build from process configuration. Fails if no bucket is configured.
    pub fn from_service_config(
        config: &ServiceConfig,
        store: Arc<dyn ObjectStore>,
        cluster: ClusterHandles,
        states: ShardStates,
    ) -> ConfigResult<Self> {
        let task_config = RecoveryTaskConfig::from_service_config(config)?;
        let settings = RecoverySettings::from_service_config(config);
        Ok(Self::new(task_config, settings, store, cluster, states))
    }

    pub fn config(&self) -> &RecoveryTaskConfig {
        &self.ctx.config
    }

    pub fn states(&self) -> &ShardStates {
        &self.ctx.states
    }

    /// State seen by the local shard
    pub fn state(&self) -> RecoveryState {
        self.ctx.states.local()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Receive the result of every attempt as it ends or hands over
    pub fn subscribe_outcomes(&self) -> watch::Receiver<Option<AttemptReport>> {
        self.ctx.outcomes.subscribe()
    }

    /// Validate a start request and spawn the pipeline.
    pub fn start_recovery(&self, body: &[u8]) -> InitRecoveryResult {
        let ctx = &self.ctx;

        if ctx.states.local().is_active() {
            ctx.metrics.increment_attempts_rejected();
            info!(
                event = %RecoveryEvent::RecoveryConflict,
                state = %ctx.states.local(),
                "rejecting recovery request"
            );
            return InitRecoveryResult::new(
                InitRecoveryStatus::Conflict,
                "A recovery is already active",
            );
        }

        let request = match RecoveryRequest::parse(body) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "bad recovery request payload");
                return InitRecoveryResult::new(
                    InitRecoveryStatus::BadRequest,
                    format!("bad recovery request payload: {}", e),
                );
            }
        };

        if ctx.tasks.is_closed() || ctx.abort.is_cancelled() {
            return InitRecoveryResult::new(
                InitRecoveryStatus::InternalServerError,
                "recovery init failed with error: service is shutting down",
            );
        }

        // Claimed before spawning so a concurrent request sees `Starting`
        if let Err(state) = ctx.states.try_begin() {
            ctx.metrics.increment_attempts_rejected();
            info!(
                event = %RecoveryEvent::RecoveryConflict,
                state = %state,
                "rejecting recovery request"
            );
            return InitRecoveryResult::new(
                InitRecoveryStatus::Conflict,
                "A recovery is already active",
            );
        }

        info!(
            event = %RecoveryEvent::RecoveryStart,
            request = %request,
            "starting recovery"
        );
        let task_ctx = Arc::clone(ctx);
        ctx.tasks.spawn(async move {
            let result = run_claimed(&task_ctx, request).await;
            report_pipeline_result(&task_ctx, result);
        });

        InitRecoveryResult::new(InitRecoveryStatus::Accepted, "recovery started")
    }

    /// Run the pipeline inline and return its result.
    ///
    /// [`TopicRecoveryService::start_recovery`] is the usual entry point; this
    /// exists for embedding and tests.
    pub async fn run_recovery(&self, request: RecoveryRequest) -> RecoveryResult<RecoveryOutcome> {
        let result = run_recovery(&self.ctx, request).await;
        report_pipeline_result(&self.ctx, result.clone());
        result
    }

    /// Run one download check now, serialized with timer firings
    pub async fn check_downloads_now(&self) -> CheckOutcome {
        self.ctx.tracker.check_now(&*self.ctx).await
    }

    /// Whether the download check timer is armed
    pub fn is_tracking_downloads(&self) -> bool {
        self.ctx.tracker.is_armed()
    }

    pub async fn current_status(&self) -> RecoveryStatusReport {
        let snapshot = self.ctx.states.snapshot();
        let attempt = self.ctx.attempt.lock().await;

        RecoveryStatusReport {
            state: snapshot.state,
            version: snapshot.version,
            topics: attempt
                .status
                .snapshot()
                .into_iter()
                .map(|(tp_ns, status)| (tp_ns.to_string(), status))
                .collect(),
            request: attempt.request.as_ref().map(|r| r.to_string()),
            last_result: self.ctx.outcomes.borrow().clone(),
            metrics: self.ctx.metrics.snapshot(),
        }
    }

    /// Cancel the download check timer and abort in-flight network calls.
    /// Idempotent.
    pub fn shutdown_recovery(&self) {
        debug!("shutting down recovery if active");
        if self.ctx.tracker.cancel() {
            warn!("cancelled active pending status timer");
        }
        self.ctx.abort.cancel();
    }

    /// Wait for the pipeline and every download check to exit.
    ///
    /// No timer can be armed once this starts.
    pub async fn stop(&self) {
        self.ctx.tasks.close();
        self.ctx.tracker.cancel();
        self.ctx.tasks.wait().await;
        debug!("stopped topic recovery service");
    }
}

impl ServiceContext {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.abort.clone(),
            self.config.operation_timeout,
            self.config.backoff,
        )
    }

    fn list_policy(&self) -> RetryPolicy {
        self.retry_policy().scaled(LIST_API_TIMEOUT_MULTIPLIER)
    }

    fn publish(&self, result: AttemptResult) {
        self.outcomes.send_replace(Some(AttemptReport {
            result,
            finished_at: Utc::now(),
        }));
    }

    /// Drop all attempt data and force every shard back to `Inactive`
    async fn abandon_attempt(&self) {
        self.attempt.lock().await.clear();
        self.tracker.cancel();
        let previous = self.states.reset();
        debug!(previous = %previous, "recovery attempt abandoned");
    }

    /// Restore steady-state retention, then end the attempt
    async fn finalize(&self) {
        let manifests = {
            let mut attempt = self.attempt.lock().await;
            attempt.status.clear();
            attempt.manifests.clone()
        };

        match manifests {
            Some(manifests) => self.reset_topic_configurations(&manifests).await,
            None => warn!("no manifests to reset config from"),
        }

        self.attempt.lock().await.clear();

        if let Err(e) = self.states.propagate(RecoveryState::Inactive) {
            error!(error = %e, "failed to end recovery attempt");
            self.states.reset();
        }

        self.metrics.increment_attempts_completed();
        self.publish(AttemptResult::Completed);
        info!(event = %RecoveryEvent::RecoveryComplete, "recovery complete");
    }

    async fn reset_topic_configurations(&self, manifests: &[TopicManifest]) {
        let updates = make_reset_updates(manifests, self.settings.retention_defaults);
        if updates.is_empty() {
            return;
        }

        // Updates set absolute values, so repeating a partially applied
        // request is harmless.
        let frontend = &self.cluster.frontend;
        let timeout = self.config.operation_timeout;
        let results = self
            .retry_policy()
            .chain()
            .retry("update_topic_properties", || {
                frontend.update_topic_properties(updates.clone(), Some(timeout))
            })
            .await;

        match results {
            Ok(results) => {
                for result in results {
                    info!(topic = %result.tp_ns, result = %result.ec, "topic update result");
                }
            }
            Err(e) if e.is_cancelled() => {
                warn!("shutdown before topic configurations were reset");
            }
            Err(e) => error!(error = %e, "failed to reset topic configurations"),
        }
    }
}

#[async_trait]
impl DownloadCheck for ServiceContext {
    async fn check_for_downloads(&self) -> CheckOutcome {
        if self.states.local() != RecoveryState::RecoveringData {
            trace!("no recovery waiting for downloads");
            return CheckOutcome::Idle;
        }
        self.metrics.increment_download_checks();
        trace!("checking for downloads");

        let chain = self.list_policy().chain();
        let markers = match gather_recovery_results(&self.remote, &self.config.bucket, &chain).await
        {
            Ok(markers) => markers,
            Err(e) if e.is_cancelled() => return CheckOutcome::Idle,
            Err(e) => {
                warn!(error = %e, "failed to gather recovery results, will retry");
                return CheckOutcome::Pending;
            }
        };

        let mut counted = 0u64;
        {
            let mut attempt = self.attempt.lock().await;
            for marker in &markers {
                match attempt.status.apply(&marker.key, &marker.tp_ns, marker.success) {
                    Applied::Counted => {
                        counted += 1;
                        debug!(
                            topic = %marker.tp_ns,
                            partition = marker.partition,
                            success = marker.success,
                            status = ?attempt.status.get(&marker.tp_ns),
                            "processed recovery result"
                        );
                    }
                    Applied::UnknownTopic => {
                        debug!(topic = %marker.tp_ns, key = %marker.key, "unexpected status file");
                    }
                    Applied::Duplicate => {
                        trace!(key = %marker.key, "recovery result already consumed");
                    }
                }
            }
        }

        if counted > 0 {
            self.metrics.add_markers_processed(counted);
            info!(event = %RecoveryEvent::DownloadsProgress, processed = counted, "download results processed");
        }

        if !markers.is_empty() {
            let keys = markers.into_iter().map(|m| m.key).collect();
            let failed = clear_recovery_results(
                &self.remote,
                &self.config.bucket,
                &self.retry_policy(),
                Some(keys),
            )
            .await;
            if failed > 0 {
                warn!(failed, "some recovery results could not be deleted");
            }
        }

        if self.attempt.lock().await.status.has_pending() {
            return CheckOutcome::Pending;
        }

        self.finalize().await;
        CheckOutcome::Complete
    }
}

async fn run_recovery(
    ctx: &Arc<ServiceContext>,
    request: RecoveryRequest,
) -> RecoveryResult<RecoveryOutcome> {
    if let Err(state) = ctx.states.try_begin() {
        return Err(RecoveryError::already_running(format!(
            "recovery already active in state {}",
            state
        )));
    }
    run_claimed(ctx, request).await
}

/// Run an attempt whose `Inactive -> Starting` claim already succeeded
async fn run_claimed(
    ctx: &Arc<ServiceContext>,
    request: RecoveryRequest,
) -> RecoveryResult<RecoveryOutcome> {
    ctx.metrics.increment_attempts_started();

    if ctx.tracker.cancel() {
        debug!("cancelled leftover download check timer");
    }

    let result = run_phases(ctx, &request).await;
    if result.is_err() {
        ctx.abandon_attempt().await;
    }
    result
}

fn advance(ctx: &ServiceContext, next: RecoveryState) -> RecoveryResult<()> {
    ctx.states
        .propagate(next)
        .map(|_| ())
        .map_err(|e| RecoveryError::already_running(e.to_string()))
}

async fn run_phases(
    ctx: &Arc<ServiceContext>,
    request: &RecoveryRequest,
) -> RecoveryResult<RecoveryOutcome> {
    let bucket = ctx.config.bucket.as_str();

    let frontend = &ctx.cluster.recovery_status;
    let running = ctx
        .retry_policy()
        .chain()
        .retry("is_recovery_running", || {
            frontend.is_recovery_running(SkipThisNode::Yes)
        })
        .await;
    match running {
        Ok(false) => {}
        Ok(true) => {
            return Err(RecoveryError::already_running(
                "a recovery is already running on another node",
            ))
        }
        Err(e) => {
            return Err(RecoveryError::already_running(format!(
                "failed to check cluster recovery status: {}",
                e
            )))
        }
    }

    advance(ctx, RecoveryState::ScanningBucket)?;

    let items = ctx
        .remote
        .list_objects(bucket, None, &ctx.list_policy().chain())
        .await
        .map_err(|e| {
            RecoveryError::listing_items(format!("failed to list bucket {}: {}", bucket, e))
        })?;
    info!(event = %RecoveryEvent::BucketScanned, bucket, objects = items.len(), "bucket listed");

    let manifests = filter_existing_topics(
        &ctx.remote,
        bucket,
        &items,
        request.topic_names_pattern(),
        Some(KAFKA_NAMESPACE),
        ctx.cluster.topics.as_ref(),
        &ctx.retry_policy(),
    )
    .await;

    if ctx.abort.is_cancelled() {
        return Err(RecoveryError::downloading_manifest(
            "recovery aborted while downloading manifests",
        ));
    }

    if manifests.is_empty() {
        info!(event = %RecoveryEvent::NothingToRecover, "no topics to recover");
        advance(ctx, RecoveryState::Inactive)?;
        return Ok(RecoveryOutcome::NothingToRecover);
    }

    let failed_deletes =
        clear_recovery_results(&ctx.remote, bucket, &ctx.retry_policy(), None).await;
    if failed_deletes > 0 {
        warn!(failed = failed_deletes, "stale recovery results remain in the bucket");
    }

    {
        let mut attempt = ctx.attempt.lock().await;
        attempt.status.clear();
        attempt.status.seed(&manifests);
        attempt.manifests = Some(manifests.clone());
        attempt.request = Some(request.clone());
    }

    advance(ctx, RecoveryState::CreatingTopics)?;

    let topics = create_topics(ctx, &manifests, request).await?;

    advance(ctx, RecoveryState::RecoveringData)?;

    let check: Arc<dyn DownloadCheck> = ctx.clone();
    if !ctx.tracker.arm(check) {
        return Err(RecoveryError::creating_topics(
            "download tracking could not start, service is shutting down",
        ));
    }
    info!(
        event = %RecoveryEvent::DownloadTrackingStart,
        topics,
        interval_ms = ctx.tracker.interval().as_millis() as u64,
        "waiting for downloads to finish"
    );

    Ok(RecoveryOutcome::Tracking { topics })
}

/// Submit the creation batch. Topics that fail are dropped from tracking and
/// from the final configuration reset. Returns the number created.
async fn create_topics(
    ctx: &ServiceContext,
    manifests: &[TopicManifest],
    request: &RecoveryRequest,
) -> RecoveryResult<usize> {
    let configs = make_topic_configs(manifests, request, ctx.settings.temporary_retention_bytes);
    debug!(topics = configs.len(), "creating topics");

    let results = tokio::select! {
        biased;
        _ = ctx.abort.cancelled() => {
            return Err(RecoveryError::creating_topics("recovery aborted while creating topics"));
        }
        r = ctx.cluster.frontend.autocreate_topics(configs, ctx.settings.create_topic_timeout) => r,
    };
    let results = results
        .map_err(|e| RecoveryError::creating_topics(format!("failed to create topics: {}", e)))?;

    let mut failed: Vec<TopicNamespace> = Vec::new();
    for result in &results {
        if result.is_success() {
            debug!(topic = %result.tp_ns, "topic created");
        } else {
            warn!(topic = %result.tp_ns, result = %result.ec, "topic creation failed");
            failed.push(result.tp_ns.clone());
        }
    }

    let created = results.len() - failed.len();
    ctx.metrics.add_topics_created(created as u64);
    ctx.metrics.add_topic_creation_failures(failed.len() as u64);

    if !failed.is_empty() {
        let mut attempt = ctx.attempt.lock().await;
        for tp_ns in &failed {
            attempt.status.erase(tp_ns);
        }
        if let Some(manifests) = attempt.manifests.as_mut() {
            manifests.retain(|m| m.tp_ns().map_or(false, |t| !failed.contains(&t)));
        }
    }

    info!(
        event = %RecoveryEvent::TopicsCreated,
        created,
        failed = failed.len(),
        "topic creation finished"
    );
    Ok(created)
}

fn report_pipeline_result(ctx: &ServiceContext, result: RecoveryResult<RecoveryOutcome>) {
    match result {
        Ok(RecoveryOutcome::NothingToRecover) => {
            ctx.metrics.increment_attempts_completed();
            ctx.publish(AttemptResult::NothingToRecover);
        }
        Ok(RecoveryOutcome::Tracking { topics }) => {
            ctx.publish(AttemptResult::TrackingDownloads { topics });
        }
        Err(error) => {
            ctx.metrics.increment_attempts_failed();
            error!(
                event = %RecoveryEvent::RecoveryFailed,
                code = error.code.as_str(),
                error = %error,
                "recovery failed"
            );
            ctx.publish(AttemptResult::Failed { error });
        }
    }
}
