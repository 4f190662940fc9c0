//! Download Tracker
//!
//! A recurring background check for partition download completion. The timer
//! and the check are separate tasks: cancelling the timer never interrupts a
//! check that already started. Checks are serialized by a single-permit
//! semaphore, so two overlapping firings can never process the same markers
//! concurrently.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

/// Result of one completion check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No recovery is waiting for downloads
    Idle,
    /// Downloads still pending, check again later
    Pending,
    /// All downloads accounted for and the attempt finalized
    Complete,
}

/// The work performed on every firing
#[async_trait]
pub trait DownloadCheck: Send + Sync + 'static {
    async fn check_for_downloads(&self) -> CheckOutcome;
}

#[derive(Debug)]
struct Inner {
    interval: Duration,
    timer: Mutex<Option<AbortHandle>>,
    permit: Semaphore,
    tasks: TaskTracker,
    abort: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct DownloadTracker {
    inner: Arc<Inner>,
}

impl DownloadTracker {
    /// Tasks are spawned on `tasks` so that shutdown can wait for them.
    /// Nothing is armed once `abort` fires or `tasks` is closed.
    pub fn new(interval: Duration, tasks: TaskTracker, abort: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                interval,
                timer: Mutex::new(None),
                permit: Semaphore::new(1),
                tasks,
                abort,
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    fn timer(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.inner
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Schedule a check one interval from now, replacing any armed timer.
    ///
    /// Returns `false` if the tracker is shutting down.
    pub fn arm(&self, check: Arc<dyn DownloadCheck>) -> bool {
        let mut timer = self.timer();
        if self.inner.tasks.is_closed() || self.inner.abort.is_cancelled() {
            debug!("not arming download check, shutting down");
            return false;
        }
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let tracker = self.clone();
        let handle = self.inner.tasks.spawn(async move {
            tokio::time::sleep(tracker.inner.interval).await;
            let firing = tracker.clone();
            tracker.inner.tasks.spawn(async move { firing.fire(check).await });
        });

        *timer = Some(handle.abort_handle());
        trace!(interval_ms = self.inner.interval.as_millis() as u64, "download check armed");
        true
    }

    /// Cancel the armed timer. Returns whether a timer was pending.
    pub fn cancel(&self) -> bool {
        match self.timer().take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    /// Whether a timer is pending
    pub fn is_armed(&self) -> bool {
        self.timer().as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Run one check now, serialized with timer firings. Does not re-arm.
    pub async fn check_now(&self, check: &dyn DownloadCheck) -> CheckOutcome {
        let Ok(_permit) = self.inner.permit.acquire().await else {
            return CheckOutcome::Idle;
        };
        check.check_for_downloads().await
    }

    async fn fire(&self, check: Arc<dyn DownloadCheck>) {
        let outcome = self.check_now(check.as_ref()).await;
        trace!(?outcome, "download check finished");
        if outcome == CheckOutcome::Pending {
            self.arm(check);
        }
    }
}
