//! Recovery counters
//!
//! Monotonic counters, reset only on process start. Relaxed ordering is
//! enough: readers only need eventually exact totals.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct RecoveryMetrics {
    attempts_started: AtomicU64,
    attempts_rejected: AtomicU64,
    attempts_completed: AtomicU64,
    attempts_failed: AtomicU64,
    topics_created: AtomicU64,
    topic_creation_failures: AtomicU64,
    markers_processed: AtomicU64,
    download_checks: AtomicU64,
}

impl RecoveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_attempts_started(&self) {
        self.attempts_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Request refused with a conflict
    pub fn increment_attempts_rejected(&self) {
        self.attempts_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_attempts_completed(&self) {
        self.attempts_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_attempts_failed(&self) {
        self.attempts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_topics_created(&self, n: u64) {
        self.topics_created.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_topic_creation_failures(&self, n: u64) {
        self.topic_creation_failures.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_markers_processed(&self, n: u64) {
        self.markers_processed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment_download_checks(&self) {
        self.download_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempts_started: self.attempts_started.load(Ordering::Relaxed),
            attempts_rejected: self.attempts_rejected.load(Ordering::Relaxed),
            attempts_completed: self.attempts_completed.load(Ordering::Relaxed),
            attempts_failed: self.attempts_failed.load(Ordering::Relaxed),
            topics_created: self.topics_created.load(Ordering::Relaxed),
            topic_creation_failures: self.topic_creation_failures.load(Ordering::Relaxed),
            markers_processed: self.markers_processed.load(Ordering::Relaxed),
            download_checks: self.download_checks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub attempts_started: u64,
    pub attempts_rejected: u64,
    pub attempts_completed: u64,
    pub attempts_failed: u64,
    pub topics_created: u64,
    pub topic_creation_failures: u64,
    pub markers_processed: u64,
    pub download_checks: u64,
}
