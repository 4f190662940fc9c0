//! Retry envelope for remote calls
//!
//! Every network operation performed during a recovery is wrapped in a
//! [`RetryChain`]: exponential backoff with jitter, bounded by an absolute
//! deadline, and interrupted promptly when the process abort token fires.
//!
//! Errors decide for themselves whether another attempt is worthwhile via
//! [`Retryable`]. A non-retryable error ends the chain immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cap on backoff growth, as a multiple of the base backoff
const MAX_BACKOFF_MULTIPLIER: u32 = 32;

/// Classifies an error as transient or terminal
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Terminal outcome of a retried operation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The abort token fired before the operation succeeded
    #[error("operation cancelled")]
    Cancelled,

    /// The deadline passed while the operation was still failing
    #[error("timed out after {attempts} attempt(s): {last_error}")]
    TimedOut { attempts: u32, last_error: String },

    /// The operation failed with a non-retryable error
    #[error("{0}")]
    Failed(E),
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RetryError::TimedOut { .. })
    }

    /// Map the inner error, preserving cancellation and timeout
    pub fn map_err<F, O>(self, f: O) -> RetryError<F>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            RetryError::Cancelled => RetryError::Cancelled,
            RetryError::TimedOut {
                attempts,
                last_error,
            } => RetryError::TimedOut {
                attempts,
                last_error,
            },
            RetryError::Failed(e) => RetryError::Failed(f(e)),
        }
    }
}

/// Bounded retry policy for a single logical operation.
///
/// The deadline is fixed when the chain is created, so every attempt and
/// every backoff sleep draws from the same time budget.
#[derive(Debug, Clone)]
pub struct RetryChain {
    abort: CancellationToken,
    deadline: Instant,
    backoff: Duration,
    max_backoff: Duration,
}

impl RetryChain {
    /// Create a chain that gives up after `timeout` and starts backing off at
    /// `backoff`.
    pub fn new(abort: CancellationToken, timeout: Duration, backoff: Duration) -> Self {
        Self {
            abort,
            deadline: Instant::now() + timeout,
            backoff,
            max_backoff: backoff.saturating_mul(MAX_BACKOFF_MULTIPLIER),
        }
    }

    /// Override the backoff ceiling
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff.max(self.backoff);
        self
    }

    /// Whether the abort token has fired
    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Run `op` until it succeeds, fails terminally, runs out of time or is
    /// cancelled.
    pub async fn retry<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0u32;
        let mut backoff = self.backoff;

        loop {
            if self.abort.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            attempts += 1;

            let outcome = tokio::select! {
                biased;
                _ = self.abort.cancelled() => return Err(RetryError::Cancelled),
                r = tokio::time::timeout_at(self.deadline, op()) => r,
            };

            let last_error = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_retryable() => return Err(RetryError::Failed(e)),
                Ok(Err(e)) => e.to_string(),
                Err(_) => {
                    return Err(RetryError::TimedOut {
                        attempts,
                        last_error: "attempt did not complete before the deadline".to_string(),
                    })
                }
            };

            let delay = backoff + jitter(backoff);
            if Instant::now() + delay >= self.deadline {
                return Err(RetryError::TimedOut {
                    attempts,
                    last_error,
                });
            }

            debug!(
                operation,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "retrying after transient failure"
            );

            tokio::select! {
                biased;
                _ = self.abort.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            backoff = backoff.saturating_mul(2).min(self.max_backoff);
        }
    }
}

/// Reusable recipe for [`RetryChain`]s.
///
/// A policy is cheap to clone and carries no deadline; each call to
/// [`RetryPolicy::chain`] starts a fresh time budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    abort: CancellationToken,
    timeout: Duration,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(abort: CancellationToken, timeout: Duration, backoff: Duration) -> Self {
        Self {
            abort,
            timeout,
            backoff,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn abort_token(&self) -> &CancellationToken {
        &self.abort
    }

    /// Start a chain whose deadline is `timeout` from now
    pub fn chain(&self) -> RetryChain {
        RetryChain::new(self.abort.clone(), self.timeout, self.backoff)
    }

    /// Same policy with the timeout multiplied by `multiplier`.
    ///
    /// Bucket listings page through many objects and get a longer budget.
    pub fn scaled(&self, multiplier: u32) -> Self {
        Self {
            abort: self.abort.clone(),
            timeout: self.timeout.saturating_mul(multiplier),
            backoff: self.backoff,
        }
    }
}

/// Random jitter in `[0, backoff / 2]`
fn jitter(backoff: Duration) -> Duration {
    let max_ms = (backoff.as_millis() / 2) as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn chain(token: &CancellationToken, timeout_ms: u64) -> RetryChain {
        RetryChain::new(
            token.clone(),
            Duration::from_millis(timeout_ms),
            Duration::from_millis(10),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&calls);
        let result = chain(&token, 10_000)
            .retry("op", || {
                let c = Arc::clone(&c);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TestError::Transient)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_immediately() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&calls);
        let result: Result<(), _> = chain(&token, 10_000)
            .retry("op", || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Fatal)
                }
            })
            .await;

        assert_eq!(result, Err(RetryError::Failed(TestError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_on_persistent_failure() {
        let token = CancellationToken::new();

        let result: Result<(), _> = chain(&token, 500)
            .retry("op", || async { Err(TestError::Transient) })
            .await;

        match result {
            Err(RetryError::TimedOut {
                attempts,
                last_error,
            }) => {
                assert!(attempts > 1);
                assert_eq!(last_error, "Transient");
            }
            other => panic!("expected TimedOut, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_is_bounded_by_deadline() {
        let token = CancellationToken::new();

        let result: Result<(), RetryError<TestError>> = chain(&token, 100)
            .retry("op", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let token = CancellationToken::new();
        let retry = RetryChain::new(
            token.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );

        let handle = tokio::spawn(async move {
            retry
                .retry("op", || async { Err::<(), _>(TestError::Transient) })
                .await
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        token.cancel();

        let result = handle.await.unwrap();
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError<TestError>> = chain(&token, 1000)
            .retry("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            let j = jitter(Duration::from_millis(100));
            assert!(j <= Duration::from_millis(50));
        }
        assert_eq!(jitter(Duration::from_millis(1)), Duration::ZERO);
    }

    #[test]
    fn test_policy_scaled_keeps_backoff() {
        let policy = RetryPolicy::new(
            CancellationToken::new(),
            Duration::from_secs(10),
            Duration::from_millis(100),
        );
        let scaled = policy.scaled(10);

        assert_eq!(scaled.timeout(), Duration::from_secs(100));
        assert_eq!(scaled.backoff(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_policy_chain_shares_abort_token() {
        let token = CancellationToken::new();
        let policy = RetryPolicy::new(token.clone(), Duration::from_secs(1), Duration::from_millis(1));
        let chain = policy.chain();

        assert!(!chain.is_aborted());
        token.cancel();
        assert!(chain.is_aborted());
    }

    #[test]
    fn test_map_err_preserves_variants() {
        let e: RetryError<u8> = RetryError::Failed(1);
        assert_eq!(e.map_err(|v| v + 1), RetryError::Failed(2));

        let e: RetryError<u8> = RetryError::Cancelled;
        assert_eq!(e.map_err(|v| v as u16), RetryError::Cancelled);
    }
}
