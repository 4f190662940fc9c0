//! Observability for the recovery service
//!
//! - Structured logging through `tracing`, installed by [`init_logging`]
//! - Typed lifecycle events, logged as the `event` field
//! - Monotonic counters exposed through the status endpoint
//!
//! ```ignore
//! use tiered_recovery::observability::RecoveryEvent;
//!
//! tracing::info!(event = %RecoveryEvent::RecoveryStart, "recovery started");
//! ```

mod events;
mod logging;
mod metrics;

pub use events::RecoveryEvent;
pub use logging::{init_logging, LogFormat};
pub use metrics::{MetricsSnapshot, RecoveryMetrics};
