//! # HTTP Server Module
//!
//! Admin API for triggering and observing topic recovery.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/v1/cloud_storage/automated_recovery` - Start (POST) or inspect (GET)

pub mod config;
pub mod recovery_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use recovery_routes::{health_routes, recovery_routes, AUTOMATED_RECOVERY_PATH};
pub use server::HttpServer;
