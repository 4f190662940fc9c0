//! # Service Configuration
//!
//! JSON configuration file. Every field except the bucket has a default;
//! the bucket is only required once a recovery service is built.
//!
//! ```json
//! {
//!     "cloud_storage_bucket": "archive",
//!     "cloud_storage_root": "/var/lib/tiered-recovery/buckets",
//!     "http": {"port": 9644}
//! }
//! ```

pub mod errors;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use errors::{ConfigError, ConfigResult};

use crate::http_server::HttpServerConfig;
use crate::recovery::RetentionDefaults;

/// Environment variable overriding the download check interval, in ms
pub const DOWNLOADS_CHECK_INTERVAL_ENV: &str = "TIERED_RECOVERY_DL_CHECK_MILLIS";

/// Default download check interval
pub const DEFAULT_DOWNLOADS_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Bucket holding the tiered-storage data
    #[serde(default)]
    pub cloud_storage_bucket: Option<String>,

    /// Directory whose subdirectories are buckets (local object store)
    #[serde(default = "default_cloud_storage_root")]
    pub cloud_storage_root: PathBuf,

    /// Deadline for one retried object store operation
    #[serde(default = "default_manifest_upload_timeout_ms")]
    pub cloud_storage_manifest_upload_timeout_ms: u64,

    /// Initial backoff between object store retries
    #[serde(default = "default_initial_backoff_ms")]
    pub cloud_storage_upload_loop_initial_backoff_ms: u64,

    #[serde(default = "default_create_topic_timeout_ms")]
    pub create_topic_timeout_ms: u64,

    /// Local retention target set on topics while they are recovering
    #[serde(default = "default_temporary_retention_bytes")]
    pub cloud_storage_recovery_temporary_retention_bytes_default: u64,

    /// Local retention restored once recovery completes
    #[serde(default = "default_retention_local_target_ms")]
    pub retention_local_target_ms_default: u64,

    #[serde(default)]
    pub retention_local_target_bytes_default: Option<u64>,

    /// Download check interval; the environment variable takes precedence
    #[serde(default = "default_downloads_check_interval_ms")]
    pub downloads_check_interval_ms: u64,

    #[serde(default = "default_shard_count")]
    pub shard_count: usize,

    #[serde(default)]
    pub http: HttpServerConfig,
}

fn default_cloud_storage_root() -> PathBuf {
    PathBuf::from("./buckets")
}
fn default_manifest_upload_timeout_ms() -> u64 {
    10_000
}
fn default_initial_backoff_ms() -> u64 {
    100
}
fn default_create_topic_timeout_ms() -> u64 {
    2_000
}
fn default_temporary_retention_bytes() -> u64 {
    1 << 30
} // 1GiB
fn default_retention_local_target_ms() -> u64 {
    24 * 60 * 60 * 1000
} // 24h
fn default_downloads_check_interval_ms() -> u64 {
    DEFAULT_DOWNLOADS_CHECK_INTERVAL.as_millis() as u64
}
fn default_shard_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cloud_storage_bucket: None,
            cloud_storage_root: default_cloud_storage_root(),
            cloud_storage_manifest_upload_timeout_ms: default_manifest_upload_timeout_ms(),
            cloud_storage_upload_loop_initial_backoff_ms: default_initial_backoff_ms(),
            create_topic_timeout_ms: default_create_topic_timeout_ms(),
            cloud_storage_recovery_temporary_retention_bytes_default:
                default_temporary_retention_bytes(),
            retention_local_target_ms_default: default_retention_local_target_ms(),
            retention_local_target_bytes_default: None,
            downloads_check_interval_ms: default_downloads_check_interval_ms(),
            shard_count: default_shard_count(),
            http: HttpServerConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        let config = Self::from_json(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(bucket) = &self.cloud_storage_bucket {
            if bucket.is_empty() || bucket.contains('/') {
                return Err(ConfigError::invalid(
                    "cloud_storage_bucket",
                    format!("'{}' is not a valid bucket name", bucket),
                ));
            }
        }
        if self.cloud_storage_manifest_upload_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "cloud_storage_manifest_upload_timeout_ms",
                "must be > 0",
            ));
        }
        if self.create_topic_timeout_ms == 0 {
            return Err(ConfigError::invalid("create_topic_timeout_ms", "must be > 0"));
        }
        if self.downloads_check_interval_ms == 0 {
            return Err(ConfigError::invalid("downloads_check_interval_ms", "must be > 0"));
        }
        if self.shard_count == 0 {
            return Err(ConfigError::invalid("shard_count", "must be > 0"));
        }
        Ok(())
    }

    pub fn create_topic_timeout(&self) -> Duration {
        Duration::from_millis(self.create_topic_timeout_ms)
    }

    pub fn retention_defaults(&self) -> RetentionDefaults {
        RetentionDefaults {
            local_target_ms: Duration::from_millis(self.retention_local_target_ms_default),
            local_target_bytes: self.retention_local_target_bytes_default,
        }
    }

    /// Check interval after applying the environment override
    pub fn downloads_check_interval(&self) -> Duration {
        let fallback = Duration::from_millis(self.downloads_check_interval_ms);
        let raw = std::env::var(DOWNLOADS_CHECK_INTERVAL_ENV).ok();
        parse_check_interval(raw.as_deref(), fallback)
    }
}

/// Interpret the interval override. Unparsable values fall back with a
/// warning.
pub fn parse_check_interval(raw: Option<&str>, fallback: Duration) -> Duration {
    let Some(raw) = raw else {
        return fallback;
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Duration::from_millis(ms),
        _ => {
            warn!(
                variable = DOWNLOADS_CHECK_INTERVAL_ENV,
                value = raw,
                fallback_ms = fallback.as_millis() as u64,
                "ignoring invalid download check interval override"
            );
            fallback
        }
    }
}

/// Settings for the retry envelope of every recovery network call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryTaskConfig {
    pub bucket: String,
    pub operation_timeout: Duration,
    pub backoff: Duration,
}

impl RecoveryTaskConfig {
    pub fn from_service_config(config: &ServiceConfig) -> ConfigResult<Self> {
        let bucket = config
            .cloud_storage_bucket
            .clone()
            .ok_or(ConfigError::MissingProperty("cloud_storage_bucket"))?;

        Ok(Self {
            bucket,
            operation_timeout: Duration::from_millis(
                config.cloud_storage_manifest_upload_timeout_ms,
            ),
            backoff: Duration::from_millis(config.cloud_storage_upload_loop_initial_backoff_ms),
        })
    }
}
