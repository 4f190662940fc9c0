//! CLI command implementations

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cluster::LocalCluster;
use crate::config::{RecoveryTaskConfig, ServiceConfig};
use crate::http_server::HttpServer;
use crate::object_store::LocalObjectStore;
use crate::observability::{init_logging, LogFormat, RecoveryEvent};
use crate::recovery::{ClusterHandles, RecoverySettings, ShardStates, TopicRecoveryService};

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Main CLI entry point. The only function main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve {
            config,
            log_format,
            port,
        } => serve(&config, log_format, port),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Print the effective configuration after defaults and validation
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = ServiceConfig::load(config_path)?;
    let task = RecoveryTaskConfig::from_service_config(&config)?;
    let settings = RecoverySettings::from_service_config(&config);

    let summary = serde_json::json!({
        "bucket": task.bucket,
        "cloud_storage_root": config.cloud_storage_root,
        "operation_timeout_ms": task.operation_timeout.as_millis() as u64,
        "initial_backoff_ms": task.backoff.as_millis() as u64,
        "create_topic_timeout_ms": settings.create_topic_timeout.as_millis() as u64,
        "downloads_check_interval_ms": settings.downloads_check_interval.as_millis() as u64,
        "shard_count": config.shard_count,
        "http": config.http,
    });

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &summary)?;
    writeln!(stdout)?;
    Ok(())
}

/// Boot the recovery service against a directory-backed bucket and serve
/// the admin API until interrupted.
pub fn serve(config_path: &Path, log_format: LogFormat, port: Option<u16>) -> CliResult<()> {
    init_logging(log_format);

    let mut config = ServiceConfig::load(config_path)?;
    if let Some(port) = port {
        config.http.port = port;
    }

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(serve_async(config))
}

async fn serve_async(config: ServiceConfig) -> CliResult<()> {
    info!(
        event = %RecoveryEvent::ServiceStart,
        root = %config.cloud_storage_root.display(),
        shards = config.shard_count,
        "starting topic recovery service"
    );

    let store = Arc::new(LocalObjectStore::new(config.cloud_storage_root.clone()));
    let states = ShardStates::new(config.shard_count);
    let cluster = Arc::new(LocalCluster::new());
    cluster.attach_local_states(states.clone());

    let service = TopicRecoveryService::from_service_config(
        &config,
        store,
        ClusterHandles::from_single(cluster),
        states,
    )?;

    let shutdown = CancellationToken::new();
    let server = HttpServer::new(config.http.clone(), service.clone());
    let server_shutdown = shutdown.clone();
    let server_task = tokio::spawn(async move {
        server
            .start(async move { server_shutdown.cancelled().await })
            .await
    });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
        }
        _ = shutdown.cancelled() => {}
    }

    info!(event = %RecoveryEvent::ShutdownStart, "shutting down");
    shutdown.cancel();
    service.shutdown_recovery();
    service.stop().await;

    let served = match server_task.await {
        Ok(result) => result.map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e))),
        Err(e) => Err(CliError::boot_failed(format!("HTTP server task failed: {}", e))),
    };
    if let Err(e) = &served {
        error!(error = %e, "admin API exited with an error");
    }

    info!(event = %RecoveryEvent::ShutdownComplete, "shutdown complete");
    served
}
