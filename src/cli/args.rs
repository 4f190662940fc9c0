//! CLI argument definitions using clap
//!
//! Commands:
//! - tiered-recovery serve --config <path> [--log-format text|json]
//! - tiered-recovery check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::observability::LogFormat;

/// Restore topics from tiered object storage onto a cluster
#[derive(Parser, Debug)]
#[command(name = "tiered-recovery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the recovery service and its admin API
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./tiered-recovery.json")]
        config: PathBuf,

        /// Log output format
        #[arg(long, default_value = "text")]
        log_format: LogFormat,

        /// Override the configured admin API port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./tiered-recovery.json")]
        config: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
