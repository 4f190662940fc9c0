//! Command-line interface
//!
//! - serve: boot the recovery service and its admin API
//! - check-config: validate a configuration file

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check_config, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
