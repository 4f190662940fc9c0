//! tiered-recovery entry point
//!
//! Parses arguments, dispatches through `cli::run` and exits non-zero on
//! failure. All other work lives in the CLI module.

use tiered_recovery::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
