//! CLI module for storegate
//!
//! Provides command-line interface for:
//! - serve: Connect stores and run the HTTP server until signalled
//! - check-config: Validate and print the effective configuration

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check_config, run, run_command, run_server, serve, shutdown_signal};
pub use errors::{CliError, CliResult};
