//! CLI argument definitions using clap
//!
//! Commands:
//! - storegate serve --config <path> [--secrets <path>] [--in-memory]
//! - storegate check-config --config <path> [--secrets <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// storegate - JSON over HTTP front for Redis counters, HMAC signing and Postgres users
#[derive(Parser, Debug)]
#[command(name = "storegate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./storegate.json")]
        config: PathBuf,

        /// Path to a secrets file merged over the configuration
        #[arg(long)]
        secrets: Option<PathBuf>,

        /// Use in-process stores instead of Redis and Postgres
        #[arg(long)]
        in_memory: bool,
    },

    /// Validate configuration and print it with secrets masked
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./storegate.json")]
        config: PathBuf,

        /// Path to a secrets file merged over the configuration
        #[arg(long)]
        secrets: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["storegate", "serve"]).unwrap();
        match cli.command {
            Command::Serve {
                config,
                secrets,
                in_memory,
            } => {
                assert_eq!(config, PathBuf::from("./storegate.json"));
                assert!(secrets.is_none());
                assert!(!in_memory);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_check_config_with_secrets() {
        let cli = Cli::try_parse_from([
            "storegate",
            "check-config",
            "--config",
            "/etc/storegate.json",
            "--secrets",
            "/run/secrets/storegate.json",
        ])
        .unwrap();
        match cli.command {
            Command::CheckConfig { config, secrets } => {
                assert_eq!(config, PathBuf::from("/etc/storegate.json"));
                assert_eq!(secrets, Some(PathBuf::from("/run/secrets/storegate.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
