//! CLI command implementations
//!
//! `serve` follows a fixed boot sequence: configuration, logging, stores,
//! schema, listener. Stores are closed exactly once on every path after
//! they were opened.

use std::future::Future;
use std::path::Path;

use tracing::{error, warn};

use super::args::Command;
use super::errors::{CliError, CliResult};
use crate::config::ServiceConfig;
use crate::http_server::{DrainOutcome, HttpServer};
use crate::observability::{init_tracing, log_event, log_event_with_detail, Event};
use crate::services::Services;
use crate::store::Stores;

/// Main entry point for CLI
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve {
            config,
            secrets,
            in_memory,
        } => serve(&config, secrets.as_deref(), in_memory),
        Command::CheckConfig { config, secrets } => check_config(&config, secrets.as_deref()),
    }
}

/// Load configuration, connect stores and serve until SIGINT or SIGTERM
pub fn serve(config_path: &Path, secrets_path: Option<&Path>, in_memory: bool) -> CliResult<()> {
    let config = ServiceConfig::load(config_path, secrets_path)?;
    init_tracing(&config.log)?;
    log_event(Event::BootStart);
    log_event_with_detail(Event::ConfigLoaded, config_path.display());

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        let stores = if in_memory {
            warn!("Serving from in-memory stores, nothing is persisted");
            Stores::in_memory()
        } else {
            Stores::connect(&config).await?
        };
        log_event(Event::StoresConnected);

        let result = run_server(&config, &stores, shutdown_signal()).await;
        match &result {
            Err(e) => error!(code = e.code(), error = %e, "Server stopped with an error"),
            Ok(DrainOutcome::Abandoned { in_flight }) => {
                warn!(in_flight, "Closing stores with requests still running")
            }
            Ok(_) => {}
        }

        // Pool close waits for connections the abandoned requests still hold
        stores.close().await;
        log_event(Event::StoresClosed);
        result.map(|_| ())
    })?;

    log_event(Event::ShutdownComplete);
    Ok(())
}

/// Prepare the users table and serve over `stores` until `signal` resolves.
///
/// Does not close the stores; the caller owns them.
pub async fn run_server<S>(
    config: &ServiceConfig,
    stores: &Stores,
    signal: S,
) -> CliResult<DrainOutcome>
where
    S: Future<Output = ()> + Send + 'static,
{
    let services = Services::new(stores, &config.postgres_repo.schema);
    services.users.ensure_table().await?;
    log_event_with_detail(Event::SchemaReady, &config.postgres_repo.schema);

    let server = HttpServer::new(
        config.server.clone(),
        services,
        config.handler.request_body_limit,
    );

    server
        .start(signal)
        .await
        .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
}

/// Validate configuration and print it with secrets masked
pub fn check_config(config_path: &Path, secrets_path: Option<&Path>) -> CliResult<()> {
    let config = ServiceConfig::load(config_path, secrets_path)?;
    let json = serde_json::to_string_pretty(&config.redacted())?;
    println!("{}", json);
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
