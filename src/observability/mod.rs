//! Observability for storegate
//!
//! Structured logging through `tracing`, plus typed lifecycle events.
//!
//! # Usage
//!
//! ```ignore
//! use storegate::observability::{init_tracing, log_event, Event};
//!
//! init_tracing(&config.log)?;
//! log_event(Event::BootStart);
//! ```

mod events;

pub use events::Event;

use std::fmt::Display;

use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Observability errors. Never fatal to request handling.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Result type for observability operations
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config.level` is the filter.
pub fn init_tracing(config: &LogConfig) -> ObservabilityResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            ObservabilityError::InvalidFilter {
                directive: config.level.clone(),
                reason: e.to_string(),
            }
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ObservabilityError::Install(e.to_string()))
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    if event.is_warning() {
        warn!(event = event.as_str(), "Lifecycle");
    } else {
        info!(event = event.as_str(), "Lifecycle");
    }
}

/// Log a lifecycle event with a detail field
pub fn log_event_with_detail(event: Event, detail: impl Display) {
    if event.is_warning() {
        warn!(event = event.as_str(), detail = %detail, "Lifecycle");
    } else {
        info!(event = event.as_str(), detail = %detail, "Lifecycle");
    }
}
