//! Lifecycle events for storegate
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable process lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot
    /// Process startup begins
    BootStart,
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Store clients connected
    StoresConnected,
    /// Users table exists
    SchemaReady,
    /// Listener bound, accepting requests
    ServerListening,

    // Shutdown
    /// Shutdown signal received
    ShutdownStart,
    /// In-flight requests did not drain in time
    DrainTimeout,
    /// Requests still running after the abort grace period
    DrainAbandoned,
    /// Store clients released
    StoresClosed,
    /// Process about to exit
    ShutdownComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "BOOT_START",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::StoresConnected => "STORES_CONNECTED",
            Event::SchemaReady => "SCHEMA_READY",
            Event::ServerListening => "SERVER_LISTENING",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::DrainTimeout => "DRAIN_TIMEOUT",
            Event::DrainAbandoned => "DRAIN_ABANDONED",
            Event::StoresClosed => "STORES_CLOSED",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
        }
    }

    /// Returns true if the event is logged at warn level
    pub fn is_warning(&self) -> bool {
        matches!(self, Event::DrainTimeout | Event::DrainAbandoned)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
