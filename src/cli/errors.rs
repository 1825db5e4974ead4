//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use thiserror::Error;

use crate::config::ConfigError;
use crate::observability::ObservabilityError;
use crate::store::StoreError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    #[error("STOREGATE_CLI_CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),

    #[error("STOREGATE_CLI_LOGGING_ERROR: {0}")]
    Logging(#[from] ObservabilityError),

    #[error("STOREGATE_CLI_STORE_ERROR: {0}")]
    Store(#[from] StoreError),

    #[error("STOREGATE_CLI_IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("STOREGATE_CLI_BOOT_FAILED: {0}")]
    BootFailed(String),
}

impl CliError {
    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::BootFailed(msg.into())
    }

    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "STOREGATE_CLI_CONFIG_ERROR",
            Self::Logging(_) => "STOREGATE_CLI_LOGGING_ERROR",
            Self::Store(_) => "STOREGATE_CLI_STORE_ERROR",
            Self::Io(_) => "STOREGATE_CLI_IO_ERROR",
            Self::BootFailed(_) => "STOREGATE_CLI_BOOT_FAILED",
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::BootFailed(format!("JSON error: {}", e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_starts_with_code() {
        let err = CliError::boot_failed("no runtime");
        assert_eq!(err.code(), "STOREGATE_CLI_BOOT_FAILED");
        assert_eq!(err.to_string(), "STOREGATE_CLI_BOOT_FAILED: no runtime");
    }

    #[test]
    fn test_store_error_converts() {
        let err = CliError::from(StoreError::Unavailable("down".to_string()));
        assert_eq!(err.code(), "STOREGATE_CLI_STORE_ERROR");
        assert!(err.to_string().ends_with("store unavailable: down"));
    }
}
