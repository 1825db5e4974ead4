//! Service configuration
//!
//! Loaded once at process start from a JSON base file and an optional JSON
//! secrets file. The secrets document is merged over the base before
//! deserialization, so credentials can live apart from the rest.
//!
//! ```json
//! {
//!   "server": { "host": "0.0.0.0", "port": 8080 },
//!   "handler": { "request_body_limit": 1024 },
//!   "redis": { "host": "localhost", "port": 6379, "database": 0 },
//!   "postgres": { "host": "localhost", "port": 5432, "database": "postgres" },
//!   "postgres_repo": { "schema": "public" }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use crate::http_server::HttpServerConfig;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Request handling limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Maximum request body size in bytes (default: 1024)
    #[serde(default = "default_body_limit")]
    pub request_body_limit: u64,
}

fn default_body_limit() -> u64 {
    1024
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            request_body_limit: default_body_limit(),
        }
    }
}

/// Redis endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            database: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSecrets {
    pub password: Option<String>,
}

/// Postgres endpoint and pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresSecrets {
    pub user: String,
    pub password: String,
}

impl Default for PostgresSecrets {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: String::new(),
        }
    }
}

/// Where the users table lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresRepoConfig {
    pub schema: String,
}

impl Default for PostgresRepoConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: HttpServerConfig,
    pub handler: HandlerConfig,
    pub redis: RedisConfig,
    pub redis_secrets: RedisSecrets,
    pub postgres: PostgresConfig,
    pub postgres_secrets: PostgresSecrets,
    pub postgres_repo: PostgresRepoConfig,
    pub log: LogConfig,
}

impl ServiceConfig {
    /// Load the base file, merge the secrets file over it, then validate
    pub fn load(base: &Path, secrets: Option<&Path>) -> ConfigResult<Self> {
        let mut document = read_json(base)?;
        if let Some(path) = secrets {
            merge(&mut document, read_json(path)?);
        }

        let config: ServiceConfig =
            serde_json::from_value(document).map_err(|source| ConfigError::Parse {
                path: base.display().to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.handler.request_body_limit == 0 {
            return Err(ConfigError::Invalid(
                "handler.request_body_limit must be > 0".to_string(),
            ));
        }

        if self.postgres.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "postgres.max_connections must be > 0".to_string(),
            ));
        }

        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.shutdown_timeout_secs must be > 0".to_string(),
            ));
        }

        // The schema is spliced into SQL text, so only plain identifiers pass
        if !is_identifier(&self.postgres_repo.schema) {
            return Err(ConfigError::Invalid(format!(
                "postgres_repo.schema '{}' is not a valid identifier",
                self.postgres_repo.schema
            )));
        }

        Ok(())
    }

    /// Copy with credentials masked, for printing
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.redis_secrets.password.is_some() {
            config.redis_secrets.password = Some(REDACTED.to_string());
        }
        if !config.postgres_secrets.password.is_empty() {
            config.postgres_secrets.password = REDACTED.to_string();
        }
        config
    }
}

const REDACTED: &str = "********";

fn read_json(path: &Path) -> ConfigResult<Value> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Deep-merge `overlay` into `base`. Objects merge key by key, anything else
/// in the overlay replaces what was there.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.handler.request_body_limit, 1024);
        assert_eq!(config.server.shutdown_timeout_secs, 10);
        assert_eq!(config.postgres_repo.schema, "public");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_merges_secrets() {
        let base = write_file(
            r#"{"handler":{"request_body_limit":2048},"postgres":{"host":"db","database":"app"}}"#,
        );
        let secrets = write_file(
            r#"{"postgres_secrets":{"user":"svc","password":"hunter2"},"postgres":{"host":"db-internal"}}"#,
        );

        let config = ServiceConfig::load(base.path(), Some(secrets.path())).unwrap();
        assert_eq!(config.handler.request_body_limit, 2048);
        assert_eq!(config.postgres.host, "db-internal");
        // Untouched sibling keys survive the merge
        assert_eq!(config.postgres.database, "app");
        assert_eq!(config.postgres_secrets.user, "svc");
        assert_eq!(config.postgres_secrets.password, "hunter2");
    }

    #[test]
    fn test_load_empty_object_uses_defaults() {
        let base = write_file("{}");
        let config = ServiceConfig::load(base.path(), None).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.redis.port, 6379);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ServiceConfig::load(Path::new("/nonexistent/storegate.json"), None).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_invalid_json() {
        let base = write_file("{not json");
        let err = ServiceConfig::load(base.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_body_limit_rejected() {
        let base = write_file(r#"{"handler":{"request_body_limit":0}}"#);
        let err = ServiceConfig::load(base.path(), None).unwrap_err();
        assert!(err.to_string().contains("request_body_limit"));
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let mut config = ServiceConfig::default();
        config.postgres.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_shutdown_timeout_rejected() {
        let mut config = ServiceConfig::default();
        config.server.shutdown_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_schema_must_be_identifier() {
        let mut config = ServiceConfig::default();
        for bad in ["", "1abc", "public; DROP TABLE users", "my-schema", "a.b"] {
            config.postgres_repo.schema = bad.to_string();
            assert!(config.validate().is_err(), "accepted {:?}", bad);
        }
        for good in ["public", "_private", "app_v2"] {
            config.postgres_repo.schema = good.to_string();
            assert!(config.validate().is_ok(), "rejected {:?}", good);
        }
    }

    #[test]
    fn test_merge_replaces_scalars_and_merges_objects() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "d": [1, 2]});
        merge(&mut base, json!({"a": {"b": 10}, "d": [3], "e": true}));
        assert_eq!(base, json!({"a": {"b": 10, "c": 2}, "d": [3], "e": true}));
    }

    #[test]
    fn test_redacted_masks_passwords() {
        let mut config = ServiceConfig::default();
        config.redis_secrets.password = Some("redis-pass".to_string());
        config.postgres_secrets.password = "pg-pass".to_string();

        let printed = serde_json::to_string(&config.redacted()).unwrap();
        assert!(!printed.contains("redis-pass"));
        assert!(!printed.contains("pg-pass"));
        assert_eq!(config.postgres_secrets.password, "pg-pass");
    }
}
