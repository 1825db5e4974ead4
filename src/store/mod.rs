//! Store module
//!
//! Seams for the two external stores the service talks to:
//! - a key-value store with atomic increment (Redis)
//! - a relational store with transactions (Postgres via SQLx)
//!
//! Also provides in-process implementations of both for tests and local runs.
//! The pair of process-wide clients is owned by [`Stores`], which is built
//! once at startup and closed exactly once at shutdown.

pub mod kv;
pub mod memory;
pub mod relational;

pub use kv::{KeyValueStore, RedisStore};
pub use memory::{JournalEntry, MemoryKeyValueStore, MemoryRelationalStore, TxStep, UserRow};
pub use relational::{PgStore, RelationalStore, UserTransaction};

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::ServiceConfig;

/// Result type for store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Call abandoned because the request was cancelled or timed out
    #[error("{0}")]
    Interrupted(&'static str),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Process-wide store clients
pub struct Stores {
    pub kv: Arc<dyn KeyValueStore>,
    pub relational: Arc<dyn RelationalStore>,
}

impl Stores {
    /// Connect to Redis and Postgres using the loaded configuration
    pub async fn connect(config: &ServiceConfig) -> StoreResult<Self> {
        let kv = RedisStore::connect(&config.redis, &config.redis_secrets).await?;
        let relational = PgStore::connect(&config.postgres, &config.postgres_secrets).await?;

        Ok(Self {
            kv: Arc::new(kv),
            relational: Arc::new(relational),
        })
    }

    /// In-process stores, nothing leaves the process
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(MemoryKeyValueStore::new()),
            relational: Arc::new(MemoryRelationalStore::new()),
        }
    }

    /// Release pooled connections. Consumes the clients so this runs once.
    pub async fn close(self) {
        self.relational.close().await;
        drop(self.kv);
        info!("Store connections released");
    }
}
