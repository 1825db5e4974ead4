//! Key-value store seam and its Redis adapter.

use futures_util::future::BoxFuture;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo};
use tracing::info;

use super::StoreResult;
use crate::config::{RedisConfig, RedisSecrets};

/// Key-value store supporting atomic integer increment
pub trait KeyValueStore: Send + Sync {
    /// Add `delta` to the integer stored at `key` and return the new total.
    /// Missing keys start at zero.
    fn incr_by<'a>(&'a self, key: &'a str, delta: i64) -> BoxFuture<'a, StoreResult<i64>>;
}

/// Redis-backed key-value store
///
/// `ConnectionManager` reconnects on its own; that is the only retry policy.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect and verify the server answers `PING`
    pub async fn connect(config: &RedisConfig, secrets: &RedisSecrets) -> StoreResult<Self> {
        let mut info = (config.host.clone(), config.port).into_connection_info()?;
        info.redis.db = config.database;
        info.redis.password = secrets.password.clone();

        let client = redis::Client::open(info)?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!(host = %config.host, port = config.port, db = config.database, "Redis connected");
        Ok(Self { conn })
    }
}

impl KeyValueStore for RedisStore {
    fn incr_by<'a>(&'a self, key: &'a str, delta: i64) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let total: i64 = conn.incr(key, delta).await?;
            Ok(total)
        })
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}
