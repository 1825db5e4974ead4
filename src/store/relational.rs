//! Relational store seam and its Postgres adapter.
//!
//! A transaction is handed out as a boxed [`UserTransaction`]. `commit` and
//! `rollback` consume it, so a transaction can end at most once.

use std::time::Duration;

use futures_util::future::BoxFuture;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use super::StoreResult;
use crate::config::{PostgresConfig, PostgresSecrets};

/// An open transaction able to run the single-row insert
pub trait UserTransaction: Send {
    /// Execute the parameterized insert and return the generated id
    fn insert_returning_id<'a>(
        &'a mut self,
        sql: &'a str,
        name: &'a str,
        age: i32,
    ) -> BoxFuture<'a, StoreResult<i64>>;

    /// Commit the transaction
    fn commit(self: Box<Self>) -> BoxFuture<'static, StoreResult<()>>;

    /// Roll the transaction back
    fn rollback(self: Box<Self>) -> BoxFuture<'static, StoreResult<()>>;
}

/// Relational store with transactions
pub trait RelationalStore: Send + Sync {
    /// Begin a transaction on a pooled connection
    fn begin(&self) -> BoxFuture<'_, StoreResult<Box<dyn UserTransaction>>>;

    /// Execute a statement outside any transaction (schema setup)
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, StoreResult<()>>;

    /// Close the pool, waiting for checked-out connections to come back
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// Postgres-backed relational store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Build the connection pool
    pub async fn connect(config: &PostgresConfig, secrets: &PostgresSecrets) -> StoreResult<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&secrets.user)
            .password(&secrets.password)
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        info!(
            host = %config.host,
            database = %config.database,
            max_connections = config.max_connections,
            "Postgres pool connected"
        );
        Ok(Self { pool })
    }
}

impl RelationalStore for PgStore {
    fn begin(&self) -> BoxFuture<'_, StoreResult<Box<dyn UserTransaction>>> {
        Box::pin(async move {
            let tx = self.pool.begin().await?;
            Ok(Box::new(PgTransaction { tx }) as Box<dyn UserTransaction>)
        })
    }

    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let result = sqlx::query(sql).execute(&self.pool).await?;
            info!(rows = result.rows_affected(), "Statement executed");
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.pool.close().await;
            info!("Postgres pool closed");
        })
    }
}

/// Transaction on a pooled Postgres connection
struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

impl UserTransaction for PgTransaction {
    fn insert_returning_id<'a>(
        &'a mut self,
        sql: &'a str,
        name: &'a str,
        age: i32,
    ) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(async move {
            // SERIAL ids are INT4
            let id: i32 = sqlx::query_scalar(sql)
                .bind(name)
                .bind(age)
                .fetch_one(&mut *self.tx)
                .await?;
            Ok(i64::from(id))
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StoreResult<()>> {
        Box::pin(async move {
            let PgTransaction { tx } = *self;
            tx.commit().await?;
            Ok(())
        })
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, StoreResult<()>> {
        Box::pin(async move {
            let PgTransaction { tx } = *self;
            tx.rollback().await?;
            Ok(())
        })
    }
}
