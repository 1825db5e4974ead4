//! User registration
//!
//! One row insert per call, inside its own transaction:
//!
//! ```text
//! Idle -> TxStarted -> RowInserted -> Committed
//!              \
//!               -> RolledBack
//! ```
//!
//! A begin failure ends the call with nothing to undo. An insert failure rolls
//! back, and the rollback's own outcome is only logged. A commit attempt is
//! never followed by a rollback, so each transaction ends in exactly one of the
//! two.
//!
//! Begin and insert are bound to the request's cancellation. Commit and
//! rollback are not: once started they run to completion, bounded only by
//! the registrar's end timeout. An ending cut off by that timeout is dropped,
//! and the Postgres adapter rolls the connection back before returning it to
//! the pool.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::{OperationError, OperationResult};
use crate::api::{AddUserRequest, AddUserResponse};
use crate::core::RequestContext;
use crate::store::{RelationalStore, StoreError, StoreResult};

/// Transaction failures, each carrying the store error that caused it
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("failed to begin transaction: {0}")]
    BeginFailed(#[source] StoreError),

    #[error("failed to insert user: {0}")]
    QueryFailed(#[source] StoreError),

    #[error("failed to commit transaction: {0}")]
    CommitFailed(#[source] StoreError),
}

/// Registration progress, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    TxStarted,
    RowInserted,
    Committed,
    RolledBack,
}

impl TxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Idle => "idle",
            TxState::TxStarted => "tx_started",
            TxState::RowInserted => "row_inserted",
            TxState::Committed => "committed",
            TxState::RolledBack => "rolled_back",
        }
    }
}

/// Default bound on a commit or rollback once it has started
pub const DEFAULT_END_TIMEOUT: Duration = Duration::from_secs(1);

/// Inserts users into `<schema>.users`
#[derive(Clone)]
pub struct UserRegistrar {
    store: Arc<dyn RelationalStore>,
    create_sql: String,
    insert_sql: String,
    end_timeout: Duration,
}

impl UserRegistrar {
    /// `schema` must already be a validated identifier
    pub fn new(store: Arc<dyn RelationalStore>, schema: &str) -> Self {
        Self {
            store,
            create_sql: format!(
                "CREATE TABLE IF NOT EXISTS {}.users (id SERIAL PRIMARY KEY, name TEXT, age INT)",
                schema
            ),
            insert_sql: format!(
                "INSERT INTO {}.users(name, age) VALUES ($1, $2) RETURNING id",
                schema
            ),
            end_timeout: DEFAULT_END_TIMEOUT,
        }
    }

    /// Bound commit and rollback by `timeout` instead of the default
    pub fn with_end_timeout(mut self, timeout: Duration) -> Self {
        self.end_timeout = timeout;
        self
    }

    /// Create the users table if it does not exist yet. Run once at startup.
    pub async fn ensure_table(&self) -> StoreResult<()> {
        self.store.execute(&self.create_sql).await
    }

    /// Insert one user and return its generated id
    pub async fn add_user(
        &self,
        ctx: &RequestContext,
        request: Option<AddUserRequest>,
    ) -> OperationResult<AddUserResponse> {
        let request = request.ok_or(OperationError::InvalidRequest)?;
        transition(ctx, TxState::Idle);

        let mut tx = ctx
            .run(self.store.begin())
            .await
            .map_err(TransactionError::BeginFailed)?;
        transition(ctx, TxState::TxStarted);

        let inserted = ctx
            .run(tx.insert_returning_id(&self.insert_sql, &request.name, request.age))
            .await;
        let id = match inserted {
            Ok(id) => id,
            Err(err) => {
                // The insert may have lost to the deadline, so the rollback
                // gets its own window
                if let Err(rollback_err) =
                    finish(self.end_timeout, "rollback timed out", tx.rollback()).await
                {
                    warn!(
                        request_id = %ctx.request_id,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                transition(ctx, TxState::RolledBack);
                return Err(TransactionError::QueryFailed(err).into());
            }
        };
        transition(ctx, TxState::RowInserted);

        // An in-flight commit is never abandoned on cancellation
        finish(self.end_timeout, "commit timed out", tx.commit())
            .await
            .map_err(TransactionError::CommitFailed)?;
        transition(ctx, TxState::Committed);

        Ok(AddUserResponse { id })
    }
}

/// Run a transaction ending to completion, bounded only by `limit`
async fn finish<F>(limit: Duration, reason: &'static str, call: F) -> StoreResult<()>
where
    F: Future<Output = StoreResult<()>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(StoreError::Interrupted(reason)))
}

fn transition(ctx: &RequestContext, state: TxState) {
    debug!(request_id = %ctx.request_id, state = state.as_str(), "User registration");
}

impl std::fmt::Debug for UserRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRegistrar")
            .field("insert_sql", &self.insert_sql)
            .field("end_timeout", &self.end_timeout)
            .finish_non_exhaustive()
    }
}
