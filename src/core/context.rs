//! Request Context
//!
//! Context carried from the route handler into the domain operations.
//! Holds the request id used in log spans and the cancellation scope every
//! store call is bound to.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::store::{StoreError, StoreResult};

/// Context carried through one request
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request ID for tracing
    pub request_id: Uuid,

    /// Cancelled when the server gives up on in-flight work
    cancel: CancellationToken,

    /// Optional per-request deadline
    deadline: Option<tokio::time::Instant>,

    /// Start time for duration tracking
    started_at: Instant,
}

impl RequestContext {
    /// Create a new request context bound to `cancel`
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancel,
            deadline: None,
            started_at: Instant::now(),
        }
    }

    /// Create a context that is only cancelled explicitly
    pub fn detached() -> Self {
        Self::new(CancellationToken::new())
    }

    /// Bound every store call made under this context by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(tokio::time::Instant::now() + timeout);
        self
    }

    /// Abort outstanding store calls
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check whether the context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    /// Run a store call, aborting it on cancellation or deadline.
    ///
    /// The call is dropped at the first of the two, which releases whatever
    /// it was holding, and the caller sees `StoreError::Interrupted`.
    pub async fn run<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Interrupted("request cancelled")),
            _ = deadline => Err(StoreError::Interrupted("deadline exceeded")),
            result = call => result,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let ctx = RequestContext::detached();
        let result = ctx.run(async { Ok::<_, StoreError>(25) }).await;
        assert_eq!(result.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_cancelled_context_never_polls_call() {
        let ctx = RequestContext::detached();
        ctx.cancel();

        let mut polled = false;
        let result = ctx
            .run(async {
                polled = true;
                Ok::<_, StoreError>(1)
            })
            .await;

        assert!(matches!(result, Err(StoreError::Interrupted("request cancelled"))));
        assert!(!polled);
    }

    #[tokio::test]
    async fn test_cancel_aborts_pending_call() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new(token.child_token());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let result = ctx
            .run(std::future::pending::<StoreResult<i64>>())
            .await;
        assert!(matches!(result, Err(StoreError::Interrupted(_))));
        assert!(ctx.is_cancelled());
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let ctx = RequestContext::detached().with_timeout(Duration::from_millis(10));
        let result = ctx
            .run(std::future::pending::<StoreResult<i64>>())
            .await;
        assert!(matches!(result, Err(StoreError::Interrupted("deadline exceeded"))));
    }

    #[test]
    fn test_contexts_have_distinct_ids() {
        let a = RequestContext::detached();
        let b = RequestContext::detached();
        assert_ne!(a.request_id, b.request_id);
    }
}
