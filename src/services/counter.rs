//! Counter increment

use std::sync::Arc;

use tracing::debug;

use super::{OperationError, OperationResult};
use crate::api::{IncrementRequest, IncrementResponse};
use crate::core::RequestContext;
use crate::store::KeyValueStore;

/// Atomic add-and-fetch on the key-value store
#[derive(Clone)]
pub struct CounterService {
    store: Arc<dyn KeyValueStore>,
}

impl CounterService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Add `request.value` to the counter at `request.key` and return the new
    /// total. Store failures are surfaced as is, without retry.
    pub async fn inc(
        &self,
        ctx: &RequestContext,
        request: Option<IncrementRequest>,
    ) -> OperationResult<IncrementResponse> {
        let request = request.ok_or(OperationError::InvalidRequest)?;

        let value = ctx
            .run(self.store.incr_by(&request.key, request.value))
            .await?;

        debug!(key = %request.key, delta = request.value, total = value, "Counter incremented");
        Ok(IncrementResponse { value })
    }
}

impl std::fmt::Debug for CounterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterService").finish_non_exhaustive()
    }
}
