//! Validation Pipeline
//!
//! Ordered checks applied to a request head before any business logic runs.
//! Each stage either lets the request continue or short-circuits with the
//! error that becomes the response.

use std::sync::Arc;

use axum::http::request::Parts;
use axum::http::Method;
use tracing::debug;

use super::middleware::{MethodCheck, NotNilRequest};
use crate::api::ApiResult;

/// A single validation stage
///
/// `request` is `None` when no request reached the chain at all.
pub trait Stage: Send + Sync {
    /// Stage name for logs
    fn name(&self) -> &'static str;

    /// Check the request, returning the rejection if it must not continue
    fn check(&self, request: Option<&Parts>) -> ApiResult<()>;
}

/// Fixed-order runner over validation stages
#[derive(Clone, Default)]
pub struct ValidationChain {
    stages: Vec<Arc<dyn Stage>>,
}

impl ValidationChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Standard chain for a route: method check first, then the nil guard
    pub fn for_method(method: Method) -> Self {
        Self::new()
            .with(MethodCheck::new(method))
            .with(NotNilRequest)
    }

    /// Append a stage
    pub fn with(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Run stages in order, stopping at the first rejection
    pub fn run(&self, request: Option<&Parts>) -> ApiResult<()> {
        for stage in &self.stages {
            if let Err(err) = stage.check(request) {
                debug!(stage = stage.name(), error = %err, "Request rejected");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Get the number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check whether the chain has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl std::fmt::Debug for ValidationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationChain")
            .field("stages", &self.stage_names())
            .finish()
    }
}
