//! Validation stages
//!
//! The two checks every route runs before touching the body.

use axum::http::request::Parts;
use axum::http::Method;

use super::pipeline::Stage;
use crate::api::{ApiError, ApiResult};

const NIL_REQUEST: &str = "nil request received.";

/// Rejects requests whose method differs from the route's
#[derive(Debug, Clone)]
pub struct MethodCheck {
    method: Method,
}

impl MethodCheck {
    pub fn new(method: Method) -> Self {
        Self { method }
    }

    /// Shorthand for POST-only routes
    pub fn post() -> Self {
        Self::new(Method::POST)
    }
}

impl Stage for MethodCheck {
    fn name(&self) -> &'static str {
        "method_check"
    }

    fn check(&self, request: Option<&Parts>) -> ApiResult<()> {
        // An absent request is left for the nil guard.
        match request {
            Some(parts) if parts.method != self.method => {
                Err(ApiError::MethodNotAllowed(parts.method.clone()))
            }
            _ => Ok(()),
        }
    }
}

/// Rejects absent requests
#[derive(Debug, Clone, Copy, Default)]
pub struct NotNilRequest;

impl Stage for NotNilRequest {
    fn name(&self) -> &'static str {
        "not_nil_request"
    }

    fn check(&self, request: Option<&Parts>) -> ApiResult<()> {
        match request {
            Some(_) => Ok(()),
            None => Err(ApiError::BadRequest(NIL_REQUEST.to_string())),
        }
    }
}
