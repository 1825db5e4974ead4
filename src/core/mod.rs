//! # Core Module
//!
//! Request-scoped plumbing shared by every route: the validation pipeline
//! that runs ahead of business logic, and the context that binds store calls
//! to the request's cancellation scope.

pub mod context;
pub mod middleware;
pub mod pipeline;

pub use context::RequestContext;
pub use middleware::{MethodCheck, NotNilRequest};
pub use pipeline::{Stage, ValidationChain};
