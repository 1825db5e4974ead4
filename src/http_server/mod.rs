//! # storegate HTTP Server Module
//!
//! Axum server exposing the three service routes behind the validation chain,
//! plus a health check.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/redis/incr` - Counter increment
//! - `/sign/hmacsha512` - HMAC-SHA512 signing
//! - `/postgres/users` - User registration

pub mod config;
pub mod observability_routes;
pub mod routes;
pub mod server;

pub use config::HttpServerConfig;
pub use routes::{service_routes, ServiceState, INCR_ROUTE, SIGN_ROUTE, USERS_ROUTE};
pub use server::{DrainOutcome, HttpServer};
