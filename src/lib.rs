//! storegate - JSON over HTTP front for a Redis counter, HMAC-SHA512 signing
//! and transactional Postgres user inserts
//!
//! Request flow: validation chain, bounded body read, JSON decode, domain
//! operation, JSON encode.

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod http_server;
pub mod observability;
pub mod services;
pub mod store;
