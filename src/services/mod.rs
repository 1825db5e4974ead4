//! Domain operations
//!
//! The three operations behind the routes. Each takes its request as an
//! `Option` and rejects `None` with [`OperationError::InvalidRequest`] before
//! touching a store.

mod counter;
mod signer;
mod users;

pub use counter::CounterService;
pub use signer::{hmac_sha512_hex, MessageSigner};
pub use users::{TransactionError, TxState, UserRegistrar};

use thiserror::Error;

use crate::store::{StoreError, Stores};

/// Result type for domain operations
pub type OperationResult<T> = Result<T, OperationError>;

/// Domain operation errors
#[derive(Debug, Error)]
pub enum OperationError {
    /// Request object was absent
    #[error("nil request")]
    InvalidRequest,

    /// Store call failed or was interrupted
    #[error("{0}")]
    Upstream(#[from] StoreError),

    #[error("{0}")]
    Transaction(#[from] TransactionError),
}

/// The operations wired to one set of stores
#[derive(Debug, Clone)]
pub struct Services {
    pub counter: CounterService,
    pub signer: MessageSigner,
    pub users: UserRegistrar,
}

impl Services {
    /// Build every operation over `stores`, with the users table in `schema`
    pub fn new(stores: &Stores, schema: &str) -> Self {
        Self {
            counter: CounterService::new(stores.kv.clone()),
            signer: MessageSigner,
            users: UserRegistrar::new(stores.relational.clone(), schema),
        }
    }
}
