//! API layer for storegate
//!
//! Wire-level building blocks shared by every route:
//!
//! - bounded body reading
//! - generic JSON decode/encode
//! - request and response shapes
//! - mapping of failures to status codes and text bodies

pub mod body;
pub mod codec;
mod errors;
mod request;
mod response;

pub use body::{read_bounded, BodyError};
pub use codec::{decode, encode, CodecError};
pub use errors::{ApiError, ApiResult};
pub use request::{AddUserRequest, IncrementRequest, SignRequest};
pub use response::{AddUserResponse, IncrementResponse, SignResponse};
