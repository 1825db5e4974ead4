//! API response types
//!
//! JSON bodies written back on success.

use serde::{Deserialize, Serialize};

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Post-increment total for the requested key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementResponse {
    #[serde(skip_serializing_if = "is_zero")]
    pub value: i64,
}

/// Lowercase hex HMAC-SHA512 digest (always 128 characters)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignResponse {
    pub hex: String,
}

/// Identifier generated for the inserted row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddUserResponse {
    pub id: i64,
}
