//! HMAC-SHA512 message signing

use hmac::{Hmac, Mac};
use sha2::Sha512;

use super::{OperationError, OperationResult};
use crate::api::{SignRequest, SignResponse};

type HmacSha512 = Hmac<Sha512>;

/// Lowercase hex of HMAC-SHA512 over `text` keyed with `key`
pub fn hmac_sha512_hex(key: &str, text: &str) -> String {
    let mut mac =
        HmacSha512::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(text.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Stateless signer
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageSigner;

impl MessageSigner {
    pub fn sign(&self, request: Option<SignRequest>) -> OperationResult<SignResponse> {
        let request = request.ok_or(OperationError::InvalidRequest)?;
        Ok(SignResponse {
            hex: hmac_sha512_hex(&request.key, &request.text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_123: &str = "2ea823c645b1baf845ef76096a6d7fa9e568304ba9f7910bd52f01c03eec39cdfeec54e50b86b62ef5bfb9e6ce5c0be747ec13b3a199f9d235e99a36de369a84";

    #[test]
    fn test_known_vector() {
        assert_eq!(hmac_sha512_hex("key", "123"), KEY_123);
    }

    #[test]
    fn test_deterministic_fixed_length_lowercase() {
        let a = hmac_sha512_hex("secret", "hello world");
        let b = hmac_sha512_hex("secret", "hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        assert!(a.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_empty_inputs_are_valid() {
        assert_eq!(hmac_sha512_hex("", "").len(), 128);
        assert_ne!(hmac_sha512_hex("", ""), hmac_sha512_hex("k", ""));
    }

    #[test]
    fn test_sign_request() {
        let response = MessageSigner
            .sign(Some(SignRequest {
                text: "123".to_string(),
                key: "key".to_string(),
            }))
            .unwrap();
        assert_eq!(response.hex, KEY_123);
    }

    #[test]
    fn test_sign_nil_request() {
        assert!(matches!(
            MessageSigner.sign(None),
            Err(OperationError::InvalidRequest)
        ));
    }
}
