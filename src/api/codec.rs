//! JSON codec
//!
//! Generic bytes <-> value conversion used by every route. Decoding is all or
//! nothing: a value is never partially populated.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Codec failures
#[derive(Debug, Error)]
pub enum CodecError {
    /// Input bytes are not a valid encoding of the target shape
    #[error("failed to unmarshal: {0}")]
    MalformedInput(#[source] serde_json::Error),

    /// Value cannot be represented as JSON
    #[error("failed to marshal: {0}")]
    Unrepresentable(#[source] serde_json::Error),
}

/// Decode `bytes` into a `T`.
///
/// An empty byte sequence and the literal `null` are both read as the empty
/// object `{}`, so request structs come back zero-valued instead of failing.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let bytes = if bytes.is_empty() || is_null(bytes) {
        b"{}".as_slice()
    } else {
        bytes
    };
    serde_json::from_slice(bytes).map_err(CodecError::MalformedInput)
}

fn is_null(bytes: &[u8]) -> bool {
    matches!(std::str::from_utf8(bytes).map(str::trim), Ok("null"))
}

/// Encode `value` as compact JSON.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(CodecError::Unrepresentable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::request::{AddUserRequest, IncrementRequest};
    use crate::api::response::{AddUserResponse, IncrementResponse, SignResponse};
    use serde::Serializer;

    /// Stands in for a field holding a live handle.
    struct Handle;

    impl Serialize for Handle {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("handle cannot be represented"))
        }
    }

    #[derive(Serialize)]
    struct WithHandle {
        handle: Handle,
    }

    #[test]
    fn test_decode_increment_request() {
        let request: IncrementRequest = decode(br#"{"key":"Alex","value":23}"#).unwrap();
        assert_eq!(
            request,
            IncrementRequest {
                key: "Alex".to_string(),
                value: 23
            }
        );
    }

    #[test]
    fn test_decode_add_user_request() {
        let request: AddUserRequest = decode(br#"{"name":"Alex","age":23}"#).unwrap();
        assert_eq!(request.name, "Alex");
        assert_eq!(request.age, 23);
    }

    #[test]
    fn test_empty_input_decodes_to_zero_value() {
        let request: IncrementRequest = decode(b"").unwrap();
        assert_eq!(request, IncrementRequest::default());

        let request: AddUserRequest = decode(&[]).unwrap();
        assert_eq!(request, AddUserRequest::default());
    }

    #[test]
    fn test_empty_input_is_present_for_optional_targets() {
        let request: Option<IncrementRequest> = decode(b"").unwrap();
        assert_eq!(request, Some(IncrementRequest::default()));
    }

    #[test]
    fn test_null_decodes_to_zero_value() {
        let request: IncrementRequest = decode(b"null").unwrap();
        assert_eq!(request, IncrementRequest::default());

        let request: AddUserRequest = decode(b" null\n").unwrap();
        assert_eq!(request, AddUserRequest::default());
    }

    #[test]
    fn test_malformed_input_rejected_whole() {
        let err = decode::<IncrementRequest>(br#"{"key":_egv"#).unwrap_err();
        assert!(matches!(err, CodecError::MalformedInput(_)));
        assert!(err.to_string().starts_with("failed to unmarshal: "));
    }

    #[test]
    fn test_wrong_field_type_rejected() {
        let err = decode::<IncrementRequest>(br#"{"key":"Alex","value":"23"}"#).unwrap_err();
        assert!(matches!(err, CodecError::MalformedInput(_)));
    }

    #[test]
    fn test_encode_response() {
        let bytes = encode(&AddUserResponse { id: 12 }).unwrap();
        assert_eq!(bytes, br#"{"id":12}"#);

        let bytes = encode(&SignResponse {
            hex: "ab".to_string(),
        })
        .unwrap();
        assert_eq!(bytes, br#"{"hex":"ab"}"#);
    }

    #[test]
    fn test_increment_response_round_trip() {
        for value in [i64::MIN, -1, 0, 1, 25, i64::MAX] {
            let original = IncrementResponse { value };
            let decoded: IncrementResponse = decode(&encode(&original).unwrap()).unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn test_unrepresentable_value() {
        let err = encode(&WithHandle { handle: Handle }).unwrap_err();
        assert!(matches!(err, CodecError::Unrepresentable(_)));
        assert!(err.to_string().contains("handle cannot be represented"));
    }
}
