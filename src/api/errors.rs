//! # API Errors
//!
//! Every failure is turned into a status code plus a one-line plain text body
//! at the handler boundary.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::body::BodyError;
use super::codec::CodecError;
use crate::services::OperationError;

/// Result type for route handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP boundary errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Route requires a different method
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    /// Oversized, absent or malformed request
    #[error("bad request, err: {0}")]
    BadRequest(String),

    /// Body stream failed mid-read
    #[error("unable to read the body")]
    UnreadableBody,

    // ==================
    // Upstream Errors (5xx)
    // ==================
    /// Domain operation failed
    #[error("failed to process the request, err: {0}")]
    FailedToProcessRequest(String),

    /// Response could not be encoded
    #[error("failed to process the response, err: {0}")]
    FailedToProcessResponse(String),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::BadRequest(_) | ApiError::UnreadableBody => StatusCode::BAD_REQUEST,
            ApiError::FailedToProcessRequest(_) => StatusCode::BAD_GATEWAY,
            ApiError::FailedToProcessResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short category label for logs
    pub fn category(&self) -> &'static str {
        match self {
            ApiError::MethodNotAllowed(_) => "method_not_allowed",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::UnreadableBody => "unreadable_body",
            ApiError::FailedToProcessRequest(_) => "upstream_failure",
            ApiError::FailedToProcessResponse(_) => "encoding_failure",
        }
    }

    /// Plain text body, newline terminated
    pub fn body(&self) -> String {
        format!("{}\n", self)
    }
}

impl From<BodyError> for ApiError {
    fn from(err: BodyError) -> Self {
        match err {
            BodyError::TooLarge => ApiError::BadRequest(err.to_string()),
            BodyError::ReadFailure(_) => ApiError::UnreadableBody,
        }
    }
}

impl From<OperationError> for ApiError {
    fn from(err: OperationError) -> Self {
        ApiError::FailedToProcessRequest(err.to_string())
    }
}

/// Decode failures are client errors, encode failures are ours
impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::MalformedInput(_) => ApiError::BadRequest(err.to_string()),
            CodecError::Unrepresentable(_) => ApiError::FailedToProcessResponse(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status_code(), self.body()).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        response
    }
}
