//! Bounded body reader
//!
//! Reads a request body stream into memory without ever buffering more than
//! the configured ceiling. Bytes past the ceiling are dropped, which leaves a
//! truncated document for the codec to reject.

use std::fmt::Display;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use thiserror::Error;

/// Body reading failures
#[derive(Debug, Error)]
pub enum BodyError {
    /// Declared content length exceeds the ceiling; nothing was read
    #[error("request body is too big")]
    TooLarge,

    /// Underlying stream failed mid-read
    #[error("unable to read the body: {0}")]
    ReadFailure(String),
}

/// Read at most `limit` bytes from `stream`.
///
/// `declared_len` is the length the client announced (`Content-Length`).
/// When it exceeds `limit` the stream is not polled at all.
pub async fn read_bounded<S, B, E>(
    stream: S,
    declared_len: Option<u64>,
    limit: u64,
) -> Result<Bytes, BodyError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    if declared_len.is_some_and(|len| len > limit) {
        return Err(BodyError::TooLarge);
    }

    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let mut stream = std::pin::pin!(stream);
    let mut buf = BytesMut::new();

    while buf.len() < limit {
        let Some(chunk) = stream.next().await else {
            break;
        };
        let chunk = chunk.map_err(|e| BodyError::ReadFailure(e.to_string()))?;
        let chunk = chunk.as_ref();
        let take = chunk.len().min(limit - buf.len());
        buf.extend_from_slice(&chunk[..take]);
    }

    Ok(buf.freeze())
}

/// Parse a `Content-Length` header value
pub fn declared_length(headers: &axum::http::HeaderMap) -> Option<u64> {
    headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}
