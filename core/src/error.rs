//! Error types for request building, transport, and response decoding.
//!
//! # Design
//! Every failure is a value handed back to the caller; nothing is retried or
//! logged here. Variants name the stage that failed. Transport failures keep
//! their own type so callers can match on timeouts and connection errors
//! without string inspection.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by request building, `Client::send`, and response helpers.
#[derive(Debug, Error)]
pub enum Error {
    /// The base URL or request path could not be turned into a URL.
    #[error("{0}")]
    Url(String),

    /// A body could not be serialized, or a response body could not be decoded.
    #[error("{0}")]
    Encoding(String),

    /// Client certificate or key material is unreadable or malformed.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// JSON decoding was attempted on a response that is not JSON.
    #[error("response content-type not json, it is {0}")]
    ContentType(String),

    /// Reading the response body failed part way.
    #[error("read response body error {0}")]
    Io(#[from] std::io::Error),

    /// A request option carried an invalid header name or value.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The client could not be constructed.
    #[error("client build error: {0}")]
    Build(String),

    /// The transport failed to execute the request.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

/// Failures reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("request timeout")]
    Timeout,

    /// The peer could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// Anything else the backend reports, TLS failures included.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}
