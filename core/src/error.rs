//! Error types for the request pipeline.
//!
//! # Design
//! Every failure of a `do_request` call surfaces as one `Error` variant and is never
//! retried or swallowed. Transport failures are kept opaque (`BoxError`) so
//! callers can downcast to the concrete transport error if they need to.
//! Non-2xx responses land in [`StatusError`], which keeps the raw body so the
//! caller can decode the server's error payload on demand.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::http::BoxError;
use crate::signal::CancelReason;

/// Errors returned by the client pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The request target was the empty string. Detected before any I/O.
    #[error("unable to construct a request from an empty url")]
    EmptyTarget,

    /// The request target is not an absolute URL.
    #[error("invalid request url: {0}")]
    InvalidTarget(#[from] url::ParseError),

    /// The request payload could not be serialized to JSON.
    #[error("failed to encode request payload: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The transport failed, or the response body could not be read.
    #[error("network error: {0}")]
    Network(#[source] BoxError),

    /// The signal fired before the transport completed.
    #[error("request {0}")]
    Cancelled(CancelReason),

    /// The round-trip succeeded but the status was not 2xx.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// The response body could not be parsed into the requested type.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// The client's default transport could not be constructed.
    #[error("failed to build client: {0}")]
    Build(#[source] BoxError),
}

impl Error {
    /// True for both explicit cancellation and deadline expiry.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Cancelled(CancelReason::DeadlineExceeded))
    }

    /// HTTP status of a [`Error::Status`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status(e) => Some(e.status),
            _ => None,
        }
    }
}

/// A non-2xx response: the status code and the fully drained body.
#[derive(Debug, Clone, Error)]
#[error("returned status code => {status}")]
pub struct StatusError {
    pub status: u16,
    pub body: Bytes,
}

impl StatusError {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Parse the error body as JSON, e.g. into the API's error envelope.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
