//! Transport abstraction: the collaborator that actually talks to the network.
//!
//! # Design
//! A [`TransportFactory`] hands out one fresh [`Transport`] per request
//! attempt. The executor runs `perform` on a background task and may call
//! `abort` concurrently from the caller's side; `abort` must make an
//! in-flight `perform` return promptly. Connection pooling, if any, is a
//! private concern of a transport implementation.

use async_trait::async_trait;
use thiserror::Error;

use crate::http::{BoxError, HttpRequest, HttpResponse};

pub mod fake;
mod reqwest_backend;

pub use reqwest_backend::{ReqwestTransport, ReqwestTransportFactory};

/// Performs prepared requests and can be told to give up on one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response head with a streaming body.
    async fn perform(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError>;

    /// Unblock a concurrent `perform` of `request`. Safe to call at any time.
    fn abort(&self, request: &HttpRequest);

    /// Drop idle pooled connections, if the transport keeps any.
    fn close_idle(&self) {}
}

/// Creates one transport handle per request attempt.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Box<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn() -> Box<dyn Transport> + Send + Sync,
{
    fn create(&self) -> Box<dyn Transport> {
        self()
    }
}

/// Errors raised by the bundled transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `abort` was called while the request was in flight.
    #[error("request aborted")]
    Aborted,

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build transport: {0}")]
    Build(#[source] reqwest::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}
