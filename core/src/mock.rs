//! Canned [`HttpClient`] for testing code that depends on the client trait.
//!
//! `MockClient` never builds a request or touches a transport: it answers
//! every call with its configured body (decoded into whatever the caller asks
//! for) or its configured failure, and records what was asked.
//!
//! A non-empty body is decoded first, so a body that does not fit the target
//! reports [`Error::Decode`] even when a failure is configured. An empty body
//! is only decoded when no failure is configured; targets that need content
//! (`Json<T>`, `serde_json::Value`) then fail with [`Error::Decode`], so give
//! the mock a body when the caller expects JSON.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::builder::Params;
use crate::client::HttpClient;
use crate::decode::Decode;
use crate::error::{Error, StatusError};
use crate::http::HttpMethod;
use crate::signal::{CancelReason, Signal};
use crate::transport::TransportError;

/// Failure a [`MockClient`] reports instead of decoding its body.
#[derive(Debug, Clone)]
pub enum MockFailure {
    Status(StatusError),
    Cancelled(CancelReason),
    Network(String),
}

impl MockFailure {
    fn to_error(&self) -> Error {
        match self {
            MockFailure::Status(e) => Error::Status(e.clone()),
            MockFailure::Cancelled(reason) => Error::Cancelled(*reason),
            MockFailure::Network(message) => {
                Error::Network(Box::new(TransportError::Other(message.clone())))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockClient {
    body: Bytes,
    failure: Option<MockFailure>,
    calls: Arc<Mutex<Vec<(HttpMethod, String)>>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond with `body` (decoded per call into the requested type).
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, Error> {
        let body = serde_json::to_vec(value).map_err(Error::Encoding)?;
        Ok(self.with_body(body))
    }

    pub fn with_failure(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// `(method, target)` of every call so far.
    pub fn calls(&self) -> Vec<(HttpMethod, String)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn do_request<P, T>(
        &self,
        signal: &Signal,
        method: HttpMethod,
        target: &str,
        _params: Option<&Params>,
        _payload: Option<&P>,
    ) -> Result<T, Error>
    where
        P: Serialize + ?Sized + Sync,
        T: Decode + Send + 'static,
    {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((method, target.to_string()));

        if let Some(reason) = signal.reason() {
            return Err(Error::Cancelled(reason));
        }
        let decoded = if self.body.is_empty() {
            None
        } else {
            Some(T::decode(self.body.clone())?)
        };
        if let Some(failure) = &self.failure {
            return Err(failure.to_error());
        }
        match decoded {
            Some(value) => Ok(value),
            None => T::decode(Bytes::new()),
        }
    }
}
