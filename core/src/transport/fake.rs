//! In-memory transport for tests.
//!
//! # Design
//! `FakeTransportFactory` is cheap to clone; every clone and every handle it
//! creates share one set of counters, so a test can keep a factory around,
//! hand a clone to the client, and assert afterwards on how many handles were
//! created, performed, aborted, and finished.
//!
//! Replies are served from a script (FIFO); once the script is exhausted the
//! default reply is used for every further call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{Transport, TransportError, TransportFactory};
use crate::http::{BoxError, HttpRequest, HttpResponse};

/// One canned outcome of a fake `perform`.
#[derive(Debug, Clone)]
pub struct FakeReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub error: Option<String>,
    pub delay: Duration,
    /// Never complete on its own; only `abort` releases the call.
    pub hang: bool,
}

impl FakeReply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            error: None,
            delay: Duration::ZERO,
            hang: false,
        }
    }

    pub fn json<T: Serialize + ?Sized>(status: u16, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self::status(status)
            .with_header("Content-Type", "application/json")
            .with_body(body)
    }

    /// A reply that fails with a transport-level error.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::status(0)
        }
    }

    /// A 302 pointing at `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::status(302).with_header("Location", location)
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::status(200)
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicUsize,
    performed: AtomicUsize,
    aborted: AtomicUsize,
    closed_idle: AtomicUsize,
    finished: AtomicUsize,
}

#[derive(Debug)]
struct Shared {
    default_reply: FakeReply,
    script: Mutex<VecDeque<FakeReply>>,
    requests: Mutex<Vec<HttpRequest>>,
    counters: Counters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Factory of [`FakeTransport`] handles sharing one script and one set of
/// counters.
#[derive(Debug, Clone)]
pub struct FakeTransportFactory {
    shared: Arc<Shared>,
}

impl FakeTransportFactory {
    /// Every call gets `reply` unless a scripted reply is queued.
    pub fn new(reply: FakeReply) -> Self {
        Self {
            shared: Arc::new(Shared {
                default_reply: reply,
                script: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Queue `reply` for the next call that has no earlier scripted reply.
    pub fn push_reply(&self, reply: FakeReply) -> &Self {
        lock(&self.shared.script).push_back(reply);
        self
    }

    /// Number of transport handles created.
    pub fn created(&self) -> usize {
        self.shared.counters.created.load(Ordering::SeqCst)
    }

    pub fn performed(&self) -> usize {
        self.shared.counters.performed.load(Ordering::SeqCst)
    }

    pub fn aborted(&self) -> usize {
        self.shared.counters.aborted.load(Ordering::SeqCst)
    }

    pub fn closed_idle(&self) -> usize {
        self.shared.counters.closed_idle.load(Ordering::SeqCst)
    }

    /// Number of `perform` calls that have returned.
    pub fn finished(&self) -> usize {
        self.shared.counters.finished.load(Ordering::SeqCst)
    }

    /// Every request passed to `perform`, in call order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.shared.requests).clone()
    }

    fn next_reply(&self) -> FakeReply {
        lock(&self.shared.script)
            .pop_front()
            .unwrap_or_else(|| self.shared.default_reply.clone())
    }
}

impl TransportFactory for FakeTransportFactory {
    fn create(&self) -> Box<dyn Transport> {
        self.shared.counters.created.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeTransport {
            factory: self.clone(),
            abort: CancellationToken::new(),
        })
    }
}

/// One fake request attempt.
#[derive(Debug)]
pub struct FakeTransport {
    factory: FakeTransportFactory,
    abort: CancellationToken,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn perform(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        let counters = &self.factory.shared.counters;
        counters.performed.fetch_add(1, Ordering::SeqCst);
        lock(&self.factory.shared.requests).push(request.clone());

        let reply = self.factory.next_reply();
        let (hang, delay) = (reply.hang, reply.delay);
        let wait = async move {
            if hang {
                std::future::pending::<()>().await;
            } else {
                tokio::time::sleep(delay).await;
            }
        };
        let aborted = tokio::select! {
            biased;
            _ = self.abort.cancelled() => true,
            _ = wait => false,
        };
        counters.finished.fetch_add(1, Ordering::SeqCst);

        if aborted {
            return Err(TransportError::Aborted.into());
        }
        if let Some(message) = reply.error {
            return Err(TransportError::Other(message).into());
        }
        Ok(HttpResponse {
            status: reply.status,
            headers: reply.headers,
            body: reply.body.into(),
        })
    }

    fn abort(&self, _request: &HttpRequest) {
        self.factory
            .shared
            .counters
            .aborted
            .fetch_add(1, Ordering::SeqCst);
        self.abort.cancel();
    }

    fn close_idle(&self) {
        self.factory
            .shared
            .counters
            .closed_idle
            .fetch_add(1, Ordering::SeqCst);
    }
}
