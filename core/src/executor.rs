//! Cancellable execution of a single request.
//!
//! # Design
//! Each call creates a fresh transport handle and runs `perform` on its own
//! tokio task; the task's `JoinHandle` is the single-slot completion channel.
//! The caller side races that handle against the [`Signal`]:
//!
//! - completion first: the transport's result is returned as-is;
//! - signal first: the transport is aborted, then the task is joined before
//!   returning, so no task outlives the call. Its result is dropped, which
//!   also releases any response body it produced.
//!
//! The race is biased towards the signal: a signal that has already fired
//! wins even if the transport finished in the same instant.
//!
//! If the `execute` future itself is dropped before the race resolves (an
//! outer `timeout`, a losing `select!` branch), an [`AbortGuard`] aborts the
//! transport so the detached task still ends.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn, Instrument};
use uuid::Uuid;

use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};
use crate::signal::Signal;
use crate::transport::{Transport, TransportFactory};

/// Aborts the transport when dropped while still armed.
struct AbortGuard {
    transport: Arc<dyn Transport>,
    request: Arc<HttpRequest>,
    armed: bool,
}

impl AbortGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if self.armed {
            debug!(url = %self.request.url, "execute dropped before completion, aborting");
            self.transport.abort(&self.request);
            self.transport.close_idle();
        }
    }
}

/// Runs requests through transports created by one factory.
#[derive(Clone)]
pub struct Executor {
    factory: Arc<dyn TransportFactory>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor").finish_non_exhaustive()
    }
}

impl Executor {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self { factory }
    }

    /// Perform `request`, giving up as soon as `signal` fires.
    #[instrument(
        name = "execute",
        skip_all,
        fields(request_id = %Uuid::new_v4(), method = %request.method, url = %request.url)
    )]
    pub async fn execute(&self, signal: &Signal, request: HttpRequest) -> Result<HttpResponse, Error> {
        debug!("{} {}", request.method, request.url);

        let request = Arc::new(request);
        let transport: Arc<dyn Transport> = Arc::from(self.factory.create());

        let mut task = tokio::spawn(
            {
                let transport = transport.clone();
                let request = request.clone();
                async move { transport.perform(&request).await }
            }
            .in_current_span(),
        );

        let mut guard = AbortGuard {
            transport: transport.clone(),
            request: request.clone(),
            armed: true,
        };

        tokio::select! {
            biased;
            reason = signal.cancelled() => {
                debug!(%reason, "signal fired before completion");
                guard.disarm();
                transport.abort(&request);
                transport.close_idle();
                if let Err(e) = task.await {
                    warn!(error = %e, "transport task failed after abort");
                }
                Err(Error::Cancelled(reason))
            }
            joined = &mut task => {
                guard.disarm();
                match joined {
                    Ok(Ok(response)) => Ok(response),
                    Ok(Err(e)) => Err(Error::Network(e)),
                    Err(e) => {
                        warn!(error = %e, "transport task terminated without a result");
                        Err(Error::Network(Box::new(e)))
                    }
                }
            }
        }
    }
}
