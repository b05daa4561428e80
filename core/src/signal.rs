//! One-shot cancellation signal with an optional deadline.
//!
//! # Design
//! `Signal` wraps a `tokio_util` [`CancellationToken`] and records *why* it
//! fired. Timeouts are not a separate mechanism: a deadline is just another
//! way for the same signal to fire, with [`CancelReason::DeadlineExceeded`]
//! instead of [`CancelReason::Cancelled`]. The first reason recorded wins and
//! later firings are no-ops.
//!
//! Deadlines are checked lazily (when the signal is queried or awaited), so
//! constructing a signal never spawns a timer task and does not need a
//! runtime.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// [`Signal::cancel`] was called on this signal or an ancestor.
    Cancelled,
    /// The deadline of this signal or an ancestor passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("cancelled"),
            CancelReason::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Cancellation signal shared between a caller and in-flight requests.
///
/// Clones refer to the same signal: cancelling any clone cancels all of them.
#[derive(Debug, Clone)]
pub struct Signal {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    token: CancellationToken,
    reason: OnceLock<CancelReason>,
    deadline: Option<Instant>,
    parent: Option<Signal>,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    /// A signal that only fires when [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::build(CancellationToken::new(), None, None)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(CancellationToken::new(), Some(deadline), None)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A signal that fires whenever `self` fires, and can also be cancelled on
    /// its own without affecting `self`.
    pub fn child(&self) -> Self {
        Self::build(
            self.inner.token.child_token(),
            self.inner.deadline,
            Some(self.clone()),
        )
    }

    /// Like [`child`](Self::child), with a deadline `timeout` from now. The
    /// parent's deadline still applies if it is earlier.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) if parent < own => parent,
            _ => own,
        };
        Self::build(self.inner.token.child_token(), Some(deadline), Some(self.clone()))
    }

    fn build(token: CancellationToken, deadline: Option<Instant>, parent: Option<Signal>) -> Self {
        Self {
            inner: Arc::new(Inner {
                token,
                reason: OnceLock::new(),
                deadline,
                parent,
            }),
        }
    }

    /// Fire the signal. Calling this on a signal that already fired has no
    /// effect; the first reason is kept.
    pub fn cancel(&self) {
        self.fire(CancelReason::Cancelled);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub fn is_fired(&self) -> bool {
        self.reason().is_some()
    }

    /// The reason this signal fired, or `None` if it has not fired yet.
    pub fn reason(&self) -> Option<CancelReason> {
        if let Some(reason) = self.inner.reason.get() {
            return Some(*reason);
        }
        if let Some(reason) = self.inner.parent.as_ref().and_then(Signal::reason) {
            return Some(reason);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.fire(CancelReason::DeadlineExceeded);
                self.inner.reason.get().copied()
            }
            _ => None,
        }
    }

    /// Wait until the signal fires and return the reason.
    pub async fn cancelled(&self) -> CancelReason {
        if let Some(reason) = self.reason() {
            return reason;
        }
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {
                        self.fire(CancelReason::DeadlineExceeded);
                    }
                }
            }
            None => self.inner.token.cancelled().await,
        }
        self.reason().unwrap_or(CancelReason::Cancelled)
    }

    fn fire(&self, reason: CancelReason) {
        let already = self.inner.reason.get().is_some()
            || self.inner.parent.as_ref().is_some_and(Signal::is_fired);
        if !already {
            let _ = self.inner.reason.set(reason);
        }
        self.inner.token.cancel();
    }
}
