//! Cooperative cancellation and the async iteration adapter
//!
//! Cancellation is checked before each element is yielded; readers also
//! check it at every refill and race it against pending reads. Once observed,
//! the adapter drops the inner stream, which drops the reader and any pooled
//! buffer it holds, yields one `FLOW_CANCELLED` error and ends.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::Notify;

use super::errors::{ExecutorError, ExecutorResult};

/// Asynchronous element sequence
pub type ElementStream<'a> = Pin<Box<dyn Stream<Item = ExecutorResult<Value>> + Send + 'a>>;

#[derive(Debug, Default)]
struct SignalInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<SignalInner>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; idempotent
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Completes once cancellation is requested
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not lost
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Wraps an element stream with cancellation checks. The result ends after
/// the first error, and after reporting cancellation.
pub fn cancellable<'a, S>(inner: S, cancel: CancellationSignal) -> ElementStream<'a>
where
    S: Stream<Item = ExecutorResult<Value>> + Send + 'a,
{
    let state = Some((Box::pin(inner), cancel));
    Box::pin(stream::unfold(state, |state| async move {
        let (mut inner, cancel) = state?;
        if cancel.is_cancelled() {
            return Some((Err(ExecutorError::cancelled()), None));
        }
        match inner.next().await {
            None => None,
            Some(Ok(_)) if cancel.is_cancelled() => Some((Err(ExecutorError::cancelled()), None)),
            Some(Ok(value)) => Some((Ok(value), Some((inner, cancel)))),
            Some(Err(err)) => Some((Err(err), None)),
        }
    }))
}
