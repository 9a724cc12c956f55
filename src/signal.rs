//! Shared cancellation signal for one pipeline instance
//!
//! Every buffering and cancellable sequence in a pipeline holds a clone of
//! the same [`CancelSignal`]. Cancelling it from any participant is terminal
//! for all of them: buffers stop prefetching, cancellable wrappers report
//! exhaustion. The signal never goes back to "continue".

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::error::SequenceError;

struct SignalState {
    cancelled: AtomicBool,
    notify: Notify,
    failure: Mutex<Option<SequenceError>>,
    active_producers: AtomicUsize,
}

/// Cooperative, shared stop flag with a slot for the first producer failure
#[derive(Clone)]
pub struct CancelSignal {
    state: Arc<SignalState>,
}

impl CancelSignal {
    /// Create a new signal in the "continue" state
    pub fn new() -> Self {
        Self {
            state: Arc::new(SignalState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                failure: Mutex::new(None),
                active_producers: AtomicUsize::new(0),
            }),
        }
    }

    /// True while no participant has asked the pipeline to stop
    pub fn should_continue(&self) -> bool {
        !self.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Ask every sequence sharing this signal to stop. Idempotent.
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::AcqRel) {
            self.state.notify.notify_waiters();
        }
    }

    /// Record a failure and cancel. Only the first failure is kept.
    pub fn fail(&self, err: SequenceError) {
        if let Ok(mut slot) = self.state.failure.lock() {
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.cancel();
    }

    /// The first failure recorded on this signal, if any
    pub fn error(&self) -> Option<SequenceError> {
        self.state.failure.lock().ok().and_then(|slot| slot.clone())
    }

    /// Resolves once the signal has been cancelled
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Number of background producers still running against this signal
    pub fn active_producers(&self) -> usize {
        self.state.active_producers.load(Ordering::Acquire)
    }

    /// Register a running producer; the count drops when the guard does
    pub(crate) fn producer_guard(&self) -> ProducerGuard {
        self.state.active_producers.fetch_add(1, Ordering::AcqRel);
        ProducerGuard {
            signal: self.clone(),
        }
    }

    /// True when both handles refer to the same pipeline signal
    pub fn same_signal(&self, other: &CancelSignal) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .field("active_producers", &self.active_producers())
            .field("failed", &self.error().is_some())
            .finish()
    }
}

pub(crate) struct ProducerGuard {
    signal: CancelSignal,
}

impl Drop for ProducerGuard {
    fn drop(&mut self) {
        self.signal
            .state
            .active_producers
            .fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_is_terminal_and_idempotent() {
        let signal = CancelSignal::new();
        assert!(signal.should_continue());
        signal.cancel();
        signal.cancel();
        assert!(signal.is_cancelled());
        assert!(signal.error().is_none());
    }

    #[test]
    fn first_failure_wins() {
        let signal = CancelSignal::new();
        signal.fail(SequenceError::invalid("first"));
        signal.fail(SequenceError::invalid("second"));
        assert!(signal.is_cancelled());
        match signal.error() {
            Some(SequenceError::InvalidConfiguration(msg)) => assert_eq!(msg, "first"),
            other => panic!("unexpected failure slot: {:?}", other),
        }
    }

    #[test]
    fn producer_guard_tracks_count() {
        let signal = CancelSignal::new();
        let a = signal.producer_guard();
        let b = signal.clone().producer_guard();
        assert_eq!(signal.active_producers(), 2);
        drop(a);
        drop(b);
        assert_eq!(signal.active_producers(), 0);
    }

    #[tokio::test]
    async fn cancelled_wakes_waiters() {
        let signal = CancelSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
