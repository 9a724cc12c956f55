//! Concurrency gate shared across sequences hitting the same backend

use futures_core::Stream;
use futures_util::ready;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

type Acquire = Pin<Box<dyn Future<Output = Result<OwnedSemaphorePermit, AcquireError>> + Send>>;

pin_project! {
    /// Holds one permit from a shared pool for the duration of every call
    /// into the wrapped stream.
    ///
    /// The permit is taken before the inner stream is polled and released
    /// as soon as the inner stream produces an element or finishes. A
    /// pending inner call keeps its permit, so the number of in-flight
    /// calls across all gated streams sharing a pool never exceeds the
    /// pool size. Dropping the wrapper releases any held permit.
    ///
    /// Closing the pool ends the stream.
    #[must_use = "streams do nothing unless polled"]
    pub struct Gated<S> {
        #[pin]
        stream: S,
        gate: Arc<Semaphore>,
        acquiring: Option<Acquire>,
        permit: Option<OwnedSemaphorePermit>,
        done: bool,
    }
}

impl<S> Gated<S>
where
    S: Stream,
{
    pub fn new(stream: S, gate: Arc<Semaphore>) -> Self {
        Self {
            stream,
            gate,
            acquiring: None,
            permit: None,
            done: false,
        }
    }

    /// The permit pool this stream draws from
    pub fn gate(&self) -> &Arc<Semaphore> {
        &self.gate
    }

    /// True while a call into the inner stream is in flight
    pub fn holds_permit(&self) -> bool {
        self.permit.is_some()
    }
}

impl<S> Stream for Gated<S>
where
    S: Stream,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        if this.permit.is_none() {
            let gate = this.gate;
            let acquire = this
                .acquiring
                .get_or_insert_with(|| Box::pin(Arc::clone(gate).acquire_owned()));
            let acquired = ready!(acquire.as_mut().poll(cx));
            *this.acquiring = None;
            match acquired {
                Ok(permit) => *this.permit = Some(permit),
                Err(_) => {
                    *this.done = true;
                    log::warn!("Permit pool closed while waiting for a permit. Ending gated sequence");
                    return Poll::Ready(None);
                }
            }
        }

        let polled = this.stream.poll_next(cx);
        if let Poll::Ready(item) = &polled {
            *this.permit = None;
            if item.is_none() {
                *this.done = true;
            }
        }
        polled
    }
}

/// Default size of the process-wide permit pool
pub fn default_permits() -> usize {
    num_cpus::get() * 2
}

lazy_static::lazy_static! {
    /// Process-wide permit pool for callers without their own
    pub static ref GLOBAL_GATE: Arc<Semaphore> = Arc::new(Semaphore::new(default_permits()));
}

/// Get the process-wide permit pool
pub fn get_global_gate() -> Arc<Semaphore> {
    GLOBAL_GATE.clone()
}
