//! Consumer-facing wrappers that control the lifetime of a pipeline

use futures_core::Stream;
use futures_util::{ready, StreamExt};
use pin_project_lite::pin_project;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::{Handle, RuntimeFlavor};

use super::PeekableStream;
use crate::error::{SequenceError, SequenceResult};
use crate::signal::CancelSignal;

pin_project! {
    /// Stops delivering as soon as its signal is cancelled, and cancels the
    /// signal when closed, dropped, or when the delivery limit is reached.
    ///
    /// Because the signal is shared, reaching the limit here stops every
    /// other sequence using the same signal. In a chain of cancellable
    /// wrappers sharing one signal only the outermost should carry a limit.
    #[must_use = "streams do nothing unless polled"]
    pub struct Cancellable<S> {
        #[pin]
        stream: S,
        signal: CancelSignal,
        limit: Option<u64>,
        delivered: u64,
    }

    impl<S> PinnedDrop for Cancellable<S> {
        fn drop(this: Pin<&mut Self>) {
            this.project().signal.cancel();
        }
    }
}

impl<S> Cancellable<S>
where
    S: Stream,
{
    /// Wrap `stream` without a delivery limit
    pub fn new(stream: S, signal: CancelSignal) -> Self {
        Self {
            stream,
            signal,
            limit: None,
            delivered: 0,
        }
    }

    /// Wrap `stream` and cancel `signal` once `limit` elements have been
    /// delivered. A limit of 0 is rejected.
    pub fn with_limit(stream: S, signal: CancelSignal, limit: u64) -> SequenceResult<Self> {
        if limit == 0 {
            return Err(SequenceError::invalid("Delivery limit must be >= 1"));
        }
        Ok(Self {
            stream,
            signal,
            limit: Some(limit),
            delivered: 0,
        })
    }

    /// Cancel the shared signal. Idempotent.
    pub fn close(&self) {
        if !self.signal.is_cancelled() {
            log::debug!("Closing after {} delivered elements", self.delivered);
        }
        self.signal.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.signal.is_cancelled()
    }

    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// The first producer failure recorded on the shared signal
    pub fn error(&self) -> Option<SequenceError> {
        self.signal.error()
    }

    /// Erase the inner type, keeping the close-on-drop behavior
    pub fn into_stream(self) -> CancellableStream<S::Item>
    where
        S: Send + 'static,
    {
        CancellableStream::new(self)
    }
}

impl<S> Stream for Cancellable<S>
where
    S: Stream,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if this.signal.is_cancelled() {
            return Poll::Ready(None);
        }

        match ready!(this.stream.poll_next(cx)) {
            Some(item) => {
                *this.delivered += 1;
                if Some(*this.delivered) == *this.limit {
                    log::debug!(
                        "Delivered limit of {} elements reached. Signalling stop",
                        this.delivered
                    );
                    this.signal.cancel();
                }
                Poll::Ready(Some(item))
            }
            None => Poll::Ready(None),
        }
    }
}

impl<S> PeekableStream for Cancellable<S>
where
    S: PeekableStream,
{
    fn poll_peek(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<&Self::Item>> {
        let this = self.project();
        if this.signal.is_cancelled() {
            return Poll::Ready(None);
        }
        this.stream.poll_peek(cx)
    }
}

impl<S> fmt::Debug for Cancellable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellable")
            .field("signal", &self.signal)
            .field("limit", &self.limit)
            .field("delivered", &self.delivered)
            .finish()
    }
}

/// Wrap a stream that is not part of a fan-out with its own fresh signal
pub fn single<S>(stream: S) -> Cancellable<S>
where
    S: Stream,
{
    Cancellable::new(stream, CancelSignal::new())
}

/// Like [`single`], stopping after `limit` elements
pub fn single_with_limit<S>(stream: S, limit: u64) -> SequenceResult<Cancellable<S>>
where
    S: Stream,
{
    Cancellable::with_limit(stream, CancelSignal::new(), limit)
}

/// Type-erased, terminal form of a [`Cancellable`].
///
/// Dropping it, or anything it has been composed into with the usual
/// stream combinators, cancels the pipeline and lets the background
/// producers exit.
#[must_use = "streams do nothing unless polled"]
pub struct CancellableStream<T> {
    inner: Pin<Box<dyn Stream<Item = T> + Send>>,
    signal: CancelSignal,
}

impl<T> CancellableStream<T> {
    pub fn new<S>(cancellable: Cancellable<S>) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        let signal = cancellable.signal.clone();
        Self {
            inner: Box::pin(cancellable),
            signal,
        }
    }

    /// Cancel the shared signal. Idempotent.
    pub fn close(&self) {
        self.signal.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.signal.is_cancelled()
    }

    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }

    /// The first producer failure recorded on the shared signal
    pub fn error(&self) -> Option<SequenceError> {
        self.signal.error()
    }

    /// Close the pipeline and report whether any producer failed
    pub fn finish(self) -> SequenceResult<()> {
        self.close();
        match self.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Collect every remaining element. Fails if a producer failed, since
    /// the collected elements are then incomplete.
    pub async fn drain(mut self) -> SequenceResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item);
        }
        self.finish().map(|_| items)
    }

    /// Consume from synchronous code. Must not be used from within an
    /// asynchronous context of `handle`'s runtime.
    ///
    /// `handle` must belong to a multi-thread runtime: blocking on a
    /// current-thread runtime from outside does not drive its spawned
    /// producers or timers, so iteration would never make progress. Such a
    /// handle is rejected and the pipeline is closed.
    pub fn into_blocking_iter(self, handle: Handle) -> SequenceResult<BlockingIter<T>> {
        if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(SequenceError::invalid(
                "Blocking iteration needs a multi-thread runtime handle",
            ));
        }
        Ok(BlockingIter {
            stream: self,
            handle,
        })
    }
}

impl<T> Stream for CancellableStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<T> Drop for CancellableStream<T> {
    fn drop(&mut self) {
        self.signal.cancel();
    }
}

impl<T> fmt::Debug for CancellableStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellableStream")
            .field("signal", &self.signal)
            .finish()
    }
}

/// Blocking iterator over a [`CancellableStream`]
pub struct BlockingIter<T> {
    stream: CancellableStream<T>,
    handle: Handle,
}

impl<T> BlockingIter<T> {
    pub fn close(&self) {
        self.stream.close();
    }

    pub fn error(&self) -> Option<SequenceError> {
        self.stream.error()
    }
}

impl<T> Iterator for BlockingIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.handle.block_on(self.stream.next())
    }
}
