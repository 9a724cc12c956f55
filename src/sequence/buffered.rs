//! Background prefetch into a bounded queue
//!
//! A [`BufferedSequence`] decouples a staggering producer (mostly fast,
//! occasionally slow, e.g. every 100th element needs a remote call) from the
//! consumer's pull rate. Read-ahead starts as soon as the sequence is
//! spawned, before the first element is requested.

use futures_core::Stream;
use futures_util::{pin_mut, ready, FutureExt, StreamExt};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Sleep;

use super::PeekableStream;
use crate::error::{OfferError, SequenceError};
use crate::queue::{self, QueueConsumer, QueueProducer};
use crate::signal::{CancelSignal, ProducerGuard};
use crate::stream_configuration::BufferConfig;

/// Foreground half of a buffering sequence.
///
/// The background task drains the inner stream into a bounded queue until
/// the inner stream ends, the shared signal is cancelled, or this value is
/// dropped. An `Err` from the inner stream, or a panic while polling it, is
/// recorded on the signal, which cancels every sequence sharing it.
///
/// Once the signal is cancelled this sequence reports no further elements,
/// even if some are still queued.
pub struct BufferedSequence<T> {
    consumer: QueueConsumer<T>,
    signal: CancelSignal,
    peeked: Option<T>,
    poll_timeout: Duration,
    timer: Option<Pin<Box<Sleep>>>,
    task: JoinHandle<()>,
    done: bool,
}

// The element slot is never pinned.
impl<T> Unpin for BufferedSequence<T> {}

impl<T> BufferedSequence<T>
where
    T: Send + 'static,
{
    /// Spawn the background producer on `executor` with default timeouts.
    /// `buffer_size` below 1 is treated as 1.
    pub fn spawn<S, E>(inner: S, executor: &Handle, buffer_size: usize, signal: CancelSignal) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        E: Error + Send + Sync + 'static,
    {
        let config = BufferConfig::new().buffer_size(buffer_size);
        Self::spawn_with_config(inner, executor, &config, signal)
    }

    /// Spawn the background producer on `executor`
    pub fn spawn_with_config<S, E>(
        inner: S,
        executor: &Handle,
        config: &BufferConfig,
        signal: CancelSignal,
    ) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        E: Error + Send + Sync + 'static,
    {
        let (producer, consumer) = queue::bounded(config);
        let guard = signal.producer_guard();
        let task = executor.spawn(produce(
            inner,
            producer,
            signal.clone(),
            config.effective_offer_timeout(),
            guard,
        ));

        Self {
            consumer,
            signal,
            peeked: None,
            poll_timeout: config.effective_poll_timeout(),
            timer: None,
            task,
            done: false,
        }
    }
}

impl<T> BufferedSequence<T> {
    /// The signal shared with the background producer
    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }

    /// True once the background producer has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Elements fetched but not yet delivered
    pub fn queued(&self) -> usize {
        self.consumer.len() + usize::from(self.peeked.is_some())
    }

    pub fn capacity(&self) -> usize {
        self.consumer.capacity()
    }

    fn poll_fill(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        loop {
            if self.signal.is_cancelled() {
                self.done = true;
                self.peeked = None;
            }
            if self.peeked.is_some() || self.done {
                self.timer = None;
                return Poll::Ready(());
            }

            match self.consumer.poll_recv(cx) {
                Poll::Ready(Some(item)) => self.peeked = Some(item),
                Poll::Ready(None) => self.done = true,
                Poll::Pending => {
                    let poll_timeout = self.poll_timeout;
                    let timer = self
                        .timer
                        .get_or_insert_with(|| Box::pin(tokio::time::sleep(poll_timeout)));
                    ready!(timer.as_mut().poll(cx));
                    self.timer = None;
                    log::trace!(
                        "No element within {:?}. Re-checking cancellation",
                        poll_timeout
                    );
                }
            }
        }
    }
}

impl<T> Stream for BufferedSequence<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        ready!(this.poll_fill(cx));
        Poll::Ready(this.peeked.take())
    }
}

impl<T> PeekableStream for BufferedSequence<T> {
    fn poll_peek(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<&Self::Item>> {
        let this = self.get_mut();
        ready!(this.poll_fill(cx));
        Poll::Ready(this.peeked.as_ref())
    }
}

impl<T> fmt::Debug for BufferedSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedSequence")
            .field("queue", &self.consumer)
            .field("peeked", &self.peeked.is_some())
            .field("done", &self.done)
            .field("finished", &self.is_finished())
            .finish()
    }
}

async fn produce<S, T, E>(
    inner: S,
    producer: QueueProducer<T>,
    signal: CancelSignal,
    offer_timeout: Duration,
    _guard: ProducerGuard,
) where
    S: Stream<Item = Result<T, E>>,
    E: Error + Send + Sync + 'static,
{
    pin_mut!(inner);
    log::debug!("Buffering producer started");

    while signal.should_continue() {
        let next = tokio::select! {
            biased;
            _ = signal.cancelled() => break,
            _ = producer.closed() => break,
            next = AssertUnwindSafe(inner.next()).catch_unwind() => next,
        };

        let next = match next {
            Ok(next) => next,
            Err(payload) => {
                log::warn!("Inner sequence panicked. Signalling stop to all sequences sharing the signal");
                signal.fail(SequenceError::ProducerPanicked);
                panic::resume_unwind(payload);
            }
        };

        let item = match next {
            Some(Ok(item)) => item,
            Some(Err(err)) => {
                log::warn!(
                    "Inner sequence failed: {}. Signalling stop to all sequences sharing the signal",
                    err
                );
                signal.fail(SequenceError::producer(err));
                break;
            }
            None => {
                log::debug!("Inner sequence exhausted");
                break;
            }
        };

        if !offer_until_cancelled(&producer, item, offer_timeout, &signal).await {
            break;
        }
    }

    log::debug!("Buffering producer stopped");
}

/// Offer with retries on timeout. False if the element could not be handed
/// off because the pipeline was cancelled or the consumer is gone.
async fn offer_until_cancelled<T>(
    producer: &QueueProducer<T>,
    item: T,
    offer_timeout: Duration,
    signal: &CancelSignal,
) -> bool {
    let mut pending = item;
    loop {
        let offered = tokio::select! {
            biased;
            _ = signal.cancelled() => return false,
            offered = producer.offer(pending, offer_timeout) => offered,
        };

        match offered {
            Ok(()) => return true,
            Err(OfferError::Timeout(item)) => {
                log::trace!("Buffer full for {:?}. Retrying offer", offer_timeout);
                pending = item;
            }
            Err(OfferError::Closed(_)) => return false,
        }
    }
}
