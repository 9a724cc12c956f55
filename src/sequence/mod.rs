//! Composable sequence wrappers
//!
//! A sequence is any [`Stream`]. The wrappers in this module each own the
//! stream they wrap and can be stacked freely:
//!
//! raw shard stream → [`Gated`] → [`BufferedSequence`] → [`OrderedMerge`] → [`Cancellable`]
//!
//! which is what [`merge_buffered`](crate::pipeline::merge_buffered) does in
//! one call.

pub mod buffered;
pub mod cancellable;
pub mod gated;
pub mod interleave;
pub mod merge;
pub mod peekable;
pub mod transform;

pub use buffered::BufferedSequence;
pub use cancellable::{single, single_with_limit, BlockingIter, Cancellable, CancellableStream};
pub use gated::{default_permits, get_global_gate, Gated, GLOBAL_GATE};
pub use interleave::{interleave, interleave_with_ratios, Interleave};
pub use merge::{merge, merge_by, merge_by_key, OrderedMerge};
pub use peekable::Peekable;
pub use transform::{partition, partition_streams, Expand, ExpandIter, Filter, Map};

use futures_core::Stream;
use futures_util::ready;
use futures_util::stream::BoxStream;
use std::convert::Infallible;
use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::error::SequenceResult;
use crate::signal::CancelSignal;
use crate::stream_configuration::BufferConfig;

/// A stream whose next element can be inspected without consuming it
pub trait PeekableStream: Stream {
    /// Poll for a reference to the element the next `poll_next` returns.
    /// `Ready(None)` means the stream is exhausted.
    fn poll_peek(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<&Self::Item>>;
}

/// Async helpers for [`PeekableStream`]s
pub trait PeekableStreamExt: PeekableStream {
    /// The next element, without consuming it. Repeated calls with no
    /// consumption in between return the same element.
    fn peek(&mut self) -> Peek<'_, Self>
    where
        Self: Unpin,
    {
        Peek { stream: Some(self) }
    }

    /// Whether another element is available
    fn has_next(&mut self) -> HasNext<'_, Self>
    where
        Self: Unpin,
    {
        HasNext { stream: self }
    }
}

impl<S> PeekableStreamExt for S where S: PeekableStream + ?Sized {}

/// Future for [`PeekableStreamExt::peek`]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Peek<'a, S: ?Sized> {
    stream: Option<&'a mut S>,
}

impl<'a, S> Future for Peek<'a, S>
where
    S: PeekableStream + Unpin + ?Sized,
{
    type Output = Option<&'a S::Item>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(stream) = self.stream.as_mut() {
            ready!(Pin::new(&mut **stream).poll_peek(cx));
        }
        match self.stream.take() {
            Some(stream) => Pin::new(stream).poll_peek(cx),
            None => Poll::Ready(None),
        }
    }
}

/// Future for [`PeekableStreamExt::has_next`]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct HasNext<'a, S: ?Sized> {
    stream: &'a mut S,
}

impl<S> Future for HasNext<'_, S>
where
    S: PeekableStream + Unpin + ?Sized,
{
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut *self.stream)
            .poll_peek(cx)
            .map(|next| next.is_some())
    }
}

/// Lift an infallible stream into the `Result` shape buffering expects
pub type Fallible<S> = Map<S, fn(<S as Stream>::Item) -> Result<<S as Stream>::Item, Infallible>>;

pub fn fallible<S>(stream: S) -> Fallible<S>
where
    S: Stream,
{
    Map::new(stream, Ok as fn(S::Item) -> Result<S::Item, Infallible>)
}

/// Extension trait building sequence wrappers from any stream
pub trait SequenceExt: Stream + Sized {
    /// Wrap with look-ahead
    fn peekable_seq(self) -> Peekable<Self> {
        Peekable::new(self)
    }

    /// Keep only elements matching `predicate`
    fn filter_seq<F>(self, predicate: F) -> Filter<Self, F>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        Filter::new(self, predicate)
    }

    /// Transform each element
    fn map_seq<U, F>(self, f: F) -> Map<Self, F>
    where
        F: FnMut(Self::Item) -> U,
    {
        Map::new(self, f)
    }

    /// Replace each element by the stream `expander` returns for it
    fn expand_seq<U, F>(self, expander: F) -> Expand<Self, U, F>
    where
        U: Stream,
        F: FnMut(Self::Item) -> U,
    {
        Expand::new(self, expander)
    }

    /// Replace each element by the iterator `expander` returns for it
    fn expand_iter_seq<I, F>(self, expander: F) -> ExpandIter<Self, I, F>
    where
        I: IntoIterator,
        F: FnMut(Self::Item) -> I,
    {
        ExpandIter::new(self, expander)
    }

    /// Split into consecutive `Vec`s of at most `size` elements
    fn partition_seq(self, size: usize) -> SequenceResult<BoxStream<'static, Vec<Self::Item>>>
    where
        Self: Send + 'static,
        Self::Item: Send + 'static,
    {
        partition(self, size)
    }

    /// Split into consecutive sub-streams of at most `size` elements
    fn partition_streams_seq(
        self,
        size: usize,
    ) -> SequenceResult<BoxStream<'static, BoxStream<'static, Self::Item>>>
    where
        Self: Send + 'static,
        Self::Item: Send + 'static,
    {
        partition_streams(self, size)
    }

    /// Bound concurrent calls into this stream by a shared permit pool
    fn gate_seq(self, gate: Arc<Semaphore>) -> Gated<Self> {
        Gated::new(self, gate)
    }

    /// Prefetch in the background on `executor`
    fn buffer_seq<T, E>(
        self,
        executor: &Handle,
        buffer_size: usize,
        signal: CancelSignal,
    ) -> BufferedSequence<T>
    where
        Self: Stream<Item = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Error + Send + Sync + 'static,
    {
        BufferedSequence::spawn(self, executor, buffer_size, signal)
    }

    /// Prefetch in the background on `executor` using `config`
    fn buffer_with_config_seq<T, E>(
        self,
        executor: &Handle,
        config: &BufferConfig,
        signal: CancelSignal,
    ) -> BufferedSequence<T>
    where
        Self: Stream<Item = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Error + Send + Sync + 'static,
    {
        BufferedSequence::spawn_with_config(self, executor, config, signal)
    }

    /// Stop when `signal` is cancelled; cancel it on close or drop
    fn cancellable_seq(self, signal: CancelSignal) -> Cancellable<Self> {
        Cancellable::new(self, signal)
    }

    /// Like [`cancellable_seq`](SequenceExt::cancellable_seq), cancelling
    /// the signal after `limit` deliveries
    fn cancellable_with_limit_seq(
        self,
        signal: CancelSignal,
        limit: u64,
    ) -> SequenceResult<Cancellable<Self>> {
        Cancellable::with_limit(self, signal, limit)
    }

    /// Wrap every element in `Ok`
    fn fallible_seq(self) -> Fallible<Self> {
        fallible(self)
    }
}

impl<S> SequenceExt for S where S: Stream + Sized {}
