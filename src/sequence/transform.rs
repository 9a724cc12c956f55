//! Lazy transform operators: filter, map, flat-expand and partition

use async_stream::stream;
use futures_core::Stream;
use futures_util::stream::{self, BoxStream, StreamExt};
use futures_util::{pin_mut, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::PeekableStream;
use crate::error::{SequenceError, SequenceResult};

// ================================
// Filter
// ================================

pin_project! {
    /// Discards elements failing a predicate.
    ///
    /// Peeking pulls from the inner stream until a match is found or it is
    /// exhausted, so checking for a next element may do inner work even
    /// though nothing is consumed.
    #[must_use = "streams do nothing unless polled"]
    pub struct Filter<S, F>
    where
        S: Stream,
    {
        #[pin]
        stream: S,
        predicate: F,
        next_element: Option<S::Item>,
        done: bool,
    }
}

impl<S, F> Filter<S, F>
where
    S: Stream,
    F: FnMut(&S::Item) -> bool,
{
    pub fn new(stream: S, predicate: F) -> Self {
        Self {
            stream,
            predicate,
            next_element: None,
            done: false,
        }
    }

    fn poll_fill(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut this = self.project();
        while this.next_element.is_none() && !*this.done {
            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(item) => {
                    if (this.predicate)(&item) {
                        *this.next_element = Some(item);
                    }
                }
                None => *this.done = true,
            }
        }
        Poll::Ready(())
    }
}

impl<S, F> Stream for Filter<S, F>
where
    S: Stream,
    F: FnMut(&S::Item) -> bool,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        ready!(self.as_mut().poll_fill(cx));
        Poll::Ready(self.project().next_element.take())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let buffered = usize::from(self.next_element.is_some());
        if self.done {
            return (buffered, Some(buffered));
        }
        let (_, upper) = self.stream.size_hint();
        (buffered, upper.and_then(|u| u.checked_add(buffered)))
    }
}

impl<S, F> PeekableStream for Filter<S, F>
where
    S: Stream,
    F: FnMut(&S::Item) -> bool,
{
    fn poll_peek(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<&Self::Item>> {
        ready!(self.as_mut().poll_fill(cx));
        Poll::Ready(self.project().next_element.as_ref())
    }
}

// ================================
// Map
// ================================

pin_project! {
    /// One-to-one transform without buffering
    #[must_use = "streams do nothing unless polled"]
    pub struct Map<S, F> {
        #[pin]
        stream: S,
        f: F,
    }
}

impl<S, F> Map<S, F> {
    pub fn new(stream: S, f: F) -> Self {
        Self { stream, f }
    }
}

impl<S, U, F> Stream for Map<S, F>
where
    S: Stream,
    F: FnMut(S::Item) -> U,
{
    type Item = U;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        this.stream
            .poll_next(cx)
            .map(|item| item.map(|item| (this.f)(item)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.stream.size_hint()
    }
}

// ================================
// Expand
// ================================

pin_project! {
    /// Maps every element to a sub-stream and drains it before pulling the
    /// next element. Empty expansions are skipped.
    #[must_use = "streams do nothing unless polled"]
    pub struct Expand<S, U, F> {
        #[pin]
        stream: S,
        #[pin]
        current: Option<U>,
        expander: F,
        done: bool,
    }
}

impl<S, U, F> Expand<S, U, F>
where
    S: Stream,
    U: Stream,
    F: FnMut(S::Item) -> U,
{
    pub fn new(stream: S, expander: F) -> Self {
        Self {
            stream,
            current: None,
            expander,
            done: false,
        }
    }
}

impl<S, U, F> Stream for Expand<S, U, F>
where
    S: Stream,
    U: Stream,
    F: FnMut(S::Item) -> U,
{
    type Item = U::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(sub) = this.current.as_mut().as_pin_mut() {
                match ready!(sub.poll_next(cx)) {
                    Some(item) => return Poll::Ready(Some(item)),
                    None => this.current.set(None),
                }
            }
            if *this.done {
                return Poll::Ready(None);
            }
            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(item) => this.current.set(Some((this.expander)(item))),
                None => *this.done = true,
            }
        }
    }
}

pin_project! {
    /// Like [`Expand`], for expanders producing plain iterators
    #[must_use = "streams do nothing unless polled"]
    pub struct ExpandIter<S, I, F>
    where
        I: IntoIterator,
    {
        #[pin]
        stream: S,
        current: Option<I::IntoIter>,
        expander: F,
        done: bool,
    }
}

impl<S, I, F> ExpandIter<S, I, F>
where
    S: Stream,
    I: IntoIterator,
    F: FnMut(S::Item) -> I,
{
    pub fn new(stream: S, expander: F) -> Self {
        Self {
            stream,
            current: None,
            expander,
            done: false,
        }
    }
}

impl<S, I, F> Stream for ExpandIter<S, I, F>
where
    S: Stream,
    I: IntoIterator,
    F: FnMut(S::Item) -> I,
{
    type Item = I::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(item) = this.current.as_mut().and_then(Iterator::next) {
                return Poll::Ready(Some(item));
            }
            *this.current = None;
            if *this.done {
                return Poll::Ready(None);
            }
            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(item) => *this.current = Some((this.expander)(item).into_iter()),
                None => *this.done = true,
            }
        }
    }
}

// ================================
// Partition
// ================================

/// Split a stream into consecutive `Vec`s of at most `size` elements.
/// Only the last partition may be shorter.
pub fn partition<S>(s: S, size: usize) -> SequenceResult<BoxStream<'static, Vec<S::Item>>>
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
{
    if size == 0 {
        return Err(SequenceError::invalid("Partition size must be >= 1"));
    }

    Ok(stream! {
        let mut buf = Vec::with_capacity(size);
        pin_mut!(s);
        while let Some(item) = s.next().await {
            buf.push(item);
            if buf.len() == size {
                yield std::mem::replace(&mut buf, Vec::with_capacity(size));
            }
        }
        if !buf.is_empty() {
            yield buf;
        }
    }
    .boxed())
}

/// Like [`partition`], but each partition is itself a stream.
pub fn partition_streams<S>(
    s: S,
    size: usize,
) -> SequenceResult<BoxStream<'static, BoxStream<'static, S::Item>>>
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
{
    Ok(partition(s, size)?
        .map(|chunk| stream::iter(chunk).boxed())
        .boxed())
}
