//! Look-ahead wrapper

use futures_core::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::PeekableStream;

pin_project! {
    /// Exposes the next element of the wrapped stream without consuming it.
    ///
    /// Once the inner stream reports exhaustion it is never polled again.
    #[must_use = "streams do nothing unless polled"]
    pub struct Peekable<S>
    where
        S: Stream,
    {
        #[pin]
        stream: S,
        peeked: Option<S::Item>,
        done: bool,
    }
}

impl<S> Peekable<S>
where
    S: Stream,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            peeked: None,
            done: false,
        }
    }

    /// Wrapping an already peekable stream returns it unchanged
    pub fn peekable_seq(self) -> Self {
        self
    }

    /// Consume the wrapper. A peeked element that was never delivered is lost.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> Stream for Peekable<S>
where
    S: Stream,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if let Some(item) = this.peeked.take() {
            return Poll::Ready(Some(item));
        }
        if *this.done {
            return Poll::Ready(None);
        }

        match this.stream.poll_next(cx) {
            Poll::Ready(None) => {
                *this.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let peeked = usize::from(self.peeked.is_some());
        if self.done {
            return (peeked, Some(peeked));
        }
        let (lower, upper) = self.stream.size_hint();
        (
            lower.saturating_add(peeked),
            upper.and_then(|u| u.checked_add(peeked)),
        )
    }
}

impl<S> PeekableStream for Peekable<S>
where
    S: Stream,
{
    fn poll_peek(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<&Self::Item>> {
        let this = self.project();

        if this.peeked.is_none() && !*this.done {
            match this.stream.poll_next(cx) {
                Poll::Ready(Some(item)) => *this.peeked = Some(item),
                Poll::Ready(None) => *this.done = true,
                Poll::Pending => return Poll::Pending,
            }
        }

        Poll::Ready(this.peeked.as_ref())
    }
}
