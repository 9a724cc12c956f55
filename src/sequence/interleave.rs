//! Ratio-based round-robin interleaving

use futures_core::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{SequenceError, SequenceResult};

/// Delivers `ratios[i]` elements from stream `i` before moving on to
/// stream `i + 1`, wrapping around. Exhausted streams are skipped.
///
/// The rotation is strict: while the current stream is pending, later
/// streams are not polled, so the output order is independent of timing.
#[must_use = "streams do nothing unless polled"]
pub struct Interleave<S> {
    streams: Vec<S>,
    ratios: Vec<usize>,
    exhausted: Vec<bool>,
    remaining: usize,
    index: usize,
    delivered: usize,
}

/// Interleave streams one element at a time
pub fn interleave<S>(streams: Vec<S>) -> Interleave<S>
where
    S: Stream + Unpin,
{
    let ratios = vec![1; streams.len()];
    Interleave::build(streams, ratios)
}

/// Interleave streams according to per-stream ratios.
///
/// Fails if the number of ratios differs from the number of streams or if
/// any ratio is below 1.
pub fn interleave_with_ratios<S>(streams: Vec<S>, ratios: Vec<usize>) -> SequenceResult<Interleave<S>>
where
    S: Stream + Unpin,
{
    if let Some(bad) = ratios.iter().find(|&&r| r < 1) {
        return Err(SequenceError::invalid(format!(
            "One ratio was {}. All ratios must be >= 1",
            bad
        )));
    }
    if streams.len() != ratios.len() {
        return Err(SequenceError::invalid(format!(
            "Got {} streams and {} ratios. The counts should be equal",
            streams.len(),
            ratios.len()
        )));
    }
    Ok(Interleave::build(streams, ratios))
}

impl<S> Interleave<S> {
    fn build(streams: Vec<S>, ratios: Vec<usize>) -> Self {
        let remaining = streams.len();
        Self {
            exhausted: vec![false; remaining],
            streams,
            ratios,
            remaining,
            index: 0,
            delivered: 0,
        }
    }

    fn advance(&mut self) {
        self.delivered = 0;
        self.index = (self.index + 1) % self.streams.len();
    }
}

impl<S> Stream for Interleave<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if this.remaining == 0 {
                return Poll::Ready(None);
            }

            let i = this.index;
            if this.exhausted[i] || this.delivered == this.ratios[i] {
                this.advance();
                continue;
            }

            match Pin::new(&mut this.streams[i]).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    this.delivered += 1;
                    return Poll::Ready(Some(item));
                }
                Poll::Ready(None) => {
                    this.exhausted[i] = true;
                    this.remaining -= 1;
                    this.advance();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
