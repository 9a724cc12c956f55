//! Ordered k-way merge over a min-heap of stream heads

use futures_core::Stream;
use futures_util::ready;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::PeekableStream;

/// The next element of one source, ordered for a min-heap
struct Head<T, F> {
    item: T,
    source: usize,
    compare: Arc<F>,
}

impl<T, F> PartialEq for Head<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T, F> Eq for Head<T, F> where F: Fn(&T, &T) -> Ordering {}

impl<T, F> PartialOrd for Head<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, F> Ord for Head<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn cmp(&self, other: &Self) -> Ordering {
        // Smallest element on top, then lowest source index
        (self.compare)(&other.item, &self.item).then_with(|| other.source.cmp(&self.source))
    }
}

/// Merges streams that are each sorted under the same comparator into one
/// sorted stream.
///
/// Every source contributes at most one element to the heap. After an
/// element is delivered its source is polled again before the next
/// comparison, so each delivery costs `O(log s)` for `s` sources. Equal
/// elements are delivered in source order (lowest index first).
///
/// Sources must be individually non-decreasing under the comparator. This
/// is not checked: unsorted input yields unsorted output.
#[must_use = "streams do nothing unless polled"]
pub struct OrderedMerge<S, F>
where
    S: Stream,
{
    sources: Vec<S>,
    heap: BinaryHeap<Head<S::Item, F>>,
    refill: Vec<usize>,
    compare: Arc<F>,
}

// Elements are held by value and never pinned.
impl<S, F> Unpin for OrderedMerge<S, F> where S: Stream + Unpin {}

/// Merge streams of `Ord` elements
pub fn merge<S, I>(streams: I) -> OrderedMerge<S, fn(&S::Item, &S::Item) -> Ordering>
where
    I: IntoIterator<Item = S>,
    S: Stream + Unpin,
    S::Item: Ord,
{
    merge_by(streams, Ord::cmp as fn(&S::Item, &S::Item) -> Ordering)
}

/// Merge streams sorted under `compare`
pub fn merge_by<S, I, F>(streams: I, compare: F) -> OrderedMerge<S, F>
where
    I: IntoIterator<Item = S>,
    S: Stream + Unpin,
    F: Fn(&S::Item, &S::Item) -> Ordering,
{
    let sources: Vec<S> = streams.into_iter().collect();
    OrderedMerge {
        heap: BinaryHeap::with_capacity(sources.len()),
        refill: (0..sources.len()).collect(),
        sources,
        compare: Arc::new(compare),
    }
}

/// Merge streams sorted by a key projection
pub fn merge_by_key<S, I, K, KF>(
    streams: I,
    key: KF,
) -> OrderedMerge<S, impl Fn(&S::Item, &S::Item) -> Ordering>
where
    I: IntoIterator<Item = S>,
    S: Stream + Unpin,
    K: Ord,
    KF: Fn(&S::Item) -> K,
{
    merge_by(streams, move |a: &S::Item, b: &S::Item| key(a).cmp(&key(b)))
}

impl<S, F> OrderedMerge<S, F>
where
    S: Stream + Unpin,
    F: Fn(&S::Item, &S::Item) -> Ordering,
{
    /// Number of sources not yet known to be exhausted
    pub fn live_sources(&self) -> usize {
        self.heap.len() + self.refill.len()
    }

    /// Make sure every live source has its head in the heap
    fn poll_fill(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let mut pending = false;
        let mut i = 0;
        while i < self.refill.len() {
            let source = self.refill[i];
            match Pin::new(&mut self.sources[source]).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    self.heap.push(Head {
                        item,
                        source,
                        compare: Arc::clone(&self.compare),
                    });
                    self.refill.swap_remove(i);
                }
                Poll::Ready(None) => {
                    self.refill.swap_remove(i);
                }
                Poll::Pending => {
                    pending = true;
                    i += 1;
                }
            }
        }

        if pending {
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }
}

impl<S, F> Stream for OrderedMerge<S, F>
where
    S: Stream + Unpin,
    F: Fn(&S::Item, &S::Item) -> Ordering,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        ready!(this.poll_fill(cx));

        match this.heap.pop() {
            Some(head) => {
                this.refill.push(head.source);
                Poll::Ready(Some(head.item))
            }
            None => Poll::Ready(None),
        }
    }
}

impl<S, F> PeekableStream for OrderedMerge<S, F>
where
    S: Stream + Unpin,
    F: Fn(&S::Item, &S::Item) -> Ordering,
{
    fn poll_peek(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<&Self::Item>> {
        let this = self.get_mut();
        ready!(this.poll_fill(cx));
        Poll::Ready(this.heap.peek().map(|head| &head.item))
    }
}

impl<S, F> fmt::Debug for OrderedMerge<S, F>
where
    S: Stream,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedMerge")
            .field("sources", &self.sources.len())
            .field("heads", &self.heap.len())
            .field("awaiting", &self.refill.len())
            .finish()
    }
}
