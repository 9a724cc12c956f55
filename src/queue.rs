//! Bounded handoff queue between a background producer and one consumer
//!
//! Capacity is `buffer_size - 1` (at least 1): the element a producer is
//! currently offering counts as the remaining slot. Offers and polls are
//! bounded by timeouts so both sides can re-check a cancellation signal
//! between attempts.

use std::fmt;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::OfferError;
use crate::stream_configuration::BufferConfig;

/// Create a bounded queue sized by [`BufferConfig::queue_capacity`]
pub fn bounded<T>(config: &BufferConfig) -> (QueueProducer<T>, QueueConsumer<T>) {
    let capacity = config.queue_capacity();
    let (sender, receiver) = mpsc::channel(capacity);
    (
        QueueProducer { sender },
        QueueConsumer { receiver, capacity },
    )
}

/// Outcome of a timed poll on the consuming side
#[derive(Debug, Clone, PartialEq)]
pub enum Polled<T> {
    Item(T),
    /// Nothing arrived within the timeout; the producer may still deliver
    Empty,
    /// The producer is gone and the queue is drained
    Closed,
}

/// Producing half of the queue, owned by the background task
pub struct QueueProducer<T> {
    sender: mpsc::Sender<T>,
}

impl<T> QueueProducer<T> {
    /// Offer an element, waiting at most `timeout` for free capacity.
    /// On failure the element is handed back inside the error.
    pub async fn offer(&self, item: T, timeout: Duration) -> Result<(), OfferError<T>> {
        match tokio::time::timeout(timeout, self.sender.reserve()).await {
            Ok(Ok(permit)) => {
                permit.send(item);
                Ok(())
            }
            Ok(Err(_)) => Err(OfferError::Closed(item)),
            Err(_) => Err(OfferError::Timeout(item)),
        }
    }

    /// True once the consumer has been dropped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the consumer has been dropped
    pub async fn closed(&self) {
        self.sender.closed().await
    }
}

/// Consuming half of the queue, owned by the foreground sequence
pub struct QueueConsumer<T> {
    receiver: mpsc::Receiver<T>,
    capacity: usize,
}

impl<T> QueueConsumer<T> {
    /// Poll for the next element without a timeout
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_recv(cx)
    }

    /// Wait at most `timeout` for the next element
    pub async fn poll_timeout(&mut self, timeout: Duration) -> Polled<T> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(item)) => Polled::Item(item),
            Ok(None) => Polled::Closed,
            Err(_) => Polled::Empty,
        }
    }

    /// Number of elements currently held
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue statistics for monitoring
    pub fn stats(&self) -> QueueStats {
        let length = self.len();
        QueueStats {
            length,
            capacity: self.capacity,
            utilization: length as f64 / self.capacity as f64,
        }
    }
}

impl<T> fmt::Debug for QueueConsumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueConsumer")
            .field("capacity", &self.capacity)
            .field("length", &self.len())
            .finish()
    }
}

/// Queue statistics for monitoring and debugging
#[derive(Debug, Clone)]
pub struct QueueStats {
    pub length: usize,
    pub capacity: usize,
    pub utilization: f64,
}

impl fmt::Display for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queue({}/{}, {:.1}%)",
            self.length,
            self.capacity,
            self.utilization * 100.0
        )
    }
}
