//! Error types and handling for shardflow
//!
//! Configuration problems fail fast at construction. Producer failures
//! surface indirectly: the failing buffer stops every sequence sharing its
//! [`CancelSignal`](crate::signal::CancelSignal) and the first failure is
//! kept on the signal for the consumer to inspect.

use std::error::Error;
use std::sync::Arc;

/// Main error type for sequence operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum SequenceError {
    /// Invalid ratio, size or other construction argument
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// An inner producer failed while being drained by a background task
    #[error("Producer failed: {0}")]
    Producer(Arc<dyn Error + Send + Sync>),
    /// An inner producer panicked inside its background task
    #[error("Producer panicked")]
    ProducerPanicked,
}

impl SequenceError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SequenceError::InvalidConfiguration(msg.into())
    }

    pub(crate) fn producer<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        SequenceError::Producer(Arc::new(err))
    }

    /// True for failures raised by an inner producer
    pub fn is_producer_failure(&self) -> bool {
        matches!(
            self,
            SequenceError::Producer(_) | SequenceError::ProducerPanicked
        )
    }
}

/// Result type for shardflow operations
pub type SequenceResult<T> = Result<T, SequenceError>;

/// Error returned by [`QueueProducer::offer`](crate::queue::QueueProducer::offer).
/// Both variants hand the element back to the caller.
#[derive(Debug, PartialEq)]
pub enum OfferError<T> {
    /// The queue stayed full for the whole timeout
    Timeout(T),
    /// The consuming side has been dropped
    Closed(T),
}

impl<T> OfferError<T> {
    /// Recover the element that could not be offered
    pub fn into_inner(self) -> T {
        match self {
            OfferError::Timeout(item) | OfferError::Closed(item) => item,
        }
    }
}

impl<T> std::fmt::Display for OfferError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfferError::Timeout(_) => write!(f, "Offer timed out on a full queue"),
            OfferError::Closed(_) => write!(f, "Queue is closed"),
        }
    }
}

impl<T: std::fmt::Debug> Error for OfferError<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_errors_are_shared_on_clone() {
        let err = SequenceError::producer(std::io::Error::new(std::io::ErrorKind::Other, "shard 3 down"));
        let copy = err.clone();
        assert!(copy.is_producer_failure());
        assert_eq!(copy.to_string(), "Producer failed: shard 3 down");
    }

    #[test]
    fn offer_error_returns_element() {
        assert_eq!(OfferError::Timeout(7).into_inner(), 7);
        assert_eq!(OfferError::Closed("x").into_inner(), "x");
    }
}
