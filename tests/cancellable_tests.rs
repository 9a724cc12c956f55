use futures_util::stream::{self, StreamExt};
use shardflow::prelude::*;
use std::io;
use std::sync::Arc;

#[tokio::test]
async fn test_limit_delivers_exactly_k() {
    let signal = CancelSignal::new();
    let limited = Cancellable::with_limit(stream::iter(0..100), signal.clone(), 3).unwrap();
    assert_eq!(limited.limit(), Some(3));

    let result: Vec<_> = limited.collect().await;
    assert_eq!(result, vec![0, 1, 2]);
    assert!(signal.is_cancelled());
}

#[tokio::test]
async fn test_limit_stops_siblings_sharing_the_signal() {
    let signal = CancelSignal::new();
    let mut limited = stream::iter(0..100)
        .cancellable_with_limit_seq(signal.clone(), 2)
        .unwrap();
    let mut sibling = stream::iter(0..100).cancellable_seq(signal.clone());

    assert_eq!(sibling.next().await, Some(0));
    assert_eq!(limited.next().await, Some(0));
    assert!(!sibling.is_closed());
    assert_eq!(limited.next().await, Some(1));
    assert_eq!(limited.delivered(), 2);

    assert!(sibling.is_closed());
    assert_eq!(sibling.next().await, None);
    assert_eq!(limited.next().await, None);
}

#[tokio::test]
async fn test_limit_above_length_ends_normally() {
    let mut limited = single_with_limit(stream::iter(vec![1, 2]), 10).unwrap();
    assert_eq!(limited.next().await, Some(1));
    assert_eq!(limited.next().await, Some(2));
    assert_eq!(limited.next().await, None);
    assert!(!limited.is_closed());
}

#[test]
fn test_zero_limit_is_rejected() {
    assert!(matches!(
        single_with_limit(stream::iter(vec![1]), 0),
        Err(SequenceError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        Cancellable::with_limit(stream::iter(vec![1]), CancelSignal::new(), 0),
        Err(SequenceError::InvalidConfiguration(_))
    ));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut seq = single(stream::iter(vec![1, 2, 3]));
    assert_eq!(seq.next().await, Some(1));

    seq.close();
    seq.close();
    assert!(seq.is_closed());
    assert!(seq.signal().is_cancelled());
    assert_eq!(seq.next().await, None);
    assert!(seq.error().is_none());
}

#[tokio::test]
async fn test_close_after_exhaustion_changes_nothing() {
    let mut seq = single(stream::iter(vec![1]));
    assert_eq!(seq.next().await, Some(1));
    assert_eq!(seq.next().await, None);
    seq.close();
    assert_eq!(seq.next().await, None);
}

#[test]
fn test_drop_cancels_signal() {
    let signal = CancelSignal::new();
    {
        let _seq = stream::iter(vec![1]).cancellable_seq(signal.clone());
        assert!(signal.should_continue());
    }
    assert!(signal.is_cancelled());
}

#[tokio::test]
async fn test_has_next_is_false_once_closed() {
    let mut seq = single(stream::iter(vec![1, 2]).peekable_seq());
    assert!(seq.has_next().await);
    assert_eq!(seq.peek().await, Some(&1));
    seq.close();
    assert!(!seq.has_next().await);
}

#[tokio::test]
async fn test_cancellable_stream_composes_and_cancels_on_drop() {
    let signal = CancelSignal::new();
    let erased = stream::iter(1..=10)
        .cancellable_seq(signal.clone())
        .into_stream();
    assert!(erased.signal().same_signal(&signal));

    let doubled: Vec<_> = erased
        .filter(|x| futures::future::ready(x % 2 == 0))
        .map(|x| x * 2)
        .take(2)
        .collect()
        .await;
    assert_eq!(doubled, vec![4, 8]);

    // The combinator chain owned the stream and has been dropped
    assert!(signal.is_cancelled());
}

#[tokio::test]
async fn test_drain_collects_remaining_elements() {
    let erased = single(stream::iter(vec!["a", "b"])).into_stream();
    assert_eq!(erased.drain().await.unwrap(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_drain_reports_recorded_failure() {
    let signal = CancelSignal::new();
    let erased = stream::iter(vec![1, 2])
        .cancellable_seq(signal.clone())
        .into_stream();

    let failure = io::Error::new(io::ErrorKind::Other, "disk read failed");
    signal.fail(SequenceError::Producer(Arc::new(failure)));

    match erased.drain().await {
        Err(err) => {
            assert!(err.is_producer_failure());
            assert_eq!(err.to_string(), "Producer failed: disk read failed");
        }
        Ok(items) => panic!("expected failure, got {:?}", items),
    }
}

#[tokio::test]
async fn test_finish_closes_pipeline() {
    let signal = CancelSignal::new();
    let mut erased = stream::iter(0..).cancellable_seq(signal.clone()).into_stream();
    assert_eq!(erased.next().await, Some(0));
    assert!(!erased.is_closed());
    assert!(erased.finish().is_ok());
    assert!(signal.is_cancelled());
}
