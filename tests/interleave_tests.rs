use async_stream::stream;
use futures_util::stream::{self, BoxStream, StreamExt};
use shardflow::prelude::*;
use std::time::Duration;

type Source = stream::Iter<std::vec::IntoIter<&'static str>>;

fn letters() -> Source {
    stream::iter(vec!["a", "b", "c", "d", "e"])
}

fn digits() -> Source {
    stream::iter(vec!["1", "2", "3"])
}

fn delayed(items: Vec<&'static str>, delay: Duration) -> BoxStream<'static, &'static str> {
    stream! {
        for item in items {
            tokio::time::sleep(delay).await;
            yield item;
        }
    }
    .boxed()
}

#[tokio::test]
async fn test_interleave_one_to_one() {
    let result: Vec<_> = interleave(vec![letters(), digits()]).collect().await;
    assert_eq!(result, vec!["a", "1", "b", "2", "c", "3", "d", "e"]);
}

#[tokio::test]
async fn test_interleave_with_ratios() {
    let result: Vec<_> = interleave_with_ratios(vec![letters(), digits()], vec![2, 1])
        .unwrap()
        .collect()
        .await;
    assert_eq!(result, vec!["a", "b", "1", "c", "d", "2", "e", "3"]);
}

#[tokio::test]
async fn test_interleave_skips_exhausted_streams() {
    let first = stream::iter(vec!["x"]);
    let second = stream::iter(vec!["1", "2", "3", "4"]);
    let third = stream::iter(vec!["p", "q"]);
    let result: Vec<_> = interleave_with_ratios(vec![first, second, third], vec![1, 2, 1])
        .unwrap()
        .collect()
        .await;
    assert_eq!(result, vec!["x", "1", "2", "p", "3", "4", "q"]);
}

#[tokio::test]
async fn test_interleave_order_independent_of_timing() {
    // The slow stream still gets its turn first
    let slow = delayed(vec!["a", "b", "c"], Duration::from_millis(10));
    let fast = delayed(vec!["1", "2", "3"], Duration::ZERO);
    let result: Vec<_> = interleave(vec![slow, fast]).collect().await;
    assert_eq!(result, vec!["a", "1", "b", "2", "c", "3"]);
}

#[tokio::test]
async fn test_interleave_empty_inputs() {
    let none: Vec<i32> = interleave(Vec::<stream::Iter<std::vec::IntoIter<i32>>>::new())
        .collect()
        .await;
    assert!(none.is_empty());

    let all_empty: Vec<i32> = interleave(vec![stream::iter(Vec::<i32>::new()), stream::iter(Vec::<i32>::new())])
        .collect()
        .await;
    assert!(all_empty.is_empty());
}

#[test]
fn test_interleave_rejects_zero_ratio() {
    match interleave_with_ratios(vec![letters(), digits()], vec![1, 0]) {
        Err(SequenceError::InvalidConfiguration(msg)) => {
            assert_eq!(msg, "One ratio was 0. All ratios must be >= 1")
        }
        _ => panic!("zero ratio should be rejected"),
    }
}

#[test]
fn test_interleave_rejects_count_mismatch() {
    match interleave_with_ratios(vec![letters(), digits()], vec![1, 1, 1]) {
        Err(SequenceError::InvalidConfiguration(msg)) => {
            assert_eq!(msg, "Got 2 streams and 3 ratios. The counts should be equal")
        }
        _ => panic!("mismatched ratios should be rejected"),
    }
}
