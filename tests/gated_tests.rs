use async_stream::stream;
use futures::future::join_all;
use futures_util::stream::{self, BoxStream, StreamExt};
use rand::Rng;
use shardflow::prelude::*;
use shardflow::sequence::{default_permits, get_global_gate};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

/// Tracks how many calls are inside any instrumented source at once
#[derive(Clone, Default)]
struct InFlight {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl InFlight {
    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn instrumented(len: usize, in_flight: InFlight) -> BoxStream<'static, usize> {
    stream! {
        for i in 0..len {
            let now = in_flight.current.fetch_add(1, Ordering::SeqCst) + 1;
            in_flight.peak.fetch_max(now, Ordering::SeqCst);
            let delay = rand::thread_rng().gen_range(1..4);
            sleep(Duration::from_millis(delay)).await;
            in_flight.current.fetch_sub(1, Ordering::SeqCst);
            yield i;
        }
    }
    .boxed()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gate_bounds_concurrent_calls() {
    let permits = 3;
    let gate = Arc::new(Semaphore::new(permits));
    let in_flight = InFlight::default();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gated = instrumented(20, in_flight.clone()).gate_seq(Arc::clone(&gate));
            tokio::spawn(async move { gated.collect::<Vec<_>>().await })
        })
        .collect();

    for result in join_all(handles).await {
        assert_eq!(result.unwrap(), (0..20).collect::<Vec<_>>());
    }

    assert!(in_flight.peak() >= 1);
    assert!(in_flight.peak() <= permits, "peak {} above {}", in_flight.peak(), permits);
    assert_eq!(gate.available_permits(), permits);
}

#[tokio::test]
async fn test_pending_call_keeps_its_permit() {
    let gate = Arc::new(Semaphore::new(1));
    let mut blocked = stream::pending::<u8>().gate_seq(Arc::clone(&gate));
    let mut waiting = stream::iter(vec![7u8]).gate_seq(Arc::clone(&gate));

    assert!(timeout(Duration::from_millis(20), blocked.next()).await.is_err());
    assert!(blocked.holds_permit());
    assert_eq!(gate.available_permits(), 0);

    // No permit left for the second stream
    assert!(timeout(Duration::from_millis(20), waiting.next()).await.is_err());

    drop(blocked);
    assert_eq!(waiting.next().await, Some(7));
    assert_eq!(waiting.next().await, None);
    assert_eq!(gate.available_permits(), 1);
}

#[tokio::test]
async fn test_permit_released_on_exhaustion() {
    let gate = Arc::new(Semaphore::new(2));
    let mut gated = stream::iter(Vec::<u8>::new()).gate_seq(Arc::clone(&gate));
    assert_eq!(gated.next().await, None);
    assert!(!gated.holds_permit());
    assert_eq!(gate.available_permits(), 2);
    assert!(Arc::ptr_eq(gated.gate(), &gate));
}

#[tokio::test]
async fn test_gate_closed_while_waiting_ends_stream() {
    let gate = Arc::new(Semaphore::new(1));
    let held = Arc::clone(&gate).acquire_owned().await.unwrap();
    let mut gated = stream::iter(vec![1, 2]).gate_seq(Arc::clone(&gate));

    assert!(timeout(Duration::from_millis(20), gated.next()).await.is_err());
    gate.close();
    assert_eq!(gated.next().await, None);
    assert_eq!(gated.next().await, None);
    drop(held);
}

#[test]
fn test_global_gate_is_shared() {
    let a = get_global_gate();
    let b = get_global_gate();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &*GLOBAL_GATE));
    assert_eq!(default_permits(), num_cpus::get() * 2);
}
