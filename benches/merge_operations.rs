use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use futures_util::stream::{self, StreamExt};
use shardflow::prelude::*;
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Semaphore;

fn shard_data(shards: usize, per_shard: u64) -> Vec<Vec<u64>> {
    (0..shards as u64)
        .map(|s| (0..per_shard).map(|i| i * shards as u64 + s).collect())
        .collect()
}

fn bench_ordered_merge(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("ordered_merge");

    for shards in [2, 8, 32].iter() {
        group.bench_with_input(BenchmarkId::new("in_memory", shards), shards, |b, &shards| {
            b.to_async(&rt).iter(|| async move {
                let sources: Vec<_> = shard_data(shards, 10_000 / shards as u64)
                    .into_iter()
                    .map(stream::iter)
                    .collect();
                let result: Vec<u64> = merge(sources).collect().await;
                black_box(result)
            });
        });
    }

    group.finish();
}

fn bench_buffered_merge(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("buffered_merge");
    group.sample_size(20);

    for buffer_size in [1, 16, 128].iter() {
        group.bench_with_input(
            BenchmarkId::new("buffer_size", buffer_size),
            buffer_size,
            |b, &buffer_size| {
                b.to_async(&rt).iter(|| async move {
                    let sources: Vec<_> = shard_data(8, 2_000)
                        .into_iter()
                        .map(|items| stream::iter(items).fallible_seq())
                        .collect();
                    let merged = merge_buffered(
                        sources,
                        |a: &u64, b: &u64| a.cmp(b),
                        &Handle::current(),
                        Arc::new(Semaphore::new(4)),
                        buffer_size,
                    );
                    let result: Vec<u64> = merged.collect().await;
                    black_box(result)
                });
            },
        );
    }

    group.bench_function("limit_early_stop", |b| {
        b.to_async(&rt).iter(|| async {
            let sources: Vec<_> = (0..8u64)
                .map(|s| stream::iter((0u64..).map(move |i| i * 8 + s)).fallible_seq())
                .collect();
            let merged = merge_buffered_with_config(
                sources,
                |a: &u64, b: &u64| a.cmp(b),
                &Handle::current(),
                Arc::new(Semaphore::new(4)),
                &MergeConfig::new().buffer_size(32).limit(100),
            )
            .unwrap();
            let result: Vec<u64> = merged.collect().await;
            black_box(result)
        });
    });

    group.finish();
}

fn bench_interleave(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("interleave_ratios", |b| {
        b.to_async(&rt).iter(|| async {
            let sources = vec![stream::iter(0..5_000), stream::iter(0..5_000)];
            let result: Vec<i32> = interleave_with_ratios(sources, vec![3, 1])
                .unwrap()
                .collect()
                .await;
            black_box(result)
        });
    });
}

criterion_group!(benches, bench_ordered_merge, bench_buffered_merge, bench_interleave);
criterion_main!(benches);
