//! Criterion-based pipeline benchmark
//!
//! Run: cargo bench --bench bench_pipeline

use criterion::{ criterion_group, criterion_main, BenchmarkId, Criterion, Throughput };
use std::hint::black_box;
use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::Arc;
use std::thread;

use ripple::disruptor::{
    ClaimStrategyType,
    FnHandler,
    RingBuffer,
    RingBufferConfig,
    Sequence,
    WaitStrategyType,
};

const RING_SIZE: usize = 64 * 1024;
const BATCH_SIZE: usize = 256;
const TOTAL_EVENTS: u64 = 1_000_000;

fn strategies() -> [(&'static str, WaitStrategyType); 3] {
    [
        ("blocking", WaitStrategyType::Blocking),
        ("yielding", WaitStrategyType::Yielding),
        ("busy-spin", WaitStrategyType::BusySpin),
    ]
}

/// One producer, `stages` chained consumers, returns when the last stage drained
fn pipeline(events: u64, stages: usize, batch: usize, wait: WaitStrategyType) -> u64 {
    let config = RingBufferConfig::new(RING_SIZE)
        .unwrap()
        .with_claim_strategy(ClaimStrategyType::SingleProducer)
        .with_wait_strategy(wait);
    let ring = RingBuffer::new(|| 0u64, config).unwrap();

    let sum = Arc::new(AtomicU64::new(0));
    let mut group = ring
        .consume_with(
            vec![
                Box::new(
                    FnHandler::new(|_, value: &u64| {
                        black_box(*value);
                        Ok(())
                    })
                )
            ]
        )
        .unwrap();
    for _ in 1..stages {
        let sum = sum.clone();
        group = group
            .then(
                vec![
                    Box::new(
                        FnHandler::new(move |_, value: &u64| {
                            sum.fetch_add(*value, Ordering::Relaxed);
                            Ok(())
                        })
                    )
                ]
            )
            .unwrap();
    }
    let tail = group.consumers().remove(0);

    let producer = ring.create_producer_barrier().unwrap();
    ring.start_consumers().unwrap();

    let mut published = 0u64;
    while published < events {
        let size = ((events - published) as usize).min(batch);
        producer
            .publish_batch(size, |seq, slot| {
                *slot = seq as u64;
            })
            .unwrap();
        published += size as u64;
    }

    let last = (events as Sequence) - 1;
    while tail.sequence() < last {
        thread::yield_now();
    }
    ring.halt().unwrap();
    black_box(sum.load(Ordering::Relaxed));
    events
}

/// Several producers racing on one ring
fn multi_producer(events: u64, producers: usize, wait: WaitStrategyType) -> u64 {
    let config = RingBufferConfig::new(RING_SIZE)
        .unwrap()
        .with_claim_strategy(ClaimStrategyType::MultiProducer)
        .with_wait_strategy(wait);
    let ring = RingBuffer::new(|| 0u64, config).unwrap();
    let stage = ring
        .consume_with(vec![Box::new(FnHandler::new(|_, value: &u64| {
            black_box(*value);
            Ok(())
        }))])
        .unwrap()
        .consumers()
        .remove(0);
    let producer = ring.create_producer_barrier().unwrap();
    ring.start_consumers().unwrap();

    let per_producer = events / (producers as u64);
    let workers: Vec<_> = (0..producers)
        .map(|_| {
            let producer = producer.clone();
            thread::spawn(move || {
                for value in 0..per_producer {
                    producer.publish_event(|_, slot| *slot = value);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let last = ring.cursor();
    while stage.sequence() < last {
        thread::yield_now();
    }
    ring.halt().unwrap();
    per_producer * (producers as u64)
}

fn benchmark_wait_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("Single Stage by Wait Strategy");
    group.throughput(Throughput::Elements(TOTAL_EVENTS));
    group.sample_size(10);

    for (name, wait) in strategies() {
        group.bench_function(BenchmarkId::new("per-event", name), |b| {
            b.iter(|| pipeline(TOTAL_EVENTS, 1, 1, wait))
        });
        group.bench_function(BenchmarkId::new("batch", name), |b| {
            b.iter(|| pipeline(TOTAL_EVENTS, 1, BATCH_SIZE, wait))
        });
    }
    group.finish();
}

fn benchmark_chain_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("Chained Stages (yielding)");
    group.throughput(Throughput::Elements(TOTAL_EVENTS));
    group.sample_size(10);

    for stages in [1usize, 2, 3] {
        group.bench_function(BenchmarkId::new("stages", stages), |b| {
            b.iter(|| pipeline(TOTAL_EVENTS, stages, BATCH_SIZE, WaitStrategyType::Yielding))
        });
    }
    group.finish();
}

fn benchmark_multi_producer(c: &mut Criterion) {
    let mut group = c.benchmark_group("Multi Producer (yielding)");
    group.throughput(Throughput::Elements(TOTAL_EVENTS));
    group.sample_size(10);

    for producers in [2usize, 4] {
        group.bench_function(BenchmarkId::new("producers", producers), |b| {
            b.iter(|| multi_producer(TOTAL_EVENTS, producers, WaitStrategyType::Yielding))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_wait_strategies, benchmark_chain_length, benchmark_multi_producer);
criterion_main!(benches);
