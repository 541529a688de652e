//! Benchmarks for the task pool.
//!
//! Benchmarks cover:
//! - Raw BoundedQueue push/pop throughput, bounded and unbounded
//! - End-to-end submit-and-drain for each queue layout and strategy

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use prometheus_task_pool::config::{SchedulerConfig, WorkerPoolConfig};
use prometheus_task_pool::core::{task, BoundedQueue, WorkerPool};

const TASKS: u64 = 2_000;

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");
    group.throughput(Throughput::Elements(TASKS));

    for capacity in [None, NonZeroUsize::new(16)] {
        let label = capacity.map_or_else(|| "unbounded".to_string(), |c| format!("cap_{c}"));
        group.bench_with_input(
            BenchmarkId::new("spsc", &label),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let queue = Arc::new(BoundedQueue::with_capacity(capacity));
                    let producer_queue = Arc::clone(&queue);
                    let producer = thread::spawn(move || {
                        for i in 0..TASKS {
                            producer_queue.push(i);
                        }
                    });
                    let mut sum = 0;
                    for _ in 0..TASKS {
                        sum += queue.pop();
                    }
                    producer.join().unwrap();
                    black_box(sum)
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Pool Benchmarks
// ============================================================================

fn configs() -> Vec<(&'static str, WorkerPoolConfig)> {
    let base = WorkerPoolConfig::new().with_worker_count(4);
    vec![
        ("shared_unbounded", base.clone()),
        ("shared_cap_64", base.clone().with_queue_capacity(64)),
        ("round_robin", base.clone().with_scheduler(SchedulerConfig::RoundRobin)),
        (
            "least_busy_first",
            base.clone().with_scheduler(SchedulerConfig::LeastBusyFirst),
        ),
        (
            "topic_partition",
            base.with_scheduler(SchedulerConfig::TopicPartition {
                topics: vec!["even".into(), "odd".into()],
            }),
        ),
    ]
}

fn bench_submit_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_and_drain");
    group.throughput(Throughput::Elements(TASKS));
    group.sample_size(20);

    for (name, config) in configs() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &config, |b, config| {
            b.iter(|| {
                let pool = WorkerPool::new(config.clone()).unwrap();
                let sum = Arc::new(AtomicU64::new(0));
                for i in 0..TASKS {
                    let sum = Arc::clone(&sum);
                    let work = move || {
                        sum.fetch_add(black_box(i), Ordering::Relaxed);
                    };
                    let topic = if i % 2 == 0 { "even" } else { "odd" };
                    pool.submit(task::routed(topic, work)).unwrap();
                }
                pool.shutdown_and_join().unwrap();
                black_box(sum.load(Ordering::Relaxed))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_queue, bench_submit_and_drain);
criterion_main!(benches);
