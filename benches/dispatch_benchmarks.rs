//! Performance benchmarks for registry matching and dispatch.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use neurobus::{BusConfig, Event, NeuroBus};
use tokio::runtime::Runtime;

/// Throughput of matching a single event against registries of growing size.
fn benchmark_registry_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_matching");

    for subscriber_count in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*subscriber_count as u64));

        group.bench_with_input(
            BenchmarkId::new("find_matches", subscriber_count),
            subscriber_count,
            |b, &subscriber_count| {
                let bus = NeuroBus::default();
                bus.start().unwrap();
                for i in 0..subscriber_count {
                    bus.subscribe("bench.*")
                        .priority(i as i64)
                        .handler(|_event| async { Ok(()) })
                        .unwrap();
                }

                b.iter(|| {
                    let subscriptions = bus.get_subscriptions();
                    black_box(subscriptions.len());
                });
            },
        );
    }

    group.finish();
}

/// End-to-end publish latency with a single cheap subscriber.
fn benchmark_publish_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("publish_latency");

    group.bench_function("single_subscriber", |b| {
        let bus = NeuroBus::default();
        bus.start().unwrap();
        bus.subscribe("bench.event")
            .handler(|_event| async { Ok(()) })
            .unwrap();

        b.iter(|| {
            rt.block_on(async {
                let report = bus
                    .publish(Event::new("bench.event").unwrap())
                    .await
                    .unwrap()
                    .wait()
                    .await
                    .unwrap();
                black_box(report);
            });
        });
    });

    group.finish();
}

/// Parallel dispatch across a growing subscriber fan-out.
fn benchmark_parallel_fan_out(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("parallel_fan_out");
    group.measurement_time(std::time::Duration::from_secs(5));

    for subscriber_count in [1, 8, 32].iter() {
        group.bench_with_input(
            BenchmarkId::new("fan_out", subscriber_count),
            subscriber_count,
            |b, &subscriber_count| {
                let bus = NeuroBus::default();
                bus.start().unwrap();
                for _ in 0..subscriber_count {
                    bus.subscribe("bench.fanout")
                        .handler(|_event| async { Ok(()) })
                        .unwrap();
                }

                b.iter(|| {
                    rt.block_on(async {
                        let report = bus
                            .publish(Event::new("bench.fanout").unwrap())
                            .await
                            .unwrap()
                            .wait()
                            .await
                            .unwrap();
                        black_box(report);
                    });
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_registry_matching,
    benchmark_publish_latency,
    benchmark_parallel_fan_out
);
criterion_main!(benches);
