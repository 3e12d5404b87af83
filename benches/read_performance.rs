//! Read-path benchmarks for kindconf.
//!
//! Typed accessors load a snapshot through `arc-swap`, so reads should stay
//! flat as readers are added and while `set` publishes new snapshots.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kindconf::prelude::*;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct BenchConfig {
    value: i64,
    name: String,
    flag: bool,
    items: Vec<String>,
}

impl ConfigKind for BenchConfig {
    const NAME: &'static str = "bench";

    fn schema() -> Schema {
        Schema::new()
            .field("value", 42, "")
            .field("name", "benchmark", "")
            .field("flag", true, "")
            .field("items", "a,b,c", "")
    }
}

fn manager(dir: &TempDir) -> Arc<ConfigManager<BenchConfig>> {
    let manager = Arc::new(ConfigManager::with_options(
        ManagerOptions::for_kind::<BenchConfig>()
            .with_search_paths([dir.path()])
            .without_env(),
    ));
    manager.initialize().unwrap();
    manager
}

/// Benchmark single-threaded typed reads
fn benchmark_typed_reads(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let config = manager(&dir);

    let mut group = c.benchmark_group("typed_reads");
    group.bench_function("get_int", |b| {
        b.iter(|| black_box(config.get_int("value")));
    });
    group.bench_function("get_string", |b| {
        b.iter(|| black_box(config.get_string("name")));
    });
    group.bench_function("get_string_slice", |b| {
        b.iter(|| black_box(config.get_string_slice("items")));
    });
    group.bench_function("get_config", |b| {
        b.iter(|| black_box(config.get_config().unwrap()));
    });
    group.finish();
}

/// Benchmark concurrent reads with varying thread counts
fn benchmark_concurrent_reads(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let config = manager(&dir);
    let mut group = c.benchmark_group("concurrent_reads");

    for num_threads in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let barrier = Arc::new(Barrier::new(num_threads + 1));

                b.iter_custom(|iters| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let cfg = Arc::clone(&config);
                            let start = Arc::clone(&barrier);
                            thread::spawn(move || {
                                start.wait();
                                let began = std::time::Instant::now();
                                for _ in 0..iters {
                                    black_box(cfg.get_int("value"));
                                }
                                began.elapsed()
                            })
                        })
                        .collect();

                    barrier.wait();
                    let total: Duration = handles.into_iter().map(|h| h.join().unwrap()).sum();
                    total / num_threads as u32
                });
            },
        );
    }

    group.finish();
}

/// Benchmark reads while another thread keeps publishing overrides
fn benchmark_reads_under_writes(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let config = manager(&dir);
    let running = Arc::new(AtomicBool::new(true));

    let writer = {
        let cfg = Arc::clone(&config);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut i = 0i64;
            while running.load(Ordering::Relaxed) {
                cfg.set("value", i);
                i += 1;
                thread::sleep(Duration::from_micros(100));
            }
        })
    };

    let mut group = c.benchmark_group("reads_under_writes");
    group.bench_function("get_int", |b| {
        b.iter(|| black_box(config.get_int("value")));
    });
    group.finish();

    running.store(false, Ordering::Relaxed);
    writer.join().unwrap();
}

/// Benchmark override publication
fn benchmark_set(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let config = manager(&dir);
    let mut counter = 0i64;

    let mut group = c.benchmark_group("update");
    group.bench_function("set", |b| {
        b.iter(|| {
            counter += 1;
            config.set("value", counter);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_typed_reads,
    benchmark_concurrent_reads,
    benchmark_reads_under_writes,
    benchmark_set,
);

criterion_main!(benches);
