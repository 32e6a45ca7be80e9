//! Throughput Benchmark for ttlkv
//!
//! This benchmark measures the performance of the store, the sweep, and a
//! persistence cycle under various workloads.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use ttlkv::persistence::persist_pending;
use ttlkv::storage::{Selector, Store, Value, NEVER_EXPIRES};

/// Benchmark INSERT operations
fn bench_insert(c: &mut Criterion) {
    let store = Arc::new(Store::new());

    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert_text", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let _ = store.insert(format!("key:{}", i), "small_value", NEVER_EXPIRES);
            i += 1;
        });
    });

    group.bench_function("insert_sequence", |b| {
        let mut i = 0u64;
        let items: Vec<i64> = (0..256).collect();
        b.iter(|| {
            let _ = store.insert(format!("seq:{}", i), items.clone(), Duration::from_secs(3600));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark FETCH operations
fn bench_fetch(c: &mut Criterion) {
    let store = Arc::new(Store::new());

    // Pre-populate with data
    for i in 0..100_000 {
        let _ = store.insert(format!("key:{}", i), format!("value:{}", i), NEVER_EXPIRES);
    }

    let mut group = c.benchmark_group("fetch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("fetch_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.fetch(&format!("key:{}", i % 100_000)).ok());
            i += 1;
        });
    });

    group.bench_function("fetch_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.fetch(&format!("missing:{}", i)).ok());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% fetches, 20% replaces)
fn bench_mixed(c: &mut Criterion) {
    let store = Arc::new(Store::new());

    // Pre-populate
    for i in 0..10_000 {
        let _ = store.insert(format!("key:{}", i), format!("value:{}", i), NEVER_EXPIRES);
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_fetch_20_replace", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 10_000);
            if i % 5 == 0 {
                // 20% writes
                let _ = store.replace(&key, "value", NEVER_EXPIRES);
            } else {
                // 80% reads
                black_box(store.fetch(&key).ok());
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark narrowing projections
fn bench_project(c: &mut Criterion) {
    let store = Store::new();
    let mut fields: BTreeMap<String, i64> = BTreeMap::new();
    for i in 0..64 {
        fields.insert(format!("field{}", i), i);
    }
    let _ = store.insert("map", fields, NEVER_EXPIRES);
    let entry = store.fetch("map").ok();
    let selector = Selector::from("field32");

    c.bench_function("project_map_key", |b| {
        b.iter(|| black_box(entry.as_ref().map(|e| e.project(&selector))));
    });
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let store = Arc::new(Store::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let store = Arc::clone(&store);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i);
                            let _ = store.insert(key.clone(), "value", NEVER_EXPIRES);
                            let _ = store.fetch(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(store.len());
        });
    });

    group.finish();
}

/// Benchmark sweeps over a populated store
fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");

    group.bench_function("sweep_half_expired_10k", |b| {
        b.iter_batched(
            || {
                let store = Store::new();
                for i in 0..10_000 {
                    let ttl = if i % 2 == 0 {
                        Duration::from_secs(1).into()
                    } else {
                        NEVER_EXPIRES
                    };
                    let _ = store.insert(format!("key:{}", i), "value", ttl);
                }
                store
            },
            |store| black_box(store.sweep_expired(SystemTime::now() + Duration::from_secs(2))),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("sweep_nothing_expired_10k", |b| {
        let store = Store::new();
        for i in 0..10_000 {
            let _ = store.insert(format!("key:{}", i), "value", NEVER_EXPIRES);
        }
        b.iter(|| black_box(store.sweep_expired(SystemTime::now())));
    });

    group.finish();
}

/// Benchmark one persistence cycle
fn bench_persist(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current.log");

    let mut group = c.benchmark_group("persist");

    group.bench_function("persist_10k_pending", |b| {
        b.iter_batched(
            || {
                let store = Store::new();
                for i in 0..10_000 {
                    let _ = store.insert(format!("key:{}", i), Value::text("value"), NEVER_EXPIRES);
                }
                store
            },
            |store| black_box(persist_pending(&store, &path).ok()),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("persist_10k_already_persisted", |b| {
        let store = Store::new();
        for i in 0..10_000 {
            let _ = store.insert(format!("key:{}", i), "value", NEVER_EXPIRES);
        }
        let _ = persist_pending(&store, &path);
        b.iter(|| black_box(persist_pending(&store, &path).ok()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_fetch,
    bench_mixed,
    bench_project,
    bench_concurrent,
    bench_sweep,
    bench_persist,
);

criterion_main!(benches);
