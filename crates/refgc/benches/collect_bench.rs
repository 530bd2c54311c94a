//! refgc Collection Benchmarks
//!
//! Run with: `cargo bench --package refgc`

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use refgc::{
    finalizer_fn, CollectOptions, GarbageCollector, GcConfig, ObjectHandle, ReferenceTier,
};

fn create_gc() -> GarbageCollector {
    let mut config = GcConfig::default();
    config.logger.record_events = false;
    GarbageCollector::new(config).unwrap()
}

/// Rooted linked list of `len` objects
fn build_chain(gc: &GarbageCollector, len: usize) -> ObjectHandle {
    let head = gc.allocate().unwrap();
    gc.roots_add("head", head).unwrap();
    let mut prev = head;
    for _ in 1..len {
        let next = gc.allocate().unwrap();
        gc.link(prev, "next", next).unwrap();
        prev = next;
    }
    head
}

/// One rooted hub pointing at `width` leaves, each with a weak handle
fn build_fan_out(gc: &GarbageCollector, width: usize) -> ObjectHandle {
    let queue = gc.queue_create();
    let hub = gc.allocate().unwrap();
    gc.roots_add("hub", hub).unwrap();
    for i in 0..width {
        let leaf = gc.allocate().unwrap();
        gc.link(hub, &format!("leaf{}", i), leaf).unwrap();
        gc.create_reference(ReferenceTier::Weak, leaf, Some(queue))
            .unwrap();
    }
    hub
}

fn bench_trace_live(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace_live");

    for &size in &[100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));

        let gc = create_gc();
        build_chain(&gc, size);
        group.bench_with_input(BenchmarkId::new("chain", size), &size, |b, _| {
            b.iter(|| black_box(gc.collect(CollectOptions::default()).unwrap()))
        });

        let gc = create_gc();
        build_fan_out(&gc, size);
        group.bench_with_input(BenchmarkId::new("fan_out", size), &size, |b, _| {
            b.iter(|| black_box(gc.collect(CollectOptions::default()).unwrap()))
        });
    }

    group.finish();
}

fn bench_reclaim(c: &mut Criterion) {
    let mut group = c.benchmark_group("reclaim");

    for &size in &[100usize, 1_000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("fan_out_weak", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let gc = create_gc();
                    build_fan_out(&gc, size);
                    gc.roots_remove("hub").unwrap();
                    gc
                },
                |gc| {
                    let report = gc.collect(CollectOptions::default()).unwrap();
                    black_box((report, gc))
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("soft", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let gc = create_gc();
                    for _ in 0..size {
                        let obj = gc.allocate().unwrap();
                        gc.create_reference(ReferenceTier::Soft, obj, None).unwrap();
                    }
                    gc
                },
                |gc| {
                    let report = gc.collect(CollectOptions::under_pressure()).unwrap();
                    black_box((report, gc))
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_finalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("finalization");

    for &size in &[10usize, 100] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("finalizers", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let gc = create_gc();
                    for _ in 0..size {
                        gc.allocate_with_finalizer(finalizer_fn(|_| Ok(()))).unwrap();
                    }
                    gc
                },
                |gc| {
                    let report = gc.collect(CollectOptions::default()).unwrap();
                    black_box((report, gc))
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_trace_live, bench_reclaim, bench_finalization);
criterion_main!(benches);
