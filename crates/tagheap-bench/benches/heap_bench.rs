//! Allocator benchmarks.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tagheap_core::Heap;

fn bench_alloc_release_cycle(c: &mut Criterion) {
    let sizes: &[usize] = &[16, 64, 256, 1024, 4096];
    let mut group = c.benchmark_group("alloc_release_cycle");

    for &size in sizes {
        group.bench_with_input(BenchmarkId::new("tagheap", size), &size, |b, &sz| {
            let mut heap = Heap::new();
            heap.init();
            b.iter(|| {
                let ptr = heap.allocate(sz).expect("fits region");
                heap.release(criterion::black_box(ptr));
            });
        });
        group.bench_with_input(BenchmarkId::new("system", size), &size, |b, &sz| {
            b.iter(|| {
                let v = vec![0u8; sz];
                criterion::black_box(v);
            });
        });
    }
    group.finish();
}

fn bench_alloc_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_burst");

    group.bench_function("1000x64B", |b| {
        b.iter(|| {
            let mut heap = Heap::new();
            let ptrs: Vec<usize> = (0..1000)
                .map(|_| heap.allocate(64).expect("fits region"))
                .collect();
            criterion::black_box(&ptrs);
            for ptr in ptrs {
                heap.release(ptr);
            }
        });
    });

    group.finish();
}

fn bench_churn_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn_reuse");

    group.bench_function("interleaved_128B", |b| {
        let mut heap = Heap::new();
        heap.init();
        b.iter(|| {
            let first = heap.allocate(128).expect("first");
            let second = heap.allocate(128).expect("second");
            heap.release(first);
            let reused = heap.allocate(96).expect("reuses the gap");
            heap.release(second);
            heap.release(criterion::black_box(reused));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_alloc_release_cycle,
    bench_alloc_burst,
    bench_churn_reuse
);
criterion_main!(benches);
