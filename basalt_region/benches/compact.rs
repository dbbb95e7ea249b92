//! Compaction and load benchmarks.
//!
//! Measures the two hot paths: serializing a constructor tree into a region
//! and sweeping the region back into a live graph.

use basalt_region::{Compactor, Region};
use basalt_runtime::object::ObjPtr;
use basalt_runtime::{mk_ctor, mk_string};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Build a full binary tree of constructors with string leaves.
fn build_tree(depth: usize, label: &str) -> ObjPtr {
    if depth == 0 {
        return mk_string(label);
    }
    let left = build_tree(depth - 1, label);
    let right = build_tree(depth - 1, label);
    mk_ctor(0, &[left, right])
}

fn bench_compact(c: &mut Criterion) {
    let mut group = c.benchmark_group("compact");
    for depth in [8usize, 12] {
        let root = build_tree(depth, "leaf");
        group.throughput(Throughput::Elements(1 << depth));
        group.bench_with_input(BenchmarkId::new("tree", depth), &root, |b, &root| {
            b.iter(|| {
                let mut compactor = Compactor::new();
                unsafe { compactor.compact(black_box(root)) };
                black_box(compactor.size())
            });
        });
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let root = build_tree(12, "leaf");
    let mut compactor = Compactor::new();
    unsafe { compactor.compact(root) };

    c.bench_function("load/tree_12", |b| {
        b.iter(|| {
            let mut region = Region::from_compactor(&compactor);
            black_box(region.read())
        });
    });
}

criterion_group!(benches, bench_compact, bench_load);
criterion_main!(benches);
