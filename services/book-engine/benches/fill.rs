//! Fill path benchmarks
//!
//! Measures inserts and weighted fills against books of different
//! depths. Run with `cargo bench -p book-engine`.

use book_engine::tree::PriceTree;
use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use types::ids::Direction;
use types::numeric::{Amount, Price};

/// One hundred units of liquidity at every level, ticks 10 apart.
fn populated_tree(levels: u32) -> PriceTree {
    let mut tree = PriceTree::new();
    for i in 0..levels {
        tree.insert(Price::new(10 + i * 10), Amount::from_u64(100));
    }
    tree
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(1));

    for levels in [1_000u32, 10_000] {
        let tree = populated_tree(levels);
        group.bench_with_input(BenchmarkId::new("new_best_level", levels), &tree, |b, tree| {
            b.iter_batched(
                || tree.clone(),
                |mut tree| {
                    tree.insert(Price::new(5), Amount::from_u64(1));
                    black_box(tree.weight())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill");

    for levels in [1_000u32, 10_000] {
        let tree = populated_tree(levels);

        // Partial fill inside the best level, no structural change.
        group.bench_with_input(BenchmarkId::new("partial_best", levels), &tree, |b, tree| {
            b.iter_batched(
                || tree.clone(),
                |mut tree| black_box(tree.fill(Direction::ZeroForOne, Amount::from_u64(50))),
                BatchSize::SmallInput,
            );
        });

        // Sweep ten whole levels off the cheap end.
        group.bench_with_input(BenchmarkId::new("sweep_10_levels", levels), &tree, |b, tree| {
            b.iter_batched(
                || tree.clone(),
                |mut tree| black_box(tree.fill(Direction::ZeroForOne, Amount::from_u64(1_000))),
                BatchSize::SmallInput,
            );
        });

        // Same sweep from the expensive end.
        group.bench_with_input(BenchmarkId::new("sweep_reverse", levels), &tree, |b, tree| {
            b.iter_batched(
                || tree.clone(),
                |mut tree| black_box(tree.fill(Direction::OneForZero, Amount::from_u64(1_000))),
                BatchSize::SmallInput,
            );
        });

        // Price-limited sweep that stops halfway down the book.
        let mid = Price::new(10 + levels / 2 * 10);
        group.bench_with_input(BenchmarkId::new("bounded_to_mid", levels), &tree, |b, tree| {
            b.iter_batched(
                || tree.clone(),
                |mut tree| {
                    black_box(tree.fill_bounded(
                        Direction::ZeroForOne,
                        Amount::from_u64(1_000),
                        Some(mid),
                    ))
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain");
    group.sample_size(20);

    let tree = populated_tree(10_000);
    group.bench_function("drain_10k_levels", |b| {
        b.iter_batched(
            || tree.clone(),
            |mut tree| {
                let taken = tree.fill(Direction::ZeroForOne, Amount::from_u64(u64::MAX));
                assert!(tree.is_empty());
                black_box(taken)
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_fill, bench_drain);
criterion_main!(benches);
