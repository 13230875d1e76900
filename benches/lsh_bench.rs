use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::prelude::*;
use std::hint::black_box;
use viewgraph::distance::k_nearest;
use viewgraph::lsh::{HashFamily, LshIndex, LshParams};
use viewgraph::{DistanceMetric, FeatureSpace, ItemId};

fn generate_space(n_items: usize, n_dims: usize, seed: u64) -> FeatureSpace {
    let mut rng = StdRng::seed_from_u64(seed);
    let rows: Vec<Vec<f64>> = (0..n_items)
        .map(|_| (0..n_dims).map(|_| rng.random_range(-1.0..1.0)).collect())
        .collect();
    let ids = (0..n_items as u64).map(ItemId::from).collect();
    FeatureSpace::new(ids, rows).unwrap()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let space = generate_space(10_000, 32, 42);
    let mut rng = StdRng::seed_from_u64(7);

    let mut group = c.benchmark_group("lsh_query");
    for &(layers, hashes) in &[(4, 4), (8, 6), (16, 8)] {
        let params = LshParams::new(layers, hashes).with_family(HashFamily::PStable { width: 2.0 });
        let index = LshIndex::build(&space, params).unwrap();
        group.bench_function(BenchmarkId::new("pstable", format!("L{}xH{}", layers, hashes)), |b| {
            b.iter_batched(
                || space.row(rng.random_range(0..space.len())).to_vec(),
                |q| black_box(index.query(&q, 10).unwrap()),
                BatchSize::SmallInput,
            )
        });
    }
    group.bench_function("exact_k_nearest", |b| {
        b.iter_batched(
            || space.row(rng.random_range(0..space.len())).to_vec(),
            |q| black_box(k_nearest(&space, &q, 10, DistanceMetric::Euclidean, &[]).unwrap()),
            BatchSize::SmallInput,
        )
    });
    group.finish();

    let mut build = c.benchmark_group("lsh_build");
    build.sample_size(10);
    build.bench_function("10k_L8xH6", |b| {
        b.iter(|| black_box(LshIndex::build(&space, LshParams::new(8, 6)).unwrap()))
    });
    build.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
