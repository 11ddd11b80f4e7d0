use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use nomad::{DistanceMatrix, Embedding};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIM: usize = 256;

fn random_set(count: usize, seed: u64) -> Vec<Embedding> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let values: Vec<f32> = (0..DIM).map(|_| rng.random_range(-1.0..1.0)).collect();
            Embedding::normalized(values).expect("non-zero random vector")
        })
        .collect()
}

fn bench_pairwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairwise_distance");
    for count in [16usize, 128, 512] {
        let degraded = random_set(count, 1);
        let reference = random_set(count, 2);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let matrix = DistanceMatrix::pairwise(black_box(&degraded), black_box(&reference))
                    .expect("pairwise");
                black_box(matrix.pooled_mean())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pairwise);
criterion_main!(benches);
