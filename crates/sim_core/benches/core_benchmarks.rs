//! Criterion benchmarks for sim_core sampling and correlation.
//!
//! Measures direct marginal sampling, quantile evaluation and the copula
//! path across matrix sizes to characterise the per-iteration cost.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sim_core::correlation::{
    cholesky_lower, Copula, CorrelationMatrix, CorrelationModel, PsdPolicy,
};
use sim_core::distributions::Distribution;
use sim_core::rng::SimRng;

/// Equicorrelated matrix of dimension `n`.
fn equicorrelated(n: usize, rho: f64) -> CorrelationMatrix {
    let names = (0..n).map(|i| format!("v{}", i)).collect();
    let rows = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { rho }).collect())
        .collect();
    CorrelationMatrix::from_rows(names, rows).unwrap()
}

/// Benchmark direct sampling per family.
fn bench_direct_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("direct_sampling");

    let families = [
        ("normal", Distribution::Normal { mean: 0.0, std_dev: 1.0 }),
        ("gamma", Distribution::Gamma { shape: 2.0, scale: 1.0 }),
        ("beta", Distribution::Beta { alpha: 2.0, beta: 5.0 }),
        ("poisson", Distribution::Poisson { lambda: 4.0 }),
    ];
    for (label, dist) in families {
        let compiled = dist.compile().unwrap();
        group.bench_function(BenchmarkId::new("draw_10k", label), |b| {
            let mut rng = SimRng::from_seed(42);
            let mut buffer = vec![0.0; 10_000];
            b.iter(|| compiled.fill(&mut rng, black_box(&mut buffer)));
        });
    }

    group.finish();
}

/// Benchmark quantile evaluation, closed form against numerical inversion.
fn bench_quantiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantile");

    let normal = Distribution::Normal { mean: 0.0, std_dev: 1.0 }.compile().unwrap();
    let gamma = Distribution::Gamma { shape: 2.0, scale: 1.0 }.compile().unwrap();
    group.bench_function("normal", |b| b.iter(|| normal.quantile(black_box(0.73))));
    group.bench_function("gamma", |b| b.iter(|| gamma.quantile(black_box(0.73))));

    group.finish();
}

/// Benchmark Cholesky factorisation and copula rows.
fn bench_copula(c: &mut Criterion) {
    let mut group = c.benchmark_group("copula");

    for n in [4, 10, 50] {
        let matrix = equicorrelated(n, 0.3);
        group.bench_with_input(BenchmarkId::new("cholesky", n), &matrix, |b, m| {
            b.iter(|| cholesky_lower(black_box(m)).unwrap());
        });

        for (label, copula) in [
            ("gaussian", Copula::Gaussian),
            ("student_t", Copula::StudentT { degrees_of_freedom: 5.0 }),
        ] {
            let model = CorrelationModel::build(matrix.clone(), copula, PsdPolicy::Strict, 1e-8).unwrap();
            group.bench_with_input(BenchmarkId::new(label, n), &model, |b, model| {
                let mut rng = SimRng::from_seed(7);
                let mut scratch = vec![0.0; n];
                let mut out = vec![0.0; n];
                b.iter(|| model.sample_uniforms(&mut rng, &mut scratch, black_box(&mut out)));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_direct_sampling, bench_quantiles, bench_copula);
criterion_main!(benches);
