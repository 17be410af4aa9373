//! Criterion benchmarks for sim_risk.
//!
//! Benchmarks cover:
//! - Parallel per-column statistics for varying column counts
//! - Full risk analysis (VaR/CVaR, failure modes, prioritisation)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sim_core::rng::SimRng;
use sim_core::types::SampleMatrix;
use sim_risk::statistics::summarise_columns;
use sim_risk::{AnalysisTarget, RiskAnalyzer};
use sim_scenarios::{LossOrientation, RiskThreshold};

fn synthetic_samples(rows: usize, inputs: usize) -> SampleMatrix {
    let mut rng = SimRng::from_seed(7);
    let mut names: Vec<String> = (0..inputs).map(|i| format!("x{i}")).collect();
    let mut columns: Vec<Vec<f64>> = (0..inputs)
        .map(|_| (0..rows).map(|_| rng.gen_normal()).collect())
        .collect();
    let outcome = (0..rows).map(|r| columns.iter().map(|c| c[r]).sum()).collect();
    names.push("y".into());
    columns.push(outcome);
    SampleMatrix::from_columns(names, columns).expect("consistent columns")
}

fn bench_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");
    for inputs in [4usize, 10, 50] {
        let samples = synthetic_samples(10_000, inputs);
        group.bench_with_input(BenchmarkId::new("summarise_columns", inputs), &samples, |b, s| {
            b.iter(|| summarise_columns(black_box(s)))
        });
    }
    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");
    for rows in [1_000usize, 10_000, 100_000] {
        let samples = synthetic_samples(rows, 10);
        let target = AnalysisTarget {
            primary: "y".into(),
            orientation: LossOrientation::HigherIsWorse,
            thresholds: [("y".to_string(), RiskThreshold::above(3.0))].into(),
            inputs: (0..10).map(|i| format!("x{i}")).collect(),
        };
        let analyzer = RiskAnalyzer::default();
        group.bench_with_input(BenchmarkId::new("analyse", rows), &samples, |b, s| {
            b.iter(|| analyzer.analyse_target(black_box(s), &target))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_statistics, bench_analysis);
criterion_main!(benches);
