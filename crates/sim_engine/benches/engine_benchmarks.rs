//! Criterion benchmarks for sim_engine.
//!
//! Benchmarks cover:
//! - End-to-end runs of the built-in profiles (cache cleared each time)
//! - Worker scaling on a correlated scenario

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sim_engine::{EngineConfig, SimulationEngine, SimulationRun};
use sim_scenarios::ScenarioOverrides;

fn bench_profiles(c: &mut Criterion) {
    let engine = SimulationEngine::new(EngineConfig::default()).expect("default config");
    let mut group = c.benchmark_group("profile_run");
    group.sample_size(20);
    for name in ["financial_portfolio", "defense_capability", "cybersecurity_threat"] {
        let scenario = engine
            .generator()
            .from_profile(name, &ScenarioOverrides::default())
            .expect("built-in profile");
        group.throughput(Throughput::Elements(10_000));
        group.bench_with_input(BenchmarkId::new(name, 10_000), &scenario, |b, s| {
            b.iter(|| {
                engine.clear_cache();
                engine
                    .run(SimulationRun::new(s.clone(), 10_000).with_seed(42))
                    .expect("run")
            })
        });
    }
    group.finish();
}

fn bench_worker_scaling(c: &mut Criterion) {
    let engine = SimulationEngine::new(EngineConfig::default().with_batch_size(2_000)).expect("config");
    let scenario = engine
        .generator()
        .from_profile("financial_portfolio", &ScenarioOverrides::default())
        .expect("built-in profile");
    let mut group = c.benchmark_group("worker_scaling");
    group.sample_size(10);
    group.throughput(Throughput::Elements(100_000));
    for workers in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            b.iter(|| {
                engine.clear_cache();
                engine
                    .run(
                        SimulationRun::new(scenario.clone(), 100_000)
                            .with_seed(42)
                            .with_parallelism(w),
                    )
                    .expect("run")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_profiles, bench_worker_scaling);
criterion_main!(benches);
