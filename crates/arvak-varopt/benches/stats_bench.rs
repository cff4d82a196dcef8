//! Benchmarks for outcome reduction and INTERP.
//!
//! Run with: cargo bench -p arvak-varopt --bench stats_bench

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use arvak_varopt::{Outcome, OutcomeDistribution, ParameterVector, StatisticsReducer, interp};

/// Cut size of a ring graph on `n` nodes.
fn ring_cut(n: usize) -> impl Fn(Outcome) -> f64 {
    move |o: Outcome| {
        (0..n)
            .filter(|&i| o.bit(i) != o.bit((i + 1) % n))
            .count() as f64
    }
}

fn uniform(qubits: usize) -> OutcomeDistribution {
    let dim = 1usize << qubits;
    let probs = vec![1.0 / dim as f64; dim];
    OutcomeDistribution::from_probabilities(&probs).expect("uniform distribution")
}

fn bench_reduce_exact(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce_exact");

    for qubits in [8, 12, 16] {
        let dist = uniform(qubits);
        let cost = ring_cut(qubits);
        group.throughput(Throughput::Elements(1 << qubits));
        group.bench_with_input(BenchmarkId::from_parameter(qubits), &qubits, |b, _| {
            b.iter(|| StatisticsReducer::new().reduce(black_box(&dist), &cost));
        });
    }

    group.finish();
}

fn bench_reduce_sampled(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce_sampled");
    let mut rng = StdRng::seed_from_u64(3);

    for shots in [1_000u64, 10_000, 100_000] {
        let dist = uniform(12).sample(shots, &mut rng).expect("sampling");
        let cost = ring_cut(12);
        group.throughput(Throughput::Elements(shots));
        group.bench_with_input(BenchmarkId::from_parameter(shots), &shots, |b, _| {
            b.iter(|| StatisticsReducer::new().reduce(black_box(&dist), &cost));
        });
    }

    group.finish();
}

fn bench_interp(c: &mut Criterion) {
    let mut group = c.benchmark_group("interp");

    for depth in [4, 16, 64] {
        let x = ParameterVector::new((0..2 * depth).map(|i| i as f64 * 0.01).collect(), 2)
            .expect("parameters");
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| interp(black_box(&x)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reduce_exact, bench_reduce_sampled, bench_interp);
criterion_main!(benches);
