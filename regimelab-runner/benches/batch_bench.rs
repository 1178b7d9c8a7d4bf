//! Criterion benchmarks for batch analysis.
//!
//! Benchmarks:
//! 1. Batch of rule-based runs on rayon, at several batch sizes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use regimelab_core::synthetic::{trending_series, SeriesSpec};
use regimelab_runner::{run_batch, PipelineConfig, RunRequest};

fn requests(n: usize) -> Vec<RunRequest> {
    (0..n)
        .map(|i| RunRequest {
            label: format!("S{i}"),
            prices: trending_series(&SeriesSpec {
                seed: i as u64,
                noise_pct: 0.02,
                ..SeriesSpec::default()
            }),
            as_of_index: 259,
            synthetic: true,
        })
        .collect()
}

fn bench_batch(c: &mut Criterion) {
    let machine = match PipelineConfig::default().build_machine() {
        Ok(m) => m,
        Err(e) => panic!("default config must build: {e}"),
    };
    let mut group = c.benchmark_group("run_batch");
    for n in [1usize, 16, 128] {
        let batch = requests(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &batch, |b, r| {
            b.iter(|| run_batch(&machine, black_box(r)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_batch);
criterion_main!(benches);
