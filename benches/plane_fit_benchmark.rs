use criterion::{black_box, criterion_group, criterion_main, Criterion};
use criterion::BenchmarkId;
use intensity_qc::{BackgroundConfig, PlaneFitEstimator};
use ndarray::Array3;
use rand::{Rng, SeedableRng, rngs::StdRng};

fn noisy_volume(depth : usize, side : usize) -> Array3<u16> {
    let mut rng = StdRng::seed_from_u64(1234);
    Array3::from_shape_fn((depth, side, side), |(_, y, x)| {
        (x + 2 * y) as u16 + rng.random_range(0..64u16)
    })
}

/// Fit the same stack serially, one slice per task, and a few
/// slices per task, to see where splitting across the pool pays off.
fn criterion_benchmark_plane_fit(c: &mut Criterion) {
    let mut fit_bench = c.benchmark_group("Plane fit benchmarks");

    let volume = noisy_volume(40, 256);
    let configs = [
        ("serial", BackgroundConfig{ parallel : false, ..Default::default() }),
        ("parallel, 1 slice per task", BackgroundConfig::default()),
        ("parallel, 8 slices per task", BackgroundConfig{ slices_per_task : 8, ..Default::default() }),
    ];

    for (name, config) in configs {
        let estimator = PlaneFitEstimator::new(config);
        fit_bench.bench_with_input(
            BenchmarkId::new(name, "40x256x256"),
            &volume,
            |bench, volume| {
                bench.iter(|| black_box(estimator.estimate(volume).unwrap()))
            },
        );
    }

    let volume = noisy_volume(10, 1024);
    fit_bench.sample_size(10);
    fit_bench.bench_with_input(
        BenchmarkId::new("parallel, 1 slice per task", "10x1024x1024"),
        &volume,
        |bench, volume| {
            bench.iter(|| black_box(PlaneFitEstimator::default().estimate(volume).unwrap()))
        },
    );
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = criterion_benchmark_plane_fit,
);
criterion_main!(benches);
