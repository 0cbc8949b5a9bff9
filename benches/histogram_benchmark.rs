use criterion::{black_box, criterion_group, criterion_main, Criterion};
use intensity_qc::{self, HistogramConfig};
use ndarray::Array3;
use rand::{Rng, SeedableRng, rngs::StdRng};

fn criterion_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(99);
    let volume = Array3::from_shape_simple_fn((20, 512, 512), || rng.random::<u16>());
    let config = HistogramConfig::default();

    c.bench_function("zero bins, 20x512x512 u16",
    |b| b.iter(|| black_box(intensity_qc::detect_zero_bins(&volume, &config).unwrap()))
    );
    c.bench_function("dynamic range, 20x512x512 u16",
    |b| b.iter(|| black_box(intensity_qc::dynamic_range(&volume, u16::MIN, u16::MAX).unwrap()))
    );
    c.bench_function("saturation, 20x512x512 u16",
    |b| b.iter(|| black_box(intensity_qc::saturation_percentage(&volume, u16::MIN, u16::MAX).unwrap()))
    );
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
