/// Pipeline benchmarks
///
/// Measures the transform at the frame sizes the detector uses and one full
/// capture through spectrogram, pooling and classification.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use detectword::{fft, Classifier, DetectorConfig, ReferenceModel, Sample, SpectrogramBuilder};
use num_complex::Complex64;

/// Generate a two-tone capture around mid-scale
fn generate_capture(len: usize) -> Vec<Sample> {
    (0..len)
        .map(|i| {
            let t = i as f64;
            let value = 0.6 * (t / 9.0).sin() + 0.3 * (t / 2.5).sin();
            (32768.0 + value * 32000.0) as Sample
        })
        .collect()
}

fn bench_fft(c: &mut Criterion) {
    let mut group = c.benchmark_group("fft");

    for &n in &[16usize, 64, 256, 1024] {
        let input: Vec<Complex64> = (0..n).map(|i| Complex64::new((i as f64).sin(), 0.0)).collect();

        group.bench_with_input(BenchmarkId::new("forward", n), &input, |b, input| {
            b.iter(|| {
                let mut buffer = input.clone();
                fft::forward(black_box(&mut buffer)).unwrap();
                black_box(buffer);
            });
        });
    }

    group.finish();
}

fn bench_spectrogram(c: &mut Criterion) {
    let config = DetectorConfig::default();
    let mut builder = SpectrogramBuilder::from_config(&config).unwrap();
    let capture = generate_capture(config.capture_len);

    c.bench_function("spectrogram_1024", |b| {
        b.iter(|| {
            let result = builder.build(black_box(&capture)).unwrap();
            black_box(result);
        });
    });
}

fn bench_classify(c: &mut Criterion) {
    let config = DetectorConfig::default();
    let mut builder = SpectrogramBuilder::from_config(&config).unwrap();
    let classifier = Classifier::from_config(&config);

    let (light, _) = builder.build(&generate_capture(config.capture_len)).unwrap();
    let (dark, _) = builder.build(&generate_capture(config.capture_len / 2)).unwrap();
    let references = ReferenceModel::new(
        classifier.reduce(&light).unwrap(),
        classifier.reduce(&dark).unwrap(),
    );

    c.bench_function("classify", |b| {
        b.iter(|| {
            let decision = classifier.classify(black_box(&light), &references).unwrap();
            black_box(decision);
        });
    });
}

criterion_group!(benches, bench_fft, bench_spectrogram, bench_classify);
criterion_main!(benches);
