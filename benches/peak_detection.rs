use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use breathxplorer::feature::FeatureExtractor;
use breathxplorer::peak::{GaussianMixtureDetector, PeakDetector, PeakMethod, TopologicalDetector};
use breathxplorer::scan::RawScan;

/// Breath-like trace: a pulse every 12 s with a small deterministic ripple
fn breath_trace(n: usize) -> (Vec<f64>, Vec<f64>) {
    let time: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();
    let intensity = time
        .iter()
        .map(|&t| {
            let phase = (t % 12.0) - 6.0;
            1000.0 * (-phase * phase / 4.0).exp() + 5.0 * (t * 1.7).sin().abs()
        })
        .collect();
    (time, intensity)
}

/// Synthetic run with `n_ions` breath ions and one flat background ion
fn breath_run(n_scans: usize, n_ions: usize) -> Vec<RawScan> {
    let (time, trace) = breath_trace(n_scans);
    time.iter()
        .zip(&trace)
        .map(|(&t, &y)| {
            let mut mz: Vec<f64> = (0..n_ions).map(|k| 50.0 + k as f64 * 1.5).collect();
            let mut intensity: Vec<f64> = (0..n_ions).map(|k| y * (1.0 + k as f64 * 0.01)).collect();
            mz.push(50.0 + n_ions as f64 * 1.5);
            intensity.push(20.0);
            RawScan::ms1(t, mz, intensity)
        })
        .collect()
}

/// Benchmark the topological detector on one trace
fn bench_topological(c: &mut Criterion) {
    let mut group = c.benchmark_group("topological");

    for n in [256, 1024, 4096] {
        let (time, intensity) = breath_trace(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{}points", n)), &n, |b, _| {
            let detector = TopologicalDetector::new(0.5);
            b.iter(|| black_box(detector.detect(black_box(&time), black_box(&intensity))));
        });
    }

    group.finish();
}

/// Benchmark the Gaussian mixture detector for several component counts
fn bench_gaussian_mixture(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_mixture");
    let (time, intensity) = breath_trace(1024);

    for k in [1, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(format!("{}components", k)), &k, |b, &k| {
            let detector = GaussianMixtureDetector::new(k);
            b.iter(|| black_box(detector.detect(black_box(&time), black_box(&intensity))));
        });
    }

    group.finish();
}

/// Benchmark full feature extraction over many m/z buckets
fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    group.sample_size(20);

    for n_ions in [50, 200] {
        let scans = breath_run(600, n_ions);
        group.throughput(Throughput::Elements(n_ions as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{}ions", n_ions)), &n_ions, |b, _| {
            let extractor = FeatureExtractor::default();
            b.iter(|| {
                let extraction = extractor
                    .extract("bench", black_box(&scans), true, 0.5, PeakMethod::Topological, 1)
                    .unwrap();
                black_box(extraction);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_topological, bench_gaussian_mixture, bench_extraction);
criterion_main!(benches);
