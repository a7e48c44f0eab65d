use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::{Array1, Array2, array};
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use varmix::{CoordinateAscent, MixturePrior, PosteriorState, Schedule, SufficientStatistics};

fn random_design(n: usize, p: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(0x5EED_F64 + (n * p) as u64);
    Array2::from_shape_fn((n, p), |_| rng.sample::<f64, _>(Standard) - 0.5)
}

fn random_response(n: usize) -> Array1<f64> {
    let mut rng = StdRng::seed_from_u64(0xBEEF + n as u64);
    Array1::from_shape_fn(n, |_| rng.sample::<f64, _>(Standard))
}

fn benchmark_sweep(c: &mut Criterion) {
    let shapes = [(500_usize, 100_usize), (2000, 400)];
    let prior = MixturePrior::from_weights(
        array![0.0, 0.001, 0.01, 0.1, 1.0].view(),
        array![0.9, 0.025, 0.025, 0.025, 0.025].view(),
        f64::EPSILON,
    )
    .expect("valid prior");

    let mut group = c.benchmark_group("coordinate_ascent_sweep");
    for &(n, p) in shapes.iter() {
        let x = random_design(n, p);
        let x32 = x.mapv(|v| v as f32);
        let y = random_response(n);
        let stats = SufficientStatistics::from_data(&x, y.view()).expect("stats");
        let schedule = Schedule::forward(p);
        let initial = PosteriorState::from_prior(&prior, p, n);
        group.throughput(Throughput::Elements((n * p) as u64));

        let engine = CoordinateAscent::new(&x, 1.0, &prior, &stats).expect("engine");
        group.bench_with_input(BenchmarkId::new("f64", format!("{n}x{p}")), &initial, |b, init| {
            b.iter(|| {
                let mut state = init.clone();
                engine.sweep(&mut state, black_box(schedule.as_slice())).expect("sweep");
                black_box(state);
            });
        });

        let engine32 = CoordinateAscent::new(&x32, 1.0, &prior, &stats).expect("engine");
        group.bench_with_input(BenchmarkId::new("f32", format!("{n}x{p}")), &initial, |b, init| {
            b.iter(|| {
                let mut state = init.clone();
                engine32.sweep(&mut state, black_box(schedule.as_slice())).expect("sweep");
                black_box(state);
            });
        });
    }
    group.finish();
}

criterion_group!(sweep_benchmark, benchmark_sweep);
criterion_main!(sweep_benchmark);
