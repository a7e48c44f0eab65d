use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use varmix::{
    CoordinateAscent, MixturePrior, PosteriorState, Schedule, SufficientStatistics, UpdateSettings,
};

struct SimulatedData {
    x: Array2<f32>,
    y: Array1<f64>,
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A sparse signal: the first three variables carry effects, the rest are noise.
fn simulate(n: usize, p: usize, seed: u64) -> SimulatedData {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let x = Array2::from_shape_fn((n, p), |_| normal.sample(&mut rng) as f32);
    let mut beta = Array1::<f64>::zeros(p);
    beta[0] = 1.5;
    beta[1] = -1.0;
    beta[2] = 0.5;
    let mut y = x.mapv(f64::from).dot(&beta);
    for value in y.iter_mut() {
        *value += 0.5 * normal.sample(&mut rng);
    }
    SimulatedData { x, y }
}

fn multi_slab_prior() -> MixturePrior {
    MixturePrior::from_weights(
        ndarray::array![0.0, 0.01, 0.1, 1.0].view(),
        ndarray::array![0.85, 0.05, 0.05, 0.05].view(),
        f64::EPSILON,
    )
    .unwrap()
}

#[test]
fn invariants_hold_over_many_sweeps() {
    init_logging();
    let data = simulate(80, 25, 7);
    let stats = SufficientStatistics::from_data(&data.x, data.y.view()).unwrap();
    let prior = multi_slab_prior();
    let settings = UpdateSettings {
        consistency_tolerance: Some(1e-8),
        ..UpdateSettings::default()
    };
    let engine = CoordinateAscent::new(&data.x, 0.25, &prior, &stats)
        .unwrap()
        .with_settings(settings)
        .unwrap();

    let mut state = PosteriorState::from_prior(&prior, 25, 80);
    for sweep in 0..40 {
        let schedule = if sweep % 2 == 0 {
            Schedule::forward(25)
        } else {
            Schedule::backward(25)
        };
        let summary = engine.sweep(&mut state, schedule.as_slice()).unwrap();
        assert_eq!(summary.updates, 25);
        assert!(state.max_column_sum_error() < 1e-9);
        assert!(state.alpha.iter().all(|&a| (0.0..=1.0).contains(&a)));
        assert!(state.mu.row(0).iter().all(|&m| m == 0.0));
    }
    assert!(state.fitted_drift(&data.x).unwrap() < 1e-9);
}

#[test]
fn strong_effects_leave_the_spike() {
    init_logging();
    let data = simulate(200, 10, 11);
    let stats = SufficientStatistics::from_data(&data.x, data.y.view()).unwrap();
    let prior = multi_slab_prior();
    let engine = CoordinateAscent::new(&data.x, 0.25, &prior, &stats).unwrap();

    let mut state = PosteriorState::from_prior(&prior, 10, 200);
    for _ in 0..50 {
        engine.sweep(&mut state, Schedule::forward(10).as_slice()).unwrap();
    }

    let effects = state.expected_effects();
    assert!(state.alpha[[0, 0]] < 0.01, "variable 0 stayed in the spike");
    assert!(state.alpha[[0, 1]] < 0.01, "variable 1 stayed in the spike");
    assert!((effects[0] - 1.5).abs() < 0.2, "effect 0 was {}", effects[0]);
    assert!((effects[1] + 1.0).abs() < 0.2, "effect 1 was {}", effects[1]);
    for j in 3..10 {
        assert!(effects[j].abs() < 0.2, "noise variable {j} has effect {}", effects[j]);
    }
}

#[test]
fn single_precision_design_matches_widened_copy() {
    init_logging();
    let data = simulate(40, 12, 3);
    let widened = data.x.mapv(f64::from);
    let stats = SufficientStatistics::from_data(&data.x, data.y.view()).unwrap();
    let stats_widened = SufficientStatistics::from_data(&widened, data.y.view()).unwrap();
    assert_eq!(stats, stats_widened);

    let prior = multi_slab_prior();
    let initial = PosteriorState::from_prior(&prior, 12, 40);
    let schedule: Vec<usize> = (0..12).chain((0..12).rev()).collect();

    let (single, _) = CoordinateAscent::new(&data.x, 0.3, &prior, &stats)
        .unwrap()
        .run(&initial, &schedule)
        .unwrap();
    let (double, _) = CoordinateAscent::new(&widened, 0.3, &prior, &stats)
        .unwrap()
        .run(&initial, &schedule)
        .unwrap();
    assert_eq!(single, double);
}

#[test]
fn sweeps_resume_across_calls() {
    init_logging();
    let data = simulate(30, 8, 21);
    let stats = SufficientStatistics::from_data(&data.x, data.y.view()).unwrap();
    let prior = multi_slab_prior();
    let engine = CoordinateAscent::new(&data.x, 0.5, &prior, &stats).unwrap();
    let initial = PosteriorState::from_prior(&prior, 8, 30);

    let full: Vec<usize> = (0..8).chain(0..8).collect();
    let (at_once, _) = engine.run(&initial, &full).unwrap();

    let (halfway, _) = engine.run(&initial, &full[..8]).unwrap();
    let (resumed, _) = engine.run(&halfway, &full[8..]).unwrap();
    assert_eq!(at_once, resumed);
}
