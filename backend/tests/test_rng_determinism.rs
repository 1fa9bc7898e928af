//! Determinism tests for the RNG and the arrival generator
//!
//! Same seed must give the same stream, run after run.

use case_sim_core::arrivals::{ArrivalConfig, ArrivalGenerator, InterarrivalDistribution};
use case_sim_core::RngManager;

fn emergency_and_referrals() -> Vec<ArrivalConfig> {
    vec![
        ArrivalConfig {
            case_type: "A".to_string(),
            distribution: InterarrivalDistribution::BusinessHours {
                open_hour: 9.0,
                close_hour: 17.0,
                max_gap: 1.0,
            },
        },
        ArrivalConfig {
            case_type: "EM".to_string(),
            distribution: InterarrivalDistribution::Exponential { rate: 1.0 },
        },
    ]
}

#[test]
fn test_same_seed_same_sequence() {
    let mut rng1 = RngManager::new(12345);
    let mut rng2 = RngManager::new(12345);

    for _ in 0..1000 {
        assert_eq!(rng1.next(), rng2.next());
    }
}

#[test]
fn test_different_seed_different_sequence() {
    let mut rng1 = RngManager::new(1);
    let mut rng2 = RngManager::new(2);

    let first: Vec<u64> = (0..10).map(|_| rng1.next()).collect();
    let second: Vec<u64> = (0..10).map(|_| rng2.next()).collect();
    assert_ne!(first, second);
}

#[test]
fn test_zero_seed_is_usable() {
    let mut rng = RngManager::new(0);
    assert_ne!(rng.next(), 0);
}

#[test]
fn test_samplers_stay_in_range() {
    let mut rng = RngManager::new(99);
    for _ in 0..1000 {
        let u = rng.uniform(2.0, 3.0);
        assert!((2.0..3.0).contains(&u));

        let e = rng.exponential(0.5);
        assert!(e.is_finite() && e >= 0.0);

        let n = rng.normal(10.0, 1.0);
        assert!(n.is_finite());
    }
}

#[test]
fn test_exponential_mean_close_to_inverse_rate() {
    let mut rng = RngManager::new(7);
    let samples = 20_000;
    let mean: f64 = (0..samples).map(|_| rng.exponential(2.0)).sum::<f64>() / samples as f64;
    assert!((mean - 0.5).abs() < 0.05, "mean was {mean}");
}

#[test]
fn test_arrival_stream_is_reproducible() {
    let mut rng1 = RngManager::new(42);
    let mut rng2 = RngManager::new(42);
    let mut gen1 = ArrivalGenerator::new(emergency_and_referrals(), None, &mut rng1);
    let mut gen2 = ArrivalGenerator::new(emergency_and_referrals(), None, &mut rng2);

    for _ in 0..200 {
        assert_eq!(gen1.next_arrival(&mut rng1), gen2.next_arrival(&mut rng2));
    }
}

#[test]
fn test_arrivals_are_time_ordered_with_sequential_ids() {
    let mut rng = RngManager::new(3);
    let mut arrivals = ArrivalGenerator::new(emergency_and_referrals(), None, &mut rng);

    let mut last_time = 0.0;
    for expected_id in 0..300 {
        let arrival = arrivals.next_arrival(&mut rng).unwrap();
        assert!(arrival.time >= last_time);
        assert_eq!(arrival.case_id.0, expected_id);
        last_time = arrival.time;
    }
    assert_eq!(arrivals.released(), 300);
}

#[test]
fn test_arrival_limit_ends_stream() {
    let mut rng = RngManager::new(3);
    let mut arrivals = ArrivalGenerator::new(emergency_and_referrals(), Some(5), &mut rng);

    let released: Vec<_> = std::iter::from_fn(|| arrivals.next_arrival(&mut rng)).collect();
    assert_eq!(released.len(), 5);
    assert!(arrivals.next_arrival(&mut rng).is_none());
}

#[test]
fn test_reset_replays_from_same_rng_state() {
    let configs = vec![ArrivalConfig {
        case_type: "EM".to_string(),
        distribution: InterarrivalDistribution::Exponential { rate: 1.0 },
    }];

    let mut rng = RngManager::new(8);
    let mut arrivals = ArrivalGenerator::new(configs, None, &mut rng);
    let first_run: Vec<_> = (0..20).map(|_| arrivals.next_arrival(&mut rng)).collect();

    let mut rng = RngManager::new(8);
    arrivals.reset(&mut rng);
    let second_run: Vec<_> = (0..20).map(|_| arrivals.next_arrival(&mut rng)).collect();

    assert_eq!(first_run, second_run);
}
