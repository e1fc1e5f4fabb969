use paipai::solvers::mc::metropolis_accept;

mod common;
use common::seeded_rng;

#[test]
fn downhill_and_flat_always_accept() {
    let mut rng = seeded_rng();
    for _ in 0..100 {
        assert!(metropolis_accept(-10.0, -10.5, 1e-3, &mut rng));
        assert!(metropolis_accept(-10.0, -10.0, 1e-3, &mut rng));
        assert!(metropolis_accept(5.0, -5.0, 1e-3, &mut rng));
    }
}

#[test]
fn uphill_rate_matches_boltzmann_factor() {
    let mut rng = seeded_rng();
    let samples = 100_000;
    let delta = 1.0;
    let temp = 1.0;

    let accepted = (0..samples)
        .filter(|_| metropolis_accept(0.0, delta, temp, &mut rng))
        .count();
    let rate = accepted as f64 / samples as f64;
    let expected = (-delta / temp).exp();

    // ~6 sigma of the binomial spread at n = 100k.
    assert!(
        (rate - expected).abs() < 0.01,
        "accept rate {} too far from {}",
        rate,
        expected
    );
}

#[test]
fn frozen_temperature_rejects_every_uphill_move() {
    let mut rng = seeded_rng();
    for _ in 0..1000 {
        // exp(-5000) underflows to zero: no draw can pass.
        assert!(!metropolis_accept(-10.0, -5.0, 1e-3, &mut rng));
    }
}
