use paipai::core::domain::MoveStatus;
use paipai::engine::operators::{apply_random_move, MoveKind, MoveWeights};

mod common;
use common::{assert_invariants, build_structure, seeded_rng};

#[test]
fn swap_metal_same_species_is_noop() {
    let mut s = build_structure(vec![2, 2], vec![1], 3);
    let before = s.occupation.clone();

    assert_eq!(s.swap_metal(0, 1), MoveStatus::NoOp);
    assert_eq!(s.occupation, before);
}

#[test]
fn swap_metal_exchanges_species() {
    let mut s = build_structure(vec![2, 2], vec![1], 3);

    assert_eq!(s.swap_metal(0, 2), MoveStatus::Applied);
    assert_eq!(s.occupation.metal_types, vec![1, 0, 0, 1]);
    // A swap never touches the counts.
    assert_eq!(s.occupation.metal_counts, vec![2, 2]);
    assert_invariants(&s);
}

#[test]
fn swap_metal_rejects_out_of_range() {
    let mut s = build_structure(vec![2, 2], vec![1], 3);
    assert_eq!(s.swap_metal(0, 4), MoveStatus::OutOfRange);
    assert_eq!(s.swap_metal(9, 0), MoveStatus::OutOfRange);
}

#[test]
fn exchange_metal_moves_one_count() {
    let mut s = build_structure(vec![2, 2], vec![1], 3);

    assert_eq!(s.exchange_metal(0, 1), MoveStatus::Applied);
    assert_eq!(s.occupation.metal_counts, vec![1, 3]);
    assert_eq!(s.occupation.num_metal_atoms(), 4);
    assert_invariants(&s);

    assert_eq!(s.exchange_metal(0, 1), MoveStatus::NoOp);
    assert_eq!(s.exchange_metal(0, 5), MoveStatus::InvalidSpecies);
    assert_eq!(s.exchange_metal(7, 0), MoveStatus::OutOfRange);
    assert_eq!(s.occupation.metal_counts, vec![1, 3]);
}

#[test]
fn swap_interstitial_moves_occupation_to_empty_site() {
    let mut s = build_structure(vec![2], vec![1], 3);
    assert_eq!(s.occupation.site_types, vec![Some(0), None, None]);

    assert_eq!(s.swap_interstitial(0, 1), MoveStatus::Applied);
    assert_eq!(s.occupation.site_types, vec![None, Some(0), None]);
    assert_eq!(s.occupation.inter_counts, vec![1]);
    assert_invariants(&s);

    // Two empty sites carry the same occupation.
    assert_eq!(s.swap_interstitial(0, 2), MoveStatus::NoOp);
    assert_eq!(s.swap_interstitial(0, 3), MoveStatus::OutOfRange);
}

#[test]
fn exchange_interstitial_empties_and_fills_sites() {
    let mut s = build_structure(vec![2], vec![1], 3);

    // Occupied -> EMPTY decrements only.
    assert_eq!(s.exchange_interstitial(0, None), MoveStatus::Applied);
    assert_eq!(s.occupation.inter_counts, vec![0]);
    assert_eq!(s.occupation.site_types, vec![None, None, None]);

    // Empty -> EMPTY is a no-op by the status rule.
    assert_eq!(s.exchange_interstitial(1, None), MoveStatus::NoOp);

    // EMPTY -> species increments only.
    assert_eq!(s.exchange_interstitial(1, Some(0)), MoveStatus::Applied);
    assert_eq!(s.occupation.inter_counts, vec![1]);
    assert_invariants(&s);

    assert_eq!(s.exchange_interstitial(1, Some(5)), MoveStatus::InvalidSpecies);
    assert_eq!(s.exchange_interstitial(9, None), MoveStatus::OutOfRange);
}

#[test]
fn random_walk_preserves_invariants() {
    let mut s = build_structure(vec![3, 2, 1], vec![2, 1], 6);
    let mut rng = seeded_rng();
    let weights = MoveWeights {
        swap_metal: 25,
        swap_inter: 25,
        exch_metal: 25,
        exch_inter: 25,
    };

    let mut applied = 0;
    for _ in 0..500 {
        let kind = weights.sample(&mut rng);
        if apply_random_move(&mut s, kind, &mut rng) {
            applied += 1;
            assert_invariants(&s);
            assert_eq!(s.occupation.num_metal_atoms(), 6);
            assert_eq!(s.occupation.num_sites(), 6);
        }
    }
    assert!(applied > 300, "sampler starved: only {} moves applied", applied);
}

#[test]
fn sampler_reports_unsupported_kinds() {
    // Single metallic species: no metal pair can differ.
    let mut s = build_structure(vec![4], vec![1], 3);
    let mut rng = seeded_rng();
    let before = s.occupation.clone();

    assert!(!apply_random_move(&mut s, MoveKind::SwapMetal, &mut rng));
    assert!(!apply_random_move(&mut s, MoveKind::ExchangeMetal, &mut rng));
    assert_eq!(s.occupation, before);

    // Interstitial moves are still available.
    assert!(apply_random_move(&mut s, MoveKind::SwapInterstitial, &mut rng));
    assert_invariants(&s);
}
