use nalgebra::{Matrix3, Point3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use paipai::core::domain::{Lattice, Occupation, Structure};
use paipai::core::strfile;

pub fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

/// A small Fe2Ni2 cell with one carbon interstitial over three sites.
pub fn sample_strfile() -> String {
    "\
Fe Ni test lattice
1.0
2.86 0.0 0.0
0.0 2.86 0.0
0.0 0.0 2.86
Fe Ni
2 2
C
1
3
No Shuffle
Cartesian
0.0 0.0 0.0
1.43 1.43 0.0
1.43 0.0 1.43
0.0 1.43 1.43
0.5 0.5 0.5
1.0 1.0 1.0
1.5 1.5 1.5
"
    .to_string()
}

pub fn sample_structure() -> Structure {
    let mut rng = seeded_rng();
    strfile::parse_structure(&sample_strfile(), &mut rng).expect("sample strfile must parse")
}

/// Direct construction for move tests: metallic species starting at Fe,
/// interstitial species starting at C, sequential occupation.
pub fn build_structure(
    metal_counts: Vec<usize>,
    inter_counts: Vec<usize>,
    num_sites: usize,
) -> Structure {
    let num_metal: usize = metal_counts.iter().sum();
    let lattice = Lattice {
        cell: Matrix3::identity() * 4.0,
        metal_species: (0..metal_counts.len()).map(|i| 26 + i as u8).collect(),
        inter_species: (0..inter_counts.len()).map(|i| 6 + i as u8).collect(),
        metal_positions: (0..num_metal)
            .map(|i| Point3::new(i as f64, 0.0, 0.0))
            .collect(),
        site_positions: (0..num_sites)
            .map(|i| Point3::new(0.0, i as f64, 0.5))
            .collect(),
    };
    let occupation = Occupation::sequential(metal_counts, inter_counts, num_sites);
    Structure { lattice, occupation }
}

/// The bookkeeping invariants that must hold after every applied move.
pub fn assert_invariants(structure: &Structure) {
    let occ = &structure.occupation;

    assert_eq!(
        occ.num_metal_atoms(),
        occ.metal_counts.iter().sum::<usize>(),
        "metallic counts no longer sum to the atom total"
    );
    for (species, &count) in occ.inter_counts.iter().enumerate() {
        let occupied = occ
            .site_types
            .iter()
            .filter(|&&t| t == Some(species))
            .count();
        assert_eq!(occupied, count, "interstitial species {} count drifted", species);
    }
    for &t in &occ.metal_types {
        assert!(t < occ.metal_counts.len());
    }
    for t in occ.site_types.iter().flatten() {
        assert!(*t < occ.inter_counts.len());
    }
}
