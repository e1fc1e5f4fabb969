use nalgebra::{Matrix3, Point3};
use rand::Rng;

// --- Constants ---

/// Metallic pair-swap attempts performed by the one-shot shuffle initializer.
const SHUFFLE_SWAP_ATTEMPTS: usize = 10;

// --- Move status ---

/// Outcome of a single move operator. Precondition failures are values, not
/// errors: the dispatcher's operand sampling keeps them out of the hot path,
/// and a `NoOp` leaves the structure untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStatus {
    /// Operands were legal but the move would not change the state.
    NoOp,
    /// The move was applied.
    Applied,
    /// An atom or site index was outside the structure.
    OutOfRange,
    /// A target species index was outside the inventory.
    InvalidSpecies,
}

impl MoveStatus {
    pub fn applied(self) -> bool {
        self == MoveStatus::Applied
    }
}

// --- Immutable lattice ---

/// The fixed part of a structure: cell, site geometry, and the two species
/// inventories. Nothing here changes after parse; MC moves act on the
/// [`Occupation`] overlay only.
#[derive(Debug, Clone)]
pub struct Lattice {
    /// Cell vectors as columns (a1, a2, a3), scale factor already applied.
    pub cell: Matrix3<f64>,
    /// Atomic numbers of the metallic species, in display order.
    pub metal_species: Vec<u8>,
    /// Atomic numbers of the interstitial species, in display order.
    pub inter_species: Vec<u8>,
    /// Cartesian positions of the metallic atoms. Index is identity.
    pub metal_positions: Vec<Point3<f64>>,
    /// Cartesian positions of the interstitial sites. Index is identity.
    pub site_positions: Vec<Point3<f64>>,
}

impl Lattice {
    pub fn num_metal_atoms(&self) -> usize {
        self.metal_positions.len()
    }

    pub fn num_sites(&self) -> usize {
        self.site_positions.len()
    }

    /// Fractional -> Cartesian, using the scaled cell.
    pub fn to_cartesian(&self, frac: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.cell * frac.coords)
    }
}

// --- Mutable occupation overlay ---

/// Which species sits where. `metal_types[i]` indexes into the metallic
/// inventory; `site_types[j]` is `None` for an empty interstitial site.
/// The count vectors are kept in lockstep by the move operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupation {
    pub metal_types: Vec<usize>,
    pub metal_counts: Vec<usize>,
    pub site_types: Vec<Option<usize>>,
    pub inter_counts: Vec<usize>,
}

impl Occupation {
    /// Initial layout straight from a parsed inventory: metallic atoms in
    /// species-block order, the first `inter_counts[0]` sites occupied by
    /// species 0, the next block by species 1, remaining sites empty.
    pub fn sequential(
        metal_counts: Vec<usize>,
        inter_counts: Vec<usize>,
        num_sites: usize,
    ) -> Self {
        let mut metal_types = Vec::with_capacity(metal_counts.iter().sum());
        for (species, &count) in metal_counts.iter().enumerate() {
            for _ in 0..count {
                metal_types.push(species);
            }
        }

        let mut site_types = vec![None; num_sites];
        let mut cursor = 0;
        for (species, &count) in inter_counts.iter().enumerate() {
            for _ in 0..count {
                site_types[cursor] = Some(species);
                cursor += 1;
            }
        }

        Self {
            metal_types,
            metal_counts,
            site_types,
            inter_counts,
        }
    }

    pub fn num_metal_atoms(&self) -> usize {
        self.metal_types.len()
    }

    pub fn num_sites(&self) -> usize {
        self.site_types.len()
    }

    /// Exchange the species of two metallic atoms.
    pub fn swap_metal(&mut self, a: usize, b: usize) -> MoveStatus {
        let n = self.num_metal_atoms();
        if a >= n || b >= n {
            return MoveStatus::OutOfRange;
        }
        if self.metal_types[a] == self.metal_types[b] {
            return MoveStatus::NoOp;
        }
        self.metal_types.swap(a, b);
        MoveStatus::Applied
    }

    /// Re-type one metallic atom, keeping the per-species counts in step.
    pub fn exchange_metal(&mut self, a: usize, target: usize) -> MoveStatus {
        if a >= self.num_metal_atoms() {
            return MoveStatus::OutOfRange;
        }
        if target >= self.metal_counts.len() {
            return MoveStatus::InvalidSpecies;
        }
        let old = self.metal_types[a];
        if old == target {
            return MoveStatus::NoOp;
        }
        self.metal_counts[old] -= 1;
        self.metal_types[a] = target;
        self.metal_counts[target] += 1;
        MoveStatus::Applied
    }

    /// Exchange the occupations of two interstitial sites. Either side may
    /// be empty.
    pub fn swap_interstitial(&mut self, a: usize, b: usize) -> MoveStatus {
        let n = self.num_sites();
        if a >= n || b >= n {
            return MoveStatus::OutOfRange;
        }
        if self.site_types[a] == self.site_types[b] {
            return MoveStatus::NoOp;
        }
        self.site_types.swap(a, b);
        MoveStatus::Applied
    }

    /// Re-occupy one interstitial site. `None` empties it. Counts move only
    /// for the occupied side(s).
    pub fn exchange_interstitial(
        &mut self,
        a: usize,
        target: Option<usize>,
    ) -> MoveStatus {
        if a >= self.num_sites() {
            return MoveStatus::OutOfRange;
        }
        if let Some(t) = target {
            if t >= self.inter_counts.len() {
                return MoveStatus::InvalidSpecies;
            }
        }
        let old = self.site_types[a];
        if old == target {
            return MoveStatus::NoOp;
        }
        if let Some(o) = old {
            self.inter_counts[o] -= 1;
        }
        if let Some(t) = target {
            self.inter_counts[t] += 1;
        }
        self.site_types[a] = target;
        MoveStatus::Applied
    }
}

// --- Structure ---

/// A lattice plus its current occupation. This is the unit the coordinator
/// reloads from `SAVE`, mutates with one move, and emits as a candidate.
#[derive(Debug, Clone)]
pub struct Structure {
    pub lattice: Lattice,
    pub occupation: Occupation,
}

impl Structure {
    pub fn swap_metal(&mut self, a: usize, b: usize) -> MoveStatus {
        self.occupation.swap_metal(a, b)
    }

    pub fn exchange_metal(&mut self, a: usize, target: usize) -> MoveStatus {
        self.occupation.exchange_metal(a, target)
    }

    pub fn swap_interstitial(&mut self, a: usize, b: usize) -> MoveStatus {
        self.occupation.swap_interstitial(a, b)
    }

    pub fn exchange_interstitial(
        &mut self,
        a: usize,
        target: Option<usize>,
    ) -> MoveStatus {
        self.occupation.exchange_interstitial(a, target)
    }

    /// One-shot randomizer run when the input file carries the `Shuffle`
    /// flag. Not part of the MC move repertoire.
    ///
    /// 1. A fixed number of metallic pair-swap attempts (uniform over pairs,
    ///    duplicates permitted; same-species draws are no-ops).
    /// 2. Occupations are cleared and each interstitial species is dealt onto
    ///    distinct empty sites uniformly at random.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let n = self.occupation.num_metal_atoms();
        if n > 0 {
            for _ in 0..SHUFFLE_SWAP_ATTEMPTS {
                let a = rng.gen_range(0..n);
                let b = rng.gen_range(0..n);
                self.occupation.swap_metal(a, b);
            }
        }

        let sites = self.occupation.num_sites();
        if sites == 0 {
            return;
        }
        for slot in self.occupation.site_types.iter_mut() {
            *slot = None;
        }
        for species in 0..self.occupation.inter_counts.len() {
            for _ in 0..self.occupation.inter_counts[species] {
                let mut a = rng.gen_range(0..sites);
                while self.occupation.site_types[a].is_some() {
                    a = rng.gen_range(0..sites);
                }
                self.occupation.site_types[a] = Some(species);
            }
        }
    }
}
