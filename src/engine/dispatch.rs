//! Fast-slot scheduler. Keeps the K worker slots fed with one candidate
//! each; the sentinel file `fast/.go_<k>` marks a slot busy until the
//! worker removes it. Existence is the whole protocol, the sentinel's
//! content is never read.

use std::fs::File;

use anyhow::{Context, Result};
use log::warn;
use rand::Rng;

use crate::core::strfile;
use crate::engine::operators::{apply_random_move, MoveWeights};
use crate::engine::store::StateStore;

pub struct Dispatcher {
    slots: usize,
    weights: MoveWeights,
}

impl Dispatcher {
    pub fn new(slots: usize, weights: MoveWeights) -> Self {
        Self { slots, weights }
    }

    /// One pass over the slots in ascending order. Busy slots are skipped;
    /// each free slot gets a fresh candidate. Never blocks. Returns the
    /// number of candidates deposited.
    pub fn tick<R: Rng>(&self, store: &StateStore, rng: &mut R) -> Result<usize> {
        let mut fed = 0;
        for slot in 1..=self.slots {
            if store.sentinel(slot).exists() {
                continue;
            }
            if self.feed_slot(store, slot, rng)? {
                fed += 1;
            }
        }
        Ok(fed)
    }

    fn feed_slot<R: Rng>(
        &self,
        store: &StateStore,
        slot: usize,
        rng: &mut R,
    ) -> Result<bool> {
        // 1. Reload the accepted state; the scratch copy from the previous
        //    proposal is irrelevant.
        let mut candidate = strfile::read_structure(store.save_path(), rng)?;

        // 2. One weighted move with rejection-sampled operands.
        let kind = self.weights.sample(rng);
        if !apply_random_move(&mut candidate, kind, rng) {
            warn!(
                "slot {}: no legal operands for {:?} on current state, slot left idle",
                slot, kind
            );
            return Ok(false);
        }

        // 3. Deposit the candidate, then arm the sentinel. The worker reads
        //    the files only after the sentinel appears.
        strfile::write_poscar(&candidate, store.slot_poscar(slot))?;
        strfile::write_save(&candidate, store.slot_save(slot))?;
        let sentinel = store.sentinel(slot);
        File::create(&sentinel)
            .with_context(|| format!("cannot create sentinel {}", sentinel.display()))?;
        Ok(true)
    }
}
