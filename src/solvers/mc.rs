//! The Metropolis coordinator: chain state, acceptance rule, the
//! `mc.log` writer, and the single-threaded tick loop that alternates
//! candidate dispatch with report consumption.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use rand::Rng;

use crate::engine::dispatch::Dispatcher;
use crate::engine::operators::MoveWeights;
use crate::engine::reports;
use crate::engine::store::StateStore;
use crate::solvers::RunSummary;

/// Back-off between ticks when no report was consumed.
const IDLE_SLEEP: Duration = Duration::from_millis(100);

// --- Chain state ---

/// Coordinator-side chain state, owned by the driver and threaded by
/// value. `current_e` stays `None` until the first valid report seeds
/// the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct McState {
    pub current_e: Option<f64>,
    pub mc_steps: u64,
    pub accept_count: u64,
}

impl McState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Metropolis rule. Temperature carries energy units; no Boltzmann
/// constant is applied.
pub fn metropolis_accept<R: Rng>(e_old: f64, e_new: f64, temp: f64, rng: &mut R) -> bool {
    if e_new <= e_old {
        return true;
    }
    let p = (-(e_new - e_old) / temp).exp();
    rng.gen::<f64>() < p
}

// --- Event log ---

/// Human-readable run log (`mc.log`), flushed after every line so a tail
/// on the file tracks the chain live.
pub struct McLog {
    out: BufWriter<File>,
}

impl McLog {
    pub fn create(path: impl AsRef<Path>, workers: usize, steps: u64, temp: f64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("cannot create log file {}", path.display()))?;
        let mut log = Self {
            out: BufWriter::new(file),
        };
        writeln!(
            log.out,
            "# MC with waiting_pool, fast={} steps={} temp={}",
            workers, steps, temp
        )?;
        log.out.flush()?;
        Ok(log)
    }

    pub fn initial_state(&mut self, task_id: &str, energy: f64) -> Result<()> {
        writeln!(self.out, "INITIAL_STATE task_id={} E = {:.12}", task_id, energy)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn step(
        &mut self,
        step: u64,
        task_id: &str,
        e_new: f64,
        e_old: f64,
        accept: bool,
    ) -> Result<()> {
        writeln!(
            self.out,
            "STEP {} proposal task_id={} E_new={:.12} E_old={:.12} -> {}",
            step,
            task_id,
            e_new,
            e_old,
            if accept { "ACCEPT" } else { "REJECT" }
        )?;
        self.out.flush()?;
        Ok(())
    }

    pub fn finish(&mut self, mc_steps: u64, accepted: u64) -> Result<()> {
        writeln!(self.out, "# Finished. MC steps = {}, accepted = {}", mc_steps, accepted)?;
        self.out.flush()?;
        Ok(())
    }
}

// --- Driver ---

#[derive(Debug, Clone, Copy)]
pub struct McConfig {
    pub workers: usize,
    pub steps: u64,
    pub temp: f64,
    pub weights: MoveWeights,
}

/// Single-threaded tick loop. Each tick feeds every free fast slot from
/// the current `SAVE`, then drains whatever reports have landed; the run
/// ends strictly when the step budget is consumed.
pub struct McDriver<R: Rng> {
    cfg: McConfig,
    store: StateStore,
    dispatcher: Dispatcher,
    rng: R,
}

impl<R: Rng> McDriver<R> {
    pub fn new(store: StateStore, cfg: McConfig, rng: R) -> Self {
        let dispatcher = Dispatcher::new(cfg.workers, cfg.weights);
        Self {
            cfg,
            store,
            dispatcher,
            rng,
        }
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        let mut log = McLog::create(
            self.store.root().join("mc.log"),
            self.cfg.workers,
            self.cfg.steps,
            self.cfg.temp,
        )?;
        let mut state = McState::new();

        while state.mc_steps < self.cfg.steps {
            self.dispatcher.tick(&self.store, &mut self.rng)?;

            let processed = reports::poll_reports(
                &self.store,
                &mut state,
                self.cfg.temp,
                self.cfg.steps,
                &mut self.rng,
                &mut log,
            )?;

            if state.mc_steps >= self.cfg.steps {
                break;
            }
            if processed == 0 {
                thread::sleep(IDLE_SLEEP);
            }
        }

        log.finish(state.mc_steps, state.accept_count)?;
        info!(
            "MC finished: steps={} accepted={}",
            state.mc_steps, state.accept_count
        );
        Ok(RunSummary {
            mc_steps: state.mc_steps,
            accept_count: state.accept_count,
            final_energy: state.current_e,
        })
    }
}
