//! Report consumer: drains `reports/*.json` dropped by the slow workers
//! and turns each one into an MC decision against the tracked state.
//!
//! Worker failures never stop the chain: a malformed, error-status, or
//! non-finite report is logged, deleted, and skipped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use rand::Rng;
use serde::Deserialize;

use crate::engine::store::StateStore;
use crate::solvers::mc::{metropolis_accept, McLog, McState};

/// Consumer-visible fields of a worker report. Workers attach more
/// (screen energy, timings, worker id); everything unknown is ignored.
#[derive(Debug, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub energy_final: Option<f64>,
}

/// Drains the report directory, processing files in ascending filename
/// order. Stops early once `state.mc_steps` reaches `max_steps`. Returns
/// the number of reports that advanced the chain.
pub fn poll_reports<R: Rng>(
    store: &StateStore,
    state: &mut McState,
    temp: f64,
    max_steps: u64,
    rng: &mut R,
    log: &mut McLog,
) -> Result<usize> {
    let dir = store.reports_dir();
    let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
        .with_context(|| format!("cannot read report directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut processed = 0;
    for path in paths {
        if process_report(store, &path, state, temp, rng, log)? {
            processed += 1;
        }
        if state.mc_steps >= max_steps {
            break;
        }
    }
    Ok(processed)
}

/// Consumes one report file. The file is deleted whatever the outcome.
/// Returns `true` when the report advanced the chain (seeded it or was
/// judged as a proposal).
fn process_report<R: Rng>(
    store: &StateStore,
    path: &Path,
    state: &mut McState,
    temp: f64,
    rng: &mut R,
    log: &mut McLog,
) -> Result<bool> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!("cannot read report {}: {}", path.display(), err);
            remove(path)?;
            return Ok(false);
        }
    };
    let report: Report = match serde_json::from_str(&text) {
        Ok(report) => report,
        Err(err) => {
            warn!("bad JSON in report {}: {}", path.display(), err);
            remove(path)?;
            return Ok(false);
        }
    };

    if report.status.as_deref() == Some("error") {
        warn!(
            "worker error in report {}: {}",
            path.display(),
            report.error.as_deref().unwrap_or("<no_msg>")
        );
        remove(path)?;
        return Ok(false);
    }

    let task_id = report.task_id.unwrap_or_else(|| file_stem(path));
    let e_final = report.energy_final.unwrap_or(f64::INFINITY);
    if !e_final.is_finite() {
        warn!("invalid energy_final in report {}", path.display());
        remove(path)?;
        return Ok(false);
    }

    match state.current_e {
        None => {
            // First valid report seeds the chain: adopted unconditionally,
            // not counted as an MC step, not archived.
            state.current_e = Some(e_final);
            state.mc_steps = 0;
            state.accept_count = 0;
            store.promote_outbox(&task_id)?;
            log.initial_state(&task_id, e_final)?;
        }
        Some(e_old) => {
            state.mc_steps += 1;
            let accept = metropolis_accept(e_old, e_final, temp, rng);
            log.step(state.mc_steps, &task_id, e_final, e_old, accept)?;
            if accept {
                state.accept_count += 1;
                state.current_e = Some(e_final);
                store.promote_outbox(&task_id)?;
                store.archive_accept(&task_id, e_final)?;
            }
        }
    }

    remove(path)?;
    Ok(true)
}

fn remove(path: &Path) -> Result<()> {
    fs::remove_file(path)
        .with_context(|| format!("cannot delete report {}", path.display()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
