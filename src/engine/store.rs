//! Filesystem side of the coordinator: the on-disk layout shared with the
//! worker processes, the current accepted state, the MC counter, and the
//! archive of accepted states.
//!
//! Every file another process may observe is written to a temporary sibling
//! and renamed into place, so readers never see a half-written file. Slot
//! inputs are the exception: workers read them only after the sentinel
//! appears, so plain overwrites are fine there.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

/// Directories created under the working directory at startup. The
/// `waiting_*` pair is worker-internal but expected to exist.
const LAYOUT: [&str; 7] = [
    "fast",
    "reports",
    "refine_outbox",
    "waiting_pool",
    "waiting_work",
    "counters",
    "mcprocess",
];

pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn init_layout(&self) -> Result<()> {
        for dir in LAYOUT {
            let path = self.root.join(dir);
            fs::create_dir_all(&path)
                .with_context(|| format!("cannot create {}", path.display()))?;
        }
        Ok(())
    }

    // --- Paths ---

    pub fn save_path(&self) -> PathBuf {
        self.root.join("SAVE")
    }

    pub fn contcar_path(&self) -> PathBuf {
        self.root.join("CONTCAR")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    pub fn outbox_dir(&self, task_id: &str) -> PathBuf {
        self.root.join("refine_outbox").join(task_id)
    }

    pub fn slot_poscar(&self, slot: usize) -> PathBuf {
        self.root.join("fast").join(format!("POSCAR{}", slot))
    }

    pub fn slot_save(&self, slot: usize) -> PathBuf {
        self.root.join("fast").join(format!("SAVE{}", slot))
    }

    /// Zero-content flag meaning "slot has work pending". Written here,
    /// removed by the fast worker.
    pub fn sentinel(&self, slot: usize) -> PathBuf {
        self.root.join("fast").join(format!(".go_{}", slot))
    }

    fn counter_path(&self) -> PathBuf {
        self.root.join("counters").join("mc_count")
    }

    fn archive_dir(&self, index: u64) -> PathBuf {
        self.root.join("mcprocess").join(format!("{:06}", index))
    }

    // --- Write primitives ---

    /// Write-then-rename, so external readers only ever see the complete
    /// content.
    pub fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        let tmp = tmp_sibling(path)?;
        fs::write(&tmp, contents)
            .with_context(|| format!("cannot write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("cannot rename {} into place", tmp.display()))?;
        Ok(())
    }

    /// Copies `src` over `dst` atomically. Returns `false` (no copy, no
    /// error) when the source does not exist.
    pub fn copy_atomic(&self, src: &Path, dst: &Path) -> Result<bool> {
        if !src.exists() {
            return Ok(false);
        }
        let data =
            fs::read(src).with_context(|| format!("cannot read {}", src.display()))?;
        let tmp = tmp_sibling(dst)?;
        fs::write(&tmp, data)
            .with_context(|| format!("cannot write {}", tmp.display()))?;
        fs::rename(&tmp, dst)
            .with_context(|| format!("cannot rename {} into place", tmp.display()))?;
        Ok(true)
    }

    // --- Accepted-state handling ---

    /// Promotes a task's outbox artifacts to the root `SAVE`/`CONTCAR`.
    /// A missing artifact is logged and skipped; the chain continues with
    /// the energy update alone.
    pub fn promote_outbox(&self, task_id: &str) -> Result<()> {
        let outbox = self.outbox_dir(task_id);
        for name in ["SAVE", "CONTCAR"] {
            if !self.copy_atomic(&outbox.join(name), &self.root.join(name))? {
                warn!(
                    "task {}: outbox artifact {} missing, global copy left stale",
                    task_id, name
                );
            }
        }
        Ok(())
    }

    /// Reads, increments, and rewrites `counters/mc_count`. Unreadable or
    /// absent counters restart from zero.
    pub fn bump_mc_counter(&self) -> Result<u64> {
        let path = self.counter_path();
        let current = match fs::read_to_string(&path) {
            Ok(text) => text.trim().parse::<u64>().unwrap_or(0),
            Err(_) => 0,
        };
        let next = current + 1;
        self.write_atomic(&path, &format!("{}\n", next))?;
        Ok(next)
    }

    /// Archives an accepted state into the next `mcprocess/NNNNNN/`
    /// directory: the outbox artifacts plus a small `info.txt`.
    pub fn archive_accept(&self, task_id: &str, e_final: f64) -> Result<PathBuf> {
        let index = self.bump_mc_counter()?;
        let dir = self.archive_dir(index);
        fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;

        let outbox = self.outbox_dir(task_id);
        for name in ["CONTCAR", "SAVE", "meta.json"] {
            if !self.copy_atomic(&outbox.join(name), &dir.join(name))? {
                warn!("task {}: outbox artifact {} missing from archive", task_id, name);
            }
        }
        self.write_atomic(
            &dir.join("info.txt"),
            &format!("task_id = {}\nE_final = {:.12}\n", task_id, e_final),
        )?;

        info!("accepted task {}, archived to {}", task_id, dir.display());
        Ok(dir)
    }
}

fn tmp_sibling(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| anyhow!("path {} has no file name", path.display()))?;
    Ok(path.with_file_name(format!(".tmp_{}", name.to_string_lossy())))
}
