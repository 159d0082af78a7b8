// Copyright 2021 Michael Freitas Gustavo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module provides the checkpoint policy and the on-disk layout of a
//! manager checkpoint.
//!
//! A checkpoint directory contains `manager_state.yml` (the full iteration
//! log, the manager counters, and the serialized selector/generator state)
//! plus one `workers/<opt_id>/state` file per worker that honoured the
//! state-save request. The directory is assembled under a dotted temporary
//! name and atomically renamed into place, so readers never observe a half
//! written checkpoint.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{GlompoError, IterationLog, OptId};

/// Name of the manager state file inside a checkpoint directory. YAML is
/// used because the log legitimately contains `inf` objective values, which
/// YAML can represent and JSON cannot.
pub(crate) const MANAGER_STATE_FILE: &str = "manager_state.yml";

/// When and where the manager writes checkpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointPolicy {
    /// Directory under which the numbered checkpoint directories are made.
    pub dir: PathBuf,
    /// Write a checkpoint whenever this much wall-clock time has passed
    /// since the previous one.
    pub every: Option<Duration>,
    /// Write a checkpoint whenever this many new iteration results have
    /// been logged since the previous one.
    pub every_n_results: Option<u64>,
}

impl CheckpointPolicy {
    /// A policy which never triggers by itself; combine with
    /// [CheckpointPolicy::every] or [CheckpointPolicy::every_n_results],
    /// or invoke the manager's `checkpoint` method manually.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CheckpointPolicy { dir: dir.into(), every: None, every_n_results: None }
    }
    pub fn every(mut self, period: Duration) -> Self {
        self.every = Some(period);
        self
    }
    pub fn every_n_results(mut self, n: u64) -> Self {
        self.every_n_results = Some(n);
        self
    }
}

/// One active worker at capture time, with everything needed to respawn it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct WorkerRecord {
    pub opt_id: OptId,
    pub opt_type: String,
    pub slots: usize,
    pub starting_point: Vec<f64>,
    /// Path of the worker's self-serialized state, relative to the
    /// checkpoint directory. `None` when the worker could not save itself
    /// (missing capability or timeout); such workers are not respawned.
    pub state_file: Option<String>,
}

/// Contents of `manager_state.json`.
#[derive(Serialize, Deserialize)]
pub(crate) struct ManagerStateFile {
    pub log: IterationLog,
    pub next_id: u32,
    pub n_started: u32,
    pub n_converged: u32,
    pub n_kills: u32,
    pub n_crashed: u32,
    pub elapsed_secs: f64,
    pub checkpoint_counter: u32,
    pub selector_state: serde_json::Value,
    pub generator_state: serde_json::Value,
    pub workers: Vec<WorkerRecord>,
}

impl ManagerStateFile {
    pub fn read(checkpoint_dir: &Path) -> Result<Self, GlompoError> {
        let bytes = std::fs::read(checkpoint_dir.join(MANAGER_STATE_FILE))?;
        Ok(serde_yaml::from_slice(&bytes)?)
    }

    pub fn write(&self, dir: &Path) -> Result<(), GlompoError> {
        std::fs::write(dir.join(MANAGER_STATE_FILE), serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

/// Atomically publishes the assembled temporary directory under its final
/// name. A stale checkpoint of the same name is replaced.
pub(crate) fn publish(tmp: &Path, final_dir: &Path) -> Result<(), GlompoError> {
    if final_dir.exists() {
        std::fs::remove_dir_all(final_dir)?;
    }
    std::fs::rename(tmp, final_dir)?;
    Ok(())
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
