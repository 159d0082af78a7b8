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

//! This module provides the manager: the single-threaded scheduler which
//! owns the iteration log and the worker handles, spawns optimizers within
//! the slot budget, drains their result channels, hunts the unpromising
//! ones, checks global convergence, and finally aggregates the best point
//! ever observed into the run result.
//!
//! The main loop suspends in exactly one place (the timed blocking read on
//! the aggregated result channels); every predicate is evaluated
//! synchronously on the manager thread against the log it owns, so no
//! locking is needed anywhere on the read path.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Select, TryRecvError};
use derive_builder::Builder;
use log::{debug, info, warn};
use rand::Rng;

use crate::{
    in_bounds, Bound, CheckerTree, CheckpointPolicy, GlompoError, HunterTree, IterationLog,
    IterationResult, LogError, ManagerView, OptId, OptimizerMetadata, Origin, RunResult, RunStats,
    SelectionContext, Selector, Signal, SpawnRequest, StartpointGenerator, Task, WorkerState,
};

use super::checkpoint::{publish, ManagerStateFile, WorkerRecord};
use super::signal::duplex;
use super::worker::{pending_handle, spawn_worker, WorkerHandle, WorkerSpawn};

/// Per-worker result channel capacity. A slow manager fills the channel and
/// the worker blocks on its next send, which throttles it naturally.
const RESULT_CHANNEL_CAP: usize = 64;
/// How long one drain step blocks waiting for worker output.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(100);
/// How long the checkpoint protocol waits for pause acknowledgements.
const PAUSE_ACK_TIMEOUT: Duration = Duration::from_secs(2);
/// How long the checkpoint protocol waits for state-save acknowledgements.
const SAVE_ACK_TIMEOUT: Duration = Duration::from_secs(10);

// ----------------------------------------------------------------------------
// --- SETTINGS ---------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Configuration of a managed run, built through [GlompoSettingsBuilder].
/// The builder validates fail-fast: a run with an invalid configuration
/// never starts.
///
/// ```
/// # use glompo::*;
/// # use std::sync::Arc;
/// let settings = GlompoSettingsBuilder::default()
///     .bounds(vec![Bound::new(-1.0, 1.0); 2])
///     .max_jobs(4)
///     .convergence(MaxFuncCalls::new(10_000).into_tree())
///     .selector(Box::new(CycleSelector::new(vec![(
///         Arc::new(RandomSearchFactory::new(8, None)) as Arc<dyn OptimizerFactory>,
///         1,
///     )])))
///     .startpoint_generator(Box::new(RandomGenerator::with_seed(42)))
///     .build()
///     .unwrap();
/// # let _ = settings;
/// ```
#[derive(Builder)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate"))]
pub struct GlompoSettings {
    /// Search-space limits; every evaluated point lies coordinate-wise
    /// inside them.
    pub bounds: Vec<Bound>,
    /// Total concurrent compute slots; every worker consumes at least one.
    #[builder(default = "num_cpus::get()")]
    pub max_jobs: usize,
    /// The run ends when this tree returns `true`.
    pub convergence: CheckerTree,
    /// Kill conditions evaluated for (hunter, victim) pairs during the hunt
    /// step. Without them no worker is ever killed.
    #[builder(default, setter(strip_option))]
    pub hunters: Option<HunterTree>,
    /// Optional pre-filter applied before `hunters`; a victim is only ever
    /// killed when both trees agree.
    #[builder(default, setter(strip_option))]
    pub killing_conditions: Option<HunterTree>,
    /// The spawning policy.
    pub selector: Box<dyn Selector>,
    /// Supplier of starting points, one per spawned worker.
    pub startpoint_generator: Box<dyn StartpointGenerator>,
    /// How often an `info!` status summary is emitted.
    #[builder(default = "Duration::from_secs(60)")]
    pub status_frequency: Duration,
    /// When and where checkpoints are written. Without a policy the
    /// checkpoint machinery stays off.
    #[builder(default, setter(strip_option))]
    pub checkpointing: Option<CheckpointPolicy>,
    /// Evaluate the hunt every N newly logged iteration results.
    #[builder(default = "1")]
    pub hunt_interval: u32,
    /// Also evaluate the hunt whenever this much wall-clock time has passed
    /// since the previous one, so victims that have stopped reporting are
    /// still hunted down. Defaults to 30 seconds.
    #[builder(default = "Some(Duration::from_secs(30))", setter(strip_option))]
    pub hunt_every: Option<Duration>,
    /// Grace period for workers to deliver their final packet after a stop
    /// signal, before they are force reaped.
    #[builder(default = "Duration::from_secs(10)")]
    pub end_timeout: Duration,
    /// When set, the per-optimizer YAML log dump and the run summary are
    /// written here after the run.
    #[builder(default, setter(strip_option))]
    pub outputs_dir: Option<PathBuf>,
    /// Master seed from which per-worker seeds are derived.
    #[builder(default = "rand::rng().random()")]
    pub seed: u64,
}

impl GlompoSettingsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(bounds) = &self.bounds {
            if bounds.is_empty() {
                return Err("at least one search bound is required".to_string());
            }
            if let Some(bad) = bounds.iter().find(|b| !b.is_valid()) {
                return Err(format!("invalid bound ({}, {}): min < max and finite required", bad.min, bad.max));
            }
        }
        if matches!(self.max_jobs, Some(0)) {
            return Err("max_jobs must be at least 1".to_string());
        }
        if matches!(self.hunt_interval, Some(0)) {
            return Err("hunt_interval must be at least 1".to_string());
        }
        if matches!(self.hunt_every, Some(Some(period)) if period.is_zero()) {
            return Err("hunt_every must be a positive duration".to_string());
        }
        Ok(())
    }
}

impl From<GlompoSettingsBuilderError> for GlompoError {
    fn from(e: GlompoSettingsBuilderError) -> Self {
        GlompoError::InvalidConfig(e.to_string())
    }
}

// ----------------------------------------------------------------------------
// --- MANAGER ----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The scheduler at the heart of a managed run. Create one with
/// [GlompoManager::new] (or [GlompoManager::restore]) and call
/// [GlompoManager::minimize].
pub struct GlompoManager {
    task: Arc<dyn Task>,
    bounds: Vec<Bound>,
    max_jobs: usize,
    checker: CheckerTree,
    hunters: Option<HunterTree>,
    killing_conditions: Option<HunterTree>,
    selector: Box<dyn Selector>,
    generator: Box<dyn StartpointGenerator>,
    status_frequency: Duration,
    checkpointing: Option<CheckpointPolicy>,
    hunt_interval: u32,
    hunt_every: Option<Duration>,
    end_timeout: Duration,
    outputs_dir: Option<PathBuf>,
    seed: u64,

    log: IterationLog,
    handles: BTreeMap<OptId, WorkerHandle>,
    t0: Instant,
    elapsed_offset: Duration,
    next_id: u32,
    n_started: u32,
    n_converged: u32,
    n_kills: u32,
    n_crashed: u32,
    converged: bool,
    results_since_hunt: u32,
    last_hunt: Instant,
    results_since_checkpoint: u64,
    last_checkpoint: Instant,
    checkpoint_counter: u32,
    last_status: Instant,
}

impl GlompoManager {
    pub fn new(task: Arc<dyn Task>, settings: GlompoSettings) -> Self {
        let now = Instant::now();
        GlompoManager {
            task,
            bounds: settings.bounds,
            max_jobs: settings.max_jobs,
            checker: settings.convergence,
            hunters: settings.hunters,
            killing_conditions: settings.killing_conditions,
            selector: settings.selector,
            generator: settings.startpoint_generator,
            status_frequency: settings.status_frequency,
            checkpointing: settings.checkpointing,
            hunt_interval: settings.hunt_interval,
            hunt_every: settings.hunt_every,
            end_timeout: settings.end_timeout,
            outputs_dir: settings.outputs_dir,
            seed: settings.seed,
            log: IterationLog::new(),
            handles: BTreeMap::new(),
            t0: now,
            elapsed_offset: Duration::ZERO,
            next_id: 0,
            n_started: 0,
            n_converged: 0,
            n_kills: 0,
            n_crashed: 0,
            converged: false,
            results_since_hunt: 0,
            last_hunt: now,
            results_since_checkpoint: 0,
            last_checkpoint: now,
            checkpoint_counter: 0,
            last_status: now,
        }
    }

    /// Read access to the central log (for inspection after a run).
    pub fn log(&self) -> &IterationLog {
        &self.log
    }

    /// Runs the managed minimization to completion and returns the best
    /// point observed across all workers.
    pub fn minimize(&mut self) -> Result<RunResult, GlompoError> {
        self.last_status = Instant::now();
        self.last_hunt = Instant::now();
        info!(
            "starting managed minimization: {} slots, convergence {}",
            self.max_jobs, self.checker
        );
        loop {
            let spawned = self.fill_up()?;
            let drained = self.drain(DRAIN_TIMEOUT)?;
            self.results_since_hunt += drained;
            self.results_since_checkpoint += u64::from(drained);

            // the hunt fires on new results or, so that stalled victims are
            // still reached, on plain wall-clock time
            if self.hunters.is_some() {
                let due_results = drained > 0 && self.results_since_hunt >= self.hunt_interval;
                let due_time = self.hunt_every.is_some_and(|t| self.last_hunt.elapsed() >= t);
                if due_results || due_time {
                    self.results_since_hunt = 0;
                    self.last_hunt = Instant::now();
                    self.hunt();
                }
            }
            self.reap();

            if !self.converged && self.check_convergence() {
                self.converged = true;
                info!("convergence reached: {}", self.checker.str_with_result());
                self.stop_all("GloMPO convergence reached");
                self.drain_remaining();
                break;
            }

            self.maybe_status();
            self.maybe_checkpoint();

            let any_alive = self.handles.values().any(|h| h.state != WorkerState::Reaped);
            if !any_alive && spawned == 0 && drained == 0 {
                info!("no live workers and the selector is exhausted; ending the run");
                break;
            }
        }
        self.finish()
    }

    fn elapsed(&self) -> Duration {
        self.t0.elapsed() + self.elapsed_offset
    }

    // ------------------------------------------------------------------------
    // --- fill-up ------------------------------------------------------------
    // ------------------------------------------------------------------------
    fn used_slots(&self) -> usize {
        self.handles.values().filter(|h| h.is_active()).map(|h| h.slots).sum()
    }

    /// Spawns workers while slots are free and the selector keeps providing
    /// packages.
    fn fill_up(&mut self) -> Result<u32, GlompoError> {
        let mut spawned = 0;
        loop {
            let free = self.max_jobs.saturating_sub(self.used_slots());
            if free == 0 {
                break;
            }
            let ctx = SelectionContext {
                n_started: self.n_started,
                f_call_overall: self.log.f_call_overall(),
            };
            let Some(request) = self.selector.select(free, &ctx) else { break };
            self.spawn(request)?;
            spawned += 1;
        }
        Ok(spawned)
    }

    fn spawn(&mut self, request: SpawnRequest) -> Result<(), GlompoError> {
        let x0 = self.generator.generate(&self.bounds);
        if !in_bounds(&x0, &self.bounds) {
            // a generator breaking its contract is a programming error
            return Err(GlompoError::OutOfBounds { x: x0 });
        }
        self.next_id += 1;
        let opt_id = OptId(self.next_id);
        let seed = self.seed.wrapping_add(u64::from(self.next_id).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let optimizer = request.factory.build(&x0, &self.bounds, seed);

        self.log.add_optimizer(
            opt_id,
            OptimizerMetadata {
                opt_type: request.factory.name().to_string(),
                init_config: request.factory.config(),
                start_time: self.elapsed().as_secs_f64(),
                end_time: None,
                end_condition: None,
                slots: request.slots,
                starting_point: x0.clone(),
            },
        )?;

        let (manager_ep, worker_ep) = duplex();
        let (tx, rx) = bounded(RESULT_CHANNEL_CAP);
        let pause = Arc::new(crate::PauseGate::new(true));
        let abort = Arc::new(AtomicBool::new(false));
        let mut handle =
            pending_handle(opt_id, request.slots, manager_ep, rx, Arc::clone(&pause), Arc::clone(&abort));
        handle.thread = Some(spawn_worker(WorkerSpawn {
            opt_id,
            optimizer,
            task: Arc::clone(&self.task),
            results: tx,
            endpoint: worker_ep,
            pause,
            abort,
            n_iter_offset: 0,
        })?);
        handle.state = WorkerState::Running;
        self.handles.insert(opt_id, handle);
        self.n_started += 1;
        info!(
            "spawned optimizer {} ({}) on {} slot(s) from {:?}",
            opt_id,
            request.factory.name(),
            request.slots,
            x0
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // --- drain --------------------------------------------------------------
    // ------------------------------------------------------------------------
    /// Blocks up to `timeout` on the aggregated result channels, then sweeps
    /// every channel dry. Returns how many iteration results were absorbed.
    fn drain(&mut self, timeout: Duration) -> Result<u32, GlompoError> {
        let mut pending: Vec<IterationResult> = vec![];
        let mut hung_up: Vec<OptId> = vec![];
        {
            let live: Vec<(OptId, &crossbeam::channel::Receiver<IterationResult>)> = self
                .handles
                .iter()
                .filter(|(_, h)| !h.disconnected)
                .map(|(id, h)| (*id, &h.results))
                .collect();
            if live.is_empty() {
                return Ok(0);
            }
            let mut select = Select::new();
            for (_, rx) in &live {
                select.recv(*rx);
            }
            if let Ok(oper) = select.select_timeout(timeout) {
                let (id, rx) = live[oper.index()];
                match oper.recv(rx) {
                    Ok(result) => pending.push(result),
                    Err(_) => hung_up.push(id),
                }
            }
            for (id, rx) in &live {
                loop {
                    match rx.try_recv() {
                        Ok(result) => pending.push(result),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            hung_up.push(*id);
                            break;
                        }
                    }
                }
            }
        }
        for id in hung_up {
            if let Some(handle) = self.handles.get_mut(&id) {
                handle.disconnected = true;
            }
        }
        let count = pending.len() as u32;
        for result in pending {
            self.absorb(result)?;
        }
        Ok(count)
    }

    /// Stamps an arrival time on the packet and appends it to the log,
    /// applying the error policy: ordering violations are warned about and
    /// dropped, identity violations abort the run.
    fn absorb(&mut self, mut result: IterationResult) -> Result<(), GlompoError> {
        result.timestamp = self.elapsed().as_secs_f64();
        let opt_id = result.opt_id;
        let is_final = result.is_final;
        match self.log.put_iteration(result) {
            Ok(()) => {}
            Err(e @ (LogError::OutOfOrder { .. } | LogError::AfterFinal(_) | LogError::Closed)) => {
                warn!("discarding iteration from optimizer {opt_id}: {e}");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        if is_final {
            if let Some(handle) = self.handles.get_mut(&opt_id) {
                if handle.state.is_active() {
                    handle.state = WorkerState::Converged;
                    self.n_converged += 1;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // --- hunt ---------------------------------------------------------------
    // ------------------------------------------------------------------------
    /// Evaluates the kill conditions for every (hunter, victim) pairing.
    /// The pairing rule: every RUNNING worker is a potential victim, and its
    /// candidate hunters are the currently RUNNING workers holding a
    /// strictly better `fx_best` (paused workers are not eligible). The
    /// victim dies on the first pair for which the pre-filter (when
    /// configured) and the hunter tree both return true.
    fn hunt(&mut self) {
        let Some(hunters) = self.hunters.as_mut() else { return };
        let log = &self.log;
        let actives: Vec<(OptId, f64, WorkerState)> = self
            .handles
            .iter()
            .filter(|(_, h)| h.is_active())
            .map(|(id, h)| (*id, log.fx_best(*id), h.state))
            .collect();

        let mut kills: Vec<(OptId, OptId)> = vec![];
        for (victim, victim_best, state) in &actives {
            if *state != WorkerState::Running {
                continue;
            }
            for (hunter_id, hunter_best, hunter_state) in &actives {
                if hunter_id == victim
                    || *hunter_state != WorkerState::Running
                    || !(hunter_best < victim_best)
                {
                    continue;
                }
                let prefilter = match self.killing_conditions.as_mut() {
                    Some(conditions) => conditions.check(log, *hunter_id, *victim),
                    None => true,
                };
                if prefilter && hunters.check(log, *hunter_id, *victim) {
                    debug!("hunt fired: {}", hunters.str_with_result());
                    kills.push((*victim, *hunter_id));
                    break;
                }
            }
        }
        for (victim, hunter) in kills {
            self.kill(victim, hunter);
        }
    }

    /// Sends the stop signal to a hunted victim and records the kill.
    fn kill(&mut self, victim: OptId, hunter: OptId) {
        let now_secs = self.elapsed().as_secs_f64();
        let Some(handle) = self.handles.get_mut(&victim) else { return };
        if !handle.state.is_active() {
            return;
        }
        handle.endpoint.signal(Signal::StopImmediate);
        // a parked victim must wake up to see the signal
        handle.pause.open();
        handle.state = WorkerState::Killed;
        handle.stop_sent_at = Some(Instant::now());
        self.n_kills += 1;
        warn!("optimizer {victim} killed after hunt by optimizer {hunter}");
        let _ = self.log.put_message(
            victim,
            &format!("Kill signal issued by manager: hunter {hunter} -> victim {victim}"),
        );
        let _ = self.log.record_end(
            victim,
            &format!("Killed by manager following hunt (hunter {hunter})"),
            now_secs,
        );
    }

    /// Sends the stop signal to every still active worker (run shutdown).
    fn stop_all(&mut self, reason: &str) {
        let now_secs = self.elapsed().as_secs_f64();
        for (id, handle) in self.handles.iter_mut() {
            if handle.state.is_active() {
                handle.endpoint.signal(Signal::StopImmediate);
                handle.pause.open();
                handle.state = WorkerState::Killed;
                handle.stop_sent_at = Some(Instant::now());
                self.n_kills += 1;
                let _ = self.log.record_end(*id, reason, now_secs);
            }
        }
    }

    // ------------------------------------------------------------------------
    // --- convergence & lifecycle --------------------------------------------
    // ------------------------------------------------------------------------
    fn check_convergence(&mut self) -> bool {
        let elapsed = self.elapsed();
        let view = ManagerView {
            log: &self.log,
            elapsed,
            f_calls: self.log.f_call_overall(),
            started: self.n_started,
            converged: self.n_converged,
            killed: self.n_kills,
            crashed: self.n_crashed,
            best_fx: self.log.best_iter().map_or(f64::INFINITY, |b| b.fx),
        };
        self.checker.check(&view)
    }

    /// Joins finished workers, classifies the dead, and enforces the stop
    /// deadline on workers that ignore their stop signal.
    fn reap(&mut self) {
        let now_secs = self.elapsed().as_secs_f64();
        let end_timeout = self.end_timeout;
        let ids: Vec<OptId> = self.handles.keys().copied().collect();
        for id in ids {
            let handle = self.handles.get_mut(&id).unwrap();
            handle.pump();
            match handle.state {
                WorkerState::Running | WorkerState::Paused => {
                    if handle.disconnected && !self.log.is_finalized(id) {
                        // the thread died without a final packet
                        let reason = handle
                            .crash_reason
                            .take()
                            .unwrap_or_else(|| "result channel disconnected".to_string());
                        handle.state = WorkerState::Crashed;
                        self.n_crashed += 1;
                        warn!("optimizer {id} crashed: {reason}");
                        let _ = self.log.put_message(id, &format!("Worker crashed: {reason}"));
                        let _ = self.log.record_end(id, &format!("Crashed: {reason}"), now_secs);
                    }
                }
                WorkerState::Killed | WorkerState::Converged | WorkerState::Crashed => {
                    let finished = handle.thread.as_ref().map_or(true, |t| t.is_finished());
                    if finished {
                        if let Some(thread) = handle.thread.take() {
                            let _ = thread.join();
                        }
                        handle.pump();
                        let reason = handle.terminating_reason.take();
                        let was = handle.state;
                        handle.state = WorkerState::Reaped;
                        if self.log.metadata(id).is_some_and(|m| m.end_condition.is_none()) {
                            let fallback = match was {
                                WorkerState::Converged => "Optimizer convergence".to_string(),
                                other => format!("Stopped while {other}"),
                            };
                            let _ = self.log.record_end(id, &reason.unwrap_or(fallback), now_secs);
                        }
                        debug!("optimizer {id} reaped");
                    } else if handle.stop_sent_at.is_some_and(|t| t.elapsed() >= end_timeout) {
                        // cooperative force kill: abort flag + detach
                        warn!("optimizer {id} ignored its stop signal; force reaping");
                        handle.abort.store(true, Ordering::Relaxed);
                        handle.pause.open();
                        handle.thread.take();
                        handle.state = WorkerState::Reaped;
                        self.n_crashed += 1;
                        let _ = self.log.record_end(id, "Crashed: stop signal timeout", now_secs);
                        let _ = self
                            .log
                            .put_message(id, "Worker failed to stop within the grace period");
                    }
                }
                WorkerState::Pending | WorkerState::Reaped => {}
            }
        }
    }

    /// After the stop signals went out: keep absorbing in-flight results
    /// until every worker is reaped or the grace period runs out.
    fn drain_remaining(&mut self) {
        let deadline = Instant::now() + self.end_timeout;
        loop {
            let _ = self.drain(Duration::from_millis(20));
            self.reap();
            if self.handles.values().all(|h| h.state == WorkerState::Reaped) {
                break;
            }
            if Instant::now() >= deadline {
                let now_secs = self.elapsed().as_secs_f64();
                for (id, handle) in self.handles.iter_mut() {
                    if handle.state != WorkerState::Reaped {
                        warn!("optimizer {id} did not exit within the grace period");
                        handle.abort.store(true, Ordering::Relaxed);
                        handle.pause.open();
                        handle.thread.take();
                        handle.state = WorkerState::Reaped;
                        self.n_crashed += 1;
                        let _ = self.log.record_end(*id, "Crashed: stop signal timeout", now_secs);
                    }
                }
                // last sweep for packets that made it out before the cut
                let _ = self.drain(Duration::ZERO);
                break;
            }
        }
    }

    fn maybe_status(&mut self) {
        if self.last_status.elapsed() < self.status_frequency {
            return;
        }
        self.last_status = Instant::now();
        let active = self.handles.values().filter(|h| h.is_active()).count();
        info!(
            "status: {} active workers on {}/{} slots; {} f-calls; best fx = {}",
            active,
            self.used_slots(),
            self.max_jobs,
            self.log.f_call_overall(),
            self.log.best_iter().map_or(f64::INFINITY, |b| b.fx),
        );
        debug!("convergence so far: {}", self.checker.str_with_result());
    }

    /// Closes the log, writes the optional output files, and aggregates the
    /// final result. Even a run in which nothing was ever logged yields a
    /// valid (empty) result.
    fn finish(&mut self) -> Result<RunResult, GlompoError> {
        self.log.close();
        if let Some(dir) = self.outputs_dir.clone() {
            if let Err(e) = self.log.save_optimizers(&dir.join("glompo_optimizer_logs")) {
                warn!("could not write the optimizer log dump: {e}");
            }
            if let Err(e) = self.log.save_summary(&dir.join("glompo_summary.yml")) {
                warn!("could not write the run summary: {e}");
            }
        }
        let stats = RunStats {
            f_calls: self.log.f_call_overall(),
            elapsed_secs: self.elapsed().as_secs_f64(),
            started: self.n_started,
            converged: self.n_converged,
            killed: self.n_kills,
            crashed: self.n_crashed,
        };
        let (x, fx, origin) = match self.log.best_iter() {
            Some(best) => {
                let meta = self.log.metadata(best.opt_id);
                let origin = Origin {
                    opt_id: best.opt_id,
                    opt_type: meta.map_or_else(String::new, |m| m.opt_type.clone()),
                    starting_point: meta.map_or_else(Vec::new, |m| m.starting_point.clone()),
                    end_condition: meta
                        .and_then(|m| m.end_condition.clone())
                        .unwrap_or_else(|| "unknown".to_string()),
                };
                (best.x.clone(), best.fx, Some(origin))
            }
            None => (vec![], f64::INFINITY, None),
        };
        info!(
            "run complete: fx = {fx} after {} f-calls across {} optimizers",
            stats.f_calls, stats.started
        );
        Ok(RunResult { x, fx, stats, origin })
    }

    // ------------------------------------------------------------------------
    // --- checkpointing ------------------------------------------------------
    // ------------------------------------------------------------------------
    fn maybe_checkpoint(&mut self) {
        let Some(policy) = &self.checkpointing else { return };
        let due_time = policy.every.is_some_and(|d| self.last_checkpoint.elapsed() >= d);
        let due_results =
            policy.every_n_results.is_some_and(|n| self.results_since_checkpoint >= n);
        if !(due_time || due_results) {
            return;
        }
        self.results_since_checkpoint = 0;
        self.last_checkpoint = Instant::now();
        match self.checkpoint() {
            Ok(path) => debug!("periodic checkpoint at {}", path.display()),
            // checkpoint failures are operational, never fatal to the run
            Err(e) => warn!("checkpoint failed: {e}; the run continues"),
        }
    }

    /// Writes a full checkpoint: pauses every worker, captures the manager
    /// state and each worker's self-serialized state into a temporary
    /// directory, atomically publishes it, and resumes.
    pub fn checkpoint(&mut self) -> Result<PathBuf, GlompoError> {
        let Some(policy) = self.checkpointing.clone() else {
            return Err(GlompoError::InvalidConfig("checkpointing is not configured".to_string()));
        };
        self.checkpoint_counter += 1;
        let name = format!("checkpoint_{:04}", self.checkpoint_counter);
        let tmp = policy.dir.join(format!(".tmp_{name}"));
        let final_dir = policy.dir.join(&name);

        self.pause_all();
        // unblock senders sitting on a full channel, then collect the acks
        let _ = self.drain(Duration::ZERO);
        if !self.await_pause_acks(PAUSE_ACK_TIMEOUT) {
            warn!("some workers did not acknowledge the checkpoint pause in time");
        }
        let _ = self.drain(Duration::ZERO);

        let outcome = self.write_checkpoint(&tmp, &final_dir);
        self.resume_all();
        if outcome.is_err() {
            let _ = fs::remove_dir_all(&tmp);
        }
        outcome
    }

    fn write_checkpoint(&mut self, tmp: &Path, final_dir: &Path) -> Result<PathBuf, GlompoError> {
        fs::create_dir_all(tmp.join("workers"))?;
        let active: Vec<OptId> =
            self.handles.iter().filter(|(_, h)| h.is_active()).map(|(id, _)| *id).collect();
        for id in &active {
            let worker_dir = tmp.join("workers").join(id.to_string());
            fs::create_dir_all(&worker_dir)?;
            let handle = self.handles.get_mut(id).unwrap();
            handle.save_ack = None;
            handle.endpoint.signal(Signal::SaveState(worker_dir.join("state")));
        }
        self.await_save_acks(&active, SAVE_ACK_TIMEOUT);

        let workers: Vec<WorkerRecord> = active
            .iter()
            .map(|id| {
                let handle = &self.handles[id];
                let meta = self.log.metadata(*id);
                if let Some(Err(reason)) = &handle.save_ack {
                    warn!("worker {id} could not save its state: {reason}");
                }
                WorkerRecord {
                    opt_id: *id,
                    opt_type: meta.map_or_else(String::new, |m| m.opt_type.clone()),
                    slots: handle.slots,
                    starting_point: meta.map_or_else(Vec::new, |m| m.starting_point.clone()),
                    state_file: matches!(handle.save_ack, Some(Ok(())))
                        .then(|| format!("workers/{id}/state")),
                }
            })
            .collect();

        let state = ManagerStateFile {
            log: self.log.clone(),
            next_id: self.next_id,
            n_started: self.n_started,
            n_converged: self.n_converged,
            n_kills: self.n_kills,
            n_crashed: self.n_crashed,
            elapsed_secs: self.elapsed().as_secs_f64(),
            checkpoint_counter: self.checkpoint_counter,
            selector_state: self.selector.state(),
            generator_state: self.generator.state(),
            workers,
        };
        state.write(tmp)?;
        publish(tmp, final_dir)?;
        info!("checkpoint written to {}", final_dir.display());
        Ok(final_dir.to_path_buf())
    }

    fn pause_all(&mut self) {
        for handle in self.handles.values_mut() {
            if handle.state == WorkerState::Running {
                handle.paused_ack = false;
                handle.pause.close();
                handle.endpoint.signal(Signal::Pause);
                handle.state = WorkerState::Paused;
            }
        }
    }

    fn resume_all(&mut self) {
        for handle in self.handles.values_mut() {
            if handle.state == WorkerState::Paused {
                handle.pause.open();
                handle.state = WorkerState::Running;
            }
        }
    }

    fn await_pause_acks(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let mut all_acked = true;
            for handle in self.handles.values_mut() {
                if handle.state == WorkerState::Paused {
                    handle.pump();
                    let settled = handle.paused_ack
                        || handle.terminating_reason.is_some()
                        || handle.crash_reason.is_some()
                        || handle.disconnected;
                    all_acked &= settled;
                }
            }
            if all_acked {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn await_save_acks(&mut self, ids: &[OptId], timeout: Duration) {
        let deadline = Instant::now() + timeout;
        loop {
            let mut all_settled = true;
            for id in ids {
                let handle = self.handles.get_mut(id).unwrap();
                handle.pump();
                let settled = handle.save_ack.is_some()
                    || handle.terminating_reason.is_some()
                    || handle.crash_reason.is_some()
                    || handle.disconnected;
                all_settled &= settled;
            }
            if all_settled || Instant::now() >= deadline {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Rebuilds a manager from a checkpoint directory. `settings` is the
    /// same configuration the original run used (predicate trees, selector
    /// and generator are reconstructed by the caller; their mutable state is
    /// reloaded from the checkpoint). `factories` maps the optimizer class
    /// names found in the checkpoint back to live factories; classes without
    /// a factory or without saved state are not respawned.
    pub fn restore(
        task: Arc<dyn Task>,
        settings: GlompoSettings,
        checkpoint_dir: &Path,
        factories: &[Arc<dyn crate::OptimizerFactory>],
    ) -> Result<Self, GlompoError> {
        let state = ManagerStateFile::read(checkpoint_dir)?;
        let mut manager = GlompoManager::new(task, settings);
        manager.selector.load_state(&state.selector_state);
        manager.generator.load_state(&state.generator_state);
        manager.log = state.log;
        manager.next_id = state.next_id;
        manager.n_started = state.n_started;
        manager.n_converged = state.n_converged;
        manager.n_kills = state.n_kills;
        manager.n_crashed = state.n_crashed;
        manager.checkpoint_counter = state.checkpoint_counter;
        manager.elapsed_offset = Duration::from_secs_f64(state.elapsed_secs);
        manager.t0 = Instant::now();

        for record in state.workers {
            let id = record.opt_id;
            let Some(file) = record.state_file.clone() else {
                let _ = manager.log.put_message(id, "Not recovered from checkpoint: no saved state");
                let _ = manager.log.record_end(id, "Lost at checkpoint restore", state.elapsed_secs);
                continue;
            };
            let Some(factory) = factories.iter().find(|f| f.name() == record.opt_type) else {
                warn!("no factory registered for optimizer class {}", record.opt_type);
                let _ = manager
                    .log
                    .put_message(id, "Not recovered from checkpoint: unknown optimizer class");
                let _ = manager.log.record_end(id, "Lost at checkpoint restore", state.elapsed_secs);
                continue;
            };
            match factory.restore(&checkpoint_dir.join(&file)) {
                Ok(optimizer) => manager.respawn(record, optimizer)?,
                Err(e) => {
                    warn!("optimizer {id} could not be restored: {e}");
                    let _ = manager
                        .log
                        .put_message(id, &format!("Not recovered from checkpoint: {e}"));
                    let _ =
                        manager.log.record_end(id, "Lost at checkpoint restore", state.elapsed_secs);
                }
            }
        }
        info!(
            "restored from {}: {} workers live again",
            checkpoint_dir.display(),
            manager.handles.len()
        );
        Ok(manager)
    }

    fn respawn(
        &mut self,
        record: WorkerRecord,
        optimizer: Box<dyn crate::Optimizer>,
    ) -> Result<(), GlompoError> {
        let opt_id = record.opt_id;
        let n_iter_offset = self.log.records(opt_id).last().map_or(0, |r| r.n_iter);
        let (manager_ep, worker_ep) = duplex();
        let (tx, rx) = bounded(RESULT_CHANNEL_CAP);
        let pause = Arc::new(crate::PauseGate::new(true));
        let abort = Arc::new(AtomicBool::new(false));
        let mut handle =
            pending_handle(opt_id, record.slots, manager_ep, rx, Arc::clone(&pause), Arc::clone(&abort));
        handle.thread = Some(spawn_worker(WorkerSpawn {
            opt_id,
            optimizer,
            task: Arc::clone(&self.task),
            results: tx,
            endpoint: worker_ep,
            pause,
            abort,
            n_iter_offset,
        })?);
        handle.state = WorkerState::Running;
        self.handles.insert(opt_id, handle);
        Ok(())
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

/// Unlike the predicates and the log, the manager loop is hard to unit test
/// in isolation, so these tests run short managed optimizations end to end
/// with scripted optimizers whose "objective" is simply the first coordinate
/// of the proposed point.
#[cfg(test)]
mod test_manager {
    use std::fmt;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::*;

    use super::super::checkpoint::ManagerStateFile;

    /// An optimizer which proposes the scripted values as points; paired
    /// with the identity task, its fx sequence is exactly the script. Once
    /// the script is exhausted it either converges or keeps repeating the
    /// last value forever.
    struct Scripted {
        seq: Vec<f64>,
        i: usize,
        converge_at_end: bool,
        best: Option<(Vec<f64>, f64)>,
    }
    impl Optimizer for Scripted {
        fn ask(&mut self) -> Vec<Vec<f64>> {
            let value = if self.i < self.seq.len() {
                self.seq[self.i]
            } else {
                *self.seq.last().unwrap()
            };
            vec![vec![value]]
        }
        fn tell(&mut self, xs: &[Vec<f64>], fxs: &[f64]) {
            self.i += 1;
            for (x, fx) in xs.iter().zip(fxs) {
                if self.best.as_ref().is_none_or(|(_, b)| fx < b) {
                    self.best = Some((x.clone(), *fx));
                }
            }
        }
        fn converged(&self) -> Option<String> {
            (self.converge_at_end && self.i >= self.seq.len())
                .then(|| "scripted convergence".to_string())
        }
        fn best(&self) -> Option<(Vec<f64>, f64)> {
            self.best.clone()
        }
    }

    struct ScriptedFactory {
        name: &'static str,
        seq: Vec<f64>,
        converge_at_end: bool,
    }
    impl OptimizerFactory for ScriptedFactory {
        fn name(&self) -> &str {
            self.name
        }
        fn build(&self, _x0: &[f64], _bounds: &[Bound], _seed: u64) -> Box<dyn Optimizer> {
            Box::new(Scripted {
                seq: self.seq.clone(),
                i: 0,
                converge_at_end: self.converge_at_end,
                best: None,
            })
        }
    }

    /// Wraps a [Scripted] optimizer and goes quiet after a number of
    /// iterations: `ask` sleeps far longer than any test runs for, so the
    /// worker stops producing results without ending.
    struct Stalling {
        inner: Scripted,
        stall_after: usize,
    }
    impl Optimizer for Stalling {
        fn ask(&mut self) -> Vec<Vec<f64>> {
            if self.inner.i >= self.stall_after {
                std::thread::sleep(Duration::from_secs(30));
            }
            self.inner.ask()
        }
        fn tell(&mut self, xs: &[Vec<f64>], fxs: &[f64]) {
            self.inner.tell(xs, fxs);
        }
        fn converged(&self) -> Option<String> {
            self.inner.converged()
        }
        fn best(&self) -> Option<(Vec<f64>, f64)> {
            self.inner.best()
        }
    }

    struct StallingFactory {
        name: &'static str,
        value: f64,
        stall_after: usize,
    }
    impl OptimizerFactory for StallingFactory {
        fn name(&self) -> &str {
            self.name
        }
        fn build(&self, _x0: &[f64], _bounds: &[Bound], _seed: u64) -> Box<dyn Optimizer> {
            Box::new(Stalling {
                inner: Scripted {
                    seq: vec![self.value],
                    i: 0,
                    converge_at_end: false,
                    best: None,
                },
                stall_after: self.stall_after,
            })
        }
    }

    /// Test-only checker firing once the manager has killed anybody.
    struct KillCount(u32);
    impl Checker for KillCount {
        fn evaluate(&mut self, view: &ManagerView) -> bool {
            view.killed >= self.0
        }
    }
    impl fmt::Display for KillCount {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "KillCount(n={})", self.0)
        }
    }

    fn init_test_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn identity_task() -> Arc<dyn Task> {
        init_test_logging();
        Arc::new(|x: &[f64]| x[0])
    }

    fn wide_bounds() -> Vec<Bound> {
        vec![Bound::new(-1e6, 1e6)]
    }

    fn scripted_selector(scripts: &[(&'static str, Vec<f64>, bool)]) -> Box<dyn Selector> {
        let classes: Vec<OptimizerClass> = scripts
            .iter()
            .map(|(name, seq, converge)| {
                (
                    Arc::new(ScriptedFactory {
                        name: *name,
                        seq: seq.clone(),
                        converge_at_end: *converge,
                    }) as Arc<dyn OptimizerFactory>,
                    1,
                )
            })
            .collect();
        let n = classes.len() as u32;
        Box::new(CycleSelector::new(classes).with_max_spawns(n))
    }

    fn base_settings(selector: Box<dyn Selector>, convergence: CheckerTree) -> GlompoSettings {
        GlompoSettingsBuilder::default()
            .bounds(wide_bounds())
            .max_jobs(2)
            .convergence(convergence)
            .selector(selector)
            .startpoint_generator(Box::new(RandomGenerator::with_seed(1)))
            .end_timeout(Duration::from_secs(5))
            .seed(0)
            .build()
            .unwrap()
    }

    #[test]
    fn two_workers_with_disjoint_best_values() {
        let selector =
            scripted_selector(&[("Alpha", vec![10.0, 5.0], true), ("Beta", vec![3.0], true)]);
        let settings = base_settings(selector, MaxFuncCalls::new(10).into_tree());
        let mut manager = GlompoManager::new(identity_task(), settings);
        let result = manager.minimize().unwrap();

        assert_eq!(3.0, result.fx);
        assert_eq!(vec![3.0], result.x);
        let origin = result.origin.unwrap();
        assert_eq!(OptId(2), origin.opt_id);
        assert_eq!("Beta", origin.opt_type);
        assert_eq!(2, result.stats.started);
        assert_eq!(2, result.stats.converged);
        assert_eq!(0, result.stats.killed);

        // the returned value is the minimum over everything ever logged
        let log_min = manager
            .log()
            .opt_ids()
            .flat_map(|id| manager.log().records(id).to_vec())
            .map(|r| r.fx)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(log_min, result.fx);
    }

    #[test]
    fn hunters_kill_the_stagnant_victim() {
        // victim spawns first and sits at fx=100 forever; the hunter holds 1
        let selector =
            scripted_selector(&[("Victim", vec![100.0], false), ("Hunter", vec![1.0], false)]);
        let mut settings = base_settings(selector, KillCount(1).into_tree());
        settings.hunters =
            Some(MinIterations::new(10).into_tree() & BestUnmoving::new(20, 0.0).into_tree());
        let mut manager = GlompoManager::new(identity_task(), settings);
        let result = manager.minimize().unwrap();

        assert_eq!(1.0, result.fx);
        assert_eq!(OptId(2), result.origin.as_ref().unwrap().opt_id);
        // the victim was killed by the hunt, the hunter stopped at shutdown
        assert_eq!(2, result.stats.killed);
        assert_eq!(0, result.stats.converged);

        // the victim had at least its window's worth of iterations
        assert!(manager.log().records(OptId(1)).len() >= 20);
        let messages = manager.log().messages(OptId(1));
        assert!(
            messages.iter().any(|m| m.contains("hunter 2 -> victim 1")),
            "kill message missing: {messages:?}"
        );
        let end = manager.log().metadata(OptId(1)).unwrap().end_condition.clone().unwrap();
        assert!(end.contains("hunter 2"), "unexpected end condition: {end}");
    }

    #[test]
    fn a_time_triggered_hunt_reaches_stalled_workers() {
        // both workers go quiet long before enough results accumulate for
        // the count trigger, so only the wall-clock trigger can fire
        let classes: Vec<OptimizerClass> = vec![
            (
                Arc::new(StallingFactory { name: "Victim", value: 100.0, stall_after: 25 })
                    as Arc<dyn OptimizerFactory>,
                1,
            ),
            (
                Arc::new(StallingFactory { name: "Hunter", value: 1.0, stall_after: 5 })
                    as Arc<dyn OptimizerFactory>,
                1,
            ),
        ];
        let selector = Box::new(CycleSelector::new(classes).with_max_spawns(2));
        let mut settings = base_settings(selector, KillCount(1).into_tree());
        settings.hunters =
            Some(MinIterations::new(10).into_tree() & BestUnmoving::new(20, 0.0).into_tree());
        settings.hunt_interval = 1000;
        settings.hunt_every = Some(Duration::from_millis(200));
        settings.end_timeout = Duration::from_secs(1);
        let mut manager = GlompoManager::new(identity_task(), settings);
        let result = manager.minimize().unwrap();

        assert_eq!(1.0, result.fx);
        assert!(manager.log().records(OptId(1)).len() >= 21);
        let messages = manager.log().messages(OptId(1));
        assert!(
            messages.iter().any(|m| m.contains("hunter 2 -> victim 1")),
            "kill message missing: {messages:?}"
        );
        // neither sleeper could deliver its final packet in time: both were
        // force reaped after the grace period
        assert_eq!(2, result.stats.crashed);
    }

    #[test]
    fn target_value_convergence_stops_every_worker() {
        let selector = scripted_selector(&[("Seeker", vec![1.0, 0.5, 0.005], false)]);
        let settings = base_settings(selector, TargetValue::new(0.01).into_tree());
        let mut manager = GlompoManager::new(identity_task(), settings);
        let result = manager.minimize().unwrap();

        assert!(result.fx <= 0.01, "fx = {}", result.fx);
        assert_eq!(1, result.stats.killed);
        let end = manager.log().metadata(OptId(1)).unwrap().end_condition.clone().unwrap();
        assert!(end.contains("convergence"), "unexpected end condition: {end}");
    }

    #[test]
    fn slot_budget_serializes_the_workers() {
        let selector =
            scripted_selector(&[("One", vec![5.0, 4.0, 3.0], true), ("Two", vec![9.0, 8.0, 7.0], true)]);
        let mut settings = base_settings(selector, MaxFuncCalls::new(1000).into_tree());
        settings.max_jobs = 1;
        let mut manager = GlompoManager::new(identity_task(), settings);
        let result = manager.minimize().unwrap();

        assert_eq!(2, result.stats.started);
        assert_eq!(3.0, result.fx);
        // with a single slot the second worker can only start after the
        // first one ended
        let first_end = manager.log().metadata(OptId(1)).unwrap().end_time.unwrap();
        let second_start = manager.log().metadata(OptId(2)).unwrap().start_time;
        assert!(
            second_start >= first_end,
            "second worker started at {second_start} before the first ended at {first_end}"
        );
    }

    #[test]
    fn an_exhausted_selector_with_no_spawns_yields_an_empty_result() {
        let selector = Box::new(
            CycleSelector::new(vec![(
                Arc::new(ScriptedFactory { name: "Never", seq: vec![1.0], converge_at_end: true })
                    as Arc<dyn OptimizerFactory>,
                1,
            )])
            .with_max_spawns(0),
        );
        let settings = base_settings(selector, MaxFuncCalls::new(10).into_tree());
        let mut manager = GlompoManager::new(identity_task(), settings);
        let result = manager.minimize().unwrap();

        assert!(result.x.is_empty());
        assert!(result.fx.is_infinite());
        assert!(result.origin.is_none());
        assert_eq!(0, result.stats.started);
    }

    #[test]
    fn an_out_of_bounds_startpoint_aborts_the_run() {
        struct BadGenerator;
        impl StartpointGenerator for BadGenerator {
            fn generate(&mut self, _bounds: &[Bound]) -> Vec<f64> {
                vec![9e9]
            }
        }
        let selector = scripted_selector(&[("Doomed", vec![1.0], true)]);
        let settings = GlompoSettingsBuilder::default()
            .bounds(vec![Bound::new(-1.0, 1.0)])
            .convergence(MaxFuncCalls::new(10).into_tree())
            .selector(selector)
            .startpoint_generator(Box::new(BadGenerator))
            .build()
            .unwrap();
        let mut manager = GlompoManager::new(identity_task(), settings);
        assert!(matches!(manager.minimize(), Err(GlompoError::OutOfBounds { .. })));
    }

    #[test]
    fn misconfigured_settings_fail_fast_in_the_builder() {
        let bad_bounds = GlompoSettingsBuilder::default()
            .bounds(vec![Bound::new(2.0, 1.0)])
            .convergence(MaxFuncCalls::new(10).into_tree())
            .selector(scripted_selector(&[("X", vec![1.0], true)]))
            .startpoint_generator(Box::new(RandomGenerator::with_seed(0)))
            .build();
        assert!(bad_bounds.is_err());

        let missing_selector = GlompoSettingsBuilder::default()
            .bounds(vec![Bound::new(0.0, 1.0)])
            .convergence(MaxFuncCalls::new(10).into_tree())
            .startpoint_generator(Box::new(RandomGenerator::with_seed(0)))
            .build();
        assert!(missing_selector.is_err());

        let zero_jobs = GlompoSettingsBuilder::default()
            .bounds(vec![Bound::new(0.0, 1.0)])
            .max_jobs(0)
            .convergence(MaxFuncCalls::new(10).into_tree())
            .selector(scripted_selector(&[("X", vec![1.0], true)]))
            .startpoint_generator(Box::new(RandomGenerator::with_seed(0)))
            .build();
        assert!(zero_jobs.is_err());
    }

    #[test]
    fn output_files_are_written_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let selector = scripted_selector(&[("Writer", vec![2.0, 1.0], true)]);
        let mut settings = base_settings(selector, MaxFuncCalls::new(100).into_tree());
        settings.outputs_dir = Some(dir.path().to_path_buf());
        let mut manager = GlompoManager::new(identity_task(), settings);
        manager.minimize().unwrap();

        assert!(dir.path().join("glompo_summary.yml").exists());
        assert!(dir.path().join("glompo_optimizer_logs").join("1_Writer.yml").exists());
    }

    fn sphere_task() -> Arc<dyn Task> {
        init_test_logging();
        Arc::new(|x: &[f64]| x.iter().map(|v| v * v).sum::<f64>())
    }

    fn checkpointable_settings(dir: &std::path::Path, budget: u64) -> GlompoSettings {
        let factory: Arc<dyn OptimizerFactory> = Arc::new(RandomSearchFactory::new(2, None));
        GlompoSettingsBuilder::default()
            .bounds(vec![Bound::new(-5.0, 5.0); 2])
            .max_jobs(2)
            .convergence(MaxFuncCalls::new(budget).into_tree())
            .selector(Box::new(CycleSelector::new(vec![(factory, 1)]).with_max_spawns(2)))
            .startpoint_generator(Box::new(RandomGenerator::with_seed(9)))
            .checkpointing(CheckpointPolicy::new(dir))
            .end_timeout(Duration::from_secs(5))
            .seed(3)
            .build()
            .unwrap()
    }

    #[test]
    fn checkpoint_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        // drive a run manually up to a mid-flight checkpoint
        let settings = checkpointable_settings(dir.path(), 1_000_000);
        let mut manager = GlompoManager::new(sphere_task(), settings);
        manager.fill_up().unwrap();
        while manager.log.len() < 30 {
            manager.drain(Duration::from_millis(100)).unwrap();
        }
        let checkpoint_dir = manager.checkpoint().unwrap();

        // wind the original run down
        manager.stop_all("test over");
        manager.drain_remaining();
        manager.finish().unwrap();

        // the restored log must equal the captured one
        let captured = ManagerStateFile::read(&checkpoint_dir).unwrap();
        let factory: Arc<dyn OptimizerFactory> = Arc::new(RandomSearchFactory::new(2, None));
        let continue_budget = captured.log.f_call_overall() + 200;
        let settings = checkpointable_settings(dir.path(), continue_budget);
        let restored =
            GlompoManager::restore(sphere_task(), settings, &checkpoint_dir, &[Arc::clone(&factory)])
                .unwrap();

        assert_eq!(captured.log.len(), restored.log().len());
        for id in captured.log.opt_ids() {
            assert_eq!(captured.log.records(id), restored.log().records(id));
        }
        // both workers are live again, with their original identities and
        // starting points
        assert_eq!(2, restored.handles.len());
        for (id, handle) in &restored.handles {
            assert!(handle.state.is_active());
            let meta = restored.log().metadata(*id).unwrap();
            assert_eq!(&captured.log.metadata(*id).unwrap().starting_point, &meta.starting_point);
        }

        // and the continued run completes cleanly past the old budget
        let mut restored = restored;
        let result = restored.minimize().unwrap();
        assert!(result.fx.is_finite());
        assert!(restored.log().f_call_overall() >= continue_budget);
    }
}
