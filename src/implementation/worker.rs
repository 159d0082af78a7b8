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

//! This module provides the worker runtime: the thread which drives one
//! optimizer instance through its ask/evaluate/tell cycles, streams the
//! iteration packets back to the manager, and services the control protocol
//! between iterations.
//!
//! The loop is a flat state machine: Ask, Evaluate, Tell, EmitResult,
//! PollSignals, CheckPause, and around again. Suspension is cooperative and
//! happens only at iteration boundaries; a parked worker keeps servicing
//! its signal endpoint so that state-save requests and stop signals work
//! while paused.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender};
use log::debug;

use crate::{
    GlompoError, IterationResult, ManagerEndpoint, Optimizer, OptId, PauseGate, Signal, Task,
    WorkerEndpoint, WorkerMessage, WorkerState,
};

/// How long a parked worker sleeps between checks of its gate and endpoint.
const PARK_POLL: Duration = Duration::from_millis(10);

/// End condition reported when the manager orders an immediate stop.
pub(crate) const STOP_REASON: &str = "Manager termination signal";

// ----------------------------------------------------------------------------
// --- WORKER HANDLE ----------------------------------------------------------
// ----------------------------------------------------------------------------
/// The manager-side record of one spawned worker: identity, lifecycle state,
/// transport endpoints, pause gate, slot count, and the latest protocol
/// messages pumped off its endpoint.
pub(crate) struct WorkerHandle {
    pub opt_id: OptId,
    pub slots: usize,
    pub state: WorkerState,
    pub thread: Option<JoinHandle<()>>,
    pub endpoint: ManagerEndpoint,
    pub results: Receiver<IterationResult>,
    pub pause: Arc<PauseGate>,
    pub abort: Arc<AtomicBool>,
    /// When a stop signal was issued, for the end-timeout force reap.
    pub stop_sent_at: Option<Instant>,
    /// The result channel hung up (worker thread exited).
    pub disconnected: bool,
    // latest protocol messages, stashed by `pump`
    pub paused_ack: bool,
    pub save_ack: Option<Result<(), String>>,
    pub terminating_reason: Option<String>,
    pub crash_reason: Option<String>,
}

impl WorkerHandle {
    /// Moves every pending protocol message from the endpoint into the
    /// handle so that the different manager steps can consume what concerns
    /// them without racing each other for the channel.
    pub fn pump(&mut self) {
        while let Some(message) = self.endpoint.try_recv() {
            match message {
                WorkerMessage::Paused => self.paused_ack = true,
                WorkerMessage::StateSaved => self.save_ack = Some(Ok(())),
                WorkerMessage::SaveFailed { reason } => self.save_ack = Some(Err(reason)),
                WorkerMessage::Terminating { reason } => self.terminating_reason = Some(reason),
                WorkerMessage::Crashed { reason } => self.crash_reason = Some(reason),
            }
        }
    }

    /// True while the worker counts against the slot budget.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

// ----------------------------------------------------------------------------
// --- WORKER RUNTIME ---------------------------------------------------------
// ----------------------------------------------------------------------------
/// Everything a worker thread needs to run one optimizer instance.
pub(crate) struct WorkerSpawn {
    pub opt_id: OptId,
    pub optimizer: Box<dyn Optimizer>,
    pub task: Arc<dyn Task>,
    pub results: Sender<IterationResult>,
    pub endpoint: WorkerEndpoint,
    pub pause: Arc<PauseGate>,
    pub abort: Arc<AtomicBool>,
    /// Iteration numbering starts above this value; non-zero when resuming
    /// a worker whose stream already has history (checkpoint restore).
    pub n_iter_offset: u32,
}

/// Spawns the worker thread. Panics inside the optimizer or the task are
/// caught at the top frame and surface as a `Crashed` message rather than a
/// poisoned process.
pub(crate) fn spawn_worker(spawn: WorkerSpawn) -> Result<JoinHandle<()>, GlompoError> {
    let name = format!("glompo-worker-{}", spawn.opt_id);
    let handle = std::thread::Builder::new().name(name).spawn(move || {
        let mut runtime = WorkerRuntime {
            opt_id: spawn.opt_id,
            optimizer: spawn.optimizer,
            task: spawn.task,
            results: spawn.results,
            endpoint: spawn.endpoint,
            pause: spawn.pause,
            abort: spawn.abort,
            n_iter: spawn.n_iter_offset,
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| runtime.run()));
        if let Err(payload) = outcome {
            let reason = panic_message(payload.as_ref());
            debug!("worker {} panicked: {}", runtime.opt_id, reason);
            runtime.endpoint.notify(WorkerMessage::Crashed { reason });
        }
    })?;
    Ok(handle)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Control-flow outcome of servicing the protocol between iterations.
enum Flow {
    /// Keep iterating.
    Continue,
    /// Stop, flush the final packet, report the reason.
    Stop(String),
    /// Exit right away without a final packet (cooperative force kill).
    Abort,
}

struct WorkerRuntime {
    opt_id: OptId,
    optimizer: Box<dyn Optimizer>,
    task: Arc<dyn Task>,
    results: Sender<IterationResult>,
    endpoint: WorkerEndpoint,
    pause: Arc<PauseGate>,
    abort: Arc<AtomicBool>,
    n_iter: u32,
}

impl WorkerRuntime {
    fn run(&mut self) {
        loop {
            // PollSignals
            match self.poll_signals() {
                Flow::Continue => {}
                Flow::Stop(reason) => return self.flush_final(reason),
                Flow::Abort => return,
            }
            // CheckPause
            match self.check_pause() {
                Flow::Continue => {}
                Flow::Stop(reason) => return self.flush_final(reason),
                Flow::Abort => return,
            }
            if self.abort.load(Ordering::Relaxed) {
                return;
            }

            // Ask
            let xs = self.optimizer.ask();
            if xs.is_empty() {
                return self.flush_final("Optimizer stopped proposing points".to_string());
            }
            // Evaluate: non-finite objective values count as failed points
            let fxs: Vec<f64> = xs
                .iter()
                .map(|x| {
                    let fx = self.task.evaluate(x);
                    if fx.is_finite() { fx } else { f64::INFINITY }
                })
                .collect();
            // Tell
            self.optimizer.tell(&xs, &fxs);
            self.n_iter += 1;

            // EmitResult: the best point of the batch represents the iteration
            let best = fxs
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map_or(0, |(i, _)| i);
            let converged = self.optimizer.converged();
            let packet = IterationResult {
                opt_id: self.opt_id,
                n_iter: self.n_iter,
                i_fcalls: xs.len() as u32,
                x: xs[best].clone(),
                fx: fxs[best],
                is_final: converged.is_some(),
                timestamp: 0.0, // stamped by the manager on arrival
                extras: self.task.residuals(&xs[best]).unwrap_or_default(),
            };
            // a full channel blocks us here, which is the intended backpressure
            if self.results.send(packet).is_err() {
                return; // manager is gone
            }
            if let Some(reason) = converged {
                self.endpoint.notify(WorkerMessage::Terminating { reason });
                return;
            }
        }
    }

    fn poll_signals(&mut self) -> Flow {
        while let Some(signal) = self.endpoint.poll() {
            match self.handle_signal(signal) {
                Flow::Continue => {}
                flow => return flow,
            }
        }
        Flow::Continue
    }

    fn handle_signal(&mut self, signal: Signal) -> Flow {
        match signal {
            Signal::StopImmediate => Flow::Stop(STOP_REASON.to_string()),
            Signal::SaveState(path) => {
                match self.optimizer.save_state(&path) {
                    Ok(()) => self.endpoint.notify(WorkerMessage::StateSaved),
                    Err(e) => self
                        .endpoint
                        .notify(WorkerMessage::SaveFailed { reason: e.to_string() }),
                };
                Flow::Continue
            }
            Signal::Pause => {
                self.endpoint.notify(WorkerMessage::Paused);
                self.parked()
            }
        }
    }

    fn check_pause(&mut self) -> Flow {
        if self.pause.is_open() {
            return Flow::Continue;
        }
        self.endpoint.notify(WorkerMessage::Paused);
        self.parked()
    }

    /// Parks at the iteration boundary until the gate opens, while still
    /// servicing stop, save and (redundant) pause signals.
    fn parked(&mut self) -> Flow {
        while !self.pause.wait_timeout(PARK_POLL) {
            if self.abort.load(Ordering::Relaxed) {
                return Flow::Abort;
            }
            while let Some(signal) = self.endpoint.poll() {
                match signal {
                    Signal::Pause => {
                        self.endpoint.notify(WorkerMessage::Paused);
                    }
                    other => match self.handle_signal(other) {
                        Flow::Continue => {}
                        flow => return flow,
                    },
                }
            }
        }
        Flow::Continue
    }

    /// Flushes the one mandatory final packet and reports the end condition.
    fn flush_final(&mut self, reason: String) {
        let (x, fx) = self.optimizer.best().unwrap_or((vec![], f64::INFINITY));
        self.n_iter += 1;
        let _ = self.results.send(IterationResult {
            opt_id: self.opt_id,
            n_iter: self.n_iter,
            i_fcalls: 0,
            x,
            fx,
            is_final: true,
            timestamp: 0.0,
            extras: vec![],
        });
        self.endpoint.notify(WorkerMessage::Terminating { reason });
    }
}

/// Builds a fresh handle in the `Pending` state; the manager flips it to
/// `Running` once the thread is up.
pub(crate) fn pending_handle(
    opt_id: OptId,
    slots: usize,
    endpoint: ManagerEndpoint,
    results: Receiver<IterationResult>,
    pause: Arc<PauseGate>,
    abort: Arc<AtomicBool>,
) -> WorkerHandle {
    WorkerHandle {
        opt_id,
        slots,
        state: WorkerState::Pending,
        thread: None,
        endpoint,
        results,
        pause,
        abort,
        stop_sent_at: None,
        disconnected: false,
        paused_ack: false,
        save_ack: None,
        terminating_reason: None,
        crash_reason: None,
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
