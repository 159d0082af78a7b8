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

//! This module defines the most basic data types that are used throughout all
//! the code of our library (both at the abstraction and implementation levels).
//! These are also the types your client library is likely to work with.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ----------------------------------------------------------------------------
// --- OPT ID -----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// This type denotes the identity of one managed optimizer (aka worker).
/// Identifiers are assigned by the manager in spawn order, starting from 1.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OptId(pub u32);
impl OptId {
    #[inline]
    /// This function returns the numeric value of the identifier.
    pub fn id(self) -> u32 {
        self.0
    }
}
impl fmt::Display for OptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// --- BOUND ------------------------------------------------------------------
// ----------------------------------------------------------------------------
/// One closed interval of the search space. A complete search space is a
/// `Vec<Bound>`, one bound per coordinate of the parameter vectors.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub min: f64,
    pub max: f64,
}
impl Bound {
    pub fn new(min: f64, max: f64) -> Self {
        Bound { min, max }
    }
    /// Width of the interval.
    pub fn span(self) -> f64 {
        self.max - self.min
    }
    /// True iff `v` lies inside the closed interval.
    pub fn contains(self, v: f64) -> bool {
        self.min <= v && v <= self.max
    }
    /// True iff the bound is usable (finite and non-degenerate).
    pub fn is_valid(self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }
}

/// True iff every coordinate of `x` lies within the matching bound.
pub fn in_bounds(x: &[f64], bounds: &[Bound]) -> bool {
    x.len() == bounds.len() && x.iter().zip(bounds).all(|(v, b)| b.contains(*v))
}

// ----------------------------------------------------------------------------
// --- ITERATION RESULT -------------------------------------------------------
// ----------------------------------------------------------------------------
/// The atomic unit of worker output: one packet per optimizer step, delivered
/// to the manager over the worker's result channel.
///
/// # Note
/// `timestamp` is stamped by the *manager* on arrival, not by the worker.
/// Stamping on arrival keeps timestamps monotonic with respect to the overall
/// function-call counter even though workers race each other.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    /// Identity of the emitting worker.
    pub opt_id: OptId,
    /// Step counter within the worker, strictly increasing per worker.
    pub n_iter: u32,
    /// Function evaluations performed in this iteration (not cumulative).
    pub i_fcalls: u32,
    /// The parameter vector tried.
    pub x: Vec<f64>,
    /// The objective value. `+inf` denotes an invalid/failed evaluation.
    pub fx: f64,
    /// True iff this is the last packet this worker will ever send.
    pub is_final: bool,
    /// Wall-clock seconds since the manager started, assigned on arrival.
    pub timestamp: f64,
    /// Optional detailed-call residuals.
    pub extras: Vec<f64>,
}

// ----------------------------------------------------------------------------
// --- OPTIMIZER METADATA -----------------------------------------------------
// ----------------------------------------------------------------------------
/// Descriptive record kept for each optimizer stream in the iteration log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerMetadata {
    /// Name of the optimizer class this worker was built from.
    pub opt_type: String,
    /// Construction configuration reported by the factory.
    pub init_config: serde_json::Value,
    /// Wall-clock seconds (since manager start) at which the worker started.
    pub start_time: f64,
    /// Wall-clock seconds at which the worker reached a terminal state.
    pub end_time: Option<f64>,
    /// Human readable reason for which the worker ended.
    pub end_condition: Option<String>,
    /// Number of compute slots the worker occupies.
    pub slots: usize,
    /// The point from which the worker started its search.
    pub starting_point: Vec<f64>,
}

// ----------------------------------------------------------------------------
// --- RUN RESULT -------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Provenance of the best point returned at the end of a managed run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    /// Which worker found the returned minimum.
    pub opt_id: OptId,
    /// The optimizer class it was built from.
    pub opt_type: String,
    /// The point from which that worker started.
    pub starting_point: Vec<f64>,
    /// The condition under which that worker ended.
    pub end_condition: String,
}

/// Aggregate counters describing a completed run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Total number of objective evaluations across all workers.
    pub f_calls: u64,
    /// Wall-clock duration of the run in seconds.
    pub elapsed_secs: f64,
    /// Number of workers spawned.
    pub started: u32,
    /// Number of workers which converged on their own.
    pub converged: u32,
    /// Number of workers killed by the manager.
    pub killed: u32,
    /// Number of workers which crashed or were force-reaped.
    pub crashed: u32,
}

/// Final outcome delivered by the manager.
///
/// A run in which no iteration was ever logged (for instance when every
/// worker crashed before reporting) is still a valid result: `x` is empty,
/// `fx` is `+inf` and `origin` is `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Best parameter vector observed across all workers.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub fx: f64,
    /// Aggregate run statistics.
    pub stats: RunStats,
    /// Where the best point came from, when one exists.
    pub origin: Option<Origin>,
}

// ----------------------------------------------------------------------------
// --- WORKER STATE -----------------------------------------------------------
// ----------------------------------------------------------------------------
/// Lifecycle state of a managed worker.
///
/// Legal transitions: `Pending -> Running`, `Running <-> Paused`,
/// `Running | Paused -> Killed | Converged | Crashed`, and finally
/// `-> Reaped` once the underlying thread has been joined. Terminal states
/// are absorbing: once a worker is killed, converged or crashed it can only
/// ever move on to `Reaped`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum WorkerState {
    /// The spawn package exists but the worker has not started yet.
    Pending,
    /// The worker is iterating.
    Running,
    /// The worker is parked on its pause gate. Paused workers still occupy
    /// their compute slots.
    Paused,
    /// The manager issued a stop signal following a hunt.
    Killed,
    /// The worker ended on its own accord.
    Converged,
    /// The worker died (panic, disconnect or stop-signal timeout).
    Crashed,
    /// The terminal state has been recorded and the thread joined.
    Reaped,
}
impl WorkerState {
    /// True for the states which count against the slot budget.
    pub fn is_active(self) -> bool {
        matches!(self, WorkerState::Running | WorkerState::Paused)
    }
    /// True once the worker can never iterate again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkerState::Killed | WorkerState::Converged | WorkerState::Crashed | WorkerState::Reaped
        )
    }
}
impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let txt = match self {
            WorkerState::Pending => "PENDING",
            WorkerState::Running => "RUNNING",
            WorkerState::Paused => "PAUSED",
            WorkerState::Killed => "KILLED",
            WorkerState::Converged => "CONVERGED",
            WorkerState::Crashed => "CRASHED",
            WorkerState::Reaped => "REAPED",
        };
        write!(f, "{txt}")
    }
}

// ----------------------------------------------------------------------------
// --- SIGNALS ----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Control codes sent from the manager to a worker over its signal endpoint.
/// Workers poll their endpoint between iterations and act on every code
/// received before evaluating again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Flush one final packet and exit (wire code 0).
    StopImmediate,
    /// Serialize the worker state to the given path, acknowledge, continue
    /// (wire code 1).
    SaveState(PathBuf),
    /// Acknowledge and block until the pause gate reopens (wire code 2).
    Pause,
}
impl Signal {
    /// The integer code of this signal on the manager/worker protocol.
    pub fn code(&self) -> u8 {
        match self {
            Signal::StopImmediate => 0,
            Signal::SaveState(_) => 1,
            Signal::Pause => 2,
        }
    }
}

/// Messages travelling the opposite way: worker to manager. Everything which
/// is not an [IterationResult] data packet is reported through these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Accompanies the final packet: the reason the worker stopped.
    Terminating { reason: String },
    /// Acknowledges a [Signal::SaveState] request.
    StateSaved,
    /// A [Signal::SaveState] request could not be honoured.
    SaveFailed { reason: String },
    /// Acknowledges a [Signal::Pause]: the worker is parked at an iteration
    /// boundary.
    Paused,
    /// The worker loop panicked; the payload is the panic message.
    Crashed { reason: String },
}

// ----------------------------------------------------------------------------
// --- ERRORS -----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Failures raised by the iteration log when a stream operation cannot be
/// honoured. The manager maps these onto its error policy: ordering
/// violations are warned about and discarded, identity violations abort.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("optimizer {0} is already registered in the log")]
    DuplicateOptimizer(OptId),
    #[error("optimizer {0} was never registered in the log")]
    UnknownOptimizer(OptId),
    #[error("out-of-order iteration for optimizer {opt_id}: got n_iter {got}, last was {last}")]
    OutOfOrder { opt_id: OptId, got: u32, last: u32 },
    #[error("optimizer {0} already sent its final packet")]
    AfterFinal(OptId),
    #[error("the log has been closed")]
    Closed,
}

/// Top level error type of the crate. Only misconfiguration is fatal before
/// a run starts; operational failures during a run are absorbed, logged and
/// the run continues.
#[derive(Debug, Error)]
pub enum GlompoError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("start point {x:?} generated outside the search bounds")]
    OutOfBounds { x: Vec<f64> },
    #[error("optimizer does not support {0}")]
    Unsupported(&'static str),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("serialization failure: {0}")]
    Json(#[from] serde_json::Error),
    #[error("serialization failure: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("checkpoint failure: {0}")]
    Checkpoint(String),
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_common {
    use crate::*;

    #[test]
    fn opt_id_is_transparent() {
        assert_eq!(7, OptId(7).id());
        assert_eq!("7", format!("{}", OptId(7)));
    }

    #[test]
    fn bound_span_and_containment() {
        let b = Bound::new(-1.0, 3.0);
        assert_eq!(4.0, b.span());
        assert!(b.contains(-1.0));
        assert!(b.contains(3.0));
        assert!(!b.contains(3.5));
    }

    #[test]
    fn degenerate_bounds_are_invalid() {
        assert!(!Bound::new(1.0, 1.0).is_valid());
        assert!(!Bound::new(2.0, 1.0).is_valid());
        assert!(!Bound::new(f64::NEG_INFINITY, 0.0).is_valid());
        assert!(Bound::new(0.0, 1.0).is_valid());
    }

    #[test]
    fn in_bounds_checks_every_coordinate() {
        let bounds = vec![Bound::new(0.0, 1.0), Bound::new(0.0, 1.0)];
        assert!(in_bounds(&[0.5, 0.5], &bounds));
        assert!(!in_bounds(&[0.5, 1.5], &bounds));
        assert!(!in_bounds(&[0.5], &bounds));
    }

    #[test]
    fn terminal_states_are_not_active() {
        for state in [
            WorkerState::Killed,
            WorkerState::Converged,
            WorkerState::Crashed,
            WorkerState::Reaped,
        ] {
            assert!(state.is_terminal());
            assert!(!state.is_active());
        }
        assert!(WorkerState::Running.is_active());
        assert!(WorkerState::Paused.is_active());
        assert!(!WorkerState::Pending.is_active());
    }

    #[test]
    fn signal_codes_follow_the_protocol() {
        assert_eq!(0, Signal::StopImmediate.code());
        assert_eq!(1, Signal::SaveState("x".into()).code());
        assert_eq!(2, Signal::Pause.code());
    }
}
