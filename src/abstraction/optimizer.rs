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

//! This module defines the seams through which heterogeneous optimizer
//! algorithms plug into the manager: the `Optimizer` trait (the ask/tell
//! surface the worker runtime drives) and the `OptimizerFactory` trait (the
//! capability set through which the selector describes spawnable classes).
//!
//! Optimizer algorithms themselves are opaque to the core. The manager only
//! relies on the contract expressed here: propose points, absorb the values
//! evaluated for them, report convergence, and optionally serialize enough
//! of yourself to be restored from a checkpoint.

use std::path::Path;

use crate::{Bound, GlompoError};

/// One local optimization algorithm instance, driven by the worker runtime
/// in ask/evaluate/tell cycles. The runtime owns the loop; the optimizer
/// only proposes and absorbs points.
pub trait Optimizer: Send {
    /// Proposes the batch of parameter vectors to evaluate next. The batch
    /// size is the optimizer's own business (a worker's `i_fcalls` for the
    /// iteration is simply the batch length).
    fn ask(&mut self) -> Vec<Vec<f64>>;

    /// Absorbs the objective values evaluated for the vectors of the last
    /// `ask`, in the same order.
    fn tell(&mut self, xs: &[Vec<f64>], fxs: &[f64]);

    /// The optimizer's own end condition, once it considers itself done.
    /// While this returns `None` the runtime keeps iterating.
    fn converged(&self) -> Option<String>;

    /// The best point this instance has seen, if any.
    fn best(&self) -> Option<(Vec<f64>, f64)>;

    /// Optional capability: serialize the internal state to `path` so that
    /// a checkpoint restore can resume this instance. The default reports
    /// the capability as absent.
    fn save_state(&self, _path: &Path) -> Result<(), GlompoError> {
        Err(GlompoError::Unsupported("save_state"))
    }
}

/// Describes one spawnable optimizer class: how it is called, how instances
/// are built, and how saved instances are brought back. Factories are shared
/// between the selector and the manager, hence `Send + Sync`.
pub trait OptimizerFactory: Send + Sync {
    /// The class name recorded in the log metadata (and matched by the
    /// `TypeHunter` kill condition).
    fn name(&self) -> &str;

    /// The construction configuration recorded in the log metadata.
    fn config(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Builds a fresh instance which starts its search from `x0` within
    /// `bounds`. The seed makes stochastic algorithms reproducible; it is
    /// drawn by the manager per spawn.
    fn build(&self, x0: &[f64], bounds: &[Bound], seed: u64) -> Box<dyn Optimizer>;

    /// Optional capability: rebuild an instance from a state file written
    /// by [Optimizer::save_state]. The default reports the capability as
    /// absent, which makes workers of this class unrecoverable from
    /// checkpoints (they are simply not respawned on restore).
    fn restore(&self, _path: &Path) -> Result<Box<dyn Optimizer>, GlompoError> {
        Err(GlompoError::Unsupported("restore"))
    }
}
