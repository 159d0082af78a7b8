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

//! This module defines the `Selector` trait: the policy deciding which
//! optimizer class to spawn next whenever compute slots free up.

use std::sync::Arc;

use crate::OptimizerFactory;

/// What the manager tells the selector about the run when asking for the
/// next spawn.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext {
    /// Number of workers spawned so far.
    pub n_started: u32,
    /// Total objective evaluations across all workers so far.
    pub f_call_overall: u64,
}

/// The selector's answer: which class to instantiate and how many compute
/// slots the worker will occupy. The manager turns this into a full spawn
/// package (identity, transport endpoints, pause gate) itself.
#[derive(Clone)]
pub struct SpawnRequest {
    pub factory: Arc<dyn OptimizerFactory>,
    pub slots: usize,
}

/// A spawning policy. The manager calls `select` during its fill-up step as
/// long as slots are free; a `None` return means no further spawn is
/// permitted right now (and, if the policy is exhausted, ever).
pub trait Selector: Send {
    /// Picks the next class to spawn, or `None` when nothing may be spawned.
    ///
    /// `slots_free` is the number of currently unoccupied compute slots; a
    /// returned request must fit within it. Implementations must not burn
    /// their internal cursor when declining for lack of room: asking again
    /// with more slots later must still produce the declined candidate.
    fn select(&mut self, slots_free: usize, ctx: &SelectionContext) -> Option<SpawnRequest>;

    /// Serializable view of the policy's mutable state (cursor, RNG, spawn
    /// tallies) for checkpointing. The default says there is none.
    fn state(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Restores the state captured by [Selector::state].
    fn load_state(&mut self, _state: &serde_json::Value) {}
}
