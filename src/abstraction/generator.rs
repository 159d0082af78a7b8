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

//! This module defines the `StartpointGenerator` trait: the supplier of the
//! initial parameter vectors handed to freshly spawned workers.

use crate::Bound;

/// Supplies starting points for new workers. Generated points must lie
/// within the given bounds; the manager re-validates every point and aborts
/// the run on a violation, since an out-of-bounds start is a programming
/// error in the generator rather than an operational hiccup.
pub trait StartpointGenerator: Send {
    /// Produces the next starting point, one coordinate per bound.
    fn generate(&mut self, bounds: &[Bound]) -> Vec<f64>;

    /// Serializable view of the generator's mutable state (typically its
    /// RNG) for checkpointing. The default says there is none.
    fn state(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Restores the state captured by [StartpointGenerator::state].
    fn load_state(&mut self, _state: &serde_json::Value) {}
}
