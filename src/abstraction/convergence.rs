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

//! This module defines the `Checker` trait: the leaf conditions of the
//! global convergence tree. When the combined checker returns `true` the
//! whole managed run ends and the best point found so far is returned.

use std::fmt;
use std::time::Duration;

use crate::{IterationLog, Predicate};

/// A read-only snapshot of the manager's global state, assembled fresh for
/// every convergence check. Checkers judge this view and nothing else; they
/// must not hold on to it across calls.
pub struct ManagerView<'a> {
    /// The central iteration log.
    pub log: &'a IterationLog,
    /// Wall-clock time since the manager started.
    pub elapsed: Duration,
    /// Total objective evaluations across all workers so far.
    pub f_calls: u64,
    /// Number of workers spawned so far.
    pub started: u32,
    /// Number of workers which converged on their own so far.
    pub converged: u32,
    /// Number of workers killed by the manager so far.
    pub killed: u32,
    /// Number of workers which crashed so far.
    pub crashed: u32,
    /// Best objective value observed so far, `+inf` when nothing was logged.
    pub best_fx: f64,
}

/// A global convergence condition. Returning `true` means "the search is
/// complete; stop the run".
pub trait Checker: fmt::Display + Send {
    /// Judges the manager's global state.
    fn evaluate(&mut self, view: &ManagerView) -> bool;

    /// Lifts this concrete condition into a single-leaf [CheckerTree] so
    /// that it can be combined with `&` and `|`.
    fn into_tree(self) -> CheckerTree
    where
        Self: Sized + 'static,
    {
        Predicate::leaf(Box::new(self))
    }
}

/// A boolean combination of [Checker] leaves.
pub type CheckerTree = Predicate<Box<dyn Checker>>;

impl CheckerTree {
    /// Resets the cached results of the whole tree and evaluates it against
    /// the given view. Both operands of every combinator are evaluated,
    /// never short circuited.
    pub fn check(&mut self, view: &ManagerView) -> bool {
        self.reset();
        self.eval_with(&mut |leaf| leaf.evaluate(view))
    }
}
