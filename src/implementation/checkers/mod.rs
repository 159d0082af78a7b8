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

//! This module provides the built-in global convergence conditions
//! (checkers). Each is a leaf of the [crate::CheckerTree] predicate algebra;
//! when the combined tree returns `true` the manager ends the whole run.

use std::fmt;
use std::time::Duration;

use crate::{Checker, ManagerView};

/// Fires once the total number of objective evaluations across all workers
/// reaches `n`.
#[derive(Debug, Clone)]
pub struct MaxFuncCalls {
    n: u64,
}
impl MaxFuncCalls {
    /// # Panics
    /// When `n` is zero.
    pub fn new(n: u64) -> Self {
        assert!(n >= 1, "MaxFuncCalls budget must be at least 1");
        MaxFuncCalls { n }
    }
}
impl Checker for MaxFuncCalls {
    fn evaluate(&mut self, view: &ManagerView) -> bool {
        view.f_calls >= self.n
    }
}
impl fmt::Display for MaxFuncCalls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaxFuncCalls(n={})", self.n)
    }
}

/// Fires once the run has lasted at least this long, wall clock.
#[derive(Debug, Clone)]
pub struct MaxSeconds {
    limit: Duration,
}
impl MaxSeconds {
    pub fn new(limit: Duration) -> Self {
        MaxSeconds { limit }
    }
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }
}
impl Checker for MaxSeconds {
    fn evaluate(&mut self, view: &ManagerView) -> bool {
        view.elapsed >= self.limit
    }
}
impl fmt::Display for MaxSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaxSeconds(limit={}s)", self.limit.as_secs_f64())
    }
}

/// Fires once any worker has found an objective value at or below `target`.
#[derive(Debug, Clone)]
pub struct TargetValue {
    target: f64,
}
impl TargetValue {
    /// # Panics
    /// When `target` is NaN.
    pub fn new(target: f64) -> Self {
        assert!(!target.is_nan(), "TargetValue target must be a number");
        TargetValue { target }
    }
}
impl Checker for TargetValue {
    fn evaluate(&mut self, view: &ManagerView) -> bool {
        view.best_fx <= self.target
    }
}
impl fmt::Display for TargetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetValue(target={})", self.target)
    }
}

/// Fires once the manager has killed `kills` more workers *after* the point
/// at which `converged` workers had ended on their own. The intuition: once
/// enough optimizers agree the search is done, every further kill is the
/// hunt confirming that newcomers cannot find anything better.
#[derive(Debug, Clone)]
pub struct KillsAfterConvergence {
    kills: u32,
    converged: u32,
    kills_at_convergence: Option<u32>,
}
impl KillsAfterConvergence {
    /// # Panics
    /// When `converged` is zero.
    pub fn new(kills: u32, converged: u32) -> Self {
        assert!(converged >= 1, "KillsAfterConvergence needs at least 1 converged optimizer");
        KillsAfterConvergence { kills, converged, kills_at_convergence: None }
    }
}
impl Checker for KillsAfterConvergence {
    fn evaluate(&mut self, view: &ManagerView) -> bool {
        if self.kills_at_convergence.is_none() && view.converged >= self.converged {
            self.kills_at_convergence = Some(view.killed);
        }
        match self.kills_at_convergence {
            Some(baseline) => view.killed - baseline >= self.kills,
            None => false,
        }
    }
}
impl fmt::Display for KillsAfterConvergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KillsAfterConvergence(kills={}, converged={})", self.kills, self.converged)
    }
}

/// Fires once `n` workers have been spawned in total. Pairs naturally with
/// selectors that never run out by themselves.
#[derive(Debug, Clone)]
pub struct MaxOptimizersStarted {
    n: u32,
}
impl MaxOptimizersStarted {
    /// # Panics
    /// When `n` is zero.
    pub fn new(n: u32) -> Self {
        assert!(n >= 1, "MaxOptimizersStarted threshold must be at least 1");
        MaxOptimizersStarted { n }
    }
}
impl Checker for MaxOptimizersStarted {
    fn evaluate(&mut self, view: &ManagerView) -> bool {
        view.started >= self.n
    }
}
impl fmt::Display for MaxOptimizersStarted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaxOptimizersStarted(n={})", self.n)
    }
}

/// Fires once `n` workers have ended on their own accord.
#[derive(Debug, Clone)]
pub struct OptimizersConverged {
    n: u32,
}
impl OptimizersConverged {
    /// # Panics
    /// When `n` is zero.
    pub fn new(n: u32) -> Self {
        assert!(n >= 1, "OptimizersConverged threshold must be at least 1");
        OptimizersConverged { n }
    }
}
impl Checker for OptimizersConverged {
    fn evaluate(&mut self, view: &ManagerView) -> bool {
        view.converged >= self.n
    }
}
impl fmt::Display for OptimizersConverged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptimizersConverged(n={})", self.n)
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
