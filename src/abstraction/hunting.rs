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

//! This module defines the `Hunter` trait: the leaf conditions of the kill
//! predicate trees which the manager evaluates against (hunter, victim)
//! worker pairs during its hunt step.

use std::fmt;

use crate::{IterationLog, OptId, Predicate};

/// A termination heuristic judging whether one worker (the *victim*) should
/// be killed, given the track record of another, currently better performing
/// worker (the *hunter*). Returning `true` means "kill the victim".
///
/// Implementations receive the log by reference on every call and must not
/// retain any handle to it across calls. They may keep private state of
/// their own (annealing hunters own a seeded random number generator, for
/// instance) which is why evaluation takes `&mut self`.
pub trait Hunter: fmt::Display + Send {
    /// Judges the (hunter, victim) pair against the current log snapshot.
    fn evaluate(&mut self, log: &IterationLog, hunter_id: OptId, victim_id: OptId) -> bool;

    /// Lifts this concrete condition into a single-leaf [HunterTree] so that
    /// it can be combined with `&` and `|`.
    fn into_tree(self) -> HunterTree
    where
        Self: Sized + 'static,
    {
        Predicate::leaf(Box::new(self))
    }
}

/// A boolean combination of [Hunter] leaves.
pub type HunterTree = Predicate<Box<dyn Hunter>>;

impl HunterTree {
    /// Resets the cached results of the whole tree and evaluates it for the
    /// given (hunter, victim) pair. Both operands of every combinator are
    /// evaluated, never short circuited.
    pub fn check(&mut self, log: &IterationLog, hunter_id: OptId, victim_id: OptId) -> bool {
        self.reset();
        self.eval_with(&mut |leaf| leaf.evaluate(log, hunter_id, victim_id))
    }
}
