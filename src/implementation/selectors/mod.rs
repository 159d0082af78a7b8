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

//! This module provides the built-in spawning policies: which optimizer
//! class gets the compute slots that just freed up.
//!
//! All policies share the same fitting rule: a class whose slot requirement
//! does not fit in the currently free slots is *declined without consuming
//! the policy's turn*, so the same class is offered again once enough room
//! opens up.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;

use crate::{OptimizerFactory, SelectionContext, Selector, SpawnRequest};

/// One spawnable class: its factory and the slots each instance occupies.
pub type OptimizerClass = (Arc<dyn OptimizerFactory>, usize);

fn assert_classes(classes: &[OptimizerClass]) {
    assert!(!classes.is_empty(), "a selector needs at least one optimizer class");
    assert!(
        classes.iter().all(|(_, slots)| *slots >= 1),
        "every optimizer class must occupy at least one slot"
    );
}

// ----------------------------------------------------------------------------
// --- CYCLE ------------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Round-robin through the configured classes, optionally stopping after a
/// total number of spawns.
pub struct CycleSelector {
    classes: Vec<OptimizerClass>,
    cursor: usize,
    spawned: u32,
    max_spawns: Option<u32>,
}
impl CycleSelector {
    /// # Panics
    /// When `classes` is empty or any class asks for zero slots.
    pub fn new(classes: Vec<OptimizerClass>) -> Self {
        assert_classes(&classes);
        CycleSelector { classes, cursor: 0, spawned: 0, max_spawns: None }
    }
    /// Limits the total number of spawns over the whole run.
    pub fn with_max_spawns(mut self, max_spawns: u32) -> Self {
        self.max_spawns = Some(max_spawns);
        self
    }
}
impl Selector for CycleSelector {
    fn select(&mut self, slots_free: usize, _ctx: &SelectionContext) -> Option<SpawnRequest> {
        if self.max_spawns.is_some_and(|max| self.spawned >= max) {
            return None;
        }
        let (factory, slots) = &self.classes[self.cursor];
        if *slots > slots_free {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.classes.len();
        self.spawned += 1;
        Some(SpawnRequest { factory: Arc::clone(factory), slots: *slots })
    }

    fn state(&self) -> serde_json::Value {
        json!({ "cursor": self.cursor, "spawned": self.spawned })
    }
    fn load_state(&mut self, state: &serde_json::Value) {
        if let Some(cursor) = state.get("cursor").and_then(|v| v.as_u64()) {
            self.cursor = cursor as usize % self.classes.len();
        }
        if let Some(spawned) = state.get("spawned").and_then(|v| v.as_u64()) {
            self.spawned = spawned as u32;
        }
    }
}

// ----------------------------------------------------------------------------
// --- RANDOM -----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Uniform choice among the classes which still fit their per-class spawn
/// limit.
pub struct RandomSelector {
    classes: Vec<OptimizerClass>,
    counts: Vec<u32>,
    limits: Option<Vec<u32>>,
    rng: ChaCha8Rng,
}
impl RandomSelector {
    /// # Panics
    /// When `classes` is empty or any class asks for zero slots.
    pub fn new(classes: Vec<OptimizerClass>, seed: u64) -> Self {
        assert_classes(&classes);
        let counts = vec![0; classes.len()];
        RandomSelector { classes, counts, limits: None, rng: ChaCha8Rng::seed_from_u64(seed) }
    }
    /// Caps how many instances of each class may ever be spawned; one entry
    /// per class.
    ///
    /// # Panics
    /// When the number of limits does not match the number of classes.
    pub fn with_class_limits(mut self, limits: Vec<u32>) -> Self {
        assert_eq!(limits.len(), self.classes.len(), "one spawn limit per class is required");
        self.limits = Some(limits);
        self
    }
}
impl Selector for RandomSelector {
    fn select(&mut self, slots_free: usize, _ctx: &SelectionContext) -> Option<SpawnRequest> {
        let candidates: Vec<usize> = (0..self.classes.len())
            .filter(|i| self.classes[*i].1 <= slots_free)
            .filter(|i| self.limits.as_ref().is_none_or(|l| self.counts[*i] < l[*i]))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let pick = candidates[self.rng.random_range(0..candidates.len())];
        self.counts[pick] += 1;
        let (factory, slots) = &self.classes[pick];
        Some(SpawnRequest { factory: Arc::clone(factory), slots: *slots })
    }

    fn state(&self) -> serde_json::Value {
        json!({
            "counts": self.counts,
            "rng": serde_json::to_value(&self.rng).unwrap_or(serde_json::Value::Null),
        })
    }
    fn load_state(&mut self, state: &serde_json::Value) {
        if let Some(counts) = state.get("counts").and_then(|v| v.as_array()) {
            for (slot, value) in self.counts.iter_mut().zip(counts) {
                *slot = value.as_u64().unwrap_or(0) as u32;
            }
        }
        if let Some(rng) = state.get("rng") {
            if let Ok(rng) = serde_json::from_value(rng.clone()) {
                self.rng = rng;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// --- CHAIN ------------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Works through the classes in order, switching from class `i` to `i + 1`
/// once the overall objective-evaluation count crosses `thresholds[i]`. The
/// typical use is an explorative class early in the run handing over to an
/// exploitative one once the budget matures. The last class never exhausts.
pub struct ChainSelector {
    classes: Vec<OptimizerClass>,
    thresholds: Vec<u64>,
}
impl ChainSelector {
    /// # Panics
    /// When `classes` is empty, any class asks for zero slots, the number of
    /// thresholds is not `classes.len() - 1`, or the thresholds are not
    /// ascending.
    pub fn new(classes: Vec<OptimizerClass>, thresholds: Vec<u64>) -> Self {
        assert_classes(&classes);
        assert_eq!(
            thresholds.len(),
            classes.len() - 1,
            "a chain of n classes switches at n - 1 thresholds"
        );
        assert!(thresholds.windows(2).all(|w| w[0] < w[1]), "chain thresholds must ascend");
        ChainSelector { classes, thresholds }
    }
}
impl Selector for ChainSelector {
    fn select(&mut self, slots_free: usize, ctx: &SelectionContext) -> Option<SpawnRequest> {
        let stage = self.thresholds.iter().filter(|t| ctx.f_call_overall >= **t).count();
        let (factory, slots) = &self.classes[stage];
        if *slots > slots_free {
            return None;
        }
        Some(SpawnRequest { factory: Arc::clone(factory), slots: *slots })
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
