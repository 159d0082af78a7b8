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

//! This module provides the built-in start-point generators.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{Bound, StartpointGenerator};

/// Draws every coordinate uniformly within its bound. The workhorse
/// generator for global exploration.
pub struct RandomGenerator {
    rng: ChaCha8Rng,
}
impl RandomGenerator {
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }
    /// Same as [RandomGenerator::new] but with a fixed seed for reproducible
    /// runs.
    pub fn with_seed(seed: u64) -> Self {
        RandomGenerator { rng: ChaCha8Rng::seed_from_u64(seed) }
    }
}
impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}
impl StartpointGenerator for RandomGenerator {
    fn generate(&mut self, bounds: &[Bound]) -> Vec<f64> {
        bounds.iter().map(|b| b.min + b.span() * self.rng.random::<f64>()).collect()
    }

    fn state(&self) -> serde_json::Value {
        serde_json::to_value(&self.rng).unwrap_or(serde_json::Value::Null)
    }
    fn load_state(&mut self, state: &serde_json::Value) {
        if let Ok(rng) = serde_json::from_value(state.clone()) {
            self.rng = rng;
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
