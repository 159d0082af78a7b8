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

//! This module provides a deliberately simple reference optimizer. Serious
//! algorithms (evolution strategies, trust region methods, ...) live in
//! client crates behind the [crate::Optimizer] contract; `RandomSearch`
//! exists so that the crate is usable and testable out of the box, and to
//! demonstrate the full worker contract including checkpoint support.

use std::fs;
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{Bound, GlompoError, Optimizer, OptimizerFactory};

/// Pure random sampling within the bounds. The first iteration evaluates
/// the assigned starting point, every following one draws `batch` uniform
/// points.
#[derive(Serialize, Deserialize)]
pub struct RandomSearch {
    bounds: Vec<Bound>,
    x0: Vec<f64>,
    batch: usize,
    max_iters: Option<u32>,
    n_iters: u32,
    started: bool,
    best: Option<(Vec<f64>, f64)>,
    rng: ChaCha8Rng,
}

impl Optimizer for RandomSearch {
    fn ask(&mut self) -> Vec<Vec<f64>> {
        if !self.started {
            self.started = true;
            return vec![self.x0.clone()];
        }
        (0..self.batch)
            .map(|_| {
                self.bounds
                    .iter()
                    .map(|b| b.min + b.span() * self.rng.random::<f64>())
                    .collect()
            })
            .collect()
    }

    fn tell(&mut self, xs: &[Vec<f64>], fxs: &[f64]) {
        self.n_iters += 1;
        for (x, fx) in xs.iter().zip(fxs) {
            if self.best.as_ref().is_none_or(|(_, b)| fx < b) {
                self.best = Some((x.clone(), *fx));
            }
        }
    }

    fn converged(&self) -> Option<String> {
        match self.max_iters {
            Some(max) if self.n_iters >= max => Some(format!("iteration budget ({max}) exhausted")),
            _ => None,
        }
    }

    fn best(&self) -> Option<(Vec<f64>, f64)> {
        self.best.clone()
    }

    fn save_state(&self, path: &Path) -> Result<(), GlompoError> {
        // YAML rather than JSON: `best` may legitimately hold an `inf`
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

/// Factory for [RandomSearch] workers.
#[derive(Debug, Clone)]
pub struct RandomSearchFactory {
    /// Points drawn per iteration.
    pub batch: usize,
    /// Stop on our own after this many iterations (`None` runs until told
    /// to stop).
    pub max_iters: Option<u32>,
}
impl RandomSearchFactory {
    /// # Panics
    /// When `batch` is zero.
    pub fn new(batch: usize, max_iters: Option<u32>) -> Self {
        assert!(batch >= 1, "RandomSearch needs at least one point per iteration");
        RandomSearchFactory { batch, max_iters }
    }
}
impl OptimizerFactory for RandomSearchFactory {
    fn name(&self) -> &str {
        "RandomSearch"
    }
    fn config(&self) -> serde_json::Value {
        json!({ "batch": self.batch, "max_iters": self.max_iters })
    }
    fn build(&self, x0: &[f64], bounds: &[Bound], seed: u64) -> Box<dyn Optimizer> {
        Box::new(RandomSearch {
            bounds: bounds.to_vec(),
            x0: x0.to_vec(),
            batch: self.batch,
            max_iters: self.max_iters,
            n_iters: 0,
            started: false,
            best: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }
    fn restore(&self, path: &Path) -> Result<Box<dyn Optimizer>, GlompoError> {
        let optimizer: RandomSearch = serde_yaml::from_slice(&fs::read(path)?)?;
        Ok(Box::new(optimizer))
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_random_search {
    use crate::*;

    fn bounds() -> Vec<Bound> {
        vec![Bound::new(-1.0, 1.0), Bound::new(-1.0, 1.0)]
    }

    #[test]
    fn first_iteration_evaluates_the_starting_point() {
        let factory = RandomSearchFactory::new(4, None);
        let mut opt = factory.build(&[0.25, -0.5], &bounds(), 0);
        assert_eq!(vec![vec![0.25, -0.5]], opt.ask());
        assert_eq!(4, opt.ask().len());
    }

    #[test]
    fn proposals_stay_within_bounds() {
        let factory = RandomSearchFactory::new(16, None);
        let mut opt = factory.build(&[0.0, 0.0], &bounds(), 7);
        opt.ask();
        for x in opt.ask() {
            assert!(in_bounds(&x, &bounds()), "{x:?}");
        }
    }

    #[test]
    fn tracks_the_best_point_it_was_told() {
        let factory = RandomSearchFactory::new(1, None);
        let mut opt = factory.build(&[0.0, 0.0], &bounds(), 0);
        let xs = vec![vec![0.1, 0.1], vec![0.2, 0.2], vec![0.3, 0.3]];
        opt.tell(&xs, &[3.0, 1.0, 2.0]);
        let (x, fx) = opt.best().unwrap();
        assert_eq!(vec![0.2, 0.2], x);
        assert_eq!(1.0, fx);
    }

    #[test]
    fn converges_on_its_iteration_budget() {
        let factory = RandomSearchFactory::new(1, Some(2));
        let mut opt = factory.build(&[0.0, 0.0], &bounds(), 0);
        assert!(opt.converged().is_none());
        opt.tell(&[vec![0.0, 0.0]], &[1.0]);
        assert!(opt.converged().is_none());
        opt.tell(&[vec![0.0, 0.0]], &[1.0]);
        assert!(opt.converged().is_some());
    }

    #[test]
    fn save_and_restore_preserve_the_search_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let factory = RandomSearchFactory::new(2, Some(100));

        let mut opt = factory.build(&[0.5, 0.5], &bounds(), 13);
        opt.ask();
        opt.tell(&[vec![0.5, 0.5]], &[2.5]);
        opt.save_state(&path).unwrap();

        let mut restored = factory.restore(&path).unwrap();
        assert_eq!(opt.best(), restored.best());
        // both continue with the identical random stream
        assert_eq!(opt.ask(), restored.ask());
    }
}
