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

//! Geometric kill conditions: a victim searching on top of another optimizer
//! is redundant, and a victim taking vanishing steps has effectively
//! stalled. Distances are expressed as fractions of the diagonal of the
//! bounded search space so that tolerances stay dimensionless.

use std::fmt;

use crate::{bounds_diagonal, Bound, Hunter, IterationLog, OptId};

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Fires when the victim's last point lies within `rel_dist` (a fraction of
/// the search-space diagonal) of the hunter's last point, i.e. the two
/// optimizers are exploring the same neighbourhood and the worse one can go.
///
/// With `test_all` the victim is compared against the last point of *every*
/// other optimizer in the log rather than just the hunter's.
#[derive(Debug, Clone)]
pub struct ParameterDistance {
    diagonal: f64,
    rel_dist: f64,
    test_all: bool,
}
impl ParameterDistance {
    /// # Panics
    /// When `rel_dist` is not strictly positive or the bounds are empty.
    pub fn new(bounds: &[Bound], rel_dist: f64, test_all: bool) -> Self {
        assert!(!bounds.is_empty(), "ParameterDistance needs the search bounds");
        assert!(rel_dist > 0.0, "ParameterDistance relative distance must be positive");
        ParameterDistance { diagonal: bounds_diagonal(bounds), rel_dist, test_all }
    }

    fn near(&self, victim_last: &[f64], other_last: &[f64]) -> bool {
        euclidean(victim_last, other_last) <= self.rel_dist * self.diagonal
    }
}
impl Hunter for ParameterDistance {
    fn evaluate(&mut self, log: &IterationLog, hunter_id: OptId, victim_id: OptId) -> bool {
        let Some(victim_last) = log.records(victim_id).last() else {
            return false;
        };
        if self.test_all {
            log.opt_ids()
                .filter(|id| *id != victim_id)
                .filter_map(|id| log.records(id).last())
                .any(|other| self.near(&victim_last.x, &other.x))
        } else {
            log.records(hunter_id)
                .last()
                .is_some_and(|other| self.near(&victim_last.x, &other.x))
        }
    }
}
impl fmt::Display for ParameterDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParameterDistance(rel_dist={}, test_all={})", self.rel_dist, self.test_all)
    }
}

/// Fires when the victim's mean step size over its last `calls` objective
/// evaluations, as a fraction of the search-space diagonal, is at most
/// `tol`. At least two points must fall inside the window.
#[derive(Debug, Clone)]
pub struct StepSize {
    diagonal: f64,
    calls: u64,
    tol: f64,
}
impl StepSize {
    /// # Panics
    /// When `calls` is zero, `tol` is negative or the bounds are empty.
    pub fn new(bounds: &[Bound], calls: u64, tol: f64) -> Self {
        assert!(!bounds.is_empty(), "StepSize needs the search bounds");
        assert!(calls >= 1, "StepSize window must be at least 1 call");
        assert!(tol >= 0.0, "StepSize tolerance must be non-negative");
        StepSize { diagonal: bounds_diagonal(bounds), calls, tol }
    }
}
impl Hunter for StepSize {
    fn evaluate(&mut self, log: &IterationLog, _hunter_id: OptId, victim_id: OptId) -> bool {
        let records = log.records(victim_id);
        let Some(last) = records.last() else { return false };
        if last.f_call_opt < self.calls {
            return false;
        }
        let floor = last.f_call_opt - self.calls;
        let window: Vec<&[f64]> = records
            .iter()
            .filter(|r| r.f_call_opt > floor)
            .map(|r| r.x.as_slice())
            .collect();
        if window.len() < 2 {
            return false;
        }
        let total: f64 = window.windows(2).map(|w| euclidean(w[0], w[1])).sum();
        let mean = total / (window.len() - 1) as f64;
        mean / self.diagonal <= self.tol
    }
}
impl fmt::Display for StepSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepSize(calls={}, tol={})", self.calls, self.tol)
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_distance {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use crate::*;

    use crate::implementation::hunters::test_fixtures::{fake_log, stream_with_x};

    fn square(side: f64) -> Vec<Bound> {
        vec![Bound::new(0.0, side), Bound::new(0.0, side)]
    }

    #[test]
    fn fires_on_close_last_points_only() {
        // hunter walks x=0, victim walks x=1: last points one unit apart
        let log = fake_log(&[
            stream_with_x(1, vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![0.0, 2.0]], 1),
            stream_with_x(2, vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 2.0]], 1),
        ]);
        // diagonal of [0,2]^2 is 2.83: 0.1 of it is too tight, 0.5 is not
        assert!(!ParameterDistance::new(&square(2.0), 0.1, false).evaluate(&log, OptId(1), OptId(2)));
        assert!(ParameterDistance::new(&square(2.0), 0.5, false).evaluate(&log, OptId(1), OptId(2)));
    }

    #[test]
    fn identical_last_points_always_fire() {
        let log = fake_log(&[
            stream_with_x(1, vec![vec![0.0, 0.0], vec![1.0, 2.0]], 1),
            stream_with_x(2, vec![vec![1.0, 0.0], vec![1.0, 2.0]], 1),
        ]);
        assert!(ParameterDistance::new(&square(2.0), 0.1, false).evaluate(&log, OptId(1), OptId(2)));
    }

    #[test]
    fn earlier_history_is_irrelevant() {
        // the paths crossed early on but the last points are far apart
        let log = fake_log(&[
            stream_with_x(1, vec![vec![1.0, 1.0], vec![0.0, 20.0]], 1),
            stream_with_x(2, vec![vec![1.0, 1.0], vec![20.0, 0.0]], 1),
        ]);
        assert!(!ParameterDistance::new(&square(20.0), 0.1, false).evaluate(&log, OptId(1), OptId(2)));
    }

    #[test]
    fn test_all_scans_every_other_stream() {
        let log = fake_log(&[
            stream_with_x(1, vec![vec![0.0, 0.0]], 1),
            stream_with_x(2, vec![vec![1.0, 2.0]], 1),
            stream_with_x(3, vec![], 1),
            stream_with_x(4, vec![vec![1.1, 2.0]], 1),
        ]);
        // stream 4 sits right on top of the victim even though the hunter is far
        let mut cond = ParameterDistance::new(&square(2.0), 0.1, true);
        assert!(cond.evaluate(&log, OptId(1), OptId(2)));
        // without test_all only the hunter is considered
        let mut cond = ParameterDistance::new(&square(2.0), 0.1, false);
        assert!(!cond.evaluate(&log, OptId(1), OptId(2)));
    }

    #[test]
    #[should_panic]
    fn zero_rel_dist_is_rejected() {
        ParameterDistance::new(&square(2.0), 0.0, false);
    }

    /// 200 random points in the unit square, 4 calls per iteration: the mean
    /// consecutive step is around 0.52.
    fn wandering_log() -> IterationLog {
        let mut rng = ChaCha8Rng::seed_from_u64(64);
        let points: Vec<Vec<f64>> = (0..200)
            .map(|_| vec![rng.random::<f64>(), rng.random::<f64>()])
            .collect();
        fake_log(&[stream_with_x(1, points, 4)])
    }

    #[test]
    fn step_size_normalizes_by_the_search_diagonal() {
        let log = wandering_log();
        // mean step 0.52 over a diagonal of 14.1 is about 0.037
        assert!(StepSize::new(&square(10.0), 100, 0.1).evaluate(&log, OptId(9), OptId(1)));
        assert!(!StepSize::new(&square(10.0), 100, 0.01).evaluate(&log, OptId(9), OptId(1)));
        // over the unit square the same walk is anything but stalled
        assert!(!StepSize::new(&square(1.0), 100, 0.1).evaluate(&log, OptId(9), OptId(1)));
        assert!(StepSize::new(&square(10.0), 200, 0.1).evaluate(&log, OptId(9), OptId(1)));
    }

    #[test]
    fn step_size_needs_a_covered_window_with_two_points() {
        let log = wandering_log();
        // only 800 calls were ever made
        assert!(!StepSize::new(&square(10.0), 900, 0.1).evaluate(&log, OptId(9), OptId(1)));
        // a 3 call window contains a single record
        assert!(!StepSize::new(&square(10.0), 3, 0.1).evaluate(&log, OptId(9), OptId(1)));
    }
}
