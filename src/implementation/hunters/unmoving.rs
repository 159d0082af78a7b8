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

//! Stagnation based kill conditions: a victim whose best value (or whose raw
//! evaluations) has stopped moving over a trailing window is a candidate for
//! termination.
//!
//! All tolerances are dimensionless fractions: a victim is "unmoving" when
//! the change over the window does not exceed `tol` times the magnitude of
//! the reference value. Windows that reach past the beginning of the
//! victim's history mean "not enough evidence yet" and never fire.

use std::fmt;

use crate::{Hunter, IterationLog, IterationRecord, OptId};

/// Relative-tolerance stagnation test. Comparisons involving infinities
/// never panic: `inf - inf` is a NaN and a NaN compares false, so streams of
/// invalid points simply do not fire here (see `LastPointsInvalid` for
/// those).
fn within_rel_tol(current: f64, reference: f64, tol: f64) -> bool {
    (current - reference).abs() <= (reference * tol).abs()
}

/// Index of the youngest record which is at least `calls` objective
/// evaluations older than the last record, or `None` when the victim's
/// history does not span the window.
fn window_start(records: &[IterationRecord], calls: u64) -> Option<usize> {
    let last = records.last()?.f_call_opt;
    if last <= calls {
        return None;
    }
    records.iter().rposition(|r| last - r.f_call_opt >= calls)
}

/// Fires when the victim's best value moved by no more than a `tol` fraction
/// over its last `iters` *iterations*:
/// `|fx_best(last) - fx_best(last - iters)| <= tol * |fx_best(last - iters)|`.
#[derive(Debug, Clone)]
pub struct BestUnmoving {
    iters: usize,
    tol: f64,
}
impl BestUnmoving {
    /// # Panics
    /// When `iters` is zero or `tol` is negative.
    pub fn new(iters: usize, tol: f64) -> Self {
        assert!(iters >= 1, "BestUnmoving window must be at least 1 iteration");
        assert!(tol >= 0.0, "BestUnmoving tolerance must be non-negative");
        BestUnmoving { iters, tol }
    }
}
impl Hunter for BestUnmoving {
    fn evaluate(&mut self, log: &IterationLog, _hunter_id: OptId, victim_id: OptId) -> bool {
        let records = log.records(victim_id);
        if records.len() <= self.iters {
            return false;
        }
        let current = records[records.len() - 1].fx_best;
        let reference = records[records.len() - 1 - self.iters].fx_best;
        within_rel_tol(current, reference, self.tol)
    }
}
impl fmt::Display for BestUnmoving {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BestUnmoving(iters={}, tol={})", self.iters, self.tol)
    }
}

/// Fires when the victim's *raw* evaluations moved by no more than a `tol`
/// fraction over its last `calls` objective evaluations. Unlike
/// [BestUnmoving] this looks at `fx` rather than the running minimum, so it
/// also catches optimizers that keep re-evaluating an already exhausted
/// neighbourhood without improving.
#[derive(Debug, Clone)]
pub struct EvaluationsUnmoving {
    calls: u64,
    tol: f64,
}
impl EvaluationsUnmoving {
    /// # Panics
    /// When `calls` is zero or `tol` is negative.
    pub fn new(calls: u64, tol: f64) -> Self {
        assert!(calls >= 1, "EvaluationsUnmoving window must be at least 1 call");
        assert!(tol >= 0.0, "EvaluationsUnmoving tolerance must be non-negative");
        EvaluationsUnmoving { calls, tol }
    }
}
impl Hunter for EvaluationsUnmoving {
    fn evaluate(&mut self, log: &IterationLog, _hunter_id: OptId, victim_id: OptId) -> bool {
        let records = log.records(victim_id);
        match window_start(records, self.calls) {
            None => false,
            Some(start) => {
                let current = records[records.len() - 1].fx;
                let reference = records[start].fx;
                within_rel_tol(current, reference, self.tol)
            }
        }
    }
}
impl fmt::Display for EvaluationsUnmoving {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvaluationsUnmoving(calls={}, tol={})", self.calls, self.tol)
    }
}

/// Fires when the victim's best value moved by no more than a `tol` fraction
/// over its last `calls` objective evaluations: the history is walked back
/// until the window of `calls` evaluations is covered and the relative
/// tolerance test is applied to `fx_best` at the two ends.
///
/// Optimizers performing several evaluations per iteration may not be able
/// to walk back far enough even though their counter passed the window; in
/// that case the condition does not fire.
#[derive(Debug, Clone)]
pub struct PseudoConverged {
    calls: u64,
    tol: f64,
}
impl PseudoConverged {
    /// # Panics
    /// When `calls` is zero or `tol` is negative.
    pub fn new(calls: u64, tol: f64) -> Self {
        assert!(calls >= 1, "PseudoConverged window must be at least 1 call");
        assert!(tol >= 0.0, "PseudoConverged tolerance must be non-negative");
        PseudoConverged { calls, tol }
    }
}
impl Hunter for PseudoConverged {
    fn evaluate(&mut self, log: &IterationLog, _hunter_id: OptId, victim_id: OptId) -> bool {
        let records = log.records(victim_id);
        match window_start(records, self.calls) {
            None => false,
            Some(start) => {
                let current = records[records.len() - 1].fx_best;
                let reference = records[start].fx_best;
                within_rel_tol(current, reference, self.tol)
            }
        }
    }
}
impl fmt::Display for PseudoConverged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PseudoConverged(calls={}, tol={})", self.calls, self.tol)
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_unmoving {
    use crate::*;

    use crate::implementation::hunters::test_fixtures::{fake_log, stream};

    /// 30 iterations: ten at fx=10, ten at fx=1, ten at fx=0.9.
    fn staircase(calls_per_iter: u32) -> IterationLog {
        let mut fx = vec![10.0; 10];
        fx.extend(vec![1.0; 10]);
        fx.extend(vec![0.9; 10]);
        fake_log(&[stream(1, &fx, calls_per_iter)])
    }

    #[test]
    fn best_unmoving_compares_across_the_iteration_window() {
        let cases = [
            (10, 0.0, false),
            (8, 0.0, true),
            (11, 0.0, false),
            (11, 0.1, true),
            (20, 0.1, false),
            (25, 0.91, true),
        ];
        let log = staircase(1);
        for (iters, tol, expected) in cases {
            let mut cond = BestUnmoving::new(iters, tol);
            assert_eq!(expected, cond.evaluate(&log, OptId(9), OptId(1)), "iters={iters} tol={tol}");
        }
    }

    #[test]
    fn best_unmoving_needs_the_full_window() {
        let log = staircase(1);
        assert!(!BestUnmoving::new(60, 0.0).evaluate(&log, OptId(9), OptId(1)));
        assert!(!BestUnmoving::new(60, 0.9).evaluate(&log, OptId(9), OptId(1)));
        // the window is counted in iterations, regardless of calls per iteration
        let log = staircase(3);
        assert!(!BestUnmoving::new(30, 0.0).evaluate(&log, OptId(9), OptId(1)));
    }

    #[test]
    fn pseudo_converged_walks_the_call_window() {
        // 30 iterations at 5 calls each: f_call_opt runs 5..=150
        let log = staircase(5);
        // 125 calls back from 150 reaches f_call_opt 25, where fx_best = 10
        assert!(PseudoConverged::new(125, 0.91).evaluate(&log, OptId(9), OptId(1)));
        assert!(!PseudoConverged::new(125, 0.5).evaluate(&log, OptId(9), OptId(1)));
        // window larger than the victim's whole call history
        assert!(!PseudoConverged::new(150, 0.0).evaluate(&log, OptId(9), OptId(1)));
    }

    #[test]
    fn pseudo_converged_fires_on_a_flat_tail() {
        let log = staircase(1);
        // the last 8 iterations all sit at fx_best = 0.9
        assert!(PseudoConverged::new(8, 0.0).evaluate(&log, OptId(9), OptId(1)));
        assert!(!PseudoConverged::new(10, 0.0).evaluate(&log, OptId(9), OptId(1)));
    }

    #[test]
    fn evaluations_unmoving_reads_raw_fx() {
        // fx decays towards 1.0: 1 + 1/i
        let fx: Vec<f64> = (1..=200).map(|i| 1.0 + 1.0 / i as f64).collect();
        let log = fake_log(&[stream(1, &fx, 4)]);
        // 100 calls back from 800: reference ~1.0057, current 1.005 -> within 1%
        assert!(EvaluationsUnmoving::new(100, 0.01).evaluate(&log, OptId(9), OptId(1)));
        // 780 calls back from 800: reference is 1.2 -> way out of 1%
        assert!(!EvaluationsUnmoving::new(780, 0.01).evaluate(&log, OptId(9), OptId(1)));
        // window not covered
        assert!(!EvaluationsUnmoving::new(900, 0.1).evaluate(&log, OptId(9), OptId(1)));
    }

    #[test]
    fn streams_of_invalid_points_do_not_fire_and_do_not_panic() {
        let log = fake_log(&[stream(2, &[f64::INFINITY, f64::INFINITY], 5)]);
        assert!(!EvaluationsUnmoving::new(3, 0.01).evaluate(&log, OptId(9), OptId(2)));
        assert!(!PseudoConverged::new(3, 0.01).evaluate(&log, OptId(9), OptId(2)));
    }

    #[test]
    #[should_panic]
    fn negative_tolerances_are_rejected() {
        BestUnmoving::new(5, -0.1);
    }
}
