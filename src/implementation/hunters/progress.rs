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

//! Kill conditions which merely gate on how much work a victim has already
//! been granted. On their own these are not reasons to kill anybody; they
//! are almost always conjoined (`&`) with a real heuristic to protect young
//! optimizers from premature termination.

use std::fmt;

use crate::{Hunter, IterationLog, OptId};

/// Fires once the victim has at least `n` logged iterations.
#[derive(Debug, Clone)]
pub struct MinIterations {
    n: usize,
}
impl MinIterations {
    /// # Panics
    /// When `n` is zero: a threshold of zero would fire on freshly spawned
    /// workers and indicates a configuration mistake.
    pub fn new(n: usize) -> Self {
        assert!(n >= 1, "MinIterations threshold must be at least 1");
        MinIterations { n }
    }
}
impl Hunter for MinIterations {
    fn evaluate(&mut self, log: &IterationLog, _hunter_id: OptId, victim_id: OptId) -> bool {
        log.records(victim_id).len() >= self.n
    }
}
impl fmt::Display for MinIterations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MinIterations(n={})", self.n)
    }
}

/// Fires once the victim has used at least `n` objective evaluations.
#[derive(Debug, Clone)]
pub struct MinFuncCalls {
    n: u64,
}
impl MinFuncCalls {
    /// # Panics
    /// When `n` is zero, for the same reason as [MinIterations::new].
    pub fn new(n: u64) -> Self {
        assert!(n >= 1, "MinFuncCalls threshold must be at least 1");
        MinFuncCalls { n }
    }
}
impl Hunter for MinFuncCalls {
    fn evaluate(&mut self, log: &IterationLog, _hunter_id: OptId, victim_id: OptId) -> bool {
        log.f_call_opt(victim_id) >= self.n
    }
}
impl fmt::Display for MinFuncCalls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MinFuncCalls(n={})", self.n)
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_progress {
    use crate::*;

    use crate::implementation::hunters::test_fixtures::{fake_log, stream};

    #[test]
    fn min_iterations_counts_logged_iterations() {
        let mut cond = MinIterations::new(5);
        for n_pts in [1, 2, 3, 5, 6] {
            let log = fake_log(&[stream(1, &vec![1.0; n_pts], 1)]);
            assert_eq!(n_pts >= 5, cond.evaluate(&log, OptId(9), OptId(1)), "n_pts={n_pts}");
        }
    }

    #[test]
    #[should_panic]
    fn min_iterations_rejects_zero_threshold() {
        MinIterations::new(0);
    }

    #[test]
    fn min_func_calls_reads_the_victim_call_counter() {
        let mut cond = MinFuncCalls::new(3);
        // one call per iteration: 5, 3 and 2 iterations
        assert!(cond.evaluate(&fake_log(&[stream(1, &[12.0; 5], 1)]), OptId(9), OptId(1)));
        assert!(cond.evaluate(&fake_log(&[stream(1, &[1.0; 3], 1)]), OptId(9), OptId(1)));
        assert!(!cond.evaluate(&fake_log(&[stream(1, &[3.0; 2], 1)]), OptId(9), OptId(1)));
    }

    #[test]
    fn unknown_victims_never_fire() {
        let log = IterationLog::new();
        assert!(!MinIterations::new(1).evaluate(&log, OptId(1), OptId(2)));
        assert!(!MinFuncCalls::new(1).evaluate(&log, OptId(1), OptId(2)));
    }
}
