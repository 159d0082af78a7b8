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

//! This module provides the built-in kill conditions (hunters). Each is a
//! leaf of the [crate::HunterTree] predicate algebra; combine them with `&`
//! and `|` to describe when a victim optimizer should be terminated.

mod progress;
mod unmoving;
mod invalid;
mod distance;
mod annealing;
mod opt_type;

pub use progress::*;
pub use unmoving::*;
pub use invalid::*;
pub use distance::*;
pub use annealing::*;
pub use opt_type::*;

#[cfg(test)]
pub(crate) mod test_fixtures {
    //! Small helpers to script iteration logs for the hunter tests.

    use crate::*;

    pub struct FakeStream {
        pub opt_id: u32,
        pub points: Vec<(Vec<f64>, f64)>,
        pub calls_per_iter: u32,
    }

    /// A stream whose `fx` values are scripted; `x` mirrors `fx`.
    pub fn stream(opt_id: u32, fx: &[f64], calls_per_iter: u32) -> FakeStream {
        FakeStream {
            opt_id,
            points: fx.iter().map(|v| (vec![*v], *v)).collect(),
            calls_per_iter,
        }
    }

    /// A stream whose `x` vectors are scripted; `fx` is zero throughout.
    pub fn stream_with_x(opt_id: u32, xs: Vec<Vec<f64>>, calls_per_iter: u32) -> FakeStream {
        FakeStream {
            opt_id,
            points: xs.into_iter().map(|x| (x, 0.0)).collect(),
            calls_per_iter,
        }
    }

    pub fn fake_log(streams: &[FakeStream]) -> IterationLog {
        fake_log_typed(&streams.iter().map(|s| (clone_stream(s), "FakeOpt")).collect::<Vec<_>>())
    }

    pub fn fake_log_typed(streams: &[(FakeStream, &str)]) -> IterationLog {
        let mut log = IterationLog::new();
        for (stream, opt_type) in streams {
            let metadata = OptimizerMetadata {
                opt_type: opt_type.to_string(),
                init_config: serde_json::Value::Null,
                start_time: 0.0,
                end_time: None,
                end_condition: None,
                slots: 1,
                starting_point: vec![0.0],
            };
            log.add_optimizer(OptId(stream.opt_id), metadata).unwrap();
            for (i, (x, fx)) in stream.points.iter().enumerate() {
                log.put_iteration(IterationResult {
                    opt_id: OptId(stream.opt_id),
                    n_iter: i as u32 + 1,
                    i_fcalls: stream.calls_per_iter,
                    x: x.clone(),
                    fx: *fx,
                    is_final: false,
                    timestamp: i as f64,
                    extras: vec![],
                })
                .unwrap();
            }
        }
        log
    }

    fn clone_stream(s: &FakeStream) -> FakeStream {
        FakeStream {
            opt_id: s.opt_id,
            points: s.points.clone(),
            calls_per_iter: s.calls_per_iter,
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_hunter_trees {
    use std::fmt;

    use crate::*;

    use super::test_fixtures::{fake_log, stream};

    struct TrueHunter;
    impl Hunter for TrueHunter {
        fn evaluate(&mut self, _: &IterationLog, _: OptId, _: OptId) -> bool {
            true
        }
    }
    impl fmt::Display for TrueHunter {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "TrueHunter()")
        }
    }

    struct FalseHunter;
    impl Hunter for FalseHunter {
        fn evaluate(&mut self, _: &IterationLog, _: OptId, _: OptId) -> bool {
            false
        }
    }
    impl fmt::Display for FalseHunter {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "FalseHunter()")
        }
    }

    #[test]
    fn combined_kill_condition_evaluates_like_the_expression() {
        let log = IterationLog::new();
        let mut tree = FalseHunter.into_tree()
            | (FalseHunter.into_tree() & TrueHunter.into_tree())
            | (TrueHunter.into_tree() & (TrueHunter.into_tree() | FalseHunter.into_tree()));
        assert!(tree.check(&log, OptId(1), OptId(2)));
    }

    #[test]
    fn every_leaf_carries_a_result_after_one_check() {
        let log = IterationLog::new();
        let mut tree = FalseHunter.into_tree() | (TrueHunter.into_tree() & TrueHunter.into_tree());
        assert!(tree.check(&log, OptId(1), OptId(2)));
        assert_eq!(Some(true), tree.last_result());
        assert_eq!(
            "[FalseHunter() = false | [TrueHunter() = true & TrueHunter() = true]]",
            tree.str_with_result()
        );
    }

    #[test]
    fn real_leaves_compose_against_a_real_log() {
        // victim 2 has been sitting on fx=100 for 30 iterations while the
        // hunter found something better long ago
        let log = fake_log(&[stream(1, &[1.0; 5], 1), stream(2, &[100.0; 30], 1)]);
        let mut tree = MinIterations::new(10).into_tree() & BestUnmoving::new(20, 0.0).into_tree();
        assert!(tree.check(&log, OptId(1), OptId(2)));
        // a young victim is protected by the MinIterations guard
        let log = fake_log(&[stream(1, &[1.0; 5], 1), stream(2, &[100.0; 5], 1)]);
        assert!(!tree.check(&log, OptId(1), OptId(2)));
        assert_eq!(
            "[MinIterations(n=10) = false & BestUnmoving(iters=20, tol=0) = false]",
            tree.str_with_result()
        );
    }

    #[test]
    fn display_renders_constructor_parameters() {
        let tree = MinFuncCalls::new(50).into_tree()
            | (LastPointsInvalid::new(5).into_tree() & TypeHunter::new("Cma").into_tree());
        assert_eq!(
            "[MinFuncCalls(n=50) | [LastPointsInvalid(k=5) & TypeHunter(opt_type=Cma)]]",
            tree.to_string()
        );
    }
}
