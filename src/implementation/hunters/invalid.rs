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

use std::fmt;

use crate::{Hunter, IterationLog, OptId};

/// Fires when the victim's last `k` evaluations were all invalid (`+inf`).
/// An optimizer stuck in a region where the objective cannot be evaluated is
/// wasting its compute slots.
#[derive(Debug, Clone)]
pub struct LastPointsInvalid {
    k: usize,
}
impl LastPointsInvalid {
    /// # Panics
    /// When `k` is zero.
    pub fn new(k: usize) -> Self {
        assert!(k >= 1, "LastPointsInvalid needs a window of at least 1 point");
        LastPointsInvalid { k }
    }
}
impl Hunter for LastPointsInvalid {
    fn evaluate(&mut self, log: &IterationLog, _hunter_id: OptId, victim_id: OptId) -> bool {
        let records = log.records(victim_id);
        records.len() >= self.k
            && records[records.len() - self.k..]
                .iter()
                .all(|r| r.fx.is_infinite() && r.fx.is_sign_positive())
    }
}
impl fmt::Display for LastPointsInvalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LastPointsInvalid(k={})", self.k)
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_invalid {
    use crate::*;

    use crate::implementation::hunters::test_fixtures::{fake_log, stream};

    const INF: f64 = f64::INFINITY;

    #[test]
    fn fires_only_when_the_whole_tail_is_invalid() {
        let cases: Vec<(&[f64], bool)> = vec![
            (&[12.0, INF, INF, INF, INF], false),
            (&[INF, INF, INF, INF], false),
            (&[INF, INF, INF, INF, INF], true),
            (&[INF, INF, INF, INF, INF, INF], true),
            (&[INF, INF, INF, 8.0, INF], false),
            (&[84.0, INF, INF, INF, INF, INF], true),
            (&[84.0, 654.0, INF, INF, INF, INF], false),
        ];
        for (fx, expected) in cases {
            let log = fake_log(&[stream(2, fx, 1)]);
            let mut cond = LastPointsInvalid::new(5);
            assert_eq!(expected, cond.evaluate(&log, OptId(1), OptId(2)), "fx={fx:?}");
        }
    }

    #[test]
    fn negative_infinity_does_not_count_as_invalid() {
        let log = fake_log(&[stream(1, &[f64::NEG_INFINITY; 5], 1)]);
        assert!(!LastPointsInvalid::new(5).evaluate(&log, OptId(9), OptId(1)));
    }
}
