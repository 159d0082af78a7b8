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

/// Fires when the victim was spawned from the named optimizer class. Useful
/// to scope an aggressive kill heuristic to one class only, e.g.
/// `TypeHunter::new("RandomSearch") & BestUnmoving::new(50, 0.0)`.
#[derive(Debug, Clone)]
pub struct TypeHunter {
    opt_type: String,
}
impl TypeHunter {
    pub fn new(opt_type: impl Into<String>) -> Self {
        TypeHunter { opt_type: opt_type.into() }
    }
}
impl Hunter for TypeHunter {
    fn evaluate(&mut self, log: &IterationLog, _hunter_id: OptId, victim_id: OptId) -> bool {
        log.metadata(victim_id).is_some_and(|meta| meta.opt_type == self.opt_type)
    }
}
impl fmt::Display for TypeHunter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHunter(opt_type={})", self.opt_type)
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_opt_type {
    use crate::*;

    use crate::implementation::hunters::test_fixtures::{fake_log_typed, stream};

    #[test]
    fn matches_the_victim_class_name() {
        let log = fake_log_typed(&[(stream(2, &[], 1), "FakeOpt"), (stream(8, &[], 1), "XXXOpt")]);
        let mut cond = TypeHunter::new("FakeOpt");
        assert!(cond.evaluate(&log, OptId(1), OptId(2)));
        assert!(!cond.evaluate(&log, OptId(1), OptId(8)));
        assert!(!cond.evaluate(&log, OptId(1), OptId(99)));
    }
}
