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

//! Probabilistic kill conditions in the simulated-annealing spirit: rather
//! than a hard threshold, the chance of firing grows as the victim looks
//! worse relative to the hunter. Each condition owns its own seeded random
//! number generator so that runs are reproducible.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{Hunter, IterationLog, OptId};

/// Fires with a probability that grows as the victim's iteration count falls
/// behind the hunter's. The survival probability is
/// `(n_victim / n_hunter) ^ (1 / crit_ratio)`: a victim which has run at
/// least as long as the hunter always survives, while young victims are
/// increasingly at risk the smaller `crit_ratio` gets.
pub struct TimeAnnealing {
    crit_ratio: f64,
    rng: ChaCha8Rng,
}
impl TimeAnnealing {
    /// # Panics
    /// When `crit_ratio` is not strictly positive.
    pub fn new(crit_ratio: f64) -> Self {
        Self::with_seed(crit_ratio, rand::rng().random())
    }

    /// Same as [TimeAnnealing::new] but with a fixed seed for reproducible
    /// runs.
    pub fn with_seed(crit_ratio: f64, seed: u64) -> Self {
        assert!(crit_ratio > 0.0, "TimeAnnealing critical ratio must be positive");
        TimeAnnealing { crit_ratio, rng: ChaCha8Rng::seed_from_u64(seed) }
    }
}
impl Hunter for TimeAnnealing {
    fn evaluate(&mut self, log: &IterationLog, hunter_id: OptId, victim_id: OptId) -> bool {
        let n_hunter = log.records(hunter_id).len();
        let n_victim = log.records(victim_id).len();
        if n_hunter == 0 || n_victim == 0 {
            return false;
        }
        let ratio = n_victim as f64 / n_hunter as f64;
        let survival = ratio.powf(1.0 / self.crit_ratio);
        self.rng.random::<f64>() >= survival
    }
}
impl fmt::Display for TimeAnnealing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeAnnealing(crit_ratio={})", self.crit_ratio)
    }
}

/// Fires with a probability that grows as the victim's best value exceeds
/// the hunter's: `1 - exp(-(f_victim - f_hunter) / |f_hunter|)`. A victim
/// doing at least as well as the hunter never fires.
pub struct ValueAnnealing {
    rng: ChaCha8Rng,
}
impl ValueAnnealing {
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    /// Same as [ValueAnnealing::new] but with a fixed seed for reproducible
    /// runs.
    pub fn with_seed(seed: u64) -> Self {
        ValueAnnealing { rng: ChaCha8Rng::seed_from_u64(seed) }
    }
}
impl Default for ValueAnnealing {
    fn default() -> Self {
        Self::new()
    }
}
impl Hunter for ValueAnnealing {
    fn evaluate(&mut self, log: &IterationLog, hunter_id: OptId, victim_id: OptId) -> bool {
        let f_hunter = log.fx_best(hunter_id);
        let f_victim = log.fx_best(victim_id);
        if log.records(hunter_id).is_empty() || log.records(victim_id).is_empty() {
            return false;
        }
        if f_victim <= f_hunter {
            return false;
        }
        let kill_probability = if f_hunter == 0.0 {
            1.0
        } else {
            1.0 - (-(f_victim - f_hunter) / f_hunter.abs()).exp()
        };
        self.rng.random::<f64>() < kill_probability
    }
}
impl fmt::Display for ValueAnnealing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueAnnealing()")
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_annealing {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use crate::*;

    use crate::implementation::hunters::test_fixtures::{fake_log, stream};

    #[test]
    fn seasoned_victims_always_survive_time_annealing() {
        // victim at least as old as the hunter: survival probability is 1
        for (n_hunter, n_victim, crit) in
            [(10, 99, 0.1), (10, 49, 0.2), (10, 19, 0.5), (10, 10, 1.0)]
        {
            let log = fake_log(&[
                stream(1, &vec![0.0; n_hunter], 1),
                stream(2, &vec![0.0; n_victim], 1),
            ]);
            let mut cond = TimeAnnealing::with_seed(crit, 1825);
            assert!(!cond.evaluate(&log, OptId(1), OptId(2)), "n_victim={n_victim}");
        }
    }

    #[test]
    fn young_victims_fire_according_to_the_drawn_number() {
        let log = fake_log(&[stream(1, &[0.0; 40], 1), stream(2, &[0.0; 10], 1)]);
        for seed in [7, 86, 1825] {
            let mut cond = TimeAnnealing::with_seed(2.0, seed);
            let expected = ChaCha8Rng::seed_from_u64(seed).random::<f64>() >= 0.25f64.powf(0.5);
            assert_eq!(expected, cond.evaluate(&log, OptId(1), OptId(2)), "seed={seed}");
        }
    }

    #[test]
    fn time_annealing_ignores_empty_streams() {
        let log = fake_log(&[stream(1, &[], 1), stream(2, &[0.0; 5], 1)]);
        let mut cond = TimeAnnealing::with_seed(1.0, 0);
        assert!(!cond.evaluate(&log, OptId(1), OptId(2)));
        assert!(!cond.evaluate(&log, OptId(2), OptId(1)));
    }

    #[test]
    #[should_panic]
    fn non_positive_critical_ratio_is_rejected() {
        TimeAnnealing::with_seed(0.0, 0);
    }

    #[test]
    fn better_victims_never_fire_value_annealing() {
        for (hunter_best, victim_best) in [(1000.0, 1.0), (1000.0, 999.0), (1000.0, 1000.0)] {
            let log = fake_log(&[stream(1, &[hunter_best], 1), stream(2, &[victim_best], 1)]);
            let mut cond = ValueAnnealing::with_seed(86);
            assert!(!cond.evaluate(&log, OptId(1), OptId(2)));
        }
    }

    #[test]
    fn hopeless_victims_always_fire_value_annealing() {
        // an infinitely worse victim has a kill probability of exactly 1
        let log = fake_log(&[stream(1, &[1000.0], 1), stream(2, &[f64::INFINITY], 1)]);
        let mut cond = ValueAnnealing::with_seed(86);
        assert!(cond.evaluate(&log, OptId(1), OptId(2)));
    }

    #[test]
    fn moderately_worse_victims_fire_according_to_the_drawn_number() {
        let log = fake_log(&[stream(1, &[1000.0], 1), stream(2, &[3400.0], 1)]);
        for seed in [7, 86, 1825] {
            let mut cond = ValueAnnealing::with_seed(seed);
            let p = 1.0 - (-2.4f64).exp();
            let expected = ChaCha8Rng::seed_from_u64(seed).random::<f64>() < p;
            assert_eq!(expected, cond.evaluate(&log, OptId(1), OptId(2)), "seed={seed}");
        }
    }
}
