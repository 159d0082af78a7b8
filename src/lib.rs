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

//! # GloMPO
//! GloMPO (Globally Managed Parallel Optimization) runs many local
//! optimizers on one expensive black-box objective at the same time,
//! watches their progress in a shared iteration log, and kills the
//! unpromising ones to hand their compute budget to the rest. The run ends
//! when user-supplied convergence conditions declare the global search
//! complete, and the best point observed by anybody is returned.
//!
//! The crate is the manager/scheduler core: optimizer algorithms themselves
//! are external collaborators which plug in through the [Optimizer] and
//! [OptimizerFactory] contracts (a simple [RandomSearch] is included to get
//! you going). What the core gives you:
//!
//! * concurrent lifecycle management of worker optimizers under a bounded
//!   slot budget ([GlompoManager], [GlompoSettings]);
//! * the central [IterationLog] every worker reports into;
//! * a composable predicate algebra over that log: [Hunter] kill conditions
//!   and [Checker] convergence conditions, combined with `&` and `|`;
//! * the duplex signal protocol (stop / save-state / pause) between the
//!   manager and its workers, including checkpoint and restore of a whole
//!   run.
//!
//! ## Quick Example
//! The following minimizes a shifted sphere function with four random
//! search workers racing each other, two at a time. Stagnant workers are
//! killed once they have stopped improving for a while.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use glompo::*;
//!
//! // 1. The expensive black-box objective (here: a cheap stand-in).
//! let task = |x: &[f64]| x.iter().map(|v| (v - 0.5) * (v - 0.5)).sum::<f64>();
//!
//! // 2. The search space.
//! let bounds = vec![Bound::new(-5.0, 5.0); 3];
//!
//! // 3. Which optimizer classes may be spawned.
//! let cls: Arc<dyn OptimizerFactory> = Arc::new(RandomSearchFactory::new(8, None));
//!
//! // 4. When is the whole search finished?
//! let convergence = MaxFuncCalls::new(4_000).into_tree()
//!     | TargetValue::new(1e-3).into_tree();
//!
//! // 5. When does a worker deserve to die? Never before 20 iterations, and
//! //    only once its best value sat still for 50 of them.
//! let hunters = MinIterations::new(20).into_tree()
//!     & BestUnmoving::new(50, 0.0).into_tree();
//!
//! let settings = GlompoSettingsBuilder::default()
//!     .bounds(bounds)
//!     .max_jobs(2)
//!     .convergence(convergence)
//!     .hunters(hunters)
//!     .selector(Box::new(CycleSelector::new(vec![(cls, 1)]).with_max_spawns(4)))
//!     .startpoint_generator(Box::new(RandomGenerator::with_seed(7)))
//!     .end_timeout(Duration::from_secs(2))
//!     .seed(7)
//!     .build()
//!     .unwrap();
//!
//! let mut manager = GlompoManager::new(Arc::new(task), settings);
//! let result = manager.minimize().unwrap();
//!
//! // the managed run found something; its provenance is recorded
//! assert!(result.fx.is_finite());
//! let origin = result.origin.unwrap();
//! assert_eq!("RandomSearch", origin.opt_type);
//! ```
//!
//! ## Going further
//! To plug in a serious optimizer, implement [OptimizerFactory] and
//! [Optimizer] for it and hand the factory to a [Selector]
//! ([CycleSelector], [RandomSelector] or [ChainSelector]). The built-in
//! kill conditions ([BestUnmoving], [PseudoConverged], [ParameterDistance],
//! [TimeAnnealing], ...) cover the usual heuristics; your own are one
//! `impl Hunter` away. Checkpointing is switched on with a
//! [CheckpointPolicy] and a run is resumed with [GlompoManager::restore].

mod common;
mod abstraction;
mod implementation;

pub use common::*;
pub use abstraction::*;
pub use implementation::*;
