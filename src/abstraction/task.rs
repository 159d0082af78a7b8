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

//! This module defines the `Task` trait: the expensive black-box objective
//! function being minimized. The task is an external collaborator; the
//! manager core never interprets parameter semantics, it only moves vectors
//! around and compares objective values.

/// The objective function of a managed run. Implementations are shared
/// between all worker threads, hence the `Send + Sync` requirement; the
/// evaluation itself takes `&self` and must be safe to call concurrently.
///
/// Any non-finite objective value returned from `evaluate` is recorded by
/// the worker runtime as `+inf`, the conventional marker for an invalid
/// point. Panicking inside `evaluate` crashes only the calling worker, not
/// the run.
pub trait Task: Send + Sync {
    /// Evaluates the objective function at `x`.
    fn evaluate(&self, x: &[f64]) -> f64;

    /// Optional capability used by residual based optimizers: the vector of
    /// per-contribution errors at `x`. The default says the capability is
    /// absent.
    fn residuals(&self, _x: &[f64]) -> Option<Vec<f64>> {
        None
    }
}

/// Plain functions and closures over a parameter slice are tasks.
impl<F> Task for F
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn evaluate(&self, x: &[f64]) -> f64 {
        self(x)
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_task {
    use crate::Task;

    #[test]
    fn closures_are_tasks() {
        let task = |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>();
        assert_eq!(5.0, Task::evaluate(&task, &[1.0, 2.0]));
        assert!(Task::residuals(&task, &[1.0]).is_none());
    }
}
