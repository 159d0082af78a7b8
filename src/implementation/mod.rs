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

//! This module (and its submodules) provide the concrete building blocks of
//! a managed run: the iteration log, the built-in hunters, checkers,
//! selectors and start-point generators, the signal transport, the worker
//! runtime, checkpointing, and the manager which ties them all together.

mod log;
mod hunters;
mod checkers;
mod selectors;
mod generators;
mod optimizers;
mod signal;
mod worker;
mod checkpoint;
mod manager;

pub use self::log::*;
pub use hunters::*;
pub use checkers::*;
pub use selectors::*;
pub use generators::*;
pub use optimizers::*;
pub use signal::*;
pub use checkpoint::*;
pub use manager::*;
