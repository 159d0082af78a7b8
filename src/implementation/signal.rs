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

//! This module provides the transport between the manager and one worker:
//! a duplex pair of channels (control codes down, acknowledgements and
//! reports up) plus the one-bit pause gate the worker parks on at iteration
//! boundaries. Every worker owns its own endpoints, so there is never any
//! contention across workers.

use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use crate::{Signal, WorkerMessage};

// ----------------------------------------------------------------------------
// --- PAUSE GATE -------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The per-worker run/pause flag. The manager is the only writer, the worker
/// the only reader: while the gate is closed the worker blocks at its next
/// iteration boundary; opening it wakes the worker up.
pub struct PauseGate {
    open: Mutex<bool>,
    monitor: Condvar,
}

impl PauseGate {
    pub fn new(open: bool) -> Self {
        PauseGate { open: Mutex::new(open), monitor: Condvar::new() }
    }

    /// Lets the worker run (sets the flag) and wakes it if it was parked.
    pub fn open(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.monitor.notify_all();
    }

    /// Requests a pause (clears the flag). The worker parks at its next
    /// iteration boundary, not immediately.
    pub fn close(&self) {
        *self.open.lock() = false;
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Waits up to `timeout` for the gate to open; the return value reports
    /// whether it is open now. Workers poll with a short timeout so that
    /// they keep servicing their signal endpoint while parked.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut open = self.open.lock();
        if !*open {
            self.monitor.wait_for(&mut open, timeout);
        }
        *open
    }
}

// ----------------------------------------------------------------------------
// --- DUPLEX ENDPOINTS -------------------------------------------------------
// ----------------------------------------------------------------------------
/// The manager's side of one worker's signal bus.
pub struct ManagerEndpoint {
    tx: Sender<Signal>,
    rx: Receiver<WorkerMessage>,
}
impl ManagerEndpoint {
    /// Sends a control code; `false` when the worker is gone.
    pub fn signal(&self, signal: Signal) -> bool {
        self.tx.send(signal).is_ok()
    }
    /// A pending worker message, if any.
    pub fn try_recv(&self) -> Option<WorkerMessage> {
        self.rx.try_recv().ok()
    }
}

/// The worker's side of its signal bus.
pub struct WorkerEndpoint {
    rx: Receiver<Signal>,
    tx: Sender<WorkerMessage>,
}
impl WorkerEndpoint {
    /// A pending control code, if any. Workers call this between iterations
    /// and while parked.
    pub fn poll(&self) -> Option<Signal> {
        self.rx.try_recv().ok()
    }
    /// Reports back to the manager; `false` when the manager is gone.
    pub fn notify(&self, message: WorkerMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// Creates the duplex signal bus for one worker.
pub fn duplex() -> (ManagerEndpoint, WorkerEndpoint) {
    let (signal_tx, signal_rx) = unbounded();
    let (message_tx, message_rx) = unbounded();
    (
        ManagerEndpoint { tx: signal_tx, rx: message_rx },
        WorkerEndpoint { rx: signal_rx, tx: message_tx },
    )
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_signal {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use crate::*;

    #[test]
    fn signals_and_messages_travel_their_own_way() {
        let (manager, worker) = duplex();
        assert!(manager.signal(Signal::StopImmediate));
        assert!(manager.signal(Signal::Pause));
        assert_eq!(Some(Signal::StopImmediate), worker.poll());
        assert_eq!(Some(Signal::Pause), worker.poll());
        assert_eq!(None, worker.poll());

        assert!(worker.notify(WorkerMessage::Paused));
        assert_eq!(Some(WorkerMessage::Paused), manager.try_recv());
        assert_eq!(None, manager.try_recv());
    }

    #[test]
    fn signalling_a_dead_worker_reports_failure() {
        let (manager, worker) = duplex();
        drop(worker);
        assert!(!manager.signal(Signal::StopImmediate));
    }

    #[test]
    fn a_closed_gate_blocks_until_opened() {
        let gate = Arc::new(PauseGate::new(true));
        gate.close();
        assert!(!gate.is_open());
        assert!(!gate.wait_timeout(Duration::from_millis(20)));

        let waiter = Arc::clone(&gate);
        let handle = std::thread::spawn(move || {
            let t0 = Instant::now();
            while !waiter.wait_timeout(Duration::from_millis(50)) {}
            t0.elapsed()
        });
        std::thread::sleep(Duration::from_millis(100));
        gate.open();
        let waited = handle.join().unwrap();
        assert!(waited >= Duration::from_millis(80), "woke after {waited:?}");
    }

    #[test]
    fn an_open_gate_does_not_block() {
        let gate = PauseGate::new(true);
        let t0 = Instant::now();
        assert!(gate.wait_timeout(Duration::from_secs(5)));
        assert!(t0.elapsed() < Duration::from_secs(1));
    }
}
