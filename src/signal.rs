//! One-shot readiness signal.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// ReadySignal is a one-shot event: it starts unsignaled, latches permanently
/// on the first [`notify`](Self::notify), and wakes every waiter. Later
/// notifies are no-ops.
#[derive(Default)]
pub struct ReadySignal {
    state: Mutex<bool>,
    cond: Condvar,
}

impl ReadySignal {
    /// Create an unsignaled signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the signal and wake all current and future waiters.
    pub fn notify(&self) {
        let mut notified = self.state.lock();
        if !*notified {
            *notified = true;
            self.cond.notify_all();
        }
    }

    /// Check whether the signal has fired, without blocking.
    pub fn is_notified(&self) -> bool {
        *self.state.lock()
    }

    /// Block until the signal fires. Returns immediately if it already has.
    pub fn wait(&self) {
        let mut notified = self.state.lock();
        while !*notified {
            self.cond.wait(&mut notified);
        }
    }

    /// Block until the signal fires or the timeout elapses.
    ///
    /// Returns `true` if the signal fired within the timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut notified = self.state.lock();
        if *notified {
            return true;
        }
        self.cond.wait_for(&mut notified, timeout);
        *notified
    }
}
