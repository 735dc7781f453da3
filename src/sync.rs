//! One-shot latch for the facility init barrier.
//!
//! Callers that observe an in-flight initialization wait on the latch
//! instead of spinning on a hand-rolled condition loop. Opening is
//! idempotent; waiting after open returns immediately.

use parking_lot::{Condvar, Mutex};

/// A one-shot open/wait signal.
#[derive(Debug, Default)]
pub(crate) struct Latch {
    open: Mutex<bool>,
    signal: Condvar,
}

impl Latch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Opens the latch, releasing all current and future waiters.
    pub(crate) fn open(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.signal.notify_all();
    }

    /// Blocks until the latch is open.
    pub(crate) fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.signal.wait(&mut open);
        }
    }
}
