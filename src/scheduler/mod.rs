//! Delay-capable message loop.
//!
//! An [`EventLoop`] owns one dedicated OS thread that sleeps until the
//! earliest pending deadline, then runs the fired jobs **on itself**, in
//! non-decreasing deadline order with FIFO tie-breaking. The background
//! pool uses a loop to time hand-offs to the worker executor; the main
//! queue uses a loop as its single execution thread, which is what gives
//! it thread affinity.
//!
//! Callers never touch the loop directly; the two pools wrap it.

mod timer;

pub use timer::TimerHandle;

use std::sync::Arc;
use std::thread::{self, Thread, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use crate::scheduler::timer::{LoopJob, TimerHeap};
use crate::task::TaskId;

struct LoopState {
    heap: TimerHeap,
    quitting: bool,
}

struct LoopShared {
    state: Mutex<LoopState>,
    wake: Condvar,
}

/// A dedicated timer loop bound to one OS thread.
pub struct EventLoop {
    shared: Arc<LoopShared>,
    thread: Thread,
}

impl EventLoop {
    /// Spawns the loop thread and returns a handle to it.
    ///
    /// # Panics
    ///
    /// Panics when the OS refuses to spawn the loop thread; the facility
    /// cannot exist without it.
    #[must_use]
    pub fn spawn(name: &str) -> Arc<Self> {
        let shared = Arc::new(LoopShared {
            state: Mutex::new(LoopState {
                heap: TimerHeap::new(),
                quitting: false,
            }),
            wake: Condvar::new(),
        });
        let for_loop = Arc::clone(&shared);
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_loop(&for_loop))
            .expect("failed to spawn dispatch loop thread");
        let thread = join.thread().clone();
        trace!(loop_name = name, "event loop started");
        Arc::new(Self { shared, thread })
    }

    /// Schedules `job` to run on the loop thread after `delay`.
    ///
    /// After [`quit`](Self::quit) the job is accepted and dropped; the
    /// returned handle reads as cancelled.
    pub fn schedule<F>(&self, key: TaskId, delay: Duration, job: F) -> Arc<TimerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = Arc::new(TimerHandle::new(key));
        let mut state = self.shared.state.lock();
        if state.quitting {
            debug!(task = ?key, "schedule after quit, dropping job");
            handle.cancel();
            return handle;
        }
        let job: LoopJob = Box::new(job);
        state
            .heap
            .insert(Instant::now() + delay, Arc::clone(&handle), job);
        drop(state);
        self.shared.wake.notify_one();
        handle
    }

    /// Marks every pending entry scheduled under `key` as cancelled.
    pub fn cancel_key(&self, key: TaskId) {
        self.shared.state.lock().heap.cancel_key(key);
    }

    /// Stops the loop thread. Pending entries are dropped without running.
    /// Idempotent.
    pub fn quit(&self) {
        let mut state = self.shared.state.lock();
        if state.quitting {
            return;
        }
        state.quitting = true;
        let dropped = state.heap.len();
        state.heap.clear();
        drop(state);
        self.shared.wake.notify_all();
        debug!(dropped, "event loop quitting");
    }

    /// Identity of the loop thread.
    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.thread.id()
    }

    /// Number of pending entries, cancelled ones included.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state.lock().heap.len()
    }
}

fn run_loop(shared: &Arc<LoopShared>) {
    loop {
        let fired = {
            let mut state = shared.state.lock();
            loop {
                if state.quitting {
                    trace!("event loop thread exiting");
                    return;
                }
                let expired = state.heap.pop_expired(Instant::now());
                if !expired.is_empty() {
                    break expired;
                }
                match state.heap.peek_deadline() {
                    Some(deadline) => {
                        shared.wake.wait_until(&mut state, deadline);
                    }
                    None => shared.wake.wait(&mut state),
                }
            }
        };
        // Jobs run outside the lock so they may schedule or cancel freely.
        // Unwinds are isolated; a panicking job must not take the loop
        // thread down with it.
        for entry in fired {
            if entry.handle.is_cancelled() {
                continue;
            }
            let job = entry.job;
            if let Err(_payload) =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || job()))
            {
                error!(task = ?entry.handle.key(), "job panicked on loop thread");
            }
        }
    }
}
