//! Per-submission work handles.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::error::TaskError;
use crate::task::Task;

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;
const PANICKED: u8 = 4;

/// Observable state of one accepted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    /// Waiting in the executor backlog.
    Queued,
    /// Running on a worker thread.
    Running,
    /// Completed normally.
    Done,
    /// Cancelled before it started.
    Cancelled,
    /// Unwound; see [`WorkHandle::error`].
    Panicked,
}

/// Handle to one in-flight execution, returned by [`Executor::submit`].
///
/// Cancellation is best-effort and cooperative only up to the start of the
/// task: a queued task is prevented from starting, a running task runs to
/// completion. The host has no thread interruption primitive, so the
/// stronger interrupt-in-flight behavior of other platforms is deliberately
/// not promised.
///
/// [`Executor::submit`]: crate::executor::Executor::submit
#[derive(Debug, Clone)]
pub struct WorkHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    state: AtomicU8,
    failure: Mutex<Option<TaskError>>,
}

impl WorkHandle {
    /// Creates a handle in the queued state.
    ///
    /// Custom [`Executor`](crate::executor::Executor) implementations mint
    /// one per accepted task and drive it with [`begin`](Self::begin) and
    /// [`finish`](Self::finish).
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                state: AtomicU8::new(QUEUED),
                failure: Mutex::new(None),
            }),
        }
    }

    /// Requests cancellation. Returns `true` when this call prevented a
    /// queued task from starting; `false` when the task already started,
    /// finished, or was cancelled before.
    pub fn cancel(&self) -> bool {
        self.inner
            .state
            .compare_exchange(QUEUED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WorkState {
        match self.inner.state.load(Ordering::Acquire) {
            QUEUED => WorkState::Queued,
            RUNNING => WorkState::Running,
            DONE => WorkState::Done,
            CANCELLED => WorkState::Cancelled,
            _ => WorkState::Panicked,
        }
    }

    /// The captured failure, if the task panicked.
    #[must_use]
    pub fn error(&self) -> Option<TaskError> {
        self.inner.failure.lock().clone()
    }

    /// Transitions queued -> running. Returns `false` when the task was
    /// cancelled in the meantime and must not run.
    pub fn begin(&self) -> bool {
        self.inner
            .state
            .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Records the outcome of a finished run.
    pub fn finish(&self, failure: Option<TaskError>) {
        let next = if failure.is_some() { PANICKED } else { DONE };
        *self.inner.failure.lock() = failure;
        self.inner.state.store(next, Ordering::Release);
    }
}

impl Default for WorkHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `task` under its handle: honors a pending cancel, catches unwinds,
/// and records the outcome. Shared by pool workers and the one-shot
/// rejection fallback threads.
pub(crate) fn run_task(task: &Task, handle: &WorkHandle) {
    if !handle.begin() {
        return;
    }
    match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
        Ok(()) => handle.finish(None),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(task = ?task.id(), %message, "task panicked on worker");
            handle.finish(Some(TaskError::Panicked(message)));
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
