//! Rejection fallback policy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::executor::handle::run_task;
use crate::executor::{Executor, SubmitError, WorkHandle};
use crate::task::Task;

/// Wraps an executor so rejection never reaches the caller: a rejected task
/// runs on a freshly spawned one-shot thread instead.
///
/// The default [`ThreadPool`](crate::executor::ThreadPool) never rejects,
/// so this policy only fires for user-supplied bounded executors. Shutdown
/// is not absorbed; a released facility must not keep spawning threads.
pub struct SpawnThreadOnReject<E> {
    inner: E,
    fallback_seq: AtomicU64,
}

impl<E> SpawnThreadOnReject<E> {
    /// Wraps `inner` with the spawn-thread fallback.
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            fallback_seq: AtomicU64::new(0),
        }
    }

    /// The wrapped executor.
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: Executor> Executor for SpawnThreadOnReject<E> {
    fn submit(&self, task: Task) -> Result<WorkHandle, SubmitError> {
        match self.inner.submit(task) {
            Ok(handle) => Ok(handle),
            Err(SubmitError::Rejected(task)) => {
                let seq = self.fallback_seq.fetch_add(1, Ordering::Relaxed);
                let name = format!("dispatchq-fallback-{seq}");
                debug!(task = ?task.id(), thread = %name, "executor rejected task, spawning one-shot thread");
                let handle = WorkHandle::new();
                let spawned = {
                    let handle = handle.clone();
                    thread::Builder::new()
                        .name(name)
                        .spawn(move || run_task(&task, &handle))
                };
                if let Err(err) = spawned {
                    warn!(%err, "failed to spawn rejection fallback thread");
                    return Err(SubmitError::Shutdown);
                }
                Ok(handle)
            }
            Err(SubmitError::Shutdown) => Err(SubmitError::Shutdown),
        }
    }

    fn shutdown(&self) {
        self.inner.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::WorkState;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    /// Refuses everything; stands in for a user-supplied bounded pool at
    /// capacity.
    struct AlwaysReject;

    impl Executor for AlwaysReject {
        fn submit(&self, task: Task) -> Result<WorkHandle, SubmitError> {
            Err(SubmitError::Rejected(task))
        }

        fn shutdown(&self) {}
    }

    struct AlwaysShutdown;

    impl Executor for AlwaysShutdown {
        fn submit(&self, _task: Task) -> Result<WorkHandle, SubmitError> {
            Err(SubmitError::Shutdown)
        }

        fn shutdown(&self) {}
    }

    #[test]
    fn rejected_task_runs_on_fallback_thread() {
        let executor = SpawnThreadOnReject::new(AlwaysReject);
        let hits = Arc::new(AtomicUsize::new(0));
        let submitter = thread::current().id();
        let task = {
            let hits = Arc::clone(&hits);
            Task::new(move || {
                assert_ne!(thread::current().id(), submitter);
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let handle = executor.submit(task).unwrap();
        let start = Instant::now();
        while handle.state() != WorkState::Done && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handle.state(), WorkState::Done);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_is_not_absorbed() {
        let executor = SpawnThreadOnReject::new(AlwaysShutdown);
        match executor.submit(Task::new(|| {})) {
            Err(SubmitError::Shutdown) => {}
            other => panic!("expected Shutdown, got {other:?}"),
        }
    }
}
