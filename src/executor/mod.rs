//! Worker executors.
//!
//! An [`Executor`] accepts tasks for eventual execution on worker threads
//! and yields a [`WorkHandle`] per accepted task. The default
//! [`ThreadPool`] keeps no core threads, grows on demand up to a clamped
//! maximum, retires idle workers after a keep-alive, and never rejects
//! (its backlog is unbounded). [`SpawnThreadOnReject`] wraps executors that
//! can reject (typically user-supplied bounded pools) and guarantees
//! forward progress by running the rejected task on a fresh one-shot thread.

mod handle;
mod reject;
mod thread_pool;

pub use handle::{WorkHandle, WorkState};
pub use reject::SpawnThreadOnReject;
pub use thread_pool::ThreadPool;

use std::sync::Arc;

use crate::task::Task;

/// Submission failure at the executor level.
///
/// Never surfaced to dispatch callers: `Rejected` is absorbed by
/// [`SpawnThreadOnReject`] and `Shutdown` is handled at the wrapper that
/// observed it (the task is dropped, not crashed on).
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The executor refused the task; the task is handed back so a
    /// fallback policy can still run it.
    #[error("executor rejected the task")]
    Rejected(Task),

    /// The executor has been shut down.
    #[error("executor is shut down")]
    Shutdown,
}

/// Capability to run tasks on worker threads.
pub trait Executor: Send + Sync {
    /// Accepts a task for execution.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Rejected`] when the executor refuses the task
    /// and [`SubmitError::Shutdown`] after [`Executor::shutdown`].
    fn submit(&self, task: Task) -> Result<WorkHandle, SubmitError>;

    /// Stops accepting tasks. Already-queued tasks still run.
    fn shutdown(&self);
}

impl<T: Executor + ?Sized> Executor for Arc<T> {
    fn submit(&self, task: Task) -> Result<WorkHandle, SubmitError> {
        self.as_ref().submit(task)
    }

    fn shutdown(&self) {
        self.as_ref().shutdown();
    }
}

/// Factory installed via
/// [`set_working_executor_factory`](crate::facility::set_working_executor_factory);
/// invoked at the next lazy facility init.
pub trait ExecutorFactory: Send + Sync {
    /// Builds a fresh executor.
    fn create(&self) -> Arc<dyn Executor>;
}

impl<F> ExecutorFactory for F
where
    F: Fn() -> Arc<dyn Executor> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Executor> {
        self()
    }
}
