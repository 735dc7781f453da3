//! Caller-held task handles.
//!
//! A [`Task`] is the unit of deferred work accepted by every pool. Identity
//! is the handle itself: clones of one `Task` share an allocation, and the
//! facility keys removal-by-handle on that allocation's address. Two tasks
//! built from identical closures are still distinct.

use std::fmt;
use std::sync::{Arc, Weak};

/// Stable identity of a [`Task`] handle.
///
/// Derived from the handle's allocation address. Valid for keying while at
/// least one clone of the handle (or a pending submission holding one) is
/// alive; the pools purge map entries on fire and on remove, so a recycled
/// address can never alias a live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

/// A cloneable unit of deferred work.
///
/// The closure may run on a worker thread, on a loop thread, or never
/// (cancelled before fire). It may be posted more than once; each post is
/// an independent submission of the same handle.
#[derive(Clone)]
pub struct Task {
    run: Arc<dyn Fn() + Send + Sync>,
}

impl Task {
    /// Wraps a closure into a task handle.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self { run: Arc::new(f) }
    }

    /// Returns the stable identity of this handle.
    #[must_use]
    pub fn id(&self) -> TaskId {
        TaskId(Arc::as_ptr(&self.run).cast::<()>() as usize)
    }

    /// Creates a weak handle that does not keep the task alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakTask {
        WeakTask {
            run: Arc::downgrade(&self.run),
        }
    }

    /// Runs the task on the current thread.
    pub fn run(&self) {
        (self.run)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Task").field(&self.id()).finish()
    }
}

/// Weak counterpart of [`Task`], held by cancel tokens so a token never
/// prolongs the life of the work it refers to.
#[derive(Clone)]
pub struct WeakTask {
    run: Weak<dyn Fn() + Send + Sync>,
}

impl WeakTask {
    /// Upgrades back to a [`Task`] if any strong handle is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Task> {
        self.run.upgrade().map(|run| Task { run })
    }
}

impl fmt::Debug for WeakTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakTask").finish_non_exhaustive()
    }
}
