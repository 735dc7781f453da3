//! The worker-pool-backed queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::executor::{Executor, SubmitError, WorkHandle};
use crate::pool::Pool;
use crate::scheduler::{EventLoop, TimerHandle};
use crate::task::{Task, TaskId};
use crate::token::CancelToken;

/// One accepted background task: the original handle, its cancelled flag,
/// its pending timer entry, and, once handed off, the in-flight work
/// handle.
pub(crate) struct Submission {
    task: Task,
    cancelled: AtomicBool,
    timer: Mutex<Option<Arc<TimerHandle>>>,
    work: Mutex<Option<WorkHandle>>,
}

impl Submission {
    fn new(task: Task) -> Self {
        Self {
            task,
            cancelled: AtomicBool::new(false),
            timer: Mutex::new(None),
            work: Mutex::new(None),
        }
    }
}

/// `Pool` over a delay loop and a worker executor.
///
/// Tracks one live submission per task handle: re-posting a handle while a
/// prior post is pending replaces the tracking entry, so
/// [`remove`](Pool::remove) by the original handle cancels the latest post.
/// Earlier submissions stay valid for their own tokens.
pub struct BackgroundPool {
    scheduler: Arc<EventLoop>,
    executor: Arc<dyn Executor>,
    submissions: Mutex<HashMap<TaskId, Arc<Submission>>>,
    self_weak: Weak<Self>,
}

impl BackgroundPool {
    /// Couples a delay loop with a worker executor.
    #[must_use]
    pub fn new(scheduler: Arc<EventLoop>, executor: Arc<dyn Executor>) -> Arc<Self> {
        Arc::new_cyclic(|self_weak| Self {
            scheduler,
            executor,
            submissions: Mutex::new(HashMap::new()),
            self_weak: self_weak.clone(),
        })
    }

    /// Number of submissions still waiting on their delay.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.submissions.lock().len()
    }

    /// Cancels a submission wherever it currently is: pending timer entry,
    /// tracking map, or in-flight executor work.
    pub(crate) fn remove_submission(&self, submission: &Arc<Submission>) {
        submission.cancelled.store(true, Ordering::Release);
        if let Some(timer) = submission.timer.lock().as_ref() {
            timer.cancel();
        }
        self.purge_mapping(submission);
        let work = submission.work.lock().clone();
        if let Some(work) = work {
            work.cancel();
        }
    }

    /// Drops the map entry for this submission, leaving a newer entry for
    /// the same handle untouched.
    fn purge_mapping(&self, submission: &Arc<Submission>) {
        let mut submissions = self.submissions.lock();
        if let Some(current) = submissions.get(&submission.task.id()) {
            if Arc::ptr_eq(current, submission) {
                submissions.remove(&submission.task.id());
            }
        }
    }

    /// Runs on the loop thread when the delay expires: unregister, observe
    /// the cancelled flag, hand off to the executor.
    fn fire(&self, submission: &Arc<Submission>) {
        self.purge_mapping(submission);
        if submission.cancelled.load(Ordering::Acquire) {
            return;
        }
        match self.executor.submit(submission.task.clone()) {
            Ok(work) => {
                *submission.work.lock() = Some(work.clone());
                // A cancel that raced the hand-off finds the flag set but
                // no work handle; finish its job here.
                if submission.cancelled.load(Ordering::Acquire) {
                    work.cancel();
                }
            }
            Err(SubmitError::Shutdown) => {
                debug!(task = ?submission.task.id(), "executor gone, dropping fired task");
            }
            Err(SubmitError::Rejected(_)) => {
                warn!(task = ?submission.task.id(), "executor rejected fired task without fallback");
            }
        }
    }
}

impl Pool for BackgroundPool {
    fn post_delay(&self, task: Task, delay: Duration) -> CancelToken {
        let submission = Arc::new(Submission::new(task.clone()));
        self.submissions
            .lock()
            .insert(task.id(), Arc::clone(&submission));
        let job = {
            let pool = self.self_weak.clone();
            let submission = Arc::clone(&submission);
            move || {
                if let Some(pool) = pool.upgrade() {
                    pool.fire(&submission);
                }
            }
        };
        let timer = self.scheduler.schedule(task.id(), delay, job);
        *submission.timer.lock() = Some(timer);
        CancelToken::for_background(self.self_weak.clone(), submission)
    }

    fn remove(&self, task: &Task) {
        let submission = self.submissions.lock().get(&task.id()).cloned();
        if let Some(submission) = submission {
            self.remove_submission(&submission);
        }
    }

    fn quit(&self) {
        self.scheduler.quit();
    }
}
