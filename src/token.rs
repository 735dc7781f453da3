//! Cancellation tokens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::pool::background::Submission;
use crate::pool::{BackgroundPool, MainQueue, Pool};
use crate::task::WeakTask;

/// Idempotent cancellation handle yielded by every submission.
///
/// The first [`cancel`](Self::cancel) routes removal to the owning pool;
/// every later call is a no-op, as is cancelling after the pool has been
/// released. Tokens hold the pool weakly and so outlive it harmlessly.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug)]
struct TokenInner {
    cancelled: AtomicBool,
    target: Target,
}

enum Target {
    Background {
        pool: Weak<BackgroundPool>,
        submission: Arc<Submission>,
    },
    Main {
        pool: Weak<MainQueue>,
        task: WeakTask,
    },
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Background { .. } => f.write_str("Target::Background"),
            Self::Main { .. } => f.write_str("Target::Main"),
        }
    }
}

impl CancelToken {
    pub(crate) fn for_background(pool: Weak<BackgroundPool>, submission: Arc<Submission>) -> Self {
        Self::with_target(Target::Background { pool, submission })
    }

    pub(crate) fn for_main(pool: Weak<MainQueue>, task: WeakTask) -> Self {
        Self::with_target(Target::Main { pool, task })
    }

    fn with_target(target: Target) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                target,
            }),
        }
    }

    /// Requests cancellation of the submission this token was issued for.
    ///
    /// Cancellation before the delay expires prevents the task from ever
    /// running; after hand-off it cancels the queued executor work; after
    /// completion it does nothing.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        match &self.inner.target {
            Target::Background { pool, submission } => {
                if let Some(pool) = pool.upgrade() {
                    pool.remove_submission(submission);
                }
            }
            Target::Main { pool, task } => {
                if let (Some(pool), Some(task)) = (pool.upgrade(), task.upgrade()) {
                    pool.remove(&task);
                }
            }
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called on this token or a
    /// clone of it.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThreadPoolConfig;
    use crate::executor::ThreadPool;
    use crate::scheduler::EventLoop;
    use crate::task::Task;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    fn test_pool() -> Arc<BackgroundPool> {
        let scheduler = EventLoop::spawn("token-test-loop");
        let executor = ThreadPool::with_config(
            ThreadPoolConfig::new()
                .with_max_threads(2)
                .with_keep_alive(Duration::from_millis(100)),
        )
        .unwrap();
        BackgroundPool::new(scheduler, Arc::new(executor))
    }

    #[test]
    fn cancel_before_fire_prevents_execution() {
        let pool = test_pool();
        let hits = Arc::new(AtomicUsize::new(0));
        let task = {
            let hits = Arc::clone(&hits);
            Task::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let token = pool.post_delay(task, Duration::from_millis(120));
        token.cancel();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        pool.quit();
    }

    #[test]
    fn cancel_is_idempotent() {
        let pool = test_pool();
        let hits = Arc::new(AtomicUsize::new(0));
        let task = {
            let hits = Arc::clone(&hits);
            Task::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let token = pool.post_delay(task, Duration::from_millis(100));
        for _ in 0..5 {
            token.cancel();
        }
        assert!(token.is_cancelled());
        thread::sleep(Duration::from_millis(250));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        pool.quit();
    }

    #[test]
    fn cancel_after_completion_is_a_noop() {
        let pool = test_pool();
        let hits = Arc::new(AtomicUsize::new(0));
        let task = {
            let hits = Arc::clone(&hits);
            Task::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let token = pool.post(task);
        let start = std::time::Instant::now();
        while hits.load(Ordering::SeqCst) == 0 && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        token.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        pool.quit();
    }

    #[test]
    fn cancel_with_dead_pool_is_harmless() {
        let pool = test_pool();
        let token = pool.post_delay(Task::new(|| {}), Duration::from_millis(200));
        pool.quit();
        drop(pool);
        token.cancel();
        token.cancel();
    }

    #[test]
    fn clones_share_the_cancelled_flag() {
        let pool = test_pool();
        let token = pool.post_delay(Task::new(|| {}), Duration::from_millis(200));
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
        pool.quit();
    }
}
