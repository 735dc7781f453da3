//! On-demand worker pool with an unbounded backlog.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::config::{ConfigError, ThreadPoolConfig};
use crate::executor::handle::run_task;
use crate::executor::{Executor, SubmitError, WorkHandle};
use crate::task::Task;

struct QueuedWork {
    task: Task,
    handle: WorkHandle,
}

struct PoolState {
    backlog: VecDeque<QueuedWork>,
    live_workers: usize,
    idle_workers: usize,
    next_worker: u64,
    shutdown: bool,
}

struct PoolShared {
    config: ThreadPoolConfig,
    state: Mutex<PoolState>,
    work_available: Condvar,
}

/// The default worker executor.
///
/// Starts with zero threads; each submission that finds no idle worker and
/// headroom under `max_threads` spawns one. Idle workers exit after the
/// configured keep-alive. The backlog is unbounded, so
/// [`SubmitError::Rejected`] is unreachable here; after
/// [`shutdown`](Executor::shutdown) the remaining backlog still drains on
/// the surviving workers.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
}

impl ThreadPool {
    /// Creates a pool with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_validated_config(ThreadPoolConfig::default())
    }

    /// Creates a pool with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid.
    pub fn with_config(config: ThreadPoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_validated_config(config))
    }

    fn with_validated_config(config: ThreadPoolConfig) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                config,
                state: Mutex::new(PoolState {
                    backlog: VecDeque::new(),
                    live_workers: 0,
                    idle_workers: 0,
                    next_worker: 0,
                    shutdown: false,
                }),
                work_available: Condvar::new(),
            }),
        }
    }

    /// Number of live worker threads.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.shared.state.lock().live_workers
    }

    /// Number of tasks waiting in the backlog.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.shared.state.lock().backlog.len()
    }

    fn spawn_worker(shared: &Arc<PoolShared>, state: &mut PoolState) {
        let seq = state.next_worker;
        state.next_worker += 1;
        state.live_workers += 1;
        let name = format!("{}-{seq}", shared.config.thread_name_prefix);
        let for_worker = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(&for_worker));
        match spawned {
            Ok(_) => trace!(worker = %name, "spawned pool worker"),
            Err(err) => {
                // The queued task stays in the backlog; an existing worker
                // or a later submission's spawn will pick it up.
                state.live_workers -= 1;
                warn!(worker = %name, %err, "failed to spawn pool worker");
            }
        }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ThreadPool {
    fn submit(&self, task: Task) -> Result<WorkHandle, SubmitError> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(SubmitError::Shutdown);
        }
        let handle = WorkHandle::new();
        state.backlog.push_back(QueuedWork {
            task,
            handle: handle.clone(),
        });
        if state.idle_workers == 0 && state.live_workers < self.shared.config.max_threads {
            Self::spawn_worker(&self.shared, &mut state);
        }
        self.shared.work_available.notify_one();
        Ok(handle)
    }

    fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        debug!(
            backlog = state.backlog.len(),
            workers = state.live_workers,
            "thread pool shutting down"
        );
        self.shared.work_available.notify_all();
    }
}

fn worker_loop(shared: &Arc<PoolShared>) {
    loop {
        let work = {
            let mut state = shared.state.lock();
            loop {
                if let Some(work) = state.backlog.pop_front() {
                    break Some(work);
                }
                if state.shutdown {
                    state.live_workers -= 1;
                    break None;
                }
                state.idle_workers += 1;
                let timeout = shared
                    .work_available
                    .wait_for(&mut state, shared.config.keep_alive);
                state.idle_workers -= 1;
                if timeout.timed_out() && state.backlog.is_empty() {
                    // Keep-alive expired with nothing to do; retire.
                    state.live_workers -= 1;
                    break None;
                }
            }
        };
        match work {
            Some(work) => run_task(&work.task, &work.handle),
            None => {
                trace!("pool worker retiring");
                return;
            }
        }
    }
}
