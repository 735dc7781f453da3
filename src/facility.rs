//! Process-wide dispatch entry points.
//!
//! The facility owns the background side of the world: the worker executor,
//! the delay loop thread, and the background pool, all created lazily on
//! first use and torn down by [`release`]. The main queue singleton lives in
//! [`pool::main`](crate::pool::main) and is only dropped here.
//!
//! Initialization is guarded by a one-shot latch: the first caller builds
//! everything, concurrent callers wait on the latch outside the state lock,
//! and every caller then observes a consistent executor/loop/pool triple.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::DispatchError;
use crate::executor::{Executor, ExecutorFactory, SpawnThreadOnReject, ThreadPool};
use crate::pool::{BackgroundPool, MainQueue, Pool};
use crate::scheduler::EventLoop;
use crate::sync::Latch;
use crate::task::Task;
use crate::token::CancelToken;

struct FacilityState {
    factory: Option<Arc<dyn ExecutorFactory>>,
    executor: Option<Arc<dyn Executor>>,
    scheduler: Option<Arc<EventLoop>>,
    working: Option<Arc<BackgroundPool>>,
    init_latch: Option<Arc<Latch>>,
}

static STATE: Mutex<FacilityState> = Mutex::new(FacilityState {
    factory: None,
    executor: None,
    scheduler: None,
    working: None,
    init_latch: None,
});

fn init_if_needed() -> Arc<BackgroundPool> {
    loop {
        let latch = {
            let mut state = STATE.lock();
            if let Some(working) = &state.working {
                return Arc::clone(working);
            }
            match &state.init_latch {
                Some(latch) => Arc::clone(latch),
                None => {
                    let latch = Arc::new(Latch::new());
                    state.init_latch = Some(Arc::clone(&latch));
                    let factory = state.factory.clone();
                    drop(state);
                    return complete_init(&latch, factory.as_deref());
                }
            }
        };
        // Another caller is mid-init; wait outside the state lock.
        latch.wait();
    }
}

fn complete_init(
    latch: &Arc<Latch>,
    factory: Option<&dyn ExecutorFactory>,
) -> Arc<BackgroundPool> {
    let executor: Arc<dyn Executor> = match factory {
        Some(factory) => Arc::new(SpawnThreadOnReject::new(factory.create())),
        None => Arc::new(ThreadPool::new()),
    };
    let scheduler = EventLoop::spawn("dispatchq-working-loop");
    let working = BackgroundPool::new(Arc::clone(&scheduler), Arc::clone(&executor));
    {
        let mut state = STATE.lock();
        state.executor = Some(executor);
        state.scheduler = Some(scheduler);
        state.working = Some(Arc::clone(&working));
        state.init_latch = None;
    }
    latch.open();
    info!("dispatch facility initialized");
    working
}

/// Installs the factory used to build the worker executor at the next lazy
/// init. Passing a factory different from the installed one (by identity)
/// releases the current facility so the change takes effect.
pub fn set_working_executor_factory(factory: Option<Arc<dyn ExecutorFactory>>) {
    let changed = {
        let mut state = STATE.lock();
        let changed = !same_factory(state.factory.as_ref(), factory.as_ref());
        state.factory = factory;
        changed
    };
    if changed {
        debug!("executor factory changed, releasing facility");
        release();
    }
}

fn same_factory(
    current: Option<&Arc<dyn ExecutorFactory>>,
    next: Option<&Arc<dyn ExecutorFactory>>,
) -> bool {
    match (current, next) {
        (None, None) => true,
        (Some(current), Some(next)) => Arc::ptr_eq(current, next),
        _ => false,
    }
}

/// Posts `task` to `pool` for immediate execution.
///
/// With no pool, the facility's working queue is used (initializing it if
/// needed). Returns `None` when there is nothing to do (no task).
pub fn dispatch_async(pool: Option<&Arc<dyn Pool>>, task: Option<Task>) -> Option<CancelToken> {
    dispatch_async_after(pool, task, Duration::ZERO)
}

/// Posts `task` to `pool` for execution after `delay`.
///
/// With no pool, the facility's working queue is used (initializing it if
/// needed). Returns `None` when there is nothing to do (no task).
pub fn dispatch_async_after(
    pool: Option<&Arc<dyn Pool>>,
    task: Option<Task>,
    delay: Duration,
) -> Option<CancelToken> {
    let substituted: Arc<dyn Pool>;
    let pool = match pool {
        Some(pool) => pool,
        None => {
            substituted = init_if_needed();
            &substituted
        }
    };
    task.map(|task| pool.post_delay(task, delay))
}

/// Removes pending posts of `task` from `pool`.
///
/// # Errors
///
/// Returns [`DispatchError::MissingParameter`] when `pool` is absent. An
/// absent task is a no-op.
pub fn dispatch_async_remove(
    pool: Option<&Arc<dyn Pool>>,
    task: Option<&Task>,
) -> Result<(), DispatchError> {
    let pool = pool.ok_or(DispatchError::MissingParameter("pool"))?;
    if let Some(task) = task {
        pool.remove(task);
    }
    Ok(())
}

/// The main queue.
#[must_use]
pub fn get_main_queue() -> Arc<dyn Pool> {
    MainQueue::instance()
}

/// The working queue, initializing the background facility if needed.
#[must_use]
pub fn get_working_queue() -> Arc<dyn Pool> {
    init_if_needed()
}

/// Tears the facility down: quits the background loop, shuts the worker
/// executor down, and drops the main queue singleton. Waits for an
/// in-flight init to finish first. Safe to call at any time, from any
/// thread, repeatedly; in-flight submissions may be abandoned but nothing
/// deadlocks or crashes.
pub fn release() {
    loop {
        let latch = {
            let mut state = STATE.lock();
            match &state.init_latch {
                Some(latch) => Arc::clone(latch),
                None => {
                    if let Some(working) = state.working.take() {
                        working.quit();
                    }
                    if let Some(executor) = state.executor.take() {
                        executor.shutdown();
                    }
                    state.scheduler = None;
                    drop(state);
                    MainQueue::release_instance();
                    debug!("dispatch facility released");
                    return;
                }
            }
        };
        latch.wait();
    }
}
