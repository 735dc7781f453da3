//! Pool- and executor-level properties, exercised on privately constructed
//! instances (no process-global state, so no serialization needed).

use dispatchq::executor::{SpawnThreadOnReject, SubmitError, WorkHandle};
use dispatchq::scheduler::EventLoop;
use dispatchq::{BackgroundPool, Executor, Pool, Task, ThreadPool, ThreadPoolConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(window: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < window {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

/// Records hand-off order and runs each task inline.
struct RecordingExecutor {
    arrivals: Mutex<Vec<usize>>,
    labels: Mutex<std::collections::HashMap<dispatchq::task::TaskId, usize>>,
}

impl RecordingExecutor {
    fn new() -> Self {
        Self {
            arrivals: Mutex::new(Vec::new()),
            labels: Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn label(&self, task: &Task, index: usize) {
        self.labels.lock().insert(task.id(), index);
    }

    fn arrivals(&self) -> Vec<usize> {
        self.arrivals.lock().clone()
    }
}

impl Executor for RecordingExecutor {
    fn submit(&self, task: Task) -> Result<WorkHandle, SubmitError> {
        if let Some(index) = self.labels.lock().get(&task.id()) {
            self.arrivals.lock().push(*index);
        }
        let handle = WorkHandle::new();
        if handle.begin() {
            task.run();
            handle.finish(None);
        }
        Ok(handle)
    }

    fn shutdown(&self) {}
}

/// Tasks handed to the executor arrive in submission order: the delay
/// loop is a single thread and the backlog is FIFO.
#[test]
fn hand_off_order_is_fifo_for_equal_delays() {
    let recorder = Arc::new(RecordingExecutor::new());
    let scheduler = EventLoop::spawn("props-fifo-loop");
    let executor: Arc<dyn Executor> = recorder.clone();
    let pool = BackgroundPool::new(scheduler, executor);
    let tasks: Vec<_> = (0..16).map(|_| Task::new(|| {})).collect();
    for (index, task) in tasks.iter().enumerate() {
        recorder.label(task, index);
        pool.post(task.clone());
    }
    assert!(wait_for(Duration::from_secs(5), || {
        recorder.arrivals().len() == 16
    }));
    assert_eq!(recorder.arrivals(), (0..16).collect::<Vec<_>>());
    pool.quit();
}

/// A bounded executor at capacity rejects into the spawn-thread fallback;
/// the task still runs.
struct AlwaysFull;

impl Executor for AlwaysFull {
    fn submit(&self, task: Task) -> Result<WorkHandle, SubmitError> {
        Err(SubmitError::Rejected(task))
    }

    fn shutdown(&self) {}
}

#[test]
fn rejection_fallback_guarantees_forward_progress() {
    let executor: Arc<dyn Executor> = Arc::new(SpawnThreadOnReject::new(AlwaysFull));
    let scheduler = EventLoop::spawn("props-reject-loop");
    let pool = BackgroundPool::new(scheduler, executor);
    let ran = Arc::new(AtomicBool::new(false));
    let task = {
        let ran = Arc::clone(&ran);
        Task::new(move || {
            ran.store(true, Ordering::SeqCst);
        })
    };
    pool.post(task);
    assert!(wait_for(Duration::from_secs(2), || ran.load(Ordering::SeqCst)));
    pool.quit();
}

/// A token cancelled after hand-off still stops work that has not started:
/// with one worker busy, the queued task is cancelled in the backlog.
#[test]
fn cancel_after_hand_off_stops_queued_work() {
    let executor = ThreadPool::with_config(
        ThreadPoolConfig::new()
            .with_max_threads(1)
            .with_keep_alive(Duration::from_millis(100)),
    )
    .unwrap();
    let scheduler = EventLoop::spawn("props-cancel-loop");
    let pool = BackgroundPool::new(scheduler, Arc::new(executor));

    let blocker_started = Arc::new(AtomicBool::new(false));
    let blocker = {
        let started = Arc::clone(&blocker_started);
        Task::new(move || {
            started.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(300));
        })
    };
    pool.post(blocker);
    assert!(wait_for(Duration::from_secs(2), || {
        blocker_started.load(Ordering::SeqCst)
    }));

    let ran = Arc::new(AtomicBool::new(false));
    let victim = {
        let ran = Arc::clone(&ran);
        Task::new(move || {
            ran.store(true, Ordering::SeqCst);
        })
    };
    let token = pool.post(victim);
    // Give the delay loop time to hand the victim to the busy executor.
    thread::sleep(Duration::from_millis(100));
    token.cancel();
    thread::sleep(Duration::from_millis(500));
    assert!(!ran.load(Ordering::SeqCst));
    pool.quit();
}

/// In-flight work runs to completion; cancel neither prevents nor repeats.
#[test]
fn cancel_of_running_work_lets_it_finish() {
    let executor = ThreadPool::with_config(
        ThreadPoolConfig::new()
            .with_max_threads(1)
            .with_keep_alive(Duration::from_millis(100)),
    )
    .unwrap();
    let scheduler = EventLoop::spawn("props-running-loop");
    let pool = BackgroundPool::new(scheduler, Arc::new(executor));

    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicUsize::new(0));
    let task = {
        let started = Arc::clone(&started);
        let finished = Arc::clone(&finished);
        Task::new(move || {
            started.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(150));
            finished.fetch_add(1, Ordering::SeqCst);
        })
    };
    let token = pool.post(task);
    assert!(wait_for(Duration::from_secs(2), || {
        started.load(Ordering::SeqCst)
    }));
    token.cancel();
    assert!(wait_for(Duration::from_secs(2), || {
        finished.load(Ordering::SeqCst) == 1
    }));
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    pool.quit();
}

/// Concurrent posts and removes of many distinct handles never lose an
/// un-removed task and never run a removed one.
#[test]
fn concurrent_post_and_remove_is_consistent() {
    let executor = ThreadPool::with_config(
        ThreadPoolConfig::new()
            .with_max_threads(4)
            .with_keep_alive(Duration::from_millis(100)),
    )
    .unwrap();
    let scheduler = EventLoop::spawn("props-race-loop");
    let pool = BackgroundPool::new(scheduler, Arc::new(executor));

    let kept_runs = Arc::new(AtomicUsize::new(0));
    let removed_runs = Arc::new(AtomicUsize::new(0));
    let mut kept = Vec::new();
    let mut removed = Vec::new();
    for index in 0..40 {
        let counter = if index % 2 == 0 {
            Arc::clone(&kept_runs)
        } else {
            Arc::clone(&removed_runs)
        };
        let task = Task::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        if index % 2 == 0 {
            kept.push(task);
        } else {
            removed.push(task);
        }
    }
    for task in &kept {
        pool.post_delay(task.clone(), Duration::from_millis(80));
    }
    for task in &removed {
        pool.post_delay(task.clone(), Duration::from_millis(80));
    }
    let remover = {
        let pool = Arc::clone(&pool);
        let removed = removed.clone();
        thread::spawn(move || {
            for task in &removed {
                pool.remove(task);
            }
        })
    };
    remover.join().unwrap();
    assert!(wait_for(Duration::from_secs(5), || {
        kept_runs.load(Ordering::SeqCst) == kept.len()
    }));
    thread::sleep(Duration::from_millis(200));
    assert_eq!(removed_runs.load(Ordering::SeqCst), 0);
    pool.quit();
}
