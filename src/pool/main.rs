//! The loop-affinity queue.
//!
//! [`MainQueue`] runs every task on one distinguished [`EventLoop`] thread.
//! Hosts with a real UI loop install it via [`install_main_loop`]; without
//! one, a process-wide dedicated loop is spawned lazily on first use. The
//! queue keeps no per-task tracking map; removal is handle equality at the
//! scheduler level.

use std::sync::{Arc, Weak};
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use crate::pool::Pool;
use crate::scheduler::EventLoop;
use crate::task::Task;
use crate::token::CancelToken;

struct MainRegistry {
    installed: Option<Arc<EventLoop>>,
    instance: Option<Arc<MainQueue>>,
}

static REGISTRY: Mutex<MainRegistry> = Mutex::new(MainRegistry {
    installed: None,
    instance: None,
});

/// Designates `main_loop` as the process's main loop.
///
/// The current singleton, if bound to a different loop, is rebuilt on the
/// next [`MainQueue::instance`] call.
pub fn install_main_loop(main_loop: Arc<EventLoop>) {
    REGISTRY.lock().installed = Some(main_loop);
}

/// `Pool` bound to the process's main loop thread.
pub struct MainQueue {
    main_loop: Arc<EventLoop>,
    self_weak: Weak<Self>,
}

impl MainQueue {
    /// The singleton instance, lazily built and rebuilt when the installed
    /// main loop changes between calls.
    #[must_use]
    pub fn instance() -> Arc<Self> {
        let mut registry = REGISTRY.lock();
        let installed = Arc::clone(
            registry
                .installed
                .get_or_insert_with(|| EventLoop::spawn("dispatchq-main")),
        );
        match &registry.instance {
            Some(instance) if Arc::ptr_eq(&instance.main_loop, &installed) => {
                Arc::clone(instance)
            }
            _ => {
                let instance = Arc::new_cyclic(|self_weak| Self {
                    main_loop: installed,
                    self_weak: self_weak.clone(),
                });
                registry.instance = Some(Arc::clone(&instance));
                instance
            }
        }
    }

    /// Drops the cached singleton. The installed loop stays; the facility
    /// does not own the main thread.
    pub(crate) fn release_instance() {
        REGISTRY.lock().instance = None;
    }

    /// Identity of the thread every task posted here runs on.
    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.main_loop.thread_id()
    }
}

impl Pool for MainQueue {
    fn post_delay(&self, task: Task, delay: Duration) -> CancelToken {
        let weak = task.downgrade();
        let job = {
            let task = task.clone();
            move || task.run()
        };
        self.main_loop.schedule(task.id(), delay, job);
        CancelToken::for_main(self.self_weak.clone(), weak)
    }

    fn remove(&self, task: &Task) {
        self.main_loop.cancel_key(task.id());
    }

    fn quit(&self) {
        // The main loop is not ours to stop.
        trace!("quit on main queue ignored");
    }
}
