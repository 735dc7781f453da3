//! Logical dispatch queues.
//!
//! A [`Pool`] is the capability handed to callers: schedule now or later,
//! remove by the original task handle, quit. Two implementations exist:
//! [`BackgroundPool`] (delay loop + worker executor) and [`MainQueue`]
//! (single loop thread with execution affinity).

pub mod background;
pub mod main;

pub use background::BackgroundPool;
pub use main::{install_main_loop, MainQueue};

use std::time::Duration;

use crate::task::Task;
use crate::token::CancelToken;

/// Capability for scheduling, delaying, removing, and quitting one logical
/// queue.
pub trait Pool: Send + Sync {
    /// Posts a task for execution as soon as possible.
    fn post(&self, task: Task) -> CancelToken {
        self.post_delay(task, Duration::ZERO)
    }

    /// Posts a task for execution after `delay`.
    fn post_delay(&self, task: Task, delay: Duration) -> CancelToken;

    /// Removes pending posts of this exact handle. Unknown handles are a
    /// silent no-op.
    fn remove(&self, task: &Task);

    /// Shuts the queue down. Subsequent posts are accepted and dropped.
    fn quit(&self);
}
