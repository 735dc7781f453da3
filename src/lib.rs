//! Two-queue task dispatch with delayed submission, token-based
//! cancellation, and idempotent removal.
//!
//! Work goes to one of two logical queues:
//!
//! - the **main queue**: every task runs on one distinguished loop thread
//!   (install the host's loop with [`install_main_loop`], or let the
//!   facility spawn a dedicated one);
//! - the **working queue**: a delay-capable loop that hands tasks to an
//!   on-demand worker pool (zero core threads, clamped maximum, idle
//!   keep-alive, unbounded backlog).
//!
//! Every submission yields a [`CancelToken`]. Cancelling before the delay
//! expires prevents the task from running; cancelling after hand-off
//! cancels work that has not started yet; in-flight work runs to
//! completion. Tokens are idempotent and never panic.
//!
//! # Example
//!
//! ```no_run
//! use dispatchq::{dispatch_async_after, release, Task};
//! use std::time::Duration;
//!
//! let token = dispatch_async_after(
//!     None, // working queue
//!     Some(Task::new(|| println!("later"))),
//!     Duration::from_millis(50),
//! );
//! // Changed our mind:
//! if let Some(token) = token {
//!     token.cancel();
//! }
//! release();
//! ```
//!
//! # Teardown
//!
//! The facility initializes lazily and is torn down only by [`release`].
//! Skipping `release` leaks the loop thread and any idle workers until
//! their keep-alive expires; no destructor is relied on for correctness.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod executor;
pub mod facility;
pub mod pool;
pub mod scheduler;
mod sync;
pub mod task;
pub mod test_logging;
pub mod token;

pub use config::ThreadPoolConfig;
pub use error::{DispatchError, TaskError};
pub use executor::{Executor, ExecutorFactory, ThreadPool, WorkHandle, WorkState};
pub use facility::{
    dispatch_async, dispatch_async_after, dispatch_async_remove, get_main_queue,
    get_working_queue, release, set_working_executor_factory,
};
pub use pool::{install_main_loop, BackgroundPool, MainQueue, Pool};
pub use task::Task;
pub use token::CancelToken;
