//! Worker pool configuration.
//!
//! [`ThreadPoolConfig`] carries the sizing knobs for the default worker
//! executor. The defaults reproduce the facility's sizing policy: no core
//! threads, a maximum of `clamp(2 x available cores, 8, 16)` workers, and a
//! ten-second idle keep-alive.

use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

/// Idle worker lifetime under the default configuration.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(10);

/// Lower bound of the default maximum pool size.
pub const MIN_DEFAULT_THREADS: usize = 8;

/// Upper bound of the default maximum pool size.
pub const MAX_DEFAULT_THREADS: usize = 16;

/// Returns the default maximum pool size: twice the available parallelism,
/// clamped into `[MIN_DEFAULT_THREADS, MAX_DEFAULT_THREADS]`.
#[must_use]
pub fn default_max_threads() -> usize {
    let cores = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    (cores * 2).clamp(MIN_DEFAULT_THREADS, MAX_DEFAULT_THREADS)
}

/// Sizing and naming configuration for [`ThreadPool`](crate::executor::ThreadPool).
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    /// Maximum number of live worker threads.
    pub max_threads: usize,
    /// How long an idle worker waits for work before exiting.
    pub keep_alive: Duration,
    /// Prefix for worker thread names; a sequence number is appended.
    pub thread_name_prefix: String,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            max_threads: default_max_threads(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            thread_name_prefix: "dispatchq-worker".to_string(),
        }
    }
}

impl ThreadPoolConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of worker threads.
    #[must_use]
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Sets the idle keep-alive.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validates the configuration for basic sanity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::ZeroMaxThreads);
        }
        Ok(())
    }
}

/// Configuration validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A pool with zero maximum threads can never run anything.
    #[error("max_threads must be at least 1")]
    ZeroMaxThreads,
}
