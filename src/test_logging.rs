//! Test logging infrastructure.
//!
//! Captures dispatch events with timestamps during tests so ordering
//! failures come with a readable trace instead of a bare assertion. The
//! [`assert_with_log!`](crate::assert_with_log) /
//! [`test_phase!`](crate::test_phase) / [`test_complete!`](crate::test_complete)
//! macros layer human-readable progress markers on top.
//!
//! Verbosity is read once from `DISPATCHQ_TEST_LOG`
//! (`error|warn|info|debug|trace`, default `info`).

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Logging verbosity level for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TestLogLevel {
    /// Only errors and failures.
    Error,
    /// Warnings and above.
    Warn,
    /// General test progress.
    #[default]
    Info,
    /// Per-event detail.
    Debug,
    /// Everything.
    Trace,
}

impl TestLogLevel {
    /// Returns a human-readable name for the level.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    fn from_env() -> Self {
        match std::env::var("DISPATCHQ_TEST_LOG").as_deref() {
            Ok("error") => Self::Error,
            Ok("warn") => Self::Warn,
            Ok("debug") => Self::Debug,
            Ok("trace") => Self::Trace,
            _ => Self::Info,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(u8::MAX);

/// Reads the verbosity level from the environment, once.
pub fn init_test_logging() {
    if LEVEL.load(Ordering::Acquire) == u8::MAX {
        LEVEL.store(TestLogLevel::from_env() as u8, Ordering::Release);
    }
}

/// Current verbosity for test output.
#[must_use]
pub fn level() -> TestLogLevel {
    match LEVEL.load(Ordering::Acquire) {
        0 => TestLogLevel::Error,
        1 => TestLogLevel::Warn,
        3 => TestLogLevel::Debug,
        4 => TestLogLevel::Trace,
        _ => TestLogLevel::Info,
    }
}

/// Typed events recorded during a test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestEvent {
    /// A task was handed to a pool.
    Posted {
        /// Caller-chosen index of the task.
        index: usize,
    },
    /// A task began running.
    Fired {
        /// Caller-chosen index of the task.
        index: usize,
    },
    /// A submission was cancelled.
    Cancelled {
        /// Caller-chosen index of the task.
        index: usize,
    },
    /// Free-form annotation.
    Note {
        /// The annotation text.
        message: String,
    },
}

/// Captures events with elapsed-time stamps and renders a report.
#[derive(Debug)]
pub struct TestLogger {
    start: Instant,
    events: Mutex<Vec<(Instant, TestEvent)>>,
}

impl TestLogger {
    /// Creates an empty logger; the report clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Records one event.
    pub fn log(&self, event: TestEvent) {
        self.events
            .lock()
            .expect("test logger lock poisoned")
            .push((Instant::now(), event));
    }

    /// All recorded events in order.
    #[must_use]
    pub fn events(&self) -> Vec<TestEvent> {
        self.events
            .lock()
            .expect("test logger lock poisoned")
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Indices of [`TestEvent::Fired`] events in recording order.
    #[must_use]
    pub fn fired_order(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TestEvent::Fired { index } => Some(index),
                _ => None,
            })
            .collect()
    }

    /// Renders the captured events with elapsed-time stamps.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (at, event) in self.events.lock().expect("test logger lock poisoned").iter() {
            let _ = writeln!(
                out,
                "[{:>8.3}ms] {event:?}",
                at.duration_since(self.start).as_secs_f64() * 1000.0
            );
        }
        out
    }
}

impl Default for TestLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Asserts a condition, printing expected/actual context on failure.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $what:expr, $expected:expr, $actual:expr) => {
        if $cond {
            if $crate::test_logging::level() >= $crate::test_logging::TestLogLevel::Debug {
                eprintln!("    ok: {} (= {:?})", $what, $actual);
            }
        } else {
            panic!(
                "check failed: {}\n  expected: {:?}\n  actual:   {:?}",
                $what, $expected, $actual
            );
        }
    };
}

/// Marks the start of a named test phase.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        if $crate::test_logging::level() >= $crate::test_logging::TestLogLevel::Info {
            eprintln!("=== {} ===", $name);
        }
    };
}

/// Marks a test as complete.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        if $crate::test_logging::level() >= $crate::test_logging::TestLogLevel::Info {
            eprintln!("=== {} complete ===", $name);
        }
    };
}
