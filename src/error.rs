//! Error types for the dispatch facility.
//!
//! Dispatch operations never fail for ordinary back-pressure: the default
//! worker backlog is unbounded and rejection from user-supplied bounded
//! executors is absorbed by the spawn-thread fallback. The errors here cover
//! caller precondition violations and user-task failures surfaced through
//! work handles.

use thiserror::Error;

/// Errors raised at the facade for caller mistakes.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A required argument was absent.
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
}

/// Failure of a user task while executing on a worker.
///
/// The facility itself never raises this; it is recorded on the submission's
/// [`WorkHandle`](crate::executor::WorkHandle) when a task unwinds, so the
/// failure of asynchronous work stays observable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The task panicked; the payload's message is preserved when it is a
    /// string, `"<non-string panic payload>"` otherwise.
    #[error("task panicked: {0}")]
    Panicked(String),
}
