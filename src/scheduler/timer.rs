//! Timer heap for pending delayed entries.
//!
//! A small min-heap of `(deadline, seq)` pairs. Entries fire in
//! non-decreasing deadline order; ties break by insertion order via the
//! monotonically increasing sequence number. Cancellation is lazy: a
//! cancelled entry stays in the heap and is discarded when it surfaces.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

use smallvec::SmallVec;

use crate::task::TaskId;

/// Work executed on the loop thread when an entry fires.
pub(crate) type LoopJob = Box<dyn FnOnce() + Send>;

/// Shared cancellation flag for one scheduled entry.
///
/// Held by the heap entry and by whoever may need to cancel it (submission,
/// cancel token). Setting the flag is the only cancellation mechanism; the
/// loop observes it at fire time.
#[derive(Debug)]
pub struct TimerHandle {
    key: TaskId,
    cancelled: AtomicBool,
}

impl TimerHandle {
    pub(crate) fn new(key: TaskId) -> Self {
        Self {
            key,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Marks the entry cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::Release);
    }

    /// Whether the entry was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Acquire)
    }

    /// The task key the entry was scheduled under.
    #[must_use]
    pub fn key(&self) -> TaskId {
        self.key
    }
}

pub(crate) struct TimerEntry {
    pub(crate) deadline: Instant,
    seq: u64,
    pub(crate) handle: Arc<TimerHandle>,
    pub(crate) job: LoopJob,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first).
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of delayed entries ordered by deadline, FIFO among equals.
#[derive(Default)]
pub(crate) struct TimerHeap {
    heap: BinaryHeap<TimerEntry>,
    next_seq: u64,
}

impl TimerHeap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Adds an entry firing at `deadline`.
    pub(crate) fn insert(&mut self, deadline: Instant, handle: Arc<TimerHandle>, job: LoopJob) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(TimerEntry {
            deadline,
            seq,
            handle,
            job,
        });
    }

    /// Returns the earliest deadline, if any.
    pub(crate) fn peek_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|entry| entry.deadline)
    }

    /// Pops all entries whose deadline is `<= now`, cancelled ones included
    /// (the caller discards those without running them).
    pub(crate) fn pop_expired(&mut self, now: Instant) -> SmallVec<[TimerEntry; 4]> {
        let mut expired = SmallVec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                expired.push(entry);
            }
        }
        expired
    }

    /// Marks every pending entry scheduled under `key` as cancelled.
    pub(crate) fn cancel_key(&mut self, key: TaskId) {
        for entry in &self.heap {
            if entry.handle.key() == key {
                entry.handle.cancel();
            }
        }
    }

    /// Drops all entries.
    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }
}
