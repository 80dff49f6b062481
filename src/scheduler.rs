//! Cooperative timer queue for rate-policy resumptions
//!
//! The bridge is single-threaded: nothing blocks, and rate-policy timers
//! schedule a future resumption instead of sleeping. The embedder pumps the
//! queue by calling [`Bridge::advance_to`](crate::bridge::Bridge::advance_to)
//! with the current time; under test the clock is advanced explicitly, which
//! makes throttle and debounce timing deterministic.
//!
//! Firing order is (due time, insertion order). Cancelled timers are
//! tombstoned and skipped when popped.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

use crate::types::ElementId;

/// Opaque, cancellable timer identity
pub type TimerId = u64;

/// What to do when a timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTask {
    /// Close or flush the rate window for an input element
    RateFlush { element_id: ElementId },
}

/// A timer that came due during a pump.
#[derive(Debug)]
pub struct FiredTimer {
    pub id: TimerId,
    pub due: Duration,
    pub task: TimerTask,
}

#[derive(Debug)]
struct Entry {
    due: Duration,
    seq: u64,
    id: TimerId,
    task: TimerTask,
}

// BinaryHeap is a max-heap; invert so the earliest (due, seq) pops first.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

/// Single-threaded timer queue with an explicitly advanced clock.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    next_id: TimerId,
    next_seq: u64,
    queue: BinaryHeap<Entry>,
    cancelled: HashSet<TimerId>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `task` to fire `delay` from now
    pub fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerId {
        self.schedule_at(self.now + delay, task)
    }

    /// Schedule `task` to fire at an absolute time. Used when re-arming a
    /// window from its own fire time so windows stay back-to-back.
    pub fn schedule_at(&mut self, due: Duration, task: TimerTask) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry {
            due: due.max(self.now),
            seq,
            id,
            task,
        });
        id
    }

    /// Cancel a timer. Idempotent; unknown ids are ignored.
    pub fn cancel(&mut self, id: TimerId) {
        self.cancelled.insert(id);
    }

    /// Pop the earliest live timer due at or before `target`, moving the
    /// clock to its due time. Returns `None` when nothing is due, leaving
    /// the clock untouched so the caller finishes with [`advance_to`].
    ///
    /// [`advance_to`]: Scheduler::advance_to
    pub fn pop_due(&mut self, target: Duration) -> Option<FiredTimer> {
        while let Some(entry) = self.queue.peek() {
            if entry.due > target {
                return None;
            }
            let entry = self.queue.pop().expect("peeked entry exists");
            if self.cancelled.remove(&entry.id) {
                continue;
            }
            self.now = self.now.max(entry.due);
            return Some(FiredTimer {
                id: entry.id,
                due: entry.due,
                task: entry.task,
            });
        }
        None
    }

    /// Move the clock forward to `target`. Moving backwards is a no-op;
    /// the clock is monotonic.
    pub fn advance_to(&mut self, target: Duration) {
        if target > self.now {
            self.now = target;
        }
    }

    /// Due time of the earliest live timer, if any
    pub fn next_due(&self) -> Option<Duration> {
        self.queue
            .iter()
            .filter(|e| !self.cancelled.contains(&e.id))
            .map(|e| e.due)
            .min()
    }
}
