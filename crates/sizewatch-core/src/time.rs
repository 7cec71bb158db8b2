#![forbid(unsafe_code)]

//! Swappable time sources for timer-driven regulation.
//!
//! # Design
//!
//! Time is a monotonic [`Duration`] measured from the time source's own
//! origin, the same convention a host-driven runner uses when it feeds
//! `performance.now()` into a step function. Timers live in a single ordered
//! queue keyed by `(deadline, sequence)`, so timers due at the same instant
//! fire in the order they were scheduled.
//!
//! Two implementations are provided:
//!
//! - [`VirtualClock`]: time only moves when the test calls
//!   [`advance`](VirtualClock::advance). Fully deterministic.
//! - [`WallClock`]: time follows the platform monotonic clock; the host loop
//!   calls [`run_due`](WallClock::run_due) and sizes its poll timeout with
//!   [`time_until_next`](WallClock::time_until_next).
//!
//! # Invariants
//!
//! 1. `cancel(handle)` removes the timer from the queue. A cancelled timer
//!    never fires, even when it was due at the very instant being processed.
//! 2. Timers are popped one at a time and the queue is not borrowed while a
//!    callback runs, so callbacks may schedule or cancel other timers.
//! 3. A zero delay still defers the callback until the next firing pass; it
//!    is never invoked from inside `schedule_after`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use web_time::Instant;

/// Deferred work handed to a time source.
pub type TimerCallback = Box<dyn FnOnce()>;

/// Identifies a scheduled timer for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Schedules deferred callbacks.
pub trait TimeSource {
    /// Current time since this source's origin.
    fn now(&self) -> Duration;

    /// Run `callback` once, no earlier than `delay` from now.
    ///
    /// A deadline beyond [`Duration::MAX`] saturates to it.
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Remove a scheduled timer. Returns `false` if it already fired or was
    /// already cancelled.
    fn cancel(&self, handle: TimerHandle) -> bool;
}

/// Ordered set of pending timers shared by both clock implementations.
#[derive(Default)]
struct TimerQueue {
    next_seq: u64,
    timers: BTreeMap<(Duration, u64), TimerCallback>,
    deadlines: HashMap<u64, Duration>,
}

impl TimerQueue {
    fn insert(&mut self, deadline: Duration, callback: TimerCallback) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert((deadline, seq), callback);
        self.deadlines.insert(seq, deadline);
        TimerHandle(seq)
    }

    fn remove(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle.0) {
            Some(deadline) => self.timers.remove(&(deadline, handle.0)).is_some(),
            None => false,
        }
    }

    /// Pop the earliest timer if it is due at or before `now`.
    fn pop_due(&mut self, now: Duration) -> Option<(Duration, TimerCallback)> {
        let entry = self.timers.first_entry()?;
        let (deadline, seq) = *entry.key();
        if deadline > now {
            return None;
        }
        let callback = entry.remove();
        self.deadlines.remove(&seq);
        Some((deadline, callback))
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.timers.keys().next().map(|(deadline, _)| *deadline)
    }

    fn len(&self) -> usize {
        self.timers.len()
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.timers.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// VirtualClock
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct VirtualState {
    now: Duration,
    queue: TimerQueue,
}

/// Deterministic, manually advanced time source.
///
/// Cloning a `VirtualClock` creates another handle to the **same** clock, so
/// a test can keep one handle and give another (boxed as
/// `Rc<dyn TimeSource>`) to the code under test.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    inner: Rc<RefCell<VirtualState>>,
}

impl VirtualClock {
    /// A clock at time zero with no pending timers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// This clock as a shared time source.
    #[must_use]
    pub fn source(&self) -> Rc<dyn TimeSource> {
        Rc::new(self.clone())
    }

    /// Move time forward by `by`, firing every timer that becomes due.
    ///
    /// Returns the number of timers fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now().saturating_add(by);
        self.advance_to(target)
    }

    /// Move time forward to `target`, firing due timers in deadline order.
    ///
    /// While a timer fires, [`now`](TimeSource::now) reads as that timer's
    /// deadline. Moving backwards is ignored.
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut fired = 0;
        loop {
            let due = {
                let mut state = self.inner.borrow_mut();
                let due = state.queue.pop_due(target);
                if let Some((deadline, _)) = &due {
                    state.now = state.now.max(*deadline);
                }
                due
            };
            let Some((_, callback)) = due else {
                break;
            };
            callback();
            fired += 1;
        }
        let mut state = self.inner.borrow_mut();
        state.now = state.now.max(target);
        fired
    }

    /// Fire timers already due without moving time (zero-delay timers).
    pub fn run_pending(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    /// Number of scheduled timers that have neither fired nor been cancelled.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Deadline of the earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner.borrow().queue.next_deadline()
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let mut state = self.inner.borrow_mut();
        let deadline = state.now.saturating_add(delay);
        state.queue.insert(deadline, callback)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        self.inner.borrow_mut().queue.remove(handle)
    }
}

// ---------------------------------------------------------------------------
// WallClock
// ---------------------------------------------------------------------------

/// Time source following the platform monotonic clock.
///
/// Nothing fires on its own: the host's event loop calls
/// [`run_due`](Self::run_due) each iteration, and can bound how long it
/// blocks waiting for input with [`time_until_next`](Self::time_until_next).
#[derive(Debug)]
pub struct WallClock {
    origin: Instant,
    queue: RefCell<TimerQueue>,
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock {
    /// A clock whose origin is the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            queue: RefCell::new(TimerQueue::default()),
        }
    }

    /// Fire every timer whose deadline has passed. Returns the number fired.
    pub fn run_due(&self) -> usize {
        let mut fired = 0;
        loop {
            let due = self.queue.borrow_mut().pop_due(self.now());
            let Some((_, callback)) = due else {
                break;
            };
            callback();
            fired += 1;
        }
        fired
    }

    /// Time left until the earliest pending timer is due, or `None` when no
    /// timer is pending. Zero when a timer is already overdue.
    #[must_use]
    pub fn time_until_next(&self) -> Option<Duration> {
        let next = self.queue.borrow().next_deadline()?;
        Some(next.saturating_sub(self.now()))
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let deadline = self.now().saturating_add(delay);
        self.queue.borrow_mut().insert(deadline, callback)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        self.queue.borrow_mut().remove(handle)
    }
}
