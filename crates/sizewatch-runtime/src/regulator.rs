#![forbid(unsafe_code)]

//! Rate regulators: reshape when size reports reach a consumer.
//!
//! A [`Regulator`] is a small `Copy` description (`Immediate`, `Debounce`,
//! `Throttle`). [`Regulator::apply`] wraps a consumer callback and returns a
//! fresh [`CancellableCallback`] with its own timer state, so one regulator
//! value can be applied to any number of callbacks independently.
//!
//! # Timing
//!
//! | Variant    | Delivery                                                   |
//! |------------|------------------------------------------------------------|
//! | Immediate  | synchronously, every report                                |
//! | Debounce   | last report of a burst, `delay` after the burst goes quiet |
//! | Throttle   | latest report of a frame, at the next frame boundary       |
//!
//! Debounce and throttle always go through the [`TimeSource`], including
//! for a zero delay, so a report is never delivered from inside `call`.
//!
//! # Cancellation
//!
//! `cancel()` removes the pending timer from the time source. A delivery
//! that has been cancelled cannot fire afterwards, however far the clock is
//! advanced. Dropping a regulated callback cancels it as well.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use sizewatch_core::{Size, SizeCallback, TimeSource, TimerHandle};
use tracing::trace;

/// A size callback whose not-yet-delivered invocation can be suppressed.
pub trait CancellableCallback {
    /// Report a size. Depending on the regulator it is delivered now, later,
    /// or replaced by a newer report.
    fn call(&self, size: Size);

    /// Drop any pending delivery. No-op when nothing is pending.
    fn cancel(&self);

    /// True while a delivery is scheduled but has not fired yet.
    fn is_pending(&self) -> bool;
}

/// How reports are shaped in time before reaching the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Regulator {
    /// Pass every report straight through.
    #[default]
    Immediate,
    /// Deliver the last report once no report arrived for this long.
    Debounce(Duration),
    /// Deliver at most once per frame of this length, anchored at creation.
    Throttle(Duration),
}

impl Regulator {
    /// No rate shaping.
    #[must_use]
    pub const fn none() -> Self {
        Self::Immediate
    }

    #[must_use]
    pub const fn debounce(delay: Duration) -> Self {
        Self::Debounce(delay)
    }

    #[must_use]
    pub const fn throttle(frame: Duration) -> Self {
        Self::Throttle(frame)
    }

    /// Parse `none`, `debounce:<ms>` or `throttle:<ms>` (case-insensitive).
    ///
    /// Returns `None` for anything else.
    #[must_use]
    pub fn from_env_value(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if matches!(value.as_str(), "" | "none" | "immediate") {
            return Some(Self::Immediate);
        }
        let (kind, ms) = value.split_once(':')?;
        let delay = Duration::from_millis(ms.trim().parse().ok()?);
        match kind.trim() {
            "debounce" => Some(Self::Debounce(delay)),
            "throttle" => Some(Self::Throttle(delay)),
            _ => None,
        }
    }

    /// Wrap `callback`, creating independent timer state on `time`.
    ///
    /// For [`Regulator::Throttle`] the frame epoch is `time.now()` at the
    /// moment of this call.
    #[must_use]
    pub fn apply(
        self,
        time: &Rc<dyn TimeSource>,
        callback: SizeCallback,
    ) -> Box<dyn CancellableCallback> {
        match self {
            Self::Immediate => Box::new(Immediate { callback }),
            Self::Debounce(delay) => Box::new(Debounced::new(Rc::clone(time), delay, callback)),
            Self::Throttle(frame) => Box::new(Throttled::new(Rc::clone(time), frame, callback)),
        }
    }
}

impl fmt::Display for Regulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("none"),
            Self::Debounce(delay) => write!(f, "debounce:{}", delay.as_millis()),
            Self::Throttle(frame) => write!(f, "throttle:{}", frame.as_millis()),
        }
    }
}

// ---------------------------------------------------------------------------
// Immediate
// ---------------------------------------------------------------------------

struct Immediate {
    callback: SizeCallback,
}

impl CancellableCallback for Immediate {
    fn call(&self, size: Size) {
        (self.callback)(size);
    }

    fn cancel(&self) {}

    fn is_pending(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

struct DebounceState {
    time: Rc<dyn TimeSource>,
    delay: Duration,
    callback: SizeCallback,
    timer: Cell<Option<TimerHandle>>,
}

/// Trailing-edge debounce.
struct Debounced {
    state: Rc<DebounceState>,
}

impl Debounced {
    fn new(time: Rc<dyn TimeSource>, delay: Duration, callback: SizeCallback) -> Self {
        Self {
            state: Rc::new(DebounceState {
                time,
                delay,
                callback,
                timer: Cell::new(None),
            }),
        }
    }
}

impl CancellableCallback for Debounced {
    fn call(&self, size: Size) {
        if let Some(previous) = self.state.timer.take() {
            self.state.time.cancel(previous);
        }
        let weak: Weak<DebounceState> = Rc::downgrade(&self.state);
        let handle = self.state.time.schedule_after(
            self.state.delay,
            Box::new(move || {
                let Some(state) = weak.upgrade() else {
                    return;
                };
                state.timer.set(None);
                trace!(%size, "debounce delivering");
                (state.callback)(size);
            }),
        );
        trace!(%size, delay_ms = self.state.delay.as_millis() as u64, "debounce rescheduled");
        self.state.timer.set(Some(handle));
    }

    fn cancel(&self) {
        if let Some(handle) = self.state.timer.take() {
            self.state.time.cancel(handle);
            trace!("debounce cancelled");
        }
    }

    fn is_pending(&self) -> bool {
        self.state.timer.get().is_some()
    }
}

impl Drop for Debounced {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

struct ThrottleState {
    time: Rc<dyn TimeSource>,
    frame: Duration,
    epoch: Duration,
    callback: SizeCallback,
    timer: Cell<Option<TimerHandle>>,
    latest: Cell<Option<Size>>,
}

impl ThrottleState {
    /// Time remaining until the next frame boundary after now.
    ///
    /// Exactly on a boundary this is a full frame. A zero-length frame has
    /// no boundaries to wait for.
    fn until_next_frame(&self) -> Duration {
        if self.frame.is_zero() {
            return Duration::ZERO;
        }
        let elapsed = self.time.now().saturating_sub(self.epoch);
        let into_frame = elapsed.as_nanos() % self.frame.as_nanos();
        // Exceeds u64 nanoseconds only for frames longer than ~584 years.
        let into_frame = u64::try_from(into_frame).unwrap_or(u64::MAX);
        self.frame.saturating_sub(Duration::from_nanos(into_frame))
    }
}

/// Frame-aligned throttle delivering the latest report per frame.
struct Throttled {
    state: Rc<ThrottleState>,
}

impl Throttled {
    fn new(time: Rc<dyn TimeSource>, frame: Duration, callback: SizeCallback) -> Self {
        let epoch = time.now();
        Self {
            state: Rc::new(ThrottleState {
                time,
                frame,
                epoch,
                callback,
                timer: Cell::new(None),
                latest: Cell::new(None),
            }),
        }
    }
}

impl CancellableCallback for Throttled {
    fn call(&self, size: Size) {
        self.state.latest.set(Some(size));
        if self.state.timer.get().is_some() {
            trace!(%size, "throttle replaced latest");
            return;
        }
        let wait = self.state.until_next_frame();
        let weak: Weak<ThrottleState> = Rc::downgrade(&self.state);
        let handle = self.state.time.schedule_after(
            wait,
            Box::new(move || {
                let Some(state) = weak.upgrade() else {
                    return;
                };
                state.timer.set(None);
                if let Some(latest) = state.latest.take() {
                    trace!(size = %latest, "throttle delivering");
                    (state.callback)(latest);
                }
            }),
        );
        trace!(%size, wait_ms = wait.as_millis() as u64, "throttle armed");
        self.state.timer.set(Some(handle));
    }

    fn cancel(&self) {
        self.state.latest.set(None);
        if let Some(handle) = self.state.timer.take() {
            self.state.time.cancel(handle);
            trace!("throttle cancelled");
        }
    }

    fn is_pending(&self) -> bool {
        self.state.timer.get().is_some()
    }
}

impl Drop for Throttled {
    fn drop(&mut self) {
        self.cancel();
    }
}
