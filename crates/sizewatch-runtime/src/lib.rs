#![forbid(unsafe_code)]

//! Runtime: the observation pipeline.
//!
//! # Role in sizewatch
//! `sizewatch-runtime` composes three layers, bottom-up:
//!
//! ```text
//! native mechanism ─▶ Detector ─▶ Regulator ─▶ SizeState ─▶ consumer
//!                     (dedup)     (timing)     (deep-equality gate)
//! ```
//!
//! - [`regulator`]: immediate, debounce, and throttle rate shaping with
//!   explicit cancellation.
//! - [`detector`]: the `observe`/`unobserve` contract and its one-shot,
//!   scroll-based, observer-based, and inert implementations.
//! - [`session`]: per-element attach/detach lifecycle for UI bindings.
//! - [`state`]: the deep-equality gated value cell sessions report into.
//!
//! # Threading
//! Everything here is single-threaded (`Rc`, `RefCell`). Timers run when the
//! host drives its [`TimeSource`](sizewatch_core::TimeSource).

pub mod detector;
pub mod regulator;
pub mod session;
pub mod state;

pub use detector::{
    Detector, DetectorConfig, InertDetector, ObserverDetector, REGULATOR_ENV, ScrollDetector,
    SizeOnce,
};
pub use regulator::{CancellableCallback, Regulator};
pub use session::{ObservationSession, SessionConfig};
pub use state::{DeepState, SizeState, Subscription};
