#![forbid(unsafe_code)]

//! Test harness and in-memory host for sizewatch.
//!
//! - [`SimulatedHost`]: a [`Host`](sizewatch_core::Host) whose surface is a map of element sizes.
//!   Tests mount elements, resize them, and fire spurious notifications; the
//!   host forwards them to every native mechanism a detector created.
//! - [`Recorder`]: a size callback that timestamps every delivery against a
//!   [`VirtualClock`](sizewatch_core::VirtualClock).
//!
//! Both are deterministic: nothing depends on wall time.

pub mod host;
pub mod recorder;

pub use host::{SimulatedHost, SimulatedMechanism, SimulatedSurface};
pub use recorder::{Delivery, Recorder};
