#![forbid(unsafe_code)]

//! Core: geometry, time sources, and native mechanism contracts.
//!
//! # Role in sizewatch
//! `sizewatch-core` is the bottom layer. It owns the value types every other
//! crate speaks ([`Size`], [`ElementId`]), the swappable time source used by
//! rate regulators, and the traits a host implements to expose its native
//! change-detection mechanisms.
//!
//! # Primary responsibilities
//! - **Geometry**: [`Size`] compared structurally, [`ElementId`] as an opaque
//!   element key.
//! - **Time**: [`time::TimeSource`] with a deterministic [`time::VirtualClock`]
//!   and a host-driven [`time::WallClock`].
//! - **Native contracts**: [`native::Host`], [`native::Surface`],
//!   [`native::NativeMechanism`].
//! - **Errors**: configuration and lifecycle errors surfaced synchronously.
//!
//! # How it fits in the system
//! `sizewatch-runtime` builds regulators, detectors, and observation sessions
//! on top of these contracts. `sizewatch-harness` implements the native
//! contracts in memory for deterministic tests.

pub mod error;
pub mod geometry;
pub mod logging;
pub mod native;
pub mod time;

pub use error::{ConfigurationError, Error, LifecycleError};
pub use geometry::{ElementId, Size, SizeCallback};
pub use native::{ChangeListener, Headless, Host, MechanismKind, NativeMechanism, Surface};
pub use time::{TimeSource, TimerCallback, TimerHandle, VirtualClock, WallClock};
