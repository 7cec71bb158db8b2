#![forbid(unsafe_code)]

//! Contracts a host implements to expose its native change detection.
//!
//! The observation pipeline never talks to a platform API directly. A host
//! (a browser binding, a terminal UI, the in-memory simulator used by tests)
//! supplies three capabilities:
//!
//! - a [`Surface`] that can synchronously measure an element,
//! - one or more [`NativeMechanism`]s that call back when an element may have
//!   changed size,
//! - a [`Host`] that says which of those exist in the current environment.
//!
//! # Invariants
//!
//! 1. A mechanism holds at most one listener per element; `listen` on an
//!    element that already has one replaces it.
//! 2. After `unlisten(element)` returns, the mechanism never calls that
//!    element's listener again.
//! 3. Listeners may fire spuriously (no actual size change). Consumers are
//!    expected to re-measure and compare.

use std::fmt;
use std::rc::Rc;

use crate::geometry::{ElementId, Size};

/// Raw "something may have changed" notification from a native mechanism.
pub type ChangeListener = Rc<dyn Fn()>;

/// Which native mechanism a detector is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MechanismKind {
    /// Scroll-based polling: hidden overflow children whose scroll events
    /// fire when the parent box changes. Available wherever a surface is.
    Scroll,
    /// Observer-based: the platform's native resize observer. Not
    /// universally available.
    Observer,
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scroll => f.write_str("scroll"),
            Self::Observer => f.write_str("resize-observer"),
        }
    }
}

/// The rendering surface elements live on.
pub trait Surface {
    /// Read the current bounding size of `element`.
    ///
    /// Returns `None` when the element is not (or no longer) on the surface.
    fn measure(&self, element: ElementId) -> Option<Size>;
}

/// A per-element change notification source.
///
/// One instance serves many elements and demultiplexes by [`ElementId`].
pub trait NativeMechanism {
    /// Start calling `listener` whenever `element` may have changed size.
    fn listen(&self, element: ElementId, listener: ChangeListener);

    /// Stop notifications for `element` and release anything tied to it.
    /// Unlistening an element that has no listener is a no-op.
    fn unlisten(&self, element: ElementId);
}

/// The environment a detector is constructed in.
pub trait Host {
    /// The rendering surface, or `None` in a headless context.
    fn surface(&self) -> Option<Rc<dyn Surface>>;

    /// Whether `kind` can be created in this environment.
    fn supports(&self, kind: MechanismKind) -> bool;

    /// Create a fresh mechanism instance of `kind`.
    ///
    /// Detectors call this lazily, at most once each, on first observe.
    fn create_mechanism(&self, kind: MechanismKind) -> Option<Rc<dyn NativeMechanism>>;
}

/// A host with no rendering surface and no mechanisms.
///
/// Detectors built on it are inert, which is what code evaluated outside an
/// interactive context should get.
#[derive(Debug, Clone, Copy, Default)]
pub struct Headless;

impl Host for Headless {
    fn surface(&self) -> Option<Rc<dyn Surface>> {
        None
    }

    fn supports(&self, _kind: MechanismKind) -> bool {
        false
    }

    fn create_mechanism(&self, _kind: MechanismKind) -> Option<Rc<dyn NativeMechanism>> {
        None
    }
}
