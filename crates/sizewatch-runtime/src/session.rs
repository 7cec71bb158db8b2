#![forbid(unsafe_code)]

//! Per-element observation lifecycle for UI bindings.
//!
//! An [`ObservationSession`] is what a component binding holds: it maps
//! mount to [`attach`](ObservationSession::attach), unmount to
//! [`detach`](ObservationSession::detach), and reads
//! [`size`](ObservationSession::size) when rendering.
//!
//! # State machine
//!
//! ```text
//!               attach(e)
//!   Unattached ───────────▶ Attached(e, teardown)
//!        ▲                        │
//!        └────────────────────────┘
//!          detach(): teardown once, size := default
//! ```
//!
//! Attaching while attached and detaching while unattached are lifecycle
//! errors. Dropping an attached session runs its teardown.
//!
//! Every report reaches consumers through a [`SizeState`], so a size equal
//! to the last delivered one never triggers a downstream update.

use std::fmt;
use std::rc::Rc;

use sizewatch_core::{ElementId, Host, LifecycleError, Size, SizeCallback};
use tracing::debug;

use crate::detector::{Detector, SizeOnce};
use crate::state::{SizeState, Subscription};

/// Configuration for an observation session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Size reported while no element is attached.
    pub default_size: Size,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_size: Size::ZERO,
        }
    }
}

impl SessionConfig {
    /// Set the size reported while detached.
    #[must_use]
    pub fn with_default_size(mut self, size: Size) -> Self {
        self.default_size = size;
        self
    }
}

/// One-shot cleanup for an active observation.
struct Teardown(Option<Box<dyn FnOnce()>>);

impl Teardown {
    fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    fn run(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

struct Attachment {
    element: ElementId,
    teardown: Teardown,
}

/// Observes at most one element at a time and exposes its size.
pub struct ObservationSession {
    detector: Rc<dyn Detector>,
    config: SessionConfig,
    size: SizeState,
    attachment: Option<Attachment>,
}

impl ObservationSession {
    /// A detached session reporting through `detector`.
    ///
    /// The detector is shared: many sessions can observe through one
    /// detector (and therefore one native mechanism instance).
    #[must_use]
    pub fn new(detector: Rc<dyn Detector>) -> Self {
        Self::with_config(detector, SessionConfig::default())
    }

    #[must_use]
    pub fn with_config(detector: Rc<dyn Detector>, config: SessionConfig) -> Self {
        Self {
            detector,
            config,
            size: SizeState::new(config.default_size),
            attachment: None,
        }
    }

    /// A session that measures once on attach and never updates.
    #[must_use]
    pub fn size_once(host: &dyn Host) -> Self {
        Self::new(SizeOnce::create(host))
    }

    /// Start observing `element`.
    ///
    /// The current size is reported before this returns.
    pub fn attach(&mut self, element: ElementId) -> Result<(), LifecycleError> {
        if let Some(current) = &self.attachment {
            return Err(LifecycleError::AlreadyAttached {
                current: current.element,
                requested: element,
            });
        }

        let state = self.size.clone();
        let on_size: SizeCallback = Rc::new(move |size: Size| {
            state.set(size);
        });
        self.detector.observe(element, on_size);

        let detector = Rc::clone(&self.detector);
        self.attachment = Some(Attachment {
            element,
            teardown: Teardown::new(move || detector.unobserve(element)),
        });
        debug!(%element, size = %self.size.get(), "session attached");
        Ok(())
    }

    /// Stop observing and reset the size to the configured default.
    pub fn detach(&mut self) -> Result<(), LifecycleError> {
        let mut attachment = self.attachment.take().ok_or(LifecycleError::NotAttached)?;
        attachment.teardown.run();
        self.size.set(self.config.default_size);
        debug!(element = %attachment.element, "session detached");
        Ok(())
    }

    /// Last delivered size, or the default while detached.
    #[must_use]
    pub fn size(&self) -> Size {
        self.size.get()
    }

    /// Number of size changes propagated so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.size.version()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// The attached element, if any.
    #[must_use]
    pub fn element(&self) -> Option<ElementId> {
        self.attachment.as_ref().map(|a| a.element)
    }

    /// Call `listener` on every propagated size change.
    pub fn subscribe(&self, listener: impl Fn(&Size) + 'static) -> Subscription {
        self.size.subscribe(listener)
    }

    /// The underlying state cell.
    #[must_use]
    pub fn state(&self) -> &SizeState {
        &self.size
    }
}

impl Drop for ObservationSession {
    fn drop(&mut self) {
        if let Some(mut attachment) = self.attachment.take() {
            attachment.teardown.run();
        }
    }
}

impl fmt::Debug for ObservationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationSession")
            .field("element", &self.element())
            .field("size", &self.size())
            .field("version", &self.version())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
