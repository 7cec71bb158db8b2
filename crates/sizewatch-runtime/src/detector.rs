#![forbid(unsafe_code)]

//! Size detectors: turn native change notifications into size reports.
//!
//! # Contract
//!
//! Every [`Detector`] exposes `observe(element, on_size)` and
//! `unobserve(element)`:
//!
//! - `observe` measures the element and calls `on_size` with its current
//!   size **before returning**. Ongoing detectors then forward later sizes,
//!   each passed through the configured [`Regulator`]. The first report
//!   always bypasses the regulator.
//! - `unobserve` stops delivery, cancels a pending regulated delivery, and
//!   releases the element's native listener. Calling it again, or for an
//!   element never observed, is a no-op.
//!
//! Observing an element that is already observed through the same detector
//! is caller error. The detector does not try to merge the two
//! subscriptions: it logs a warning and replaces the old one.
//!
//! # Variants
//!
//! | Detector           | Ongoing | Regulated | Native mechanism            |
//! |--------------------|---------|-----------|-----------------------------|
//! | [`SizeOnce`]       | no      | no        | none (one measurement)      |
//! | [`ScrollDetector`] | yes     | yes       | [`MechanismKind::Scroll`]   |
//! | [`ObserverDetector`] | yes   | yes       | [`MechanismKind::Observer`] |
//! | [`InertDetector`]  | no      | no        | none (headless hosts)       |
//!
//! Ongoing detectors create their native mechanism lazily, on the first
//! `observe`, and share that one instance across every element they observe.

use std::cell::{Cell, OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use sizewatch_core::{
    ConfigurationError, ElementId, Host, MechanismKind, NativeMechanism, Size, SizeCallback,
    Surface, TimeSource,
};
use tracing::{debug, trace, warn};

use crate::regulator::{CancellableCallback, Regulator};

/// Environment variable read by [`DetectorConfig::from_env`].
pub const REGULATOR_ENV: &str = "SIZEWATCH_REGULATOR";

/// Observes elements and reports their sizes.
pub trait Detector {
    /// Start reporting sizes of `element` to `on_size`.
    fn observe(&self, element: ElementId, on_size: SizeCallback);

    /// Stop reporting sizes of `element`.
    fn unobserve(&self, element: ElementId);
}

/// Configuration for ongoing detectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Rate shaping applied to every report after the first.
    pub regulator: Regulator,
}

impl DetectorConfig {
    /// Set the regulator.
    #[must_use]
    pub fn with_regulator(mut self, regulator: Regulator) -> Self {
        self.regulator = regulator;
        self
    }

    /// Default config, with the regulator overridden by `SIZEWATCH_REGULATOR`
    /// when it holds a valid value.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = get_env(REGULATOR_ENV) {
            match Regulator::from_env_value(&raw) {
                Some(regulator) => config.regulator = regulator,
                None => warn!(value = %raw, "ignoring invalid SIZEWATCH_REGULATOR value"),
            }
        }
        config
    }
}

// ---------------------------------------------------------------------------
// SizeOnce / Inert
// ---------------------------------------------------------------------------

/// Reports the current size once, synchronously, and never again.
pub struct SizeOnce {
    surface: Rc<dyn Surface>,
}

impl SizeOnce {
    /// A one-shot detector measuring on `host`'s surface, or an inert one
    /// when the host is headless.
    #[must_use]
    pub fn create(host: &dyn Host) -> Rc<dyn Detector> {
        match host.surface() {
            Some(surface) => Rc::new(Self { surface }),
            None => Rc::new(InertDetector),
        }
    }
}

impl Detector for SizeOnce {
    fn observe(&self, element: ElementId, on_size: SizeCallback) {
        match self.surface.measure(element) {
            Some(size) => on_size(size),
            None => warn!(%element, "element has no size on the surface"),
        }
    }

    fn unobserve(&self, _element: ElementId) {}
}

impl fmt::Debug for SizeOnce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SizeOnce").finish_non_exhaustive()
    }
}

/// Detector for hosts without a rendering surface. Never reports anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct InertDetector;

impl Detector for InertDetector {
    fn observe(&self, element: ElementId, _on_size: SizeCallback) {
        trace!(%element, "inert detector ignoring observe");
    }

    fn unobserve(&self, _element: ElementId) {}
}

// ---------------------------------------------------------------------------
// Native detectors
// ---------------------------------------------------------------------------

/// Per-element observation state.
struct Watch {
    element: ElementId,
    /// Last size forwarded for this element, for de-duplication.
    last: Cell<Option<Size>>,
    regulated: Box<dyn CancellableCallback>,
}

impl Watch {
    /// Re-measure after a native notification and forward real changes.
    fn on_native_change(&self, surface: &dyn Surface) {
        let Some(size) = surface.measure(self.element) else {
            warn!(element = %self.element, "element vanished from the surface");
            return;
        };
        if self.last.get() == Some(size) {
            trace!(element = %self.element, %size, "suppressed unchanged size");
            return;
        }
        self.last.set(Some(size));
        self.regulated.call(size);
    }
}

/// Shared machinery behind [`ScrollDetector`] and [`ObserverDetector`].
struct NativeDetector {
    kind: MechanismKind,
    host: Rc<dyn Host>,
    surface: Rc<dyn Surface>,
    time: Rc<dyn TimeSource>,
    config: DetectorConfig,
    mechanism: OnceCell<Option<Rc<dyn NativeMechanism>>>,
    watches: RefCell<HashMap<ElementId, Rc<Watch>>>,
}

impl NativeDetector {
    fn new(
        kind: MechanismKind,
        host: Rc<dyn Host>,
        surface: Rc<dyn Surface>,
        time: Rc<dyn TimeSource>,
        config: DetectorConfig,
    ) -> Self {
        Self {
            kind,
            host,
            surface,
            time,
            config,
            mechanism: OnceCell::new(),
            watches: RefCell::new(HashMap::new()),
        }
    }

    /// The shared mechanism instance, created on first use.
    fn mechanism(&self) -> Option<&Rc<dyn NativeMechanism>> {
        self.mechanism
            .get_or_init(|| {
                let mechanism = self.host.create_mechanism(self.kind);
                match &mechanism {
                    Some(_) => debug!(kind = %self.kind, "native mechanism created"),
                    None => warn!(kind = %self.kind, "host could not create native mechanism"),
                }
                mechanism
            })
            .as_ref()
    }

    fn observe(&self, element: ElementId, on_size: SizeCallback) {
        if self.watches.borrow().contains_key(&element) {
            warn!(%element, kind = %self.kind, "element observed twice without unobserve");
            self.unobserve(element);
        }

        let initial = self.surface.measure(element);
        match initial {
            Some(size) => on_size(size),
            None => warn!(%element, "element has no size on the surface"),
        }

        let watch = Rc::new(Watch {
            element,
            last: Cell::new(initial),
            regulated: self.config.regulator.apply(&self.time, on_size),
        });
        self.watches.borrow_mut().insert(element, Rc::clone(&watch));

        let Some(mechanism) = self.mechanism() else {
            return;
        };
        let weak: Weak<Watch> = Rc::downgrade(&watch);
        let surface = Rc::clone(&self.surface);
        mechanism.listen(
            element,
            Rc::new(move || {
                if let Some(watch) = weak.upgrade() {
                    watch.on_native_change(surface.as_ref());
                }
            }),
        );
        debug!(
            %element,
            kind = %self.kind,
            regulator = %self.config.regulator,
            "observing"
        );
    }

    fn unobserve(&self, element: ElementId) {
        let Some(watch) = self.watches.borrow_mut().remove(&element) else {
            trace!(%element, "unobserve of unobserved element ignored");
            return;
        };
        watch.regulated.cancel();
        if let Some(mechanism) = self.mechanism.get().and_then(Option::as_ref) {
            mechanism.unlisten(element);
        }
        debug!(%element, kind = %self.kind, "unobserved");
    }

    fn observed_count(&self) -> usize {
        self.watches.borrow().len()
    }
}

impl fmt::Debug for NativeDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeDetector")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .field("mechanism_created", &self.mechanism.get().is_some())
            .field("observed", &self.observed_count())
            .finish()
    }
}

/// Ongoing detector built on the scroll-based mechanism.
#[derive(Debug)]
pub struct ScrollDetector {
    inner: NativeDetector,
}

impl ScrollDetector {
    /// Build a scroll detector, or an inert one on a headless host.
    ///
    /// The scroll mechanism needs nothing beyond a surface, so this never
    /// fails.
    #[must_use]
    pub fn create(
        host: Rc<dyn Host>,
        time: Rc<dyn TimeSource>,
        config: DetectorConfig,
    ) -> Rc<dyn Detector> {
        match Self::try_new(host, time, config) {
            Ok(detector) => Rc::new(detector),
            Err(_) => {
                debug!("headless host, scroll detector is inert");
                Rc::new(InertDetector)
            }
        }
    }

    /// Build a scroll detector without the headless fallback.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::MechanismUnavailable`] when the host has no
    /// rendering surface.
    pub fn try_new(
        host: Rc<dyn Host>,
        time: Rc<dyn TimeSource>,
        config: DetectorConfig,
    ) -> Result<Self, ConfigurationError> {
        let surface = host
            .surface()
            .ok_or(ConfigurationError::MechanismUnavailable(MechanismKind::Scroll))?;
        Ok(Self {
            inner: NativeDetector::new(MechanismKind::Scroll, host, surface, time, config),
        })
    }

    /// Number of elements currently observed.
    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.inner.observed_count()
    }
}

impl Detector for ScrollDetector {
    fn observe(&self, element: ElementId, on_size: SizeCallback) {
        self.inner.observe(element, on_size);
    }

    fn unobserve(&self, element: ElementId) {
        self.inner.unobserve(element);
    }
}

/// Ongoing detector built on the platform's native resize observer.
#[derive(Debug)]
pub struct ObserverDetector {
    inner: NativeDetector,
}

impl ObserverDetector {
    /// Build an observer detector.
    ///
    /// On a headless host this yields an inert detector. On a host with a
    /// surface but no observer capability it fails immediately rather than
    /// on first observe.
    pub fn create(
        host: Rc<dyn Host>,
        time: Rc<dyn TimeSource>,
        config: DetectorConfig,
    ) -> Result<Rc<dyn Detector>, ConfigurationError> {
        if host.surface().is_none() {
            debug!("headless host, observer detector is inert");
            return Ok(Rc::new(InertDetector));
        }
        Ok(Rc::new(Self::try_new(host, time, config)?))
    }

    /// Build an observer detector without the headless fallback.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::MechanismUnavailable`] when the host has no
    /// rendering surface or no observer capability.
    pub fn try_new(
        host: Rc<dyn Host>,
        time: Rc<dyn TimeSource>,
        config: DetectorConfig,
    ) -> Result<Self, ConfigurationError> {
        let unavailable = ConfigurationError::MechanismUnavailable(MechanismKind::Observer);
        let surface = host.surface().ok_or(unavailable)?;
        if !host.supports(MechanismKind::Observer) {
            return Err(unavailable);
        }
        Ok(Self {
            inner: NativeDetector::new(MechanismKind::Observer, host, surface, time, config),
        })
    }

    /// Number of elements currently observed.
    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.inner.observed_count()
    }
}

impl Detector for ObserverDetector {
    fn observe(&self, element: ElementId, on_size: SizeCallback) {
        self.inner.observe(element, on_size);
    }

    fn unobserve(&self, element: ElementId) {
        self.inner.unobserve(element);
    }
}
