#![forbid(unsafe_code)]

//! In-memory host implementing the native mechanism contracts.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use sizewatch_core::{
    ChangeListener, ElementId, Host, MechanismKind, NativeMechanism, Size, Surface,
};
use tracing::trace;

/// Element sizes keyed by id.
#[derive(Debug, Default)]
pub struct SimulatedSurface {
    sizes: RefCell<HashMap<ElementId, Size>>,
}

impl Surface for SimulatedSurface {
    fn measure(&self, element: ElementId) -> Option<Size> {
        self.sizes.borrow().get(&element).copied()
    }
}

/// A native mechanism instance handed to a detector.
pub struct SimulatedMechanism {
    kind: MechanismKind,
    listeners: RefCell<HashMap<ElementId, ChangeListener>>,
}

impl SimulatedMechanism {
    fn new(kind: MechanismKind) -> Self {
        Self {
            kind,
            listeners: RefCell::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> MechanismKind {
        self.kind
    }

    /// Number of elements with a live listener.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn notify(&self, element: ElementId) {
        // Clone out so the listener can unlisten while running.
        let listener = self.listeners.borrow().get(&element).cloned();
        if let Some(listener) = listener {
            trace!(%element, kind = %self.kind, "simulated native notification");
            listener();
        }
    }
}

impl NativeMechanism for SimulatedMechanism {
    fn listen(&self, element: ElementId, listener: ChangeListener) {
        self.listeners.borrow_mut().insert(element, listener);
    }

    fn unlisten(&self, element: ElementId) {
        self.listeners.borrow_mut().remove(&element);
    }
}

impl fmt::Debug for SimulatedMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedMechanism")
            .field("kind", &self.kind)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[derive(Debug)]
struct HostState {
    surface: Option<Rc<SimulatedSurface>>,
    observer_available: bool,
    next_element: Cell<u64>,
    mechanisms: RefCell<Vec<Rc<SimulatedMechanism>>>,
}

/// Deterministic host for tests and demos.
///
/// Cloning shares the same surface and mechanisms.
#[derive(Debug, Clone)]
pub struct SimulatedHost {
    state: Rc<HostState>,
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHost {
    /// A host with a surface and both mechanisms available.
    #[must_use]
    pub fn new() -> Self {
        Self::build(true, true)
    }

    /// A host with a surface but no native resize observer.
    #[must_use]
    pub fn without_observer() -> Self {
        Self::build(true, false)
    }

    /// A host with no rendering surface.
    #[must_use]
    pub fn headless() -> Self {
        Self::build(false, false)
    }

    fn build(surface: bool, observer_available: bool) -> Self {
        Self {
            state: Rc::new(HostState {
                surface: surface.then(|| Rc::new(SimulatedSurface::default())),
                observer_available,
                next_element: Cell::new(1),
                mechanisms: RefCell::new(Vec::new()),
            }),
        }
    }

    /// This host as a shared trait object.
    #[must_use]
    pub fn shared(&self) -> Rc<dyn Host> {
        Rc::new(self.clone())
    }

    /// Put a new element of `size` on the surface.
    ///
    /// # Panics
    ///
    /// Panics on a headless host.
    pub fn mount(&self, size: Size) -> ElementId {
        let id = self.state.next_element.get();
        self.state.next_element.set(id + 1);
        let element = ElementId::new(id);
        self.surface_map().sizes.borrow_mut().insert(element, size);
        element
    }

    /// Remove `element` from the surface. Later measurements return `None`.
    pub fn unmount(&self, element: ElementId) {
        if let Some(surface) = &self.state.surface {
            surface.sizes.borrow_mut().remove(&element);
        }
    }

    /// Change `element`'s size and notify every mechanism listening to it.
    ///
    /// Notifications fire even when the size did not change, the way a
    /// scroll sensor reacts to any layout pass.
    pub fn resize(&self, element: ElementId, size: Size) {
        self.surface_map().sizes.borrow_mut().insert(element, size);
        self.notify(element);
    }

    /// Resize every mounted element, as when the viewport they fill changes.
    pub fn resize_all(&self, size: Size) {
        let elements: Vec<ElementId> = {
            let mut sizes = self.surface_map().sizes.borrow_mut();
            for slot in sizes.values_mut() {
                *slot = size;
            }
            let mut keys: Vec<_> = sizes.keys().copied().collect();
            keys.sort();
            keys
        };
        for element in elements {
            self.notify(element);
        }
    }

    /// Fire a spurious notification without changing anything.
    pub fn nudge(&self, element: ElementId) {
        self.notify(element);
    }

    /// Current size of `element` on the surface.
    #[must_use]
    pub fn size_of(&self, element: ElementId) -> Option<Size> {
        self.state
            .surface
            .as_ref()
            .and_then(|surface| surface.measure(element))
    }

    /// Live listeners across every mechanism this host created.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state
            .mechanisms
            .borrow()
            .iter()
            .map(|m| m.listener_count())
            .sum()
    }

    /// How many mechanism instances of `kind` detectors have created.
    #[must_use]
    pub fn mechanisms_created(&self, kind: MechanismKind) -> usize {
        self.state
            .mechanisms
            .borrow()
            .iter()
            .filter(|m| m.kind == kind)
            .count()
    }

    fn surface_map(&self) -> &SimulatedSurface {
        match &self.state.surface {
            Some(surface) => surface,
            None => panic!("headless SimulatedHost has no surface"),
        }
    }

    fn notify(&self, element: ElementId) {
        let mechanisms: Vec<Rc<SimulatedMechanism>> = self.state.mechanisms.borrow().clone();
        for mechanism in mechanisms {
            mechanism.notify(element);
        }
    }
}

impl Host for SimulatedHost {
    fn surface(&self) -> Option<Rc<dyn Surface>> {
        self.state
            .surface
            .as_ref()
            .map(|surface| Rc::clone(surface) as Rc<dyn Surface>)
    }

    fn supports(&self, kind: MechanismKind) -> bool {
        match kind {
            MechanismKind::Scroll => self.state.surface.is_some(),
            MechanismKind::Observer => self.state.surface.is_some() && self.state.observer_available,
        }
    }

    fn create_mechanism(&self, kind: MechanismKind) -> Option<Rc<dyn NativeMechanism>> {
        if !self.supports(kind) {
            return None;
        }
        let mechanism = Rc::new(SimulatedMechanism::new(kind));
        self.state.mechanisms.borrow_mut().push(Rc::clone(&mechanism));
        Some(mechanism)
    }
}
