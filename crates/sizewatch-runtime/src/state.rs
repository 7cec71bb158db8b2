#![forbid(unsafe_code)]

//! Deep-equality gated state cell.
//!
//! # Design
//!
//! [`DeepState<T>`] holds the last delivered value in shared,
//! reference-counted storage (`Rc<RefCell<..>>`). A new value is propagated
//! only when it differs structurally (`PartialEq`) from the stored one. This
//! is the gate that keeps numerically identical size reports from causing
//! downstream work, whichever path they arrived by (an initial measurement,
//! a regulator delivery, a reset on detach).
//!
//! # Invariants
//!
//! 1. `version` increments by exactly 1 per propagated change.
//! 2. `set(v)` with `v == current` changes nothing and notifies no one.
//! 3. Subscribers run in registration order, after the value is stored.
//! 4. A dropped [`Subscription`] is never called again; its slot is pruned
//!    lazily on the next propagation.
//!
//! # Failure Modes
//!
//! - **Re-entrant set**: no borrow is held while subscribers run, so a
//!   subscriber may call `set` on the same cell. The nested change is
//!   propagated before the outer notification loop resumes.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use sizewatch_core::Size;

type Listener<T> = Rc<dyn Fn(&T)>;

struct Slot<T> {
    value: T,
    version: u64,
    listeners: Vec<Weak<dyn Fn(&T)>>,
}

/// A shared value that only propagates structural changes.
///
/// Cloning creates another handle to the same cell.
pub struct DeepState<T> {
    inner: Rc<RefCell<Slot<T>>>,
}

/// The state cell an observation session reports sizes into.
pub type SizeState = DeepState<Size>;

impl<T> Clone for DeepState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DeepState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("DeepState")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> DeepState<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Slot {
                value,
                version: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Clone of the last delivered value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Store `value` if it differs from the current one and notify
    /// subscribers. Returns whether the value propagated.
    pub fn set(&self, value: T) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return false;
            }
            inner.value = value.clone();
            inner.version += 1;
        }
        self.propagate(&value);
        true
    }

    /// Number of propagated changes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Call `listener` with every propagated value until the returned guard
    /// is dropped.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let strong: Listener<T> = Rc::new(listener);
        self.inner
            .borrow_mut()
            .listeners
            .push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Registered listener slots, including dropped ones not yet pruned.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    fn propagate(&self, value: &T) {
        let live: Vec<Listener<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.listeners.retain(|w| w.strong_count() > 0);
            inner.listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in &live {
            listener(value);
        }
    }
}

/// RAII guard keeping a [`DeepState`] listener alive.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
