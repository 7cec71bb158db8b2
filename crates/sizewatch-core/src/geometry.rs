#![forbid(unsafe_code)]

//! Element dimensions and element identity.

use std::fmt;
use std::rc::Rc;

/// Visible dimensions of an element, as reported by its bounding box.
///
/// Sizes are plain values: two sizes are the same when their fields are
/// equal, regardless of where they came from. Unlike raw `f64` comparison,
/// a NaN dimension equals another NaN, so a repeated unmeasurable report is
/// recognised as unchanged. `0.0` and `-0.0` are equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// The empty size, used as the default reported size.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Create a size from a width and a height.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True if either dimension is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }
}

fn same_dimension(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl PartialEq for Size {
    fn eq(&self, other: &Self) -> bool {
        same_dimension(self.width, other.width) && same_dimension(self.height, other.height)
    }
}

impl From<(f64, f64)> for Size {
    fn from((width, height): (f64, f64)) -> Self {
        Self::new(width, height)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Consumer callback receiving size reports.
pub type SizeCallback = Rc<dyn Fn(Size)>;

/// Opaque key identifying an element on the host's rendering surface.
///
/// The host decides what the number means (a node index, a DOM handle slot,
/// a widget id). The observation pipeline only uses it as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
