#![forbid(unsafe_code)]

//! Timestamped capture of size deliveries.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use sizewatch_core::{Size, SizeCallback, TimeSource, VirtualClock};

/// One size delivered to a consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delivery {
    /// Virtual time of the delivery.
    pub at: Duration,
    pub size: Size,
}

/// Records every size passed to its [`callback`](Self::callback).
#[derive(Debug, Clone)]
pub struct Recorder {
    clock: VirtualClock,
    log: Rc<RefCell<Vec<Delivery>>>,
}

impl Recorder {
    #[must_use]
    pub fn new(clock: &VirtualClock) -> Self {
        Self {
            clock: clock.clone(),
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A callback appending to this recorder.
    #[must_use]
    pub fn callback(&self) -> SizeCallback {
        let clock = self.clock.clone();
        let log = Rc::clone(&self.log);
        Rc::new(move |size: Size| {
            log.borrow_mut().push(Delivery {
                at: clock.now(),
                size,
            });
        })
    }

    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.log.borrow().clone()
    }

    /// Delivered sizes, in order.
    #[must_use]
    pub fn sizes(&self) -> Vec<Size> {
        self.log.borrow().iter().map(|d| d.size).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    /// The most recent delivery.
    #[must_use]
    pub fn last(&self) -> Option<Delivery> {
        self.log.borrow().last().copied()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_with_virtual_timestamps() {
        let clock = VirtualClock::new();
        let recorder = Recorder::new(&clock);
        let callback = recorder.callback();

        callback(Size::new(1.0, 1.0));
        clock.advance(Duration::from_millis(30));
        callback(Size::new(2.0, 2.0));

        assert_eq!(
            recorder.deliveries(),
            vec![
                Delivery {
                    at: Duration::ZERO,
                    size: Size::new(1.0, 1.0)
                },
                Delivery {
                    at: Duration::from_millis(30),
                    size: Size::new(2.0, 2.0)
                },
            ]
        );
        assert_eq!(recorder.len(), 2);

        recorder.clear();
        assert!(recorder.is_empty());
        assert_eq!(recorder.last(), None);
    }
}
