//! Order key cell for scene members.
//!
//! A [`Priority`] holds the integer key a member is sorted by (update order or
//! draw order) and notifies a single observer whenever the value changes. The
//! [`Scene`](crate::scene::Scene) installs that observer when the member is
//! registered and removes it on unregistration, so members never need to know
//! which scene they belong to.
//!
//! # Example
//!
//! ```ignore
//! struct Enemy {
//!     update: Priority,
//!     draw: Priority,
//! }
//!
//! // Later, from any thread:
//! enemy.update.set(20); // the owning scene relocates the enemy immediately
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// Callback fired after the value of a [`Priority`] changed.
pub(crate) type PriorityObserver = Arc<dyn Fn() + Send + Sync>;

/// Integer order key with change notification.
///
/// Lower values run (or draw) first. `set` only notifies when the stored
/// value actually changes.
pub struct Priority {
    value: AtomicI32,
    observer: Mutex<Option<PriorityObserver>>,
}

impl Priority {
    pub fn new(value: i32) -> Self {
        Priority {
            value: AtomicI32::new(value),
            observer: Mutex::new(None),
        }
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> i32 {
        self.value.load(Ordering::Acquire)
    }

    /// Store a new value and notify the observer if it differs from the old one.
    pub fn set(&self, value: i32) {
        let previous = self.value.swap(value, Ordering::AcqRel);
        if previous == value {
            return;
        }
        // Clone out of the slot so the observer runs without the slot locked.
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer();
        }
    }

    /// Returns `true` while a scene is listening to this cell.
    pub fn is_observed(&self) -> bool {
        self.observer.lock().is_some()
    }

    /// Install `observer` if the slot is free. Returns `false` when another
    /// observer is already installed.
    pub(crate) fn try_observe(&self, observer: PriorityObserver) -> bool {
        let mut slot = self.observer.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(observer);
        true
    }

    pub(crate) fn clear_observer(&self) {
        self.observer.lock().take();
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Priority")
            .field("value", &self.get())
            .field("observed", &self.is_observed())
            .finish()
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_observer() -> (Arc<AtomicUsize>, PriorityObserver) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let observer: PriorityObserver = Arc::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        (hits, observer)
    }

    #[test]
    fn test_default_is_zero() {
        let p = Priority::default();
        assert_eq!(p.get(), 0);
        assert!(!p.is_observed());
    }

    #[test]
    fn test_set_notifies_only_on_change() {
        let p = Priority::new(3);
        let (hits, observer) = counting_observer();
        assert!(p.try_observe(observer));

        p.set(3);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        p.set(7);
        assert_eq!(p.get(), 7);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_observer_is_refused() {
        let p = Priority::new(0);
        let (_, first) = counting_observer();
        let (_, second) = counting_observer();
        assert!(p.try_observe(first));
        assert!(!p.try_observe(second));
    }

    #[test]
    fn test_clear_observer_stops_notifications() {
        let p = Priority::new(0);
        let (hits, observer) = counting_observer();
        assert!(p.try_observe(observer));
        p.clear_observer();
        assert!(!p.is_observed());

        p.set(10);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_observer_may_read_the_cell() {
        let p = Arc::new(Priority::new(1));
        let seen = Arc::new(AtomicI32::new(0));
        let (pp, s) = (Arc::downgrade(&p), seen.clone());
        assert!(p.try_observe(Arc::new(move || {
            if let Some(p) = pp.upgrade() {
                s.store(p.get(), Ordering::SeqCst);
            }
        })));
        p.set(42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }
}
