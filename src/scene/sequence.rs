//! Order-sorted member sequence.
//!
//! Each [`OrderSequence`] keeps its slots sorted ascending by the key each
//! member had when it was placed. Insertion short-circuits the common append
//! and prepend cases and falls back to a binary search; relocation after a
//! key change removes and reinserts the member under one lock acquisition.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::Arc;

use super::member::MemberId;

/// Inline capacity of a dispatch copy before it spills to the heap.
pub(crate) const DISPATCH_INLINE: usize = 32;

pub(crate) struct Slot<T: ?Sized> {
    pub id: MemberId,
    pub key: i32,
    pub member: Arc<T>,
}

impl<T: ?Sized> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Slot {
            id: self.id,
            key: self.key,
            member: self.member.clone(),
        }
    }
}

/// Ascending sequence of members keyed by one integer priority.
pub(crate) struct OrderSequence<T: ?Sized> {
    slots: Mutex<Vec<Slot<T>>>,
    key_of: fn(&T) -> i32,
}

impl<T: ?Sized> OrderSequence<T> {
    pub fn new(key_of: fn(&T) -> i32) -> Self {
        OrderSequence {
            slots: Mutex::new(Vec::new()),
            key_of,
        }
    }

    /// Insert `member` at its sorted position, reading its current key.
    #[cfg(test)]
    pub fn insert(&self, id: MemberId, member: Arc<T>) {
        let mut slots = self.slots.lock();
        self.insert_locked(&mut slots, id, member);
    }

    /// Run `admit` while holding this sequence's lock and insert only if it
    /// returns `true`.
    ///
    /// Registration installs the change observer inside `admit`, so a key
    /// change racing with the insertion is relocated after it, never lost.
    pub fn insert_if(&self, id: MemberId, member: Arc<T>, admit: impl FnOnce(&T) -> bool) -> bool {
        let mut slots = self.slots.lock();
        if !admit(&*member) {
            return false;
        }
        self.insert_locked(&mut slots, id, member);
        true
    }

    /// Remove the slot for `id`. Returns the member if it was present.
    pub fn remove(&self, id: MemberId) -> Option<Arc<T>> {
        let mut slots = self.slots.lock();
        let index = slots.iter().position(|s| s.id == id)?;
        Some(slots.remove(index).member)
    }

    /// Move `id` to the position matching its current key. No-op if absent.
    pub fn relocate(&self, id: MemberId) -> bool {
        let mut slots = self.slots.lock();
        let Some(index) = slots.iter().position(|s| s.id == id) else {
            return false;
        };
        let slot = slots.remove(index);
        self.insert_locked(&mut slots, slot.id, slot.member);
        true
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Copy of the current slots, taken under one lock acquisition.
    pub fn snapshot(&self) -> SmallVec<[Slot<T>; DISPATCH_INLINE]> {
        self.slots.lock().iter().cloned().collect()
    }

    pub fn ids(&self) -> Vec<MemberId> {
        self.slots.lock().iter().map(|s| s.id).collect()
    }

    fn insert_locked(&self, slots: &mut Vec<Slot<T>>, id: MemberId, member: Arc<T>) {
        let key = (self.key_of)(&*member);
        let index = insertion_index(slots, key);
        slots.insert(index, Slot { id, key, member });
        debug_assert!(is_sorted(slots), "order sequence lost its ordering");
    }
}

/// Position at which a slot with `key` keeps `slots` sorted.
///
/// 1. empty, or `key >= last` → end
/// 2. `key <= first` → front
/// 3. otherwise binary search; a miss yields the insertion point
fn insertion_index<T: ?Sized>(slots: &[Slot<T>], key: i32) -> usize {
    match (slots.first(), slots.last()) {
        (None, _) | (_, None) => 0,
        (_, Some(last)) if last.key <= key => slots.len(),
        (Some(first), _) if first.key >= key => 0,
        _ => match slots.binary_search_by(|s| s.key.cmp(&key)) {
            Ok(index) | Err(index) => index,
        },
    }
}

fn is_sorted<T: ?Sized>(slots: &[Slot<T>]) -> bool {
    slots.windows(2).all(|w| w[0].key <= w[1].key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct Item {
        name: &'static str,
        key: AtomicI32,
    }

    fn item(name: &'static str, key: i32) -> Arc<Item> {
        Arc::new(Item {
            name,
            key: AtomicI32::new(key),
        })
    }

    fn seq() -> OrderSequence<Item> {
        OrderSequence::new(|i: &Item| i.key.load(Ordering::SeqCst))
    }

    fn names(s: &OrderSequence<Item>) -> Vec<&'static str> {
        s.snapshot().iter().map(|slot| slot.member.name).collect()
    }

    #[test]
    fn test_append_prepend_and_middle() {
        let s = seq();
        s.insert(MemberId(0), item("b", 5));
        s.insert(MemberId(1), item("d", 9));
        s.insert(MemberId(2), item("a", 1));
        s.insert(MemberId(3), item("c", 7));
        assert_eq!(names(&s), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_equal_keys_append_in_insertion_order() {
        let s = seq();
        s.insert(MemberId(0), item("a", 10));
        s.insert(MemberId(1), item("b", 5));
        s.insert(MemberId(2), item("c", 10));
        assert_eq!(names(&s), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_relocate_reads_live_key() {
        let s = seq();
        let b = item("b", 5);
        s.insert(MemberId(0), item("a", 10));
        s.insert(MemberId(1), b.clone());
        s.insert(MemberId(2), item("c", 10));

        b.key.store(20, Ordering::SeqCst);
        assert!(s.relocate(MemberId(1)));
        assert_eq!(names(&s), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_insert_if_refused_leaves_sequence_untouched() {
        let s = seq();
        assert!(!s.insert_if(MemberId(0), item("a", 1), |_| false));
        assert_eq!(s.len(), 0);
        assert!(s.insert_if(MemberId(1), item("b", 1), |i| i.name == "b"));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_relocate_missing_is_noop() {
        let s = seq();
        s.insert(MemberId(0), item("a", 1));
        assert!(!s.relocate(MemberId(9)));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_remove_returns_member() {
        let s = seq();
        s.insert(MemberId(0), item("a", 1));
        s.insert(MemberId(1), item("b", 2));
        let removed = s.remove(MemberId(0)).map(|m| m.name);
        assert_eq!(removed, Some("a"));
        assert!(s.remove(MemberId(0)).is_none());
        assert_eq!(s.ids(), vec![MemberId(1)]);
    }

    #[test]
    fn test_stale_key_does_not_break_ordering() {
        // A key that changed but has not been relocated yet must not mislead
        // later insertions: the sequence sorts by the stored keys.
        let s = seq();
        let stale = item("s", 4);
        s.insert(MemberId(0), item("a", 1));
        s.insert(MemberId(1), item("b", 3));
        s.insert(MemberId(2), stale.clone());
        s.insert(MemberId(3), item("c", 5));
        s.insert(MemberId(4), item("d", 7));

        stale.key.store(100, Ordering::SeqCst);
        s.insert(MemberId(5), item("x", 6));
        s.relocate(MemberId(2));

        assert_eq!(names(&s), vec!["a", "b", "c", "x", "d", "s"]);
        assert!(is_sorted(&s.snapshot()));
    }

    #[test]
    fn test_many_random_inserts_stay_sorted() {
        let s = seq();
        let mut rng = fastrand::Rng::with_seed(7);
        for i in 0..500 {
            s.insert(MemberId(i), item("r", rng.i32(-50..50)));
        }
        assert_eq!(s.len(), 500);
        assert!(is_sorted(&s.snapshot()));
    }
}
