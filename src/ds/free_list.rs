//! Index-stable free list over a pluggable slot storage.
//!
//! Objects are created into slots and addressed by the slot index. Live slots
//! form the *used chain* (creation/relink order); vacant slots form the *free
//! chain*, whose head is the most recently freed slot and is handed out by
//! the next `create`. Every operation is O(1) except iteration and counting.
//!
//! ## Architecture
//!
//! ```text
//!   storage (S: SlotStorage<T>)
//!   ┌─────┬────────┬────────┬────────┬────────┬────────┐
//!   │ idx │   0    │   1    │   2    │   3    │   4    │
//!   ├─────┼────────┼────────┼────────┼────────┼────────┤
//!   │     │ Occ(4) │ Occ(1) │ Vacant │ Occ(3) │ Occ(5) │
//!   └─────┴────────┴────────┴────────┴────────┴────────┘
//!
//!   used:  first_used ─► [0] ◄──► [1] ◄──► [3] ◄──► [4] ◄── last_used
//!   free:  first_free ─► [2]
//! ```
//!
//! ## Operations
//! - `create(v)`: pop the free chain head (or grow storage by one slot), link
//!   after `last_used`
//! - `remove(id)`: unlink from the used chain, push onto the free chain head;
//!   growable storage then drops trailing vacant slots
//! - `iter()` / `for_each_mut` / `count_if`: walk the used chain
//!
//! ## Failure semantics
//! - Capacity exhaustion: `create` returns `None`, nothing changes
//! - Unknown or out-of-range ids: `None` / `false`, never a panic
//!
//! Ids are indices, not addresses: they stay valid when a growable storage
//! reallocates. Hold ids, not references, across calls that may create.
//!
//! `check_invariants()` verifies both chains against the header.

use std::marker::PhantomData;

use tracing::trace;

use crate::ds::slot::{ChainHeader, NPOS, SlotState};
use crate::error::{AttachError, InvariantError};
use crate::store::fixed::FixedStorage;
use crate::store::growable::GrowableStorage;
use crate::store::region::ShmSafe;
use crate::store::traits::SlotStorage;

/// Free list backed by a [`SlotStorage`].
///
/// # Example
///
/// ```
/// use slotkit::ds::FreeList;
///
/// let mut list = FreeList::new();
/// let a = list.create("a").unwrap();
/// let b = list.create("b").unwrap();
/// assert_eq!(list.get(a), Some(&"a"));
///
/// assert_eq!(list.remove(a), Some("a"));
/// assert_eq!(list.remove(a), None);
///
/// // freed ids are reused first
/// let c = list.create("c").unwrap();
/// assert_eq!(c, a);
/// assert_eq!(list.iter().map(|(_, v)| *v).collect::<Vec<_>>(), ["b", "c"]);
/// # let _ = b;
/// ```
#[derive(Debug)]
pub struct FreeList<T, S = GrowableStorage<T>> {
    storage: S,
    _marker: PhantomData<T>,
}

/// Free list over a fixed-capacity region.
pub type FixedFreeList<'a, T> = FreeList<T, FixedStorage<'a, T>>;

impl<T> FreeList<T, GrowableStorage<T>> {
    /// Creates an empty list over growable storage.
    pub fn new() -> Self {
        Self::from_storage(GrowableStorage::new())
    }

    /// Creates an empty growable list with room for `capacity` slots before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_storage(GrowableStorage::with_capacity(capacity))
    }
}

impl<T> Default for FreeList<T, GrowableStorage<T>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FreeList<T, FixedStorage<'static, T>> {
    /// Creates an empty list holding at most `capacity` objects.
    pub fn fixed(capacity: usize) -> Self {
        Self::from_storage(FixedStorage::with_capacity(capacity))
    }
}

impl<'a, T: ShmSafe> FreeList<T, FixedStorage<'a, T>> {
    /// Initialises a fresh list of `capacity` slots inside `buf`.
    pub fn construct(buf: &'a mut [u8], capacity: usize) -> Result<Self, AttachError> {
        FixedStorage::construct(buf, capacity).map(Self::from_storage)
    }

    /// Reattaches to a list previously constructed in `buf`.
    ///
    /// The stored objects, ids and chain order are kept as they were.
    pub fn resume(buf: &'a mut [u8]) -> Result<Self, AttachError> {
        FixedStorage::resume(buf).and_then(Self::attach)
    }
}

impl<T, S: SlotStorage<T>> FreeList<T, S> {
    /// Wraps a storage whose header is taken to be empty.
    ///
    /// The storage is cleared so the header and slots agree.
    pub fn from_storage(mut storage: S) -> Self {
        storage.clear();
        Self {
            storage,
            _marker: PhantomData,
        }
    }

    /// Wraps a storage that already holds chains (e.g. a resumed region).
    ///
    /// # Errors
    ///
    /// [`AttachError::Corrupt`] if the stored chains fail
    /// [`check_invariants`](Self::check_invariants).
    pub fn attach(storage: S) -> Result<Self, AttachError> {
        let list = Self {
            storage,
            _marker: PhantomData,
        };
        list.check_invariants()?;
        Ok(list)
    }

    /// Read-only access to the backing storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Snapshot of the chain header.
    pub fn header(&self) -> ChainHeader {
        *self.storage.header()
    }

    /// Number of live objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.header().size
    }

    /// Returns `true` if there are no live objects.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of live objects, or `None` for growable storage.
    pub fn capacity(&self) -> Option<usize> {
        self.storage.capacity()
    }

    /// Number of slots currently allocated in the storage (live + vacant).
    pub fn storage_len(&self) -> usize {
        self.storage.len()
    }

    /// Number of further objects that fit, or `None` for growable storage.
    pub fn free_count(&self) -> Option<usize> {
        self.capacity().map(|cap| cap - self.len())
    }

    /// Returns `true` if `id` denotes a live object.
    #[inline]
    pub fn contains(&self, id: usize) -> bool {
        self.storage.slot(id).is_some_and(|slot| slot.is_occupied())
    }

    /// Returns the object at `id`, if live.
    #[inline]
    pub fn get(&self, id: usize) -> Option<&T> {
        self.storage.slot(id).and_then(|slot| slot.value())
    }

    /// Returns the object at `id` mutably, if live.
    #[inline]
    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.storage.slot_mut(id).and_then(|slot| slot.value_mut())
    }

    /// Id of the oldest live object in chain order.
    pub fn first_index(&self) -> Option<usize> {
        self.live(self.storage.header().first_used)
    }

    /// Id of the newest live object in chain order.
    pub fn last_index(&self) -> Option<usize> {
        self.live(self.storage.header().last_used)
    }

    /// Id following `id` in chain order; `None` if `id` is not live or is last.
    pub fn next_index(&self, id: usize) -> Option<usize> {
        let slot = self.storage.slot(id).filter(|slot| slot.is_occupied())?;
        self.live(slot.next)
    }

    /// Id preceding `id` in chain order; `None` if `id` is not live or is first.
    pub fn prev_index(&self, id: usize) -> Option<usize> {
        let slot = self.storage.slot(id).filter(|slot| slot.is_occupied())?;
        self.live(slot.prev)
    }

    #[inline]
    fn live(&self, idx: usize) -> Option<usize> {
        if idx != NPOS && self.contains(idx) {
            Some(idx)
        } else {
            None
        }
    }

    /// Id the next `create` will use, or `None` if the storage is full.
    pub fn next_vacancy(&self) -> Option<usize> {
        let first_free = self.storage.header().first_free;
        if first_free != NPOS {
            Some(first_free)
        } else if self.storage.can_grow() {
            Some(self.storage.len())
        } else {
            None
        }
    }

    /// Creates an object and returns its id.
    ///
    /// Returns `None` (dropping `value`) if the storage cannot grow.
    pub fn create(&mut self, value: T) -> Option<usize> {
        self.create_with(|_| value)
    }

    /// Creates a default-constructed object and returns its id.
    pub fn create_default(&mut self) -> Option<usize>
    where
        T: Default,
    {
        self.create_with(|_| T::default())
    }

    /// Creates an object from a constructor that receives the new id.
    ///
    /// The constructor is not called when the storage is full. It runs before
    /// the slot is linked, so a panicking constructor leaves the list intact.
    pub fn create_with(&mut self, init: impl FnOnce(usize) -> T) -> Option<usize> {
        let Some(idx) = self.next_vacancy() else {
            trace!(capacity = ?self.capacity(), "slot storage exhausted");
            return None;
        };
        let value = init(idx);
        self.claim(idx)?;
        self.link_last(idx);
        if let Some(slot) = self.storage.slot_mut(idx) {
            slot.state = SlotState::Occupied(value);
        }
        self.storage.header_mut().size += 1;
        Some(idx)
    }

    /// Takes `idx` off the free chain, or grows the storage onto it.
    fn claim(&mut self, idx: usize) -> Option<()> {
        if idx == self.storage.header().first_free {
            self.unlink_free(idx);
            Some(())
        } else {
            (self.storage.grow()? == idx).then_some(())
        }
    }

    fn link_last(&mut self, idx: usize) {
        let last = self.storage.header().last_used;
        if let Some(slot) = self.storage.slot_mut(idx) {
            slot.prev = last;
            slot.next = NPOS;
        }
        if last == NPOS {
            self.storage.header_mut().first_used = idx;
        } else if let Some(slot) = self.storage.slot_mut(last) {
            slot.next = idx;
        }
        self.storage.header_mut().last_used = idx;
    }

    fn unlink_used(&mut self, idx: usize) {
        let Some((prev, next)) = self.storage.slot(idx).map(|slot| (slot.prev, slot.next)) else {
            return;
        };
        if prev == NPOS {
            self.storage.header_mut().first_used = next;
        } else if let Some(slot) = self.storage.slot_mut(prev) {
            slot.next = next;
        }
        if next == NPOS {
            self.storage.header_mut().last_used = prev;
        } else if let Some(slot) = self.storage.slot_mut(next) {
            slot.prev = prev;
        }
    }

    fn push_free(&mut self, idx: usize) {
        let head = self.storage.header().first_free;
        if let Some(slot) = self.storage.slot_mut(idx) {
            slot.prev = NPOS;
            slot.next = head;
        }
        if let Some(slot) = self.storage.slot_mut(head) {
            slot.prev = idx;
        }
        self.storage.header_mut().first_free = idx;
    }

    fn unlink_free(&mut self, idx: usize) {
        let Some((prev, next)) = self.storage.slot(idx).map(|slot| (slot.prev, slot.next)) else {
            return;
        };
        if prev == NPOS {
            self.storage.header_mut().first_free = next;
        } else if let Some(slot) = self.storage.slot_mut(prev) {
            slot.next = next;
        }
        if let Some(slot) = self.storage.slot_mut(next) {
            slot.prev = prev;
        }
        if let Some(slot) = self.storage.slot_mut(idx) {
            slot.prev = NPOS;
            slot.next = NPOS;
        }
    }

    /// Removes the object at `id` and returns it.
    ///
    /// Returns `None` without side effects if `id` is not live.
    pub fn remove(&mut self, id: usize) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        self.unlink_used(id);
        self.push_free(id);
        let value = self.storage.slot_mut(id).and_then(|slot| slot.take());
        self.storage.header_mut().size -= 1;

        if self.storage.trims_tail() {
            self.trim_tail();
        }
        value
    }

    /// Releases trailing vacant slots.
    fn trim_tail(&mut self) {
        while let Some(back) = self.storage.back() {
            if back.is_occupied() {
                break;
            }
            let idx = self.storage.len() - 1;
            self.unlink_free(idx);
            self.storage.release();
        }
    }

    /// Drops every object and resets the list.
    pub fn clear(&mut self) {
        self.storage.clear();
    }

    /// Iterates `(id, &object)` in chain order.
    pub fn iter(&self) -> Iter<'_, T, S> {
        Iter {
            list: self,
            current: self.storage.header().first_used,
            remaining: self.len(),
        }
    }

    /// Iterates live ids in chain order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.iter().map(|(idx, _)| idx)
    }

    /// Calls `f` for every live object in chain order.
    pub fn for_each(&self, mut f: impl FnMut(usize, &T)) {
        for (idx, value) in self.iter() {
            f(idx, value);
        }
    }

    /// Calls `f` with mutable access for every live object in chain order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(usize, &mut T)) {
        let mut current = self.storage.header().first_used;
        while current != NPOS {
            let Some(slot) = self.storage.slot_mut(current) else {
                break;
            };
            let next = slot.next;
            if let Some(value) = slot.value_mut() {
                f(current, value);
            }
            current = next;
        }
    }

    /// Counts live objects matching `pred`.
    pub fn count_if(&self, mut pred: impl FnMut(usize, &T) -> bool) -> usize {
        self.iter().filter(|&(idx, value)| pred(idx, value)).count()
    }

    /// Verifies header and chain consistency.
    ///
    /// Checks that the used chain is a well-linked sequence of occupied slots
    /// of length `size` bounded by `first_used`/`last_used`, that the free
    /// chain is a well-linked sequence of vacant slots, and that together they
    /// cover every slot in the storage exactly once.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let header = *self.storage.header();
        let len = self.storage.len();
        let mut seen = vec![false; len];

        let mut walk = |start: usize, occupied: bool, what: &str| -> Result<(usize, usize), InvariantError> {
            let mut count = 0usize;
            let mut prev = NPOS;
            let mut current = start;
            while current != NPOS {
                let slot = self.storage.slot(current).ok_or_else(|| {
                    InvariantError::new(format!("{what} chain links out-of-range slot {current}"))
                })?;
                if std::mem::replace(&mut seen[current], true) {
                    return Err(InvariantError::new(format!(
                        "slot {current} linked twice ({what} chain)"
                    )));
                }
                if slot.is_occupied() != occupied {
                    return Err(InvariantError::new(format!(
                        "slot {current} on {what} chain has wrong occupancy"
                    )));
                }
                if slot.prev != prev {
                    return Err(InvariantError::new(format!(
                        "slot {current} prev link {} expected {prev}",
                        slot.prev
                    )));
                }
                prev = current;
                current = slot.next;
                count += 1;
            }
            Ok((count, prev))
        };

        let (used, last) = walk(header.first_used, true, "used")?;
        if used != header.size {
            return Err(InvariantError::new(format!(
                "used chain holds {used} slots, header size {}",
                header.size
            )));
        }
        if last != header.last_used {
            return Err(InvariantError::new(format!(
                "used chain ends at {last}, header last_used {}",
                header.last_used
            )));
        }
        let (free, _) = walk(header.first_free, false, "free")?;
        if used + free != len {
            return Err(InvariantError::new(format!(
                "chains cover {} of {len} slots",
                used + free
            )));
        }
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("free list invariant violated: {err}");
        }
        assert_eq!(self.iter().count(), self.len());
    }
}

impl<T: Clone, S: SlotStorage<T>> FreeList<T, S> {
    /// Returns the live objects in chain order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().map(|(_, value)| value.clone()).collect()
    }
}

/// Iterator over `(id, &T)` in chain order.
pub struct Iter<'a, T, S> {
    list: &'a FreeList<T, S>,
    current: usize,
    remaining: usize,
}

impl<'a, T, S: SlotStorage<T>> Iterator for Iter<'a, T, S> {
    type Item = (usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == NPOS {
            return None;
        }
        let slot = self.list.storage.slot(self.current)?;
        let value = slot.value()?;
        let idx = self.current;
        self.current = slot.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((idx, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<'a, T, S: SlotStorage<T>> IntoIterator for &'a FreeList<T, S> {
    type Item = (usize, &'a T);
    type IntoIter = Iter<'a, T, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
