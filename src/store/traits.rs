//! Slot-storage backends for the free-list engine.
//!
//! A backend owns a contiguous run of [`Slot`]s plus the [`ChainHeader`] that
//! describes which of them are used or free. The engine in
//! [`FreeList`](crate::ds::FreeList) only ever addresses slots by index, so a
//! backend is free to reallocate (growable) or to live in an externally
//! supplied buffer (fixed).
//!
//! The header is part of the backend rather than the engine because a
//! buffer-backed storage has to persist it next to the slots.

use crate::ds::slot::{ChainHeader, Slot};

/// Storage contract consumed by [`FreeList`](crate::ds::FreeList).
pub trait SlotStorage<T> {
    /// Chain bookkeeping for the slots in this storage.
    fn header(&self) -> &ChainHeader;

    /// Mutable chain bookkeeping.
    fn header_mut(&mut self) -> &mut ChainHeader;

    /// Number of slots handed out so far (the high-water mark).
    fn len(&self) -> usize;

    /// Returns `true` if no slot has been handed out.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of slots, or `None` when the storage grows on demand.
    fn capacity(&self) -> Option<usize>;

    /// Returns `true` if [`grow`](Self::grow) would succeed.
    fn can_grow(&self) -> bool {
        self.capacity().is_none_or(|cap| self.len() < cap)
    }

    /// Appends one vacant, unlinked slot and returns its index.
    ///
    /// Returns `None` once the capacity is exhausted.
    fn grow(&mut self) -> Option<usize>;

    /// Discards the most recently created slot.
    fn release(&mut self);

    /// Slot at `idx`, if `idx < len()`.
    fn slot(&self, idx: usize) -> Option<&Slot<T>>;

    /// Mutable slot at `idx`, if `idx < len()`.
    fn slot_mut(&mut self, idx: usize) -> Option<&mut Slot<T>>;

    /// Most recently created slot.
    fn back(&self) -> Option<&Slot<T>> {
        self.slot(self.len().checked_sub(1)?)
    }

    /// Drops every slot and resets the header.
    fn clear(&mut self);

    /// Whether trailing vacant slots should be released after a removal.
    fn trims_tail(&self) -> bool;
}
