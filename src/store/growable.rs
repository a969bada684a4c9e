//! Heap-backed slot storage that grows on demand.
//!
//! Slots live in a `Vec`, so creating a slot may reallocate the whole array.
//! Callers therefore hold indices, never references, across any operation
//! that can create. After a removal the free-list engine pops trailing vacant
//! slots, which keeps the vector no longer than its highest live id.

use crate::ds::slot::{ChainHeader, Slot};
use crate::store::traits::SlotStorage;

/// `Vec`-backed [`SlotStorage`] with an inline header.
#[derive(Debug)]
pub struct GrowableStorage<T> {
    header: ChainHeader,
    slots: Vec<Slot<T>>,
}

impl<T> GrowableStorage<T> {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self {
            header: ChainHeader::empty(),
            slots: Vec::new(),
        }
    }

    /// Creates an empty storage with room for `capacity` slots before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            header: ChainHeader::empty(),
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Number of slots the vector can hold without reallocating.
    pub fn reserved(&self) -> usize {
        self.slots.capacity()
    }

    /// Releases unused vector capacity.
    pub fn shrink_to_fit(&mut self) {
        self.slots.shrink_to_fit();
    }
}

impl<T> Default for GrowableStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotStorage<T> for GrowableStorage<T> {
    #[inline]
    fn header(&self) -> &ChainHeader {
        &self.header
    }

    #[inline]
    fn header_mut(&mut self) -> &mut ChainHeader {
        &mut self.header
    }

    #[inline]
    fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn capacity(&self) -> Option<usize> {
        None
    }

    fn grow(&mut self) -> Option<usize> {
        self.slots.push(Slot::vacant());
        Some(self.slots.len() - 1)
    }

    fn release(&mut self) {
        self.slots.pop();
    }

    #[inline]
    fn slot(&self, idx: usize) -> Option<&Slot<T>> {
        self.slots.get(idx)
    }

    #[inline]
    fn slot_mut(&mut self, idx: usize) -> Option<&mut Slot<T>> {
        self.slots.get_mut(idx)
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.header = ChainHeader::empty();
    }

    #[inline]
    fn trims_tail(&self) -> bool {
        true
    }
}
