//! Slot cells and the chain header shared by every slot storage.
//!
//! A slot is addressed by its position in the backing storage; that position
//! is the stored object's id until the object is removed. Each slot carries
//! `prev`/`next` links that thread it onto either the used chain or the free
//! chain, and a tagged state that is either vacant or holds the payload.
//!
//! ```text
//!   index:   0          1          2          3
//!          ┌──────────┬──────────┬──────────┬──────────┐
//!   state  │ Occ(a)   │ Vacant   │ Occ(c)   │ Vacant   │
//!   prev   │ NPOS     │ NPOS     │ 0        │ 1        │
//!   next   │ 2        │ 3        │ NPOS     │ NPOS     │
//!          └──────────┴──────────┴──────────┴──────────┘
//!   header: first_used = 0, last_used = 2, first_free = 1, size = 2
//! ```
//!
//! Both types are `#[repr(C)]` so a slot array can live inside a byte buffer
//! shared between processes; an all-zero `SlotState` is `Vacant`.

/// Sentinel index meaning "no such slot".
pub const NPOS: usize = usize::MAX;

/// Occupancy of a slot.
#[repr(C, u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState<T> {
    /// The slot is on the free chain.
    Vacant,
    /// The slot is on the used chain and holds a value.
    Occupied(T),
}

pub(crate) const TAG_VACANT: u8 = 0;
pub(crate) const TAG_OCCUPIED: u8 = 1;

/// Storage cell holding chain links and an optional payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot<T> {
    pub(crate) prev: usize,
    pub(crate) next: usize,
    pub(crate) state: SlotState<T>,
}

impl<T> Slot<T> {
    /// Creates an unlinked vacant slot.
    #[inline]
    pub const fn vacant() -> Self {
        Self {
            prev: NPOS,
            next: NPOS,
            state: SlotState::Vacant,
        }
    }

    /// Returns `true` if the slot holds a value.
    #[inline]
    pub fn is_occupied(&self) -> bool {
        matches!(self.state, SlotState::Occupied(_))
    }

    /// Index of the previous slot on this slot's chain, or [`NPOS`].
    #[inline]
    pub fn prev(&self) -> usize {
        self.prev
    }

    /// Index of the next slot on this slot's chain, or [`NPOS`].
    #[inline]
    pub fn next(&self) -> usize {
        self.next
    }

    /// Returns the payload if occupied.
    #[inline]
    pub fn value(&self) -> Option<&T> {
        match &self.state {
            SlotState::Occupied(value) => Some(value),
            SlotState::Vacant => None,
        }
    }

    /// Returns the payload mutably if occupied.
    #[inline]
    pub fn value_mut(&mut self) -> Option<&mut T> {
        match &mut self.state {
            SlotState::Occupied(value) => Some(value),
            SlotState::Vacant => None,
        }
    }

    /// Replaces the state with `Vacant`, returning the previous payload.
    #[inline]
    pub(crate) fn take(&mut self) -> Option<T> {
        match std::mem::replace(&mut self.state, SlotState::Vacant) {
            SlotState::Occupied(value) => Some(value),
            SlotState::Vacant => None,
        }
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::vacant()
    }
}

/// Bookkeeping for the used and free chains.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHeader {
    /// Oldest slot on the used chain.
    pub first_used: usize,
    /// Newest slot on the used chain.
    pub last_used: usize,
    /// Most recently freed slot; head of the free chain.
    pub first_free: usize,
    /// Number of occupied slots.
    pub size: usize,
}

impl ChainHeader {
    /// Header of an empty list.
    pub const fn empty() -> Self {
        Self {
            first_used: NPOS,
            last_used: NPOS,
            first_free: NPOS,
            size: 0,
        }
    }
}

impl Default for ChainHeader {
    fn default() -> Self {
        Self::empty()
    }
}
