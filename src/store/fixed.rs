//! Fixed-capacity slot storage over a byte region.
//!
//! The storage tracks a high-water mark over `capacity` slots laid out as
//! described in [`region`](crate::store::region). Slots below the mark have
//! been handed out at least once; creating past `capacity` fails and physical
//! capacity is never released.
//!
//! ## Attach modes
//!
//! | Constructor      | Region            | Header        | Payload bound |
//! |------------------|-------------------|---------------|---------------|
//! | `with_capacity`  | owned allocation  | fresh         | any `T`       |
//! | `construct`      | caller's buffer   | fresh         | `T: ShmSafe`  |
//! | `resume`         | caller's buffer   | kept, checked | `T: ShmSafe`  |
//!
//! `resume` re-wraps the bytes left behind by an earlier attach (possibly in a
//! previous process) without touching the stored objects or chains. It checks
//! the header (magic, version, slot size and alignment, capacity) and every
//! slot tag below the high-water mark before handing the slots out. Chain
//! consistency is verified by [`FreeList::attach`](crate::ds::FreeList::attach).
//!
//! Storage attached to a caller buffer never drops its payloads: the objects
//! belong to the region and outlive the attachment.

use std::marker::PhantomData;
use std::mem::{offset_of, size_of};
use std::ptr::{self, NonNull};

use tracing::debug;

use crate::ds::slot::{ChainHeader, Slot, TAG_OCCUPIED, TAG_VACANT};
use crate::error::{AttachError, InvariantError};
use crate::store::region::{
    LAYOUT_VERSION, REGION_MAGIC, RegionHeader, ShmRegion, ShmSafe, mem_size, region_align,
    slots_offset,
};
use crate::store::traits::SlotStorage;

/// [`SlotStorage`] over a fixed number of slots in a byte region.
pub struct FixedStorage<'a, T> {
    header: NonNull<RegionHeader>,
    slots: NonNull<Slot<T>>,
    capacity: usize,
    owned: Option<ShmRegion>,
    _marker: PhantomData<(&'a mut [u8], T)>,
}

impl<T> FixedStorage<'static, T> {
    /// Creates a self-contained storage for `capacity` slots.
    ///
    /// # Example
    ///
    /// ```
    /// use slotkit::store::fixed::FixedStorage;
    /// use slotkit::store::traits::SlotStorage;
    ///
    /// let mut storage: FixedStorage<'_, String> = FixedStorage::with_capacity(2);
    /// assert_eq!(storage.grow(), Some(0));
    /// assert_eq!(storage.grow(), Some(1));
    /// assert_eq!(storage.grow(), None);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        let region = ShmRegion::for_capacity::<T>(capacity);
        let base = region.as_non_null();
        // SAFETY: the region is sized and aligned for `capacity` slots of `T`.
        let mut storage = unsafe { Self::from_base(base, capacity, Some(region)) };
        storage.write_fresh_header();
        storage
    }
}

impl<'a, T> FixedStorage<'a, T> {
    /// Bytes a caller buffer must provide for `capacity` slots.
    pub fn mem_size(capacity: usize) -> usize {
        mem_size::<T>(capacity)
    }

    /// Alignment a caller buffer must satisfy.
    pub fn required_align() -> usize {
        region_align::<T>()
    }

    /// Returns `true` if the slots live in an allocation owned by this storage.
    pub fn is_owned(&self) -> bool {
        self.owned.is_some()
    }

    /// # Safety
    ///
    /// `base` must point to at least `mem_size::<T>(capacity)` writable bytes
    /// aligned to `region_align::<T>()`, valid for `'a`.
    unsafe fn from_base(base: NonNull<u8>, capacity: usize, owned: Option<ShmRegion>) -> Self {
        let header = base.cast::<RegionHeader>();
        let slots = unsafe { base.add(slots_offset::<T>()) }.cast::<Slot<T>>();
        Self {
            header,
            slots,
            capacity,
            owned,
            _marker: PhantomData,
        }
    }

    fn write_fresh_header(&mut self) {
        // SAFETY: the header pointer is valid and aligned for the whole lifetime.
        unsafe { ptr::write(self.header.as_ptr(), RegionHeader::fresh::<T>(self.capacity)) };
    }

    #[inline]
    fn region_header(&self) -> &RegionHeader {
        unsafe { self.header.as_ref() }
    }

    #[inline]
    fn region_header_mut(&mut self) -> &mut RegionHeader {
        unsafe { self.header.as_mut() }
    }

    #[inline]
    fn high_water(&self) -> usize {
        self.region_header().high_water as usize
    }

    fn check_buffer(buf: &[u8], required: usize) -> Result<(), AttachError> {
        if buf.len() < required {
            return Err(AttachError::BufferTooSmall {
                required,
                actual: buf.len(),
            });
        }
        let align = region_align::<T>();
        if buf.as_ptr() as usize % align != 0 {
            return Err(AttachError::Misaligned { required: align });
        }
        Ok(())
    }

    fn drop_payloads(&mut self) {
        for idx in 0..self.high_water() {
            // SAFETY: every slot below the high-water mark is initialised.
            unsafe { ptr::drop_in_place(self.slots.as_ptr().add(idx)) };
        }
    }
}

impl<'a, T: ShmSafe> FixedStorage<'a, T> {
    /// Initialises a fresh region of `capacity` slots at the start of `buf`.
    ///
    /// Any bytes previously stored in the buffer are forgotten.
    ///
    /// # Errors
    ///
    /// [`AttachError::BufferTooSmall`] if `buf` is shorter than
    /// [`mem_size(capacity)`](Self::mem_size), [`AttachError::Misaligned`] if
    /// it does not start at [`required_align`](Self::required_align).
    pub fn construct(buf: &'a mut [u8], capacity: usize) -> Result<Self, AttachError> {
        Self::check_buffer(buf, mem_size::<T>(capacity))?;
        let base = NonNull::from(&mut buf[..]).cast::<u8>();
        // SAFETY: size and alignment were checked above; the borrow lasts `'a`.
        let mut storage = unsafe { Self::from_base(base, capacity, None) };
        storage.write_fresh_header();
        debug!(capacity, bytes = mem_size::<T>(capacity), "constructed fixed slot region");
        Ok(storage)
    }

    /// Reattaches to a region previously written by [`construct`](Self::construct).
    ///
    /// Stored slots, header and chains are preserved as-is.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is too small or misaligned, if the header does not
    /// describe a region of `Slot<T>` written by this layout version, or if a
    /// slot below the high-water mark carries an invalid tag.
    pub fn resume(buf: &'a mut [u8]) -> Result<Self, AttachError> {
        Self::check_buffer(buf, size_of::<RegionHeader>())?;
        // SAFETY: the header fits and the buffer is aligned; every bit
        // pattern of `RegionHeader` is a valid value.
        let header = unsafe { ptr::read(buf.as_ptr().cast::<RegionHeader>()) };

        if header.magic != REGION_MAGIC {
            return Err(AttachError::LayoutMismatch(
                "buffer does not start with a slot region header".into(),
            ));
        }
        if header.version != LAYOUT_VERSION {
            return Err(AttachError::LayoutMismatch(format!(
                "region layout version {} (expected {LAYOUT_VERSION})",
                header.version
            )));
        }
        let expected = RegionHeader::fresh::<T>(0);
        if header.slot_size != expected.slot_size || header.slot_align != expected.slot_align {
            return Err(AttachError::LayoutMismatch(format!(
                "slot size/align {}/{} (expected {}/{})",
                header.slot_size, header.slot_align, expected.slot_size, expected.slot_align
            )));
        }
        let capacity = usize::try_from(header.capacity).map_err(|_| {
            AttachError::LayoutMismatch(format!("capacity {} not addressable", header.capacity))
        })?;
        Self::check_buffer(buf, mem_size::<T>(capacity))?;
        if header.high_water > header.capacity {
            return Err(InvariantError::new(format!(
                "high-water mark {} exceeds capacity {}",
                header.high_water, header.capacity
            ))
            .into());
        }

        let base = NonNull::from(&mut buf[..]).cast::<u8>();
        // SAFETY: the buffer holds `capacity` slots (checked above).
        let storage = unsafe { Self::from_base(base, capacity, None) };
        storage.check_tags()?;
        debug!(
            capacity,
            high_water = header.high_water,
            live = header.chain.size,
            "resumed fixed slot region"
        );
        Ok(storage)
    }

    fn check_tags(&self) -> Result<(), AttachError> {
        let tag_offset = offset_of!(Slot<T>, state);
        for idx in 0..self.high_water() {
            // SAFETY: in bounds; reading a single byte has no validity requirement.
            let tag = unsafe {
                ptr::read(
                    self.slots
                        .as_ptr()
                        .add(idx)
                        .cast::<u8>()
                        .add(tag_offset),
                )
            };
            if tag != TAG_VACANT && tag != TAG_OCCUPIED {
                return Err(InvariantError::new(format!("slot {idx} has invalid tag {tag}")).into());
            }
        }
        Ok(())
    }
}

impl<T> SlotStorage<T> for FixedStorage<'_, T> {
    #[inline]
    fn header(&self) -> &ChainHeader {
        &self.region_header().chain
    }

    #[inline]
    fn header_mut(&mut self) -> &mut ChainHeader {
        &mut self.region_header_mut().chain
    }

    #[inline]
    fn len(&self) -> usize {
        self.high_water()
    }

    #[inline]
    fn capacity(&self) -> Option<usize> {
        Some(self.capacity)
    }

    fn grow(&mut self) -> Option<usize> {
        let idx = self.high_water();
        if idx >= self.capacity {
            return None;
        }
        // SAFETY: `idx < capacity`, so the slot lies inside the region.
        unsafe { ptr::write(self.slots.as_ptr().add(idx), Slot::vacant()) };
        self.region_header_mut().high_water += 1;
        Some(idx)
    }

    fn release(&mut self) {
        let hw = self.high_water();
        if hw == 0 {
            return;
        }
        self.region_header_mut().high_water -= 1;
        if self.owned.is_some() {
            // SAFETY: the slot was initialised and is no longer reachable.
            unsafe { ptr::drop_in_place(self.slots.as_ptr().add(hw - 1)) };
        }
    }

    #[inline]
    fn slot(&self, idx: usize) -> Option<&Slot<T>> {
        if idx < self.high_water() {
            // SAFETY: slots below the high-water mark are initialised.
            Some(unsafe { &*self.slots.as_ptr().add(idx) })
        } else {
            None
        }
    }

    #[inline]
    fn slot_mut(&mut self, idx: usize) -> Option<&mut Slot<T>> {
        if idx < self.high_water() {
            // SAFETY: as above, and `&mut self` guarantees exclusivity.
            Some(unsafe { &mut *self.slots.as_ptr().add(idx) })
        } else {
            None
        }
    }

    fn clear(&mut self) {
        self.drop_payloads();
        let header = self.region_header_mut();
        header.high_water = 0;
        header.chain = ChainHeader::empty();
    }

    #[inline]
    fn trims_tail(&self) -> bool {
        false
    }
}

impl<T> Drop for FixedStorage<'_, T> {
    fn drop(&mut self) {
        if self.owned.is_some() {
            self.drop_payloads();
        }
    }
}

impl<T> std::fmt::Debug for FixedStorage<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedStorage")
            .field("capacity", &self.capacity)
            .field("high_water", &self.high_water())
            .field("chain", self.header())
            .field("owned", &self.is_owned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligned_buffer<T>(capacity: usize) -> ShmRegion {
        ShmRegion::for_capacity::<T>(capacity)
    }

    #[test]
    fn grow_stops_at_capacity() {
        let mut storage: FixedStorage<'_, u32> = FixedStorage::with_capacity(3);
        assert_eq!(storage.grow(), Some(0));
        assert_eq!(storage.grow(), Some(1));
        assert_eq!(storage.grow(), Some(2));
        assert_eq!(storage.grow(), None);
        assert_eq!(storage.len(), 3);
        assert!(!storage.can_grow());
        assert!(!storage.trims_tail());
    }

    #[test]
    fn release_lowers_high_water() {
        let mut storage: FixedStorage<'_, String> = FixedStorage::with_capacity(2);
        storage.grow();
        storage.grow();
        storage.release();
        assert_eq!(storage.len(), 1);
        assert!(storage.slot(1).is_none());
        storage.release();
        storage.release();
        assert!(storage.is_empty());
    }

    #[test]
    fn construct_rejects_short_buffer() {
        let mut region = aligned_buffer::<u64>(4);
        let err = FixedStorage::<'_, u64>::construct(region.as_mut_slice(), 5).unwrap_err();
        assert!(matches!(err, AttachError::BufferTooSmall { .. }));
    }

    #[test]
    fn construct_rejects_misaligned_buffer() {
        let mut region = aligned_buffer::<u64>(8);
        let slice = &mut region.as_mut_slice()[1..];
        let err = FixedStorage::<'_, u64>::construct(slice, 2).unwrap_err();
        assert!(matches!(err, AttachError::Misaligned { .. }));
    }

    #[test]
    fn resume_rejects_unconstructed_buffer() {
        let mut region = aligned_buffer::<u64>(4);
        let err = FixedStorage::<'_, u64>::resume(region.as_mut_slice()).unwrap_err();
        assert!(matches!(err, AttachError::LayoutMismatch(_)));
    }

    #[test]
    fn resume_rejects_other_slot_type() {
        let mut region = aligned_buffer::<u64>(4);
        FixedStorage::<'_, u64>::construct(region.as_mut_slice(), 4).unwrap();
        let err = FixedStorage::<'_, [u64; 4]>::resume(region.as_mut_slice()).unwrap_err();
        assert!(matches!(err, AttachError::LayoutMismatch(_)));
    }

    #[test]
    fn resume_keeps_slots_and_header() {
        let mut region = aligned_buffer::<u64>(4);
        {
            let mut storage = FixedStorage::<'_, u64>::construct(region.as_mut_slice(), 4).unwrap();
            let idx = storage.grow().unwrap();
            let slot = storage.slot_mut(idx).unwrap();
            slot.state = crate::ds::slot::SlotState::Occupied(42);
            storage.header_mut().size = 1;
        }
        let storage = FixedStorage::<'_, u64>::resume(region.as_mut_slice()).unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.capacity(), Some(4));
        assert_eq!(storage.header().size, 1);
        assert_eq!(storage.slot(0).and_then(|s| s.value()), Some(&42));
    }

    #[test]
    fn resume_rejects_corrupt_tag() {
        let mut region = aligned_buffer::<u64>(2);
        {
            let mut storage = FixedStorage::<'_, u64>::construct(region.as_mut_slice(), 2).unwrap();
            storage.grow();
        }
        let tag_at = slots_offset::<u64>() + offset_of!(Slot<u64>, state);
        region.as_mut_slice()[tag_at] = 7;
        let err = FixedStorage::<'_, u64>::resume(region.as_mut_slice()).unwrap_err();
        assert!(matches!(err, AttachError::Corrupt(_)));
    }

    #[test]
    fn owned_storage_drops_payloads() {
        use std::rc::Rc;

        let marker = Rc::new(());
        {
            let mut storage: FixedStorage<'_, Rc<()>> = FixedStorage::with_capacity(2);
            let idx = storage.grow().unwrap();
            storage.slot_mut(idx).unwrap().state =
                crate::ds::slot::SlotState::Occupied(Rc::clone(&marker));
            assert_eq!(Rc::strong_count(&marker), 2);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
