//! Byte-region layout for fixed slot storage.
//!
//! A region is a header followed by `capacity` slots:
//!
//! ```text
//!   offset 0                 slots_offset
//!   ┌────────────────────────┬──────────┬──────────┬─────┬──────────┐
//!   │ RegionHeader           │ Slot<T>  │ Slot<T>  │ ... │ Slot<T>  │
//!   │  magic / version       │  [0]     │  [1]     │     │ [cap-1]  │
//!   │  slot size / align     │          │          │     │          │
//!   │  capacity / high_water │          │          │     │          │
//!   │  ChainHeader           │          │          │     │          │
//!   └────────────────────────┴──────────┴──────────┴─────┴──────────┘
//!   mem_size = slots_offset + capacity * size_of::<Slot<T>>()
//! ```
//!
//! The region may be a plain heap allocation ([`ShmRegion`]) or memory mapped
//! by the caller and shared between processes. Everything inside it is
//! position independent: links are slot indices, never addresses.
//!
//! ## Cross-process use
//!
//! Exactly one process constructs a region; every later attach resumes it.
//! The storage performs no inter-process locking; writers must be serialized
//! by the caller. A region must only be resumed by a binary with the same
//! slot layout for the same `T` (checked via size, alignment and
//! [`LAYOUT_VERSION`]).

use std::alloc::{self, Layout};
use std::mem::{align_of, size_of};
use std::ptr::NonNull;

use crate::ds::slot::{ChainHeader, Slot};

/// Marker stored at the start of every constructed region.
pub const REGION_MAGIC: u64 = u64::from_le_bytes(*b"SLOTKIT\0");

/// Version of the region header and slot encoding.
pub const LAYOUT_VERSION: u32 = 1;

/// Types that may be stored in a region shared across process restarts.
///
/// # Safety
///
/// Implementors guarantee that
/// - every bit pattern of `size_of::<Self>()` bytes is a valid value, and
/// - values contain no pointers or handles into process-local memory.
///
/// `#[repr(C)]` structs made of integers, floats and arrays of them qualify.
pub unsafe trait ShmSafe: Copy + 'static {}

macro_rules! impl_shm_safe {
    ($($ty:ty),* $(,)?) => {
        $(unsafe impl ShmSafe for $ty {})*
    };
}

impl_shm_safe!(
    (),
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
);

unsafe impl<T: ShmSafe, const N: usize> ShmSafe for [T; N] {}

/// Header persisted at offset zero of a region.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegionHeader {
    pub(crate) magic: u64,
    pub(crate) version: u32,
    pub(crate) slot_align: u32,
    pub(crate) slot_size: u64,
    pub(crate) capacity: u64,
    pub(crate) high_water: u64,
    pub(crate) chain: ChainHeader,
}

impl RegionHeader {
    pub(crate) fn fresh<T>(capacity: usize) -> Self {
        Self {
            magic: REGION_MAGIC,
            version: LAYOUT_VERSION,
            slot_align: align_of::<Slot<T>>() as u32,
            slot_size: size_of::<Slot<T>>() as u64,
            capacity: capacity as u64,
            high_water: 0,
            chain: ChainHeader::empty(),
        }
    }
}

/// Required alignment of a region holding `T` values.
pub fn region_align<T>() -> usize {
    align_of::<RegionHeader>().max(align_of::<Slot<T>>())
}

/// Byte offset of the first slot.
pub(crate) fn slots_offset<T>() -> usize {
    size_of::<RegionHeader>().next_multiple_of(align_of::<Slot<T>>())
}

/// Bytes needed for a region of `capacity` slots of `T`.
///
/// Saturates at `usize::MAX` for capacities that cannot be addressed.
pub fn mem_size<T>(capacity: usize) -> usize {
    capacity
        .checked_mul(size_of::<Slot<T>>())
        .and_then(|bytes| bytes.checked_add(slots_offset::<T>()))
        .unwrap_or(usize::MAX)
}

/// Owned, zero-initialised, aligned byte region.
///
/// Stands in for a mapped shared-memory segment: a pool can be constructed in
/// it, dropped, and resumed from the same bytes later. Fixed pools created
/// with `with_capacity` also keep their slots in one of these.
///
/// # Example
///
/// ```
/// use slotkit::store::region::{ShmRegion, mem_size};
///
/// let region = ShmRegion::for_capacity::<u64>(16);
/// assert_eq!(region.len(), mem_size::<u64>(16));
/// assert!(region.as_slice().iter().all(|&b| b == 0));
/// ```
pub struct ShmRegion {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl ShmRegion {
    /// Allocates `len` zeroed bytes aligned to `align`.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two or `len` overflows `isize`.
    pub fn zeroed(len: usize, align: usize) -> Self {
        let layout = match Layout::from_size_align(len, align) {
            Ok(layout) => layout,
            Err(err) => panic!("invalid region layout ({len} bytes, align {align}): {err}"),
        };
        let ptr = if len == 0 {
            // Zero-sized allocations are not allowed; any aligned dangling
            // pointer is a valid empty slice base.
            NonNull::new(std::ptr::without_provenance_mut::<u8>(align))
                .unwrap_or(NonNull::dangling())
        } else {
            // SAFETY: `layout` has a non-zero size.
            let raw = unsafe { alloc::alloc_zeroed(layout) };
            match NonNull::new(raw) {
                Some(ptr) => ptr,
                None => alloc::handle_alloc_error(layout),
            }
        };
        Self { ptr, layout }
    }

    /// Allocates a region sized and aligned for `capacity` slots of `T`.
    pub fn for_capacity<T>(capacity: usize) -> Self {
        Self::zeroed(mem_size::<T>(capacity), region_align::<T>())
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    /// Returns `true` for a zero-length region.
    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    /// Alignment of the region start.
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// Region bytes.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    /// Mutable region bytes, suitable for `construct`/`resume`.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }

    pub(crate) fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }
}

// The region exclusively owns its allocation, like a `Vec<u8>`.
unsafe impl Send for ShmRegion {}
unsafe impl Sync for ShmRegion {}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        if self.layout.size() != 0 {
            unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
        }
    }
}

impl std::fmt::Debug for ShmRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmRegion")
            .field("len", &self.layout.size())
            .field("align", &self.layout.align())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_size_covers_header_and_slots() {
        let size = mem_size::<u64>(10);
        assert!(size >= size_of::<RegionHeader>() + 10 * size_of::<Slot<u64>>());
        assert_eq!(mem_size::<u64>(0), slots_offset::<u64>());
    }

    #[test]
    fn mem_size_saturates() {
        assert_eq!(mem_size::<u64>(usize::MAX), usize::MAX);
    }

    #[test]
    fn slots_offset_is_aligned() {
        assert_eq!(slots_offset::<u8>() % align_of::<Slot<u8>>(), 0);
        assert_eq!(slots_offset::<u128>() % align_of::<Slot<u128>>(), 0);
    }

    #[test]
    fn region_is_zeroed_and_aligned() {
        let region = ShmRegion::for_capacity::<u32>(8);
        assert_eq!(region.len(), mem_size::<u32>(8));
        assert_eq!(region.as_slice().as_ptr() as usize % region_align::<u32>(), 0);
        assert!(region.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn empty_region_is_usable() {
        let mut region = ShmRegion::zeroed(0, 8);
        assert!(region.is_empty());
        assert!(region.as_mut_slice().is_empty());
    }

    #[test]
    fn fresh_header_records_layout() {
        let header = RegionHeader::fresh::<u64>(5);
        assert_eq!(header.magic, REGION_MAGIC);
        assert_eq!(header.version, LAYOUT_VERSION);
        assert_eq!(header.capacity, 5);
        assert_eq!(header.high_water, 0);
        assert_eq!(header.slot_size, size_of::<Slot<u64>>() as u64);
        assert_eq!(header.chain, ChainHeader::empty());
    }
}
