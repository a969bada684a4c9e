//! FNV-1 key hashing for keyed pools.
//!
//! Keys are fed through [`Hash`] into a 32-bit FNV-1 state (multiply, then
//! xor), and the result is reduced into `[0, bucket_count)` with a double
//! modulo over the signed value, so bucket placement is stable across runs and
//! processes for keys with a stable `Hash` implementation.

use std::hash::{Hash, Hasher};

const FNV1_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV1_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1 [`Hasher`].
///
/// # Example
///
/// ```
/// use std::hash::Hasher;
/// use slotkit::pool::hash::Fnv1Hasher;
///
/// let mut h = Fnv1Hasher::default();
/// h.write(b"");
/// assert_eq!(h.finish(), 0x811c_9dc5);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Fnv1Hasher(u32);

impl Default for Fnv1Hasher {
    fn default() -> Self {
        Self(FNV1_OFFSET_BASIS)
    }
}

impl Fnv1Hasher {
    /// Current 32-bit state.
    pub fn finish32(&self) -> u32 {
        self.0
    }
}

impl Hasher for Fnv1Hasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = self.0.wrapping_mul(FNV1_PRIME);
            self.0 ^= u32::from(byte);
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        u64::from(self.0)
    }
}

/// FNV-1 digest of `key`.
pub fn fnv1<K: Hash + ?Sized>(key: &K) -> u32 {
    let mut hasher = Fnv1Hasher::default();
    key.hash(&mut hasher);
    hasher.finish32()
}

/// Bucket index of `key` among `bucket_count` buckets.
///
/// `bucket_count` must be non-zero.
pub fn bucket_index<K: Hash + ?Sized>(key: &K, bucket_count: usize) -> usize {
    debug_assert!(bucket_count > 0);
    let n = bucket_count as i64;
    let signed = i64::from(fnv1(key) as i32);
    (((signed % n) + n) % n) as usize
}
