//! Error types for the slotkit library.
//!
//! ## Key Components
//!
//! - [`InvariantError`]: Returned when free-list chain invariants are violated
//!   (`check_invariants` methods, and resume-time validation).
//! - [`ConfigError`]: Returned when configuration parameters are invalid
//!   (e.g. zero hash buckets, zero GC batch sizes).
//! - [`AttachError`]: Returned when a byte buffer cannot be attached as slot
//!   storage (too small, misaligned, wrong layout, corrupted chains).
//! - [`PoolError`]: Returned by keyed creation (duplicate key, exhausted).
//! - [`ResumeError`]: Returned when reattaching a pool to a previously
//!   written buffer fails.
//!
//! Lookups with unknown ids and removal of missing entries are never errors:
//! they yield `None`.
//!
//! ## Example Usage
//!
//! ```
//! use slotkit::error::ConfigError;
//! use slotkit::pool::keyed::KeyedObjectPool;
//!
//! let pool: Result<KeyedObjectPool<u32, String>, ConfigError> =
//!     KeyedObjectPool::try_with_buckets(31);
//! assert!(pool.is_ok());
//!
//! let bad = KeyedObjectPool::<u32, String>::try_with_buckets(0);
//! assert!(bad.is_err());
//! ```

use thiserror::Error;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when free-list invariants are violated.
///
/// Produced by [`FreeList::check_invariants`](crate::ds::FreeList::check_invariants)
/// and wrapped in [`AttachError::Corrupt`] when a resumed buffer fails
/// validation. Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when configuration parameters are invalid.
///
/// Produced by fallible constructors such as
/// [`KeyedObjectPool::try_with_buckets`](crate::pool::keyed::KeyedObjectPool::try_with_buckets)
/// and [`LruManagerBuilder::try_build`](crate::builder::LruManagerBuilder::try_build).
///
/// # Example
///
/// ```
/// use slotkit::builder::LruManagerBuilder;
///
/// let err = LruManagerBuilder::new().proc_item_count(0).try_build().unwrap_err();
/// assert!(err.to_string().contains("proc_item_count"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// AttachError
// ---------------------------------------------------------------------------

/// Error returned when a byte buffer cannot back a fixed slot storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    /// The buffer is shorter than `FixedStorage::mem_size(capacity)`.
    #[error("buffer too small: {required} bytes required, {actual} supplied")]
    BufferTooSmall { required: usize, actual: usize },

    /// The buffer start is not aligned for the region header and slots.
    #[error("buffer misaligned: {required}-byte alignment required")]
    Misaligned { required: usize },

    /// The buffer was written with a different slot layout or is not a region.
    #[error("layout mismatch: {0}")]
    LayoutMismatch(String),

    /// The stored chains do not satisfy the free-list invariants.
    #[error("corrupted region: {0}")]
    Corrupt(#[from] InvariantError),
}

// ---------------------------------------------------------------------------
// PoolError
// ---------------------------------------------------------------------------

/// Error returned by keyed pool creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The key is already mapped to a live entry; nothing was changed.
    #[error("key already present")]
    DuplicateKey,

    /// The backing storage cannot hold another slot.
    #[error("pool capacity exhausted")]
    Exhausted,
}

// ---------------------------------------------------------------------------
// ResumeError
// ---------------------------------------------------------------------------

/// Error returned when a pool cannot be resumed from a previously written buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResumeError {
    /// The buffer failed validation before any object was touched.
    #[error(transparent)]
    Attach(#[from] AttachError),

    /// An object's resume hook failed under [`ResumePolicy::Abort`](crate::pool::resume::ResumePolicy::Abort).
    #[error("resume hook failed for object {id} with status {code}")]
    HookFailed { id: usize, code: i32 },

    /// Two live entries of a keyed pool carry the same key.
    #[error("duplicate key stored at object {id}")]
    DuplicateKey { id: usize },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- InvariantError ---------------------------------------------------

    #[test]
    fn invariant_display_shows_message() {
        let err = InvariantError::new("size mismatch");
        assert_eq!(err.to_string(), "size mismatch");
    }

    #[test]
    fn invariant_message_accessor() {
        let err = InvariantError::new("test");
        assert_eq!(err.message(), "test");
    }

    #[test]
    fn invariant_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<InvariantError>();
    }

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("bucket_count must be > 0");
        assert_eq!(err.to_string(), "bucket_count must be > 0");
    }

    #[test]
    fn config_clone_and_eq() {
        let a = ConfigError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    // -- AttachError ------------------------------------------------------

    #[test]
    fn attach_too_small_reports_sizes() {
        let err = AttachError::BufferTooSmall {
            required: 128,
            actual: 64,
        };
        let msg = err.to_string();
        assert!(msg.contains("128"));
        assert!(msg.contains("64"));
    }

    #[test]
    fn attach_wraps_invariant_error() {
        let err: AttachError = InvariantError::new("free chain cycle").into();
        assert_eq!(err.to_string(), "corrupted region: free chain cycle");
    }

    // -- ResumeError ------------------------------------------------------

    #[test]
    fn resume_attach_is_transparent() {
        let err: ResumeError = AttachError::Misaligned { required: 8 }.into();
        assert_eq!(err.to_string(), "buffer misaligned: 8-byte alignment required");
    }

    #[test]
    fn resume_hook_failure_mentions_id_and_code() {
        let err = ResumeError::HookFailed { id: 3, code: -7 };
        assert_eq!(
            err.to_string(),
            "resume hook failed for object 3 with status -7"
        );
    }
}
