//! slotkit: index-stable object pools, resumable fixed regions and LRU
//! object recycling.
//!
//! ## Layers
//!
//! | Module     | Contents                                                   |
//! |------------|------------------------------------------------------------|
//! | [`ds`]     | `FreeList` engine, slot and chain header types             |
//! | [`store`]  | slot storage backends: growable `Vec`, fixed byte region   |
//! | [`pool`]   | id and key addressed object pools, resume hooks, registry  |
//! | [`policy`] | per-key FILO pools with a shared adaptive eviction manager |
//! | [`builder`]| validated construction of LRU managers                     |
//! | [`error`]  | error types                                                |
//!
//! Objects are addressed by slot index, never by address, so ids survive
//! reallocation of growable storage and reattachment of a fixed region in a
//! later process. Nothing here is thread-safe; callers synchronize.
//!
//! ## Example
//!
//! ```
//! use slotkit::prelude::*;
//!
//! let mut pool = KeyedObjectPool::new();
//! let id = pool.create_by_key(42u64, "answer").unwrap().id();
//! assert_eq!(pool.get(id).map(|e| *e.key()), Some(42));
//! assert!(pool.create_by_key(42, "again").is_err());
//! ```

pub mod builder;
pub mod ds;
pub mod error;
pub mod policy;
pub mod pool;
pub mod prelude;
pub mod store;
