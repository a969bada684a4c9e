pub mod hash;
pub mod keyed;
pub mod object_pool;
pub mod registry;
pub mod resume;

pub use keyed::{DEFAULT_BUCKETS, FixedKeyedObjectPool, KeyedEntry, KeyedEntryMut, KeyedObjectPool};
pub use object_pool::{EntryMut, FixedObjectPool, ObjectPool, PoolEntry};
pub use registry::PoolRegistry;
pub use resume::{ResumeHook, ResumePolicy};
