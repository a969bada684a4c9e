pub use crate::builder::LruManagerBuilder;
pub use crate::ds::{FixedFreeList, FreeList, NPOS};
pub use crate::error::{AttachError, ConfigError, InvariantError, PoolError, ResumeError};
pub use crate::policy::{DropAction, LruAction, LruPool, LruPoolManager, SharedLruManager};
pub use crate::pool::{
    EntryMut, FixedKeyedObjectPool, FixedObjectPool, KeyedEntry, KeyedEntryMut, KeyedObjectPool,
    ObjectPool, PoolEntry, PoolRegistry, ResumeHook, ResumePolicy,
};
pub use crate::store::{FixedStorage, GrowableStorage, ShmRegion, ShmSafe, SlotStorage};
