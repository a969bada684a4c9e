//! Id-addressed object pool.
//!
//! [`ObjectPool`] wraps a [`FreeList`] of [`PoolEntry`] values: every created
//! object is stamped with its id so callers holding only the object can still
//! name it. The pool is an explicitly owned value; create one per object type
//! (or use [`PoolRegistry`](crate::pool::registry::PoolRegistry) for
//! type-indexed lookup).
//!
//! ## Backends
//!
//! | Constructor              | Storage                        | Full pool        |
//! |--------------------------|--------------------------------|------------------|
//! | `new` / `with_capacity`  | growable `Vec`                 | never            |
//! | `fixed(capacity)`        | owned fixed region             | `create` → None  |
//! | `construct(buf, cap)`    | caller buffer, fresh           | `create` → None  |
//! | `resume(buf, policy)`    | caller buffer, kept            | `create` → None  |
//!
//! ## Example
//!
//! ```
//! use slotkit::pool::ObjectPool;
//!
//! let mut pool = ObjectPool::new();
//! let id = pool.create(String::from("alpha")).unwrap().id();
//! pool.create(String::from("beta"));
//!
//! assert_eq!(pool.get(id).map(|e| e.as_str()), Some("alpha"));
//! assert_eq!(pool.len(), 2);
//! assert_eq!(pool.remove(id).as_deref(), Some("alpha"));
//! assert_eq!(pool.first().map(|e| e.as_str()), Some("beta"));
//! ```

use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::ds::FreeList;
use crate::error::{AttachError, ResumeError};
use crate::pool::resume::{self, ResumeHook, ResumePolicy};
use crate::store::fixed::FixedStorage;
use crate::store::growable::GrowableStorage;
use crate::store::region::ShmSafe;
use crate::store::traits::SlotStorage;

/// A pooled object stamped with its id.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolEntry<T> {
    id: usize,
    value: T,
}

impl<T> PoolEntry<T> {
    /// Id of this object in its pool.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// The stored object.
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Unwraps the stored object.
    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T> Deref for PoolEntry<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

unsafe impl<T: ShmSafe> ShmSafe for PoolEntry<T> {}

/// Mutable handle to a freshly created object.
///
/// Derefs to the object only; the id stamp stays read-only.
#[derive(Debug)]
pub struct EntryMut<'a, T> {
    entry: &'a mut PoolEntry<T>,
}

impl<'a, T> EntryMut<'a, T> {
    /// Id of this object in its pool.
    #[inline]
    pub fn id(&self) -> usize {
        self.entry.id
    }

    /// Converts the handle into a mutable reference to the object.
    pub fn into_mut(self) -> &'a mut T {
        &mut self.entry.value
    }
}

impl<T> Deref for EntryMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entry.value
    }
}

impl<T> DerefMut for EntryMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.entry.value
    }
}

/// Pool of objects addressed by stable ids.
#[derive(Debug)]
pub struct ObjectPool<T, S = GrowableStorage<PoolEntry<T>>> {
    list: FreeList<PoolEntry<T>, S>,
}

/// Object pool over a fixed-capacity region.
pub type FixedObjectPool<'a, T> = ObjectPool<T, FixedStorage<'a, PoolEntry<T>>>;

impl<T> ObjectPool<T> {
    /// Creates an empty growable pool.
    pub fn new() -> Self {
        Self {
            list: FreeList::new(),
        }
    }

    /// Creates an empty growable pool with room for `capacity` objects before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            list: FreeList::with_capacity(capacity),
        }
    }
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObjectPool<T, FixedStorage<'static, PoolEntry<T>>> {
    /// Creates an empty pool holding at most `capacity` objects.
    pub fn fixed(capacity: usize) -> Self {
        Self {
            list: FreeList::fixed(capacity),
        }
    }
}

impl<'a, T> FixedObjectPool<'a, T> {
    /// Bytes a buffer must provide for a pool of `capacity` objects.
    pub fn mem_size(capacity: usize) -> usize {
        FixedStorage::<'a, PoolEntry<T>>::mem_size(capacity)
    }

    /// Alignment a buffer must satisfy.
    pub fn required_align() -> usize {
        FixedStorage::<'a, PoolEntry<T>>::required_align()
    }
}

impl<'a, T: ShmSafe> FixedObjectPool<'a, T> {
    /// Initialises an empty pool of `capacity` objects inside `buf`.
    pub fn construct(buf: &'a mut [u8], capacity: usize) -> Result<Self, AttachError> {
        Ok(Self {
            list: FreeList::construct(buf, capacity)?,
        })
    }
}

impl<'a, T: ShmSafe + ResumeHook> FixedObjectPool<'a, T> {
    /// Reattaches to a pool previously constructed in `buf`.
    ///
    /// Objects, ids and chain order are kept. Every live object then gets one
    /// [`ResumeHook::on_resume`] call; failures are handled per `policy`.
    ///
    /// # Example
    ///
    /// ```
    /// use slotkit::pool::{FixedObjectPool, ResumePolicy};
    /// use slotkit::store::region::ShmRegion;
    ///
    /// let mut region = ShmRegion::for_capacity::<slotkit::pool::PoolEntry<u64>>(4);
    /// {
    ///     let mut pool = FixedObjectPool::<u64>::construct(region.as_mut_slice(), 4).unwrap();
    ///     pool.create(7);
    /// }
    /// let pool = FixedObjectPool::<u64>::resume(region.as_mut_slice(), ResumePolicy::Log).unwrap();
    /// assert_eq!(pool.get(0).map(|e| **e), Some(7));
    /// ```
    pub fn resume(buf: &'a mut [u8], policy: ResumePolicy) -> Result<Self, ResumeError> {
        let mut list = FreeList::resume(buf)?;
        let stats = resume::replay(
            &mut list,
            policy,
            |entry: &mut PoolEntry<T>| entry.value.on_resume(),
            |_, _| Ok(()),
        )?;
        debug!(live = list.len(), discarded = stats.discarded, "resumed object pool");
        Ok(Self { list })
    }
}

impl<T, S: SlotStorage<PoolEntry<T>>> ObjectPool<T, S> {
    /// Creates an object and returns a handle to it.
    ///
    /// Returns `None` when a fixed pool is full.
    pub fn create(&mut self, value: T) -> Option<EntryMut<'_, T>> {
        self.create_with(|_| value)
    }

    /// Creates a default-constructed object and returns its entry.
    pub fn create_default(&mut self) -> Option<EntryMut<'_, T>>
    where
        T: Default,
    {
        self.create_with(|_| T::default())
    }

    /// Creates an object from a constructor that receives the new id.
    pub fn create_with(&mut self, init: impl FnOnce(usize) -> T) -> Option<EntryMut<'_, T>> {
        let id = self.list.create_with(|id| PoolEntry {
            id,
            value: init(id),
        })?;
        self.list.get_mut(id).map(|entry| EntryMut { entry })
    }

    /// Returns the entry at `id`, if live.
    #[inline]
    pub fn get(&self, id: usize) -> Option<&PoolEntry<T>> {
        self.list.get(id)
    }

    /// Returns the object at `id` mutably, if live.
    #[inline]
    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.list.get_mut(id).map(|entry| &mut entry.value)
    }

    /// Returns `true` if `id` denotes a live object.
    #[inline]
    pub fn contains(&self, id: usize) -> bool {
        self.list.contains(id)
    }

    /// Oldest live entry in chain order.
    pub fn first(&self) -> Option<&PoolEntry<T>> {
        self.list.first_index().and_then(|id| self.list.get(id))
    }

    /// Id of the oldest live entry.
    pub fn used_head(&self) -> Option<usize> {
        self.list.first_index()
    }

    /// Id following `id` in chain order.
    pub fn next_id(&self, id: usize) -> Option<usize> {
        self.list.next_index(id)
    }

    /// Removes the object at `id` and returns it.
    pub fn remove(&mut self, id: usize) -> Option<T> {
        self.list.remove(id).map(PoolEntry::into_value)
    }

    /// Drops every object.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    /// Number of live objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns `true` if the pool holds no objects.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Further objects that fit; `None` for growable pools.
    pub fn free_count(&self) -> Option<usize> {
        self.list.free_count()
    }

    /// Maximum number of objects; `None` for growable pools.
    pub fn capacity(&self) -> Option<usize> {
        self.list.capacity()
    }

    /// Live entries in chain order.
    pub fn iter(&self) -> impl Iterator<Item = &PoolEntry<T>> + '_ {
        self.list.iter().map(|(_, entry)| entry)
    }

    /// Read-only access to the underlying free list.
    pub fn as_free_list(&self) -> &FreeList<PoolEntry<T>, S> {
        &self.list
    }
}
