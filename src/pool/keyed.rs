//! Object pool addressed by application key as well as by id.
//!
//! Keys are spread over a fixed number of hash buckets (FNV-1, see
//! [`hash`](crate::pool::hash)); each bucket is an ordered map from key to
//! slot id. A prime bucket count keeps collisions low; the default is
//! [`DEFAULT_BUCKETS`].
//!
//! ```text
//!   buckets[bucket_index(key)]           free list
//!   ┌──────────────┐                     ┌──────────────────────────────┐
//!   │ BTreeMap     │  key ───► id ─────► │ KeyedEntry { id, key, value }│
//!   │  key → id    │                     └──────────────────────────────┘
//!   └──────────────┘
//! ```
//!
//! Every live key maps to exactly one live slot. Creation checks for a
//! duplicate first, then allocates, then records the key, so a failed create
//! leaves nothing behind. Removal by id or by key drops both sides.
//!
//! For buffer-backed pools only the slots live in the region; the buckets are
//! process-local and are rebuilt from the stored keys on `resume`.

use std::collections::BTreeMap;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::ds::FreeList;
use crate::error::{AttachError, ConfigError, InvariantError, PoolError, ResumeError};
use crate::pool::hash::bucket_index;
use crate::pool::resume::{self, ResumeHook, ResumePolicy};
use crate::store::fixed::FixedStorage;
use crate::store::growable::GrowableStorage;
use crate::store::region::ShmSafe;
use crate::store::traits::SlotStorage;

/// Default number of hash buckets.
pub const DEFAULT_BUCKETS: usize = 127;

/// A pooled object stamped with its id and key.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyedEntry<K, T> {
    id: usize,
    key: K,
    value: T,
}

impl<K, T> KeyedEntry<K, T> {
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

impl<K, T> Deref for KeyedEntry<K, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

unsafe impl<K: ShmSafe, T: ShmSafe> ShmSafe for KeyedEntry<K, T> {}

/// Mutable handle to a freshly created keyed object.
///
/// Id and key are readable but only the object itself can be changed, so
/// the key index stays in step with the slots.
#[derive(Debug)]
pub struct KeyedEntryMut<'a, K, T> {
    entry: &'a mut KeyedEntry<K, T>,
}

impl<'a, K, T> KeyedEntryMut<'a, K, T> {
    #[inline]
    pub fn id(&self) -> usize {
        self.entry.id
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.entry.key
    }

    pub fn into_mut(self) -> &'a mut T {
        &mut self.entry.value
    }
}

impl<K, T> Deref for KeyedEntryMut<'_, K, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entry.value
    }
}

impl<K, T> DerefMut for KeyedEntryMut<'_, K, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.entry.value
    }
}

/// Pool of objects addressed by id and by unique key.
///
/// # Example
///
/// ```
/// use slotkit::error::PoolError;
/// use slotkit::pool::KeyedObjectPool;
///
/// let mut pool = KeyedObjectPool::new();
/// let id = pool.create_by_key(7u32, "seven").unwrap().id();
///
/// assert_eq!(pool.create_by_key(7, "again").unwrap_err(), PoolError::DuplicateKey);
/// assert_eq!(pool.get_by_key(&7).map(|e| e.id()), Some(id));
/// assert_eq!(pool.remove_by_key(&7), Some("seven"));
/// assert!(pool.get_by_key(&7).is_none());
/// ```
#[derive(Debug)]
pub struct KeyedObjectPool<K, T, S = GrowableStorage<KeyedEntry<K, T>>> {
    list: FreeList<KeyedEntry<K, T>, S>,
    buckets: Vec<BTreeMap<K, usize>>,
}

/// Keyed pool over a fixed-capacity region.
pub type FixedKeyedObjectPool<'a, K, T> =
    KeyedObjectPool<K, T, FixedStorage<'a, KeyedEntry<K, T>>>;

fn empty_buckets<K>(count: usize) -> Result<Vec<BTreeMap<K, usize>>, ConfigError> {
    if count == 0 {
        return Err(ConfigError::new("bucket_count must be > 0"));
    }
    Ok((0..count).map(|_| BTreeMap::new()).collect())
}

impl<K: Hash + Ord + Clone, T> KeyedObjectPool<K, T> {
    /// Creates an empty growable pool with [`DEFAULT_BUCKETS`] buckets.
    pub fn new() -> Self {
        Self {
            list: FreeList::new(),
            buckets: (0..DEFAULT_BUCKETS).map(|_| BTreeMap::new()).collect(),
        }
    }

    /// Creates an empty growable pool with `bucket_count` hash buckets.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if `bucket_count` is zero.
    pub fn try_with_buckets(bucket_count: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            list: FreeList::new(),
            buckets: empty_buckets(bucket_count)?,
        })
    }
}

impl<K: Hash + Ord + Clone, T> Default for KeyedObjectPool<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Ord + Clone, T> KeyedObjectPool<K, T, FixedStorage<'static, KeyedEntry<K, T>>> {
    /// Creates an empty pool holding at most `capacity` objects.
    pub fn fixed(capacity: usize) -> Self {
        Self {
            list: FreeList::fixed(capacity),
            buckets: (0..DEFAULT_BUCKETS).map(|_| BTreeMap::new()).collect(),
        }
    }
}

impl<'a, K, T> FixedKeyedObjectPool<'a, K, T> {
    /// Bytes a buffer must provide for a pool of `capacity` objects.
    pub fn mem_size(capacity: usize) -> usize {
        FixedStorage::<'a, KeyedEntry<K, T>>::mem_size(capacity)
    }

    /// Alignment a buffer must satisfy.
    pub fn required_align() -> usize {
        FixedStorage::<'a, KeyedEntry<K, T>>::required_align()
    }
}

impl<'a, K, T> FixedKeyedObjectPool<'a, K, T>
where
    K: ShmSafe + Hash + Ord,
    T: ShmSafe,
{
    /// Initialises an empty pool of `capacity` objects inside `buf`.
    pub fn construct(buf: &'a mut [u8], capacity: usize) -> Result<Self, AttachError> {
        Ok(Self {
            list: FreeList::construct(buf, capacity)?,
            buckets: (0..DEFAULT_BUCKETS).map(|_| BTreeMap::new()).collect(),
        })
    }
}

impl<'a, K, T> FixedKeyedObjectPool<'a, K, T>
where
    K: ShmSafe + Hash + Ord,
    T: ShmSafe + ResumeHook,
{
    /// Reattaches to a pool previously constructed in `buf`.
    ///
    /// Runs [`ResumeHook::on_resume`] on every live object, then rebuilds the
    /// key index from the stored keys. Objects discarded by `policy` do not
    /// get an index entry.
    ///
    /// # Errors
    ///
    /// [`ResumeError::Attach`] if the region fails validation,
    /// [`ResumeError::HookFailed`] under [`ResumePolicy::Abort`], and
    /// [`ResumeError::DuplicateKey`] if two stored objects share a key.
    pub fn resume(buf: &'a mut [u8], policy: ResumePolicy) -> Result<Self, ResumeError> {
        let mut list = FreeList::resume(buf)?;
        let mut buckets: Vec<BTreeMap<K, usize>> =
            (0..DEFAULT_BUCKETS).map(|_| BTreeMap::new()).collect();
        let stats = resume::replay(
            &mut list,
            policy,
            |entry: &mut KeyedEntry<K, T>| entry.value.on_resume(),
            |id, entry| {
                let bucket = &mut buckets[bucket_index(&entry.key, DEFAULT_BUCKETS)];
                match bucket.insert(entry.key, id) {
                    None => Ok(()),
                    Some(_) => Err(ResumeError::DuplicateKey { id }),
                }
            },
        )?;
        debug!(
            live = list.len(),
            discarded = stats.discarded,
            "resumed keyed object pool"
        );
        Ok(Self { list, buckets })
    }
}

impl<K, T, S> KeyedObjectPool<K, T, S>
where
    K: Hash + Ord + Clone,
    S: SlotStorage<KeyedEntry<K, T>>,
{
    /// Number of hash buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    fn bucket(&self, key: &K) -> &BTreeMap<K, usize> {
        &self.buckets[bucket_index(key, self.buckets.len())]
    }

    #[inline]
    fn bucket_mut(&mut self, key: &K) -> &mut BTreeMap<K, usize> {
        let idx = bucket_index(key, self.buckets.len());
        &mut self.buckets[idx]
    }

    /// Creates an object under `key`.
    ///
    /// # Errors
    ///
    /// [`PoolError::DuplicateKey`] if `key` is live; [`PoolError::Exhausted`]
    /// if a fixed pool is full. Neither changes the pool.
    pub fn create_by_key(&mut self, key: K, value: T) -> Result<KeyedEntryMut<'_, K, T>, PoolError> {
        self.create_by_key_with(key, |_| value)
    }

    /// Creates a default-constructed object under `key`.
    pub fn create_default_by_key(&mut self, key: K) -> Result<KeyedEntryMut<'_, K, T>, PoolError>
    where
        T: Default,
    {
        self.create_by_key_with(key, |_| T::default())
    }

    /// Creates an object under `key` from a constructor that receives the new id.
    pub fn create_by_key_with(
        &mut self,
        key: K,
        init: impl FnOnce(usize) -> T,
    ) -> Result<KeyedEntryMut<'_, K, T>, PoolError> {
        if self.bucket(&key).contains_key(&key) {
            return Err(PoolError::DuplicateKey);
        }
        let stored = key.clone();
        let id = self
            .list
            .create_with(|id| KeyedEntry {
                id,
                key: stored,
                value: init(id),
            })
            .ok_or(PoolError::Exhausted)?;
        self.bucket_mut(&key).insert(key, id);
        self.list
            .get_mut(id)
            .map(|entry| KeyedEntryMut { entry })
            .ok_or(PoolError::Exhausted)
    }

    /// Returns the entry at `id`, if live.
    #[inline]
    pub fn get(&self, id: usize) -> Option<&KeyedEntry<K, T>> {
        self.list.get(id)
    }

    /// Returns the object at `id` mutably, if live.
    #[inline]
    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.list.get_mut(id).map(|entry| &mut entry.value)
    }

    /// Returns the entry stored under `key`.
    pub fn get_by_key(&self, key: &K) -> Option<&KeyedEntry<K, T>> {
        let id = *self.bucket(key).get(key)?;
        self.list.get(id)
    }

    /// Returns the object stored under `key` mutably.
    pub fn get_by_key_mut(&mut self, key: &K) -> Option<&mut T> {
        let id = *self.bucket(key).get(key)?;
        self.get_mut(id)
    }

    /// Returns `true` if `key` is live.
    pub fn contains_key(&self, key: &K) -> bool {
        self.bucket(key).contains_key(key)
    }

    /// Returns `true` if `id` denotes a live object.
    #[inline]
    pub fn contains(&self, id: usize) -> bool {
        self.list.contains(id)
    }

    /// Oldest live entry in chain order.
    pub fn first(&self) -> Option<&KeyedEntry<K, T>> {
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

    /// Removes the object stored under `key` and returns it.
    pub fn remove_by_key(&mut self, key: &K) -> Option<T> {
        let id = self.bucket_mut(key).remove(key)?;
        self.list.remove(id).map(KeyedEntry::into_value)
    }

    /// Removes the object at `id` and its key, and returns the object.
    pub fn remove(&mut self, id: usize) -> Option<T> {
        let entry = self.list.remove(id)?;
        self.bucket_mut(&entry.key).remove(&entry.key);
        Some(entry.value)
    }

    /// Drops every object and key.
    pub fn clear(&mut self) {
        self.list.clear();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
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
    pub fn iter(&self) -> impl Iterator<Item = &KeyedEntry<K, T>> + '_ {
        self.list.iter().map(|(_, entry)| entry)
    }

    /// Read-only access to the underlying free list.
    pub fn as_free_list(&self) -> &FreeList<KeyedEntry<K, T>, S> {
        &self.list
    }

    /// Verifies the free list and that keys and live slots correspond one to one.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.list.check_invariants()?;
        let mapped: usize = self.buckets.iter().map(BTreeMap::len).sum();
        if mapped != self.list.len() {
            return Err(InvariantError::new(format!(
                "{mapped} keys for {} live objects",
                self.list.len()
            )));
        }
        for (id, entry) in self.list.iter() {
            if self.bucket(&entry.key).get(&entry.key) != Some(&id) {
                return Err(InvariantError::new(format!(
                    "object {id} not reachable through its key"
                )));
            }
        }
        Ok(())
    }
}
