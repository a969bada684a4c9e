//! Type-indexed registry of growable pools.
//!
//! Code that wants "the pool for type `T`" without threading the pool
//! through every call can keep one [`PoolRegistry`] and look pools up by
//! type. The registry is an ordinary owned value: there is no global state,
//! and two registries never share pools.

use std::any::{Any, TypeId};
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::pool::keyed::KeyedObjectPool;
use crate::pool::object_pool::ObjectPool;

/// Owned map from pool type to pool instance.
///
/// # Example
///
/// ```
/// use slotkit::pool::PoolRegistry;
///
/// let mut registry = PoolRegistry::new();
/// let id = registry.pool_mut::<u32>().create(5).unwrap().id();
/// registry.keyed_pool_mut::<String, f64>().create_by_key("half".into(), 0.5).unwrap();
///
/// assert_eq!(registry.pool::<u32>().and_then(|p| p.get(id)).map(|e| **e), Some(5));
/// assert!(registry.pool::<i64>().is_none());
/// assert_eq!(registry.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: FxHashMap<TypeId, Box<dyn Any>>,
}

impl PoolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registered `P`, creating it with `P::default()` first if needed.
    pub fn get_or_default<P: Any + Default>(&mut self) -> &mut P {
        let pool = self
            .pools
            .entry(TypeId::of::<P>())
            .or_insert_with(|| Box::new(P::default()));
        match pool.downcast_mut::<P>() {
            Some(pool) => pool,
            None => unreachable!("registry entry keyed by TypeId holds another type"),
        }
    }

    /// Returns the registered `P`, if any.
    pub fn get<P: Any>(&self) -> Option<&P> {
        self.pools.get(&TypeId::of::<P>())?.downcast_ref()
    }

    /// Returns the registered `P` mutably, if any.
    pub fn get_mut<P: Any>(&mut self) -> Option<&mut P> {
        self.pools.get_mut(&TypeId::of::<P>())?.downcast_mut()
    }

    /// Registers `pool`, returning the one it replaces.
    pub fn insert<P: Any>(&mut self, pool: P) -> Option<P> {
        let old = self.pools.insert(TypeId::of::<P>(), Box::new(pool))?;
        old.downcast().ok().map(|boxed| *boxed)
    }

    /// Unregisters and returns `P`.
    pub fn remove<P: Any>(&mut self) -> Option<P> {
        let old = self.pools.remove(&TypeId::of::<P>())?;
        old.downcast().ok().map(|boxed| *boxed)
    }

    /// The id-addressed pool of `T`, created on first use.
    pub fn pool_mut<T: 'static>(&mut self) -> &mut ObjectPool<T> {
        self.get_or_default()
    }

    /// The id-addressed pool of `T`, if created.
    pub fn pool<T: 'static>(&self) -> Option<&ObjectPool<T>> {
        self.get()
    }

    /// The keyed pool of `T` by `K`, created on first use.
    pub fn keyed_pool_mut<K, T>(&mut self) -> &mut KeyedObjectPool<K, T>
    where
        K: Hash + Ord + Clone + 'static,
        T: 'static,
    {
        self.get_or_default()
    }

    /// The keyed pool of `T` by `K`, if created.
    pub fn keyed_pool<K, T>(&self) -> Option<&KeyedObjectPool<K, T>>
    where
        K: Hash + Ord + Clone + 'static,
        T: 'static,
    {
        self.get()
    }

    /// Number of registered pools.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Returns `true` if no pool is registered.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Drops every registered pool.
    pub fn clear(&mut self) {
        self.pools.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pools_are_per_type() {
        let mut registry = PoolRegistry::new();
        registry.pool_mut::<u8>().create(1);
        registry.pool_mut::<u8>().create(2);
        registry.pool_mut::<u16>().create(3);
        assert_eq!(registry.pool::<u8>().map(ObjectPool::len), Some(2));
        assert_eq!(registry.pool::<u16>().map(ObjectPool::len), Some(1));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn keyed_and_plain_pools_do_not_collide() {
        let mut registry = PoolRegistry::new();
        registry.pool_mut::<u32>().create(1);
        registry.keyed_pool_mut::<u8, u32>().create_by_key(1, 1).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.keyed_pool::<u8, u32>().is_some_and(|p| p.contains_key(&1)));
        assert!(registry.keyed_pool::<u16, u32>().is_none());
    }

    #[test]
    fn insert_and_remove_round_trip() {
        let mut registry = PoolRegistry::new();
        let mut pool = ObjectPool::new();
        pool.create('x');
        assert!(registry.insert(pool).is_none());

        let replaced = registry.insert(ObjectPool::<char>::new()).unwrap();
        assert_eq!(replaced.len(), 1);

        let removed: ObjectPool<char> = registry.remove().unwrap();
        assert!(removed.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut registry = PoolRegistry::new();
        registry.pool_mut::<i8>();
        registry.pool_mut::<i16>();
        registry.clear();
        assert!(registry.get::<ObjectPool<i8>>().is_none());
        assert!(registry.get_mut::<ObjectPool<i16>>().is_none());
    }
}
