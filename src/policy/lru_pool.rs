//! Per-key FILO pools of idle objects with manager-driven eviction.
//!
//! An [`LruPool`] keeps, for every key, a bucket of objects handed back by
//! their users. [`push`](LruPool::push) stores an object at the front of its
//! key's bucket and [`pull`](LruPool::pull) takes the most recently pushed one
//! back out, so warm objects are reused first and cold ones drift to the
//! back, where the shared [`LruPoolManager`] evicts them.
//!
//! ## Architecture
//!
//! ```text
//!   LruPool<K, V, A>
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ FxHashMap<K, Rc<RefCell<Bucket>>>                            │
//!   │                                                              │
//!   │   key 123 ─► front ─► [C #3] ◄──► [A #1] ◄── back (oldest)   │
//!   │   key 456 ─► front ─► [B #2]                                 │
//!   │                                                              │
//!   │ push ids: strictly increasing, never 0                       │
//!   └──────────────────────────────────────────────────────────────┘
//!              │ push: check {#id, Weak(bucket)}
//!              ▼
//!   SharedLruManager (Rc<RefCell<LruPoolManager>>)
//! ```
//!
//! Buckets emptied by eviction stay in the map until the next
//! [`push`](LruPool::push) finds them outnumbering the live ones and sweeps
//! them out, or a [`pull`](LruPool::pull) on their key removes them.
//!
//! ## Action hooks
//!
//! | Event            | Hook                         |
//! |------------------|------------------------------|
//! | `push`           | `on_push`                    |
//! | `pull`           | `on_pull`, then `on_reset`   |
//! | eviction / drop  | `on_gc` (default: drop)      |
//!
//! ## Example
//!
//! ```
//! use slotkit::policy::{LruPool, LruPoolManager};
//!
//! let mgr = LruPoolManager::create();
//! let mut pool: LruPool<&str, Vec<u8>> = LruPool::new();
//! pool.init(mgr.clone());
//!
//! pool.push("buf", Vec::with_capacity(64));
//! pool.push("buf", Vec::with_capacity(128));
//!
//! // last in, first out
//! assert_eq!(pool.pull(&"buf").map(|v| v.capacity() >= 128), Some(true));
//! assert_eq!(mgr.borrow().item_count(), 1);
//! assert!(pool.pull(&"other").is_none());
//! ```

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::hash::Hash;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::policy::lru_manager::{LruList, ManagerLink, SharedLruManager};

/// Hooks run on objects as they move through an [`LruPool`].
pub trait LruAction<V> {
    fn on_push(&self, _value: &mut V) {}

    fn on_pull(&self, _value: &mut V) {}

    fn on_reset(&self, _value: &mut V) {}

    /// Disposes of an evicted object.
    fn on_gc(&self, value: V) {
        drop(value);
    }
}

/// Action that only drops evicted objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropAction;

impl<V> LruAction<V> for DropAction {}

type OwnerCell = Rc<RefCell<Option<ManagerLink>>>;

struct Wrapper<V> {
    value: V,
    push_id: u64,
}

struct Bucket<V, A> {
    cache: VecDeque<Wrapper<V>>,
    action: Rc<A>,
    owner: OwnerCell,
    emptied: Rc<Cell<usize>>,
}

impl<V, A: LruAction<V>> LruList for Bucket<V, A> {
    fn tail_id(&self) -> u64 {
        self.cache.back().map_or(0, |w| w.push_id)
    }

    fn gc(&mut self) -> bool {
        match self.cache.pop_back() {
            Some(wrapper) => {
                if self.cache.is_empty() {
                    self.emptied.set(self.emptied.get() + 1);
                }
                self.action.on_gc(wrapper.value);
                true
            }
            None => false,
        }
    }

    fn owner(&self) -> Option<ManagerLink> {
        self.owner.borrow().clone()
    }
}

/// Keyed FILO object pool coordinated by an [`LruPoolManager`](crate::policy::LruPoolManager).
pub struct LruPool<K, V, A: LruAction<V> = DropAction> {
    data: FxHashMap<K, Rc<RefCell<Bucket<V, A>>>>,
    manager: Option<SharedLruManager>,
    owner: OwnerCell,
    action: Rc<A>,
    /// Buckets emptied by eviction since the last sweep.
    emptied: Rc<Cell<usize>>,
    last_push_id: u64,
}

impl<K, V, A: LruAction<V> + Default> LruPool<K, V, A> {
    /// Creates a detached pool with a default action.
    pub fn new() -> Self {
        Self::with_action(A::default())
    }
}

impl<K, V, A: LruAction<V> + Default> Default for LruPool<K, V, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A: LruAction<V>> LruPool<K, V, A> {
    /// Creates a detached pool using `action` for its hooks.
    pub fn with_action(action: A) -> Self {
        Self {
            data: FxHashMap::default(),
            manager: None,
            owner: Rc::new(RefCell::new(None)),
            action: Rc::new(action),
            emptied: Rc::new(Cell::new(0)),
            last_push_id: 0,
        }
    }

    /// Attaches the pool to `manager`.
    pub fn init(&mut self, manager: SharedLruManager) {
        self.set_manager(Some(manager));
    }

    /// Moves the pool to another manager (or detaches it with `None`).
    ///
    /// The pool's idle objects are subtracted from the old manager's item
    /// count and added to the new one's.
    pub fn set_manager(&mut self, manager: Option<SharedLruManager>) {
        let held = self.len();
        if let Some(old) = self.manager.take() {
            old.borrow_mut().remove_items(held);
        }
        if let Some(new) = &manager {
            new.borrow_mut().add_items(held);
        }
        *self.owner.borrow_mut() = manager.as_ref().map(ManagerLink::of);
        self.manager = manager;
    }

    /// The manager this pool reports to.
    pub fn manager(&self) -> Option<&SharedLruManager> {
        self.manager.as_ref()
    }

    /// Action used for the hooks.
    pub fn action(&self) -> &A {
        &self.action
    }

    /// Total number of idle objects.
    pub fn len(&self) -> usize {
        self.data.values().map(|b| b.borrow().cache.len()).sum()
    }

    /// Returns `true` if no object is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys currently holding a bucket.
    pub fn key_count(&self) -> usize {
        self.data.len()
    }

    /// Drops buckets left empty by eviction once they make up more than
    /// half of the key map.
    fn sweep_emptied(&mut self) {
        if self.emptied.get() > self.data.len() / 2 {
            self.data.retain(|_, bucket| !bucket.borrow().cache.is_empty());
            self.emptied.set(0);
        }
    }

    fn next_push_id(&mut self) -> u64 {
        loop {
            self.last_push_id = self.last_push_id.wrapping_add(1);
            if self.last_push_id != 0 {
                return self.last_push_id;
            }
        }
    }
}

impl<K, V, A> LruPool<K, V, A>
where
    K: Hash + Eq,
    V: 'static,
    A: LruAction<V> + 'static,
{
    /// Stores `value` as the most recent object under `key`.
    ///
    /// Returns the push id stamped on the entry. If the pool is attached and
    /// this push exceeds a budget, the manager evicts synchronously (possibly
    /// from this very bucket).
    pub fn push(&mut self, key: K, value: V) -> u64 {
        self.sweep_emptied();
        let push_id = self.next_push_id();
        let bucket = Rc::clone(self.data.entry(key).or_insert_with(|| {
            Rc::new(RefCell::new(Bucket {
                cache: VecDeque::new(),
                action: Rc::clone(&self.action),
                owner: Rc::clone(&self.owner),
                emptied: Rc::clone(&self.emptied),
            }))
        }));

        {
            let mut bucket = bucket.borrow_mut();
            bucket.cache.push_front(Wrapper { value, push_id });
            if let Some(front) = bucket.cache.front_mut() {
                self.action.on_push(&mut front.value);
            }
        }

        if let Some(manager) = &self.manager {
            let list: Rc<RefCell<dyn LruList>> = bucket;
            let mut manager = manager.borrow_mut();
            manager.add_items(1);
            manager.push_check_list(push_id, Rc::downgrade(&list));
        }
        push_id
    }

    /// Takes back the most recently pushed object under `key`.
    pub fn pull(&mut self, key: &K) -> Option<V> {
        let bucket = self.data.get(key)?;
        let popped = bucket.borrow_mut().cache.pop_front();
        if bucket.borrow().cache.is_empty() {
            self.data.remove(key);
        }
        let mut wrapper = popped?;

        self.action.on_pull(&mut wrapper.value);
        self.action.on_reset(&mut wrapper.value);

        if let Some(manager) = &self.manager {
            manager.borrow_mut().remove_items(1);
        }
        Some(wrapper.value)
    }

    /// Number of idle objects under `key`.
    pub fn bucket_len(&self, key: &K) -> usize {
        self.data.get(key).map_or(0, |b| b.borrow().cache.len())
    }

    /// Returns `true` if `key` has at least one idle object.
    pub fn contains_key(&self, key: &K) -> bool {
        self.bucket_len(key) > 0
    }
}

impl<K, V, A: LruAction<V>> Drop for LruPool<K, V, A> {
    fn drop(&mut self) {
        self.set_manager(None);
        for bucket in self.data.values() {
            while bucket.borrow_mut().gc() {}
        }
        self.data.clear();
    }
}

impl<K, V, A: LruAction<V>> std::fmt::Debug for LruPool<K, V, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruPool")
            .field("keys", &self.data.len())
            .field("len", &self.len())
            .field("attached", &self.manager.is_some())
            .field("last_push_id", &self.last_push_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::policy::lru_manager::LruPoolManager;

    #[derive(Debug, Default)]
    struct Counting {
        push: Cell<usize>,
        pull: Cell<usize>,
        reset: Cell<usize>,
        gc: Cell<usize>,
    }

    impl Counting {
        fn stats(&self) -> [usize; 4] {
            [self.push.get(), self.pull.get(), self.reset.get(), self.gc.get()]
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Shared(Rc<Counting>);

    impl<V> LruAction<V> for Shared {
        fn on_push(&self, _: &mut V) {
            self.0.push.set(self.0.push.get() + 1);
        }

        fn on_pull(&self, _: &mut V) {
            self.0.pull.set(self.0.pull.get() + 1);
        }

        fn on_reset(&self, _: &mut V) {
            self.0.reset.set(self.0.reset.get() + 1);
        }

        fn on_gc(&self, _: V) {
            self.0.gc.set(self.0.gc.get() + 1);
        }
    }

    #[derive(Debug, PartialEq)]
    struct Data(u32);

    #[test]
    fn push_pull_and_forced_gc() {
        let stats = Shared::default();
        let mgr = LruPoolManager::create();
        {
            let mut lru: LruPool<u32, Data, Shared> = LruPool::with_action(stats.clone());
            lru.init(mgr.clone());

            lru.push(123, Data(1));
            lru.push(456, Data(2));
            lru.push(123, Data(3));
            assert_eq!(stats.0.stats(), [3, 0, 0, 0]);
            assert_eq!(mgr.borrow().item_count(), 3);
            assert_eq!(mgr.borrow().list_count(), 3);

            assert_eq!(lru.pull(&789), None);
            assert_eq!(lru.pull(&456), Some(Data(2)));
            assert_eq!(lru.pull(&456), None);
            assert_eq!(stats.0.stats(), [3, 1, 1, 0]);

            // the oldest entry under 123 goes first
            assert_eq!(mgr.borrow_mut().gc(), 1);
            assert_eq!(stats.0.stats(), [3, 1, 1, 1]);
            assert_eq!(lru.bucket_len(&123), 1);
        }
        // dropping the pool evicts what is left
        assert_eq!(stats.0.stats(), [3, 1, 1, 2]);
        assert_eq!(mgr.borrow().item_count(), 0);
    }

    #[test]
    fn push_triggered_eviction_and_proc_batches() {
        let stats = Shared::default();
        let mgr = LruPoolManager::create();
        let mut lru: LruPool<u32, Data, Shared> = LruPool::with_action(stats.clone());
        lru.init(mgr.clone());
        {
            let mut m = mgr.borrow_mut();
            m.set_proc_item_count(16);
            m.set_proc_list_count(16);
            m.set_item_max_bound(32);
        }

        for i in 0..32 {
            lru.push(123, Data(i));
        }
        for i in 0..24 {
            assert_eq!(lru.pull(&123), Some(Data(31 - i)));
        }
        for i in 0..24 {
            lru.push(123, Data(i + 8));
        }
        assert_eq!(stats.0.stats(), [56, 24, 24, 0]);

        lru.push(123, Data(100));
        assert_eq!(stats.0.gc.get(), 1);
        mgr.borrow_mut().set_item_max_bound(8);
        lru.push(123, Data(101));
        assert_eq!(stats.0.gc.get(), 8);
        assert_eq!(mgr.borrow().list_count(), 41);
        assert_eq!(mgr.borrow().item_count(), 26);

        let steps: Vec<_> = (0..4)
            .map(|_| {
                let evicted = mgr.borrow_mut().proc();
                let m = mgr.borrow();
                (evicted, m.list_count(), m.item_count())
            })
            .collect();
        assert_eq!(steps, [(1, 25, 25), (16, 9, 9), (1, 8, 8), (0, 8, 8)]);
        assert_eq!(lru.len(), 8);
    }

    #[test]
    fn pull_is_filo_per_key() {
        let mut lru: LruPool<&str, u32> = LruPool::new();
        for v in 0..5 {
            lru.push("k", v);
        }
        lru.push("other", 99);
        let pulled: Vec<_> = std::iter::from_fn(|| lru.pull(&"k")).collect();
        assert_eq!(pulled, [4, 3, 2, 1, 0]);
        assert_eq!(lru.pull(&"other"), Some(99));
        assert!(lru.is_empty());
    }

    #[test]
    fn detached_pool_tracks_nothing() {
        let mgr = LruPoolManager::create();
        let mut lru: LruPool<u8, u8> = LruPool::new();
        lru.push(1, 1);
        assert_eq!(mgr.borrow().item_count(), 0);
        assert!(lru.manager().is_none());

        // attaching brings existing objects into the budget
        lru.init(mgr.clone());
        assert_eq!(mgr.borrow().item_count(), 1);
        lru.set_manager(None);
        assert_eq!(mgr.borrow().item_count(), 0);
    }

    #[test]
    fn set_manager_moves_item_count() {
        let a = LruPoolManager::create();
        let b = LruPoolManager::create();
        let mut lru: LruPool<u8, u8> = LruPool::new();
        lru.init(a.clone());
        lru.push(1, 1);
        lru.push(2, 2);
        lru.set_manager(Some(b.clone()));
        assert_eq!(a.borrow().item_count(), 0);
        assert_eq!(b.borrow().item_count(), 2);
    }

    #[test]
    fn evicted_buckets_do_not_pile_up_under_key_churn() {
        let mgr = LruPoolManager::create();
        mgr.borrow_mut().set_item_max_bound(8);
        let mut lru: LruPool<u32, u32> = LruPool::new();
        lru.init(mgr.clone());

        for key in 0..10_000 {
            lru.push(key, key);
            assert!(lru.len() <= 8, "len {} after key {key}", lru.len());
            assert!(lru.key_count() <= 18, "{} keys after key {key}", lru.key_count());
        }
        assert!(lru.contains_key(&9_999));
        assert!(!lru.contains_key(&0));
    }

    #[test]
    fn pull_on_emptied_bucket_drops_the_key() {
        let mgr = LruPoolManager::create();
        let mut lru: LruPool<u32, u32> = LruPool::new();
        lru.init(mgr.clone());
        lru.push(1, 10);
        lru.push(2, 20);
        mgr.borrow_mut().set_item_max_bound(1);
        lru.push(2, 21);
        assert_eq!(lru.bucket_len(&1), 0);

        assert_eq!(lru.pull(&1), None);
        assert_eq!(lru.key_count(), 1);
    }

    #[test]
    fn push_ids_strictly_increase() {
        let mut lru: LruPool<u8, ()> = LruPool::new();
        let ids: Vec<_> = (0..10).map(|i| lru.push(i % 3, ())).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(ids.iter().all(|&id| id != 0));
    }

    #[test]
    fn push_id_skips_zero_on_wrap() {
        let mut lru: LruPool<u8, ()> = LruPool::new();
        lru.last_push_id = u64::MAX;
        assert_eq!(lru.push(0, ()), 1);
    }

    #[test]
    fn repeated_gc_converges_under_constant_load() {
        let mgr = LruPoolManager::create();
        let mut lru: LruPool<u32, u32> = LruPool::new();
        lru.init(mgr.clone());
        for round in 0..50u32 {
            for key in 0..20 {
                lru.push(key, round);
            }
            for key in 0..20 {
                lru.pull(&key);
            }
            mgr.borrow_mut().gc();
        }
        let first = mgr.borrow().bounds();
        mgr.borrow_mut().gc();
        let second = mgr.borrow().bounds();
        assert_eq!(first.item_max_bound, second.item_max_bound);
        assert!(mgr.borrow().item_count() <= lru.len());
    }
}
