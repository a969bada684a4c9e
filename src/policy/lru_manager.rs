//! Budget-driven eviction manager shared by LRU pools.
//!
//! Every push into an attached [`LruPool`](crate::policy::lru_pool::LruPool)
//! appends a *check* `{push_id, weak bucket}` to the manager's FIFO queue.
//! Eviction drains that queue from the front: a check whose bucket still
//! exists and whose oldest entry still carries the checked push id evicts
//! that entry; any other check is stale and is consumed without progress.
//!
//! ## Architecture
//!
//! ```text
//!   LruPoolManager
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │ counters: item_count, list_count                                 │
//!   │ bounds:   item_min_bound, item_max_bound, list_bound             │
//!   │ batches:  proc_item_count, proc_list_count                       │
//!   │ targets:  gc_item, gc_list   (0 = not armed)                     │
//!   │                                                                  │
//!   │ check queue (front = oldest)                                     │
//!   │  ┌─────────────┬─────────────┬─────────────┬─────────────┐       │
//!   │  │ id 1, W(b1) │ id 2, W(b2) │ id 3, W(b1) │     ...     │       │
//!   │  └──────┬──────┴─────────────┴─────────────┴─────────────┘       │
//!   └─────────┼────────────────────────────────────────────────────────┘
//!             ▼ upgrade + tail_id == 1 ?  → evict tail of b1
//! ```
//!
//! ## Passes
//!
//! | Call          | Arms                                         | Then   |
//! |---------------|----------------------------------------------|--------|
//! | push (over)   | unarmed `gc_list = list_bound`,              | `proc` |
//! |               | unarmed `gc_item = item_max_bound`           |        |
//! | `gc()`        | if unarmed: re-derive bounds, `gc_list =     | `proc` |
//! |               | list_bound`, `gc_item = item_min_bound`;     |        |
//! |               | if still armed: accelerate batch sizes       |        |
//! | `proc()`      | nothing                                      | drain  |
//!
//! `proc()` disarms each target once its counter is at or below it and
//! stops after `proc_list_count` checks or `proc_item_count` evictions. An
//! empty queue resets both counters and both targets to zero.
//!
//! The manager must not be borrowed while an attached pool pushes, pulls or
//! is dropped, and [`LruAction::on_gc`](crate::policy::lru_pool::LruAction::on_gc)
//! must not call back into the manager.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::policy::gc_policy::{self, Bounds};

/// Manager handle shared by the pools it coordinates.
pub type SharedLruManager = Rc<RefCell<LruPoolManager>>;

pub const DEFAULT_ITEM_MIN_BOUND: usize = 0;
pub const DEFAULT_ITEM_MAX_BOUND: usize = 1024;
pub const DEFAULT_LIST_BOUND: usize = 2048;
pub const DEFAULT_PROC_LIST_COUNT: usize = 16;
pub const DEFAULT_PROC_ITEM_COUNT: usize = 16;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// Bucket interface the manager evicts through.
pub(crate) trait LruList {
    /// Push id of the oldest entry, `0` when empty.
    fn tail_id(&self) -> u64;

    /// Evicts the oldest entry; `false` when empty.
    fn gc(&mut self) -> bool;

    /// Manager the owning pool is attached to.
    fn owner(&self) -> Option<ManagerLink>;
}

/// Identity of a manager as seen by a pool's buckets.
#[derive(Debug, Clone)]
pub(crate) struct ManagerLink {
    pub(crate) id: u64,
    pub(crate) manager: Weak<RefCell<LruPoolManager>>,
}

impl ManagerLink {
    pub(crate) fn of(manager: &SharedLruManager) -> Self {
        Self {
            id: manager.borrow().id,
            manager: Rc::downgrade(manager),
        }
    }
}

struct CheckItem {
    push_id: u64,
    list: Weak<RefCell<dyn LruList>>,
}

/// Global item and check budgets for a set of LRU pools.
///
/// # Example
///
/// ```
/// use slotkit::policy::{LruPool, LruPoolManager};
///
/// let mgr = LruPoolManager::create();
/// let mut pool: LruPool<u32, String> = LruPool::new();
/// pool.init(mgr.clone());
///
/// pool.push(1, "a".into());
/// pool.push(1, "b".into());
/// assert_eq!(mgr.borrow().item_count(), 2);
///
/// // the first pass evicts the oldest entry of key 1
/// assert_eq!(mgr.borrow_mut().gc(), 1);
/// assert_eq!(pool.pull(&1).as_deref(), Some("b"));
/// ```
pub struct LruPoolManager {
    id: u64,
    item_min_bound: usize,
    item_max_bound: usize,
    list_bound: usize,
    proc_list_count: usize,
    proc_item_count: usize,
    gc_list: usize,
    gc_item: usize,
    item_count: usize,
    list_count: usize,
    checked: VecDeque<CheckItem>,
}

impl Default for LruPoolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LruPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruPoolManager")
            .field("item_count", &self.item_count)
            .field("list_count", &self.list_count)
            .field("item_min_bound", &self.item_min_bound)
            .field("item_max_bound", &self.item_max_bound)
            .field("list_bound", &self.list_bound)
            .field("proc_list_count", &self.proc_list_count)
            .field("proc_item_count", &self.proc_item_count)
            .field("gc_list", &self.gc_list)
            .field("gc_item", &self.gc_item)
            .field("pending_checks", &self.checked.len())
            .finish()
    }
}

macro_rules! setter_getter {
    ($($field:ident => $setter:ident),* $(,)?) => {
        $(
            #[inline]
            pub fn $field(&self) -> usize {
                self.$field
            }

            #[inline]
            pub fn $setter(&mut self, value: usize) {
                self.$field = value;
            }
        )*
    };
}

impl LruPoolManager {
    /// Creates a manager with the default bounds and batch sizes.
    pub fn new() -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            item_min_bound: DEFAULT_ITEM_MIN_BOUND,
            item_max_bound: DEFAULT_ITEM_MAX_BOUND,
            list_bound: DEFAULT_LIST_BOUND,
            proc_list_count: DEFAULT_PROC_LIST_COUNT,
            proc_item_count: DEFAULT_PROC_ITEM_COUNT,
            gc_list: 0,
            gc_item: 0,
            item_count: 0,
            list_count: 0,
            checked: VecDeque::new(),
        }
    }

    /// Creates a shareable manager with the default settings.
    pub fn create() -> SharedLruManager {
        Self::new().into_shared()
    }

    /// Wraps the manager for sharing between pools.
    pub fn into_shared(self) -> SharedLruManager {
        Rc::new(RefCell::new(self))
    }

    setter_getter!(
        item_min_bound => set_item_min_bound,
        item_max_bound => set_item_max_bound,
        list_bound => set_list_bound,
        proc_list_count => set_proc_list_count,
        proc_item_count => set_proc_item_count,
        gc_list => set_gc_list,
        gc_item => set_gc_item,
    );

    /// Items currently counted against the budget.
    #[inline]
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Checks currently counted against the budget.
    #[inline]
    pub fn list_count(&self) -> usize {
        self.list_count
    }

    /// Checks waiting in the queue.
    pub fn pending_checks(&self) -> usize {
        self.checked.len()
    }

    /// Returns `true` while a pass has unmet targets.
    pub fn is_armed(&self) -> bool {
        self.gc_list != 0 || self.gc_item != 0
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            item_min_bound: self.item_min_bound,
            item_max_bound: self.item_max_bound,
            list_bound: self.list_bound,
        }
    }

    pub(crate) fn add_items(&mut self, n: usize) {
        self.item_count = self.item_count.saturating_add(n);
    }

    pub(crate) fn remove_items(&mut self, n: usize) {
        self.item_count = self.item_count.saturating_sub(n);
    }

    /// Forced pass with adaptive bounds. Returns the number of evicted items.
    pub fn gc(&mut self) -> usize {
        if self.gc_list > 0 {
            self.proc_list_count = gc_policy::accelerate(self.proc_list_count);
        }
        if self.gc_item > 0 {
            self.proc_item_count = gc_policy::accelerate(self.proc_item_count);
        }

        if !self.is_armed() {
            let bounds = gc_policy::rederive_bounds(self.bounds(), self.item_count, self.list_count);
            self.item_min_bound = bounds.item_min_bound;
            self.item_max_bound = bounds.item_max_bound;
            self.list_bound = bounds.list_bound;

            self.gc_list = self.list_bound;
            self.gc_item = self.item_min_bound;
        }

        debug!(
            item_count = self.item_count,
            list_count = self.list_count,
            gc_item = self.gc_item,
            gc_list = self.gc_list,
            proc_item_count = self.proc_item_count,
            proc_list_count = self.proc_list_count,
            "lru gc pass"
        );
        self.proc()
    }

    /// Periodic step: drains at most one batch of checks. Returns the number
    /// of evicted items.
    pub fn proc(&mut self) -> usize {
        if !self.is_armed() {
            return 0;
        }

        let mut evicted = 0;
        let mut left_list = self.proc_list_count;
        let mut left_item = self.proc_item_count;

        while left_list > 0 && left_item > 0 {
            if self.gc_item != 0 && self.item_count <= self.gc_item {
                self.gc_item = 0;
            }
            if self.gc_list != 0 && self.list_count <= self.gc_list {
                self.gc_list = 0;
            }
            if !self.is_armed() {
                break;
            }

            let Some(check) = self.checked.pop_front() else {
                self.gc_list = 0;
                self.gc_item = 0;
                self.list_count = 0;
                self.item_count = 0;
                break;
            };
            self.list_count = self.list_count.saturating_sub(1);
            left_list -= 1;

            let Some(list) = check.list.upgrade() else {
                continue;
            };
            let Ok(mut list) = list.try_borrow_mut() else {
                continue;
            };
            if list.tail_id() != check.push_id {
                continue;
            }
            if list.gc() {
                let owner = list.owner();
                drop(list);
                self.release_item(owner);
                evicted += 1;
                left_item -= 1;
            }
        }

        if evicted > 0 {
            debug!(
                evicted,
                item_count = self.item_count,
                list_count = self.list_count,
                "lru proc evicted items"
            );
        }
        evicted
    }

    /// Queues a check for the entry pushed with `push_id` into `list`.
    ///
    /// Runs an eviction pass when a budget is exceeded; returns the number of
    /// evicted items.
    pub(crate) fn push_check_list(&mut self, push_id: u64, list: Weak<RefCell<dyn LruList>>) -> usize {
        self.checked.push_back(CheckItem { push_id, list });
        self.list_count += 1;

        if self.list_count > self.list_bound || self.item_count > self.item_max_bound {
            self.inner_gc()
        } else {
            0
        }
    }

    fn inner_gc(&mut self) -> usize {
        if self.gc_list == 0 {
            self.gc_list = self.list_bound;
        }
        if self.gc_item == 0 {
            self.gc_item = self.item_max_bound;
        }
        self.proc()
    }

    /// Decrements the item count of the manager the evicted item belonged to.
    fn release_item(&mut self, owner: Option<ManagerLink>) {
        let Some(owner) = owner else {
            return;
        };
        if owner.id == self.id {
            self.remove_items(1);
        } else if let Some(other) = owner.manager.upgrade() {
            if let Ok(mut other) = other.try_borrow_mut() {
                other.remove_items(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeList {
        ids: VecDeque<u64>,
        owner: Option<ManagerLink>,
    }

    impl FakeList {
        fn len(&self) -> usize {
            self.ids.len()
        }
    }

    impl LruList for FakeList {
        fn tail_id(&self) -> u64 {
            self.ids.back().copied().unwrap_or(0)
        }

        fn gc(&mut self) -> bool {
            self.ids.pop_back().is_some()
        }

        fn owner(&self) -> Option<ManagerLink> {
            self.owner.clone()
        }
    }

    fn fake(mgr: &SharedLruManager, ids: &[u64]) -> Rc<RefCell<FakeList>> {
        Rc::new(RefCell::new(FakeList {
            ids: ids.iter().rev().copied().collect(),
            owner: Some(ManagerLink::of(mgr)),
        }))
    }

    fn queue(mgr: &SharedLruManager, list: &Rc<RefCell<FakeList>>, push_id: u64) {
        let list: Rc<RefCell<dyn LruList>> = list.clone();
        let mut m = mgr.borrow_mut();
        m.add_items(1);
        m.push_check_list(push_id, Rc::downgrade(&list));
    }

    #[test]
    fn defaults_match_documented_values() {
        let m = LruPoolManager::new();
        assert_eq!(m.item_min_bound(), 0);
        assert_eq!(m.item_max_bound(), 1024);
        assert_eq!(m.list_bound(), 2048);
        assert_eq!(m.proc_list_count(), 16);
        assert_eq!(m.proc_item_count(), 16);
        assert!(!m.is_armed());
    }

    #[test]
    fn proc_without_armed_targets_is_noop() {
        let mgr = LruPoolManager::create();
        let list = fake(&mgr, &[1]);
        queue(&mgr, &list, 1);
        assert_eq!(mgr.borrow_mut().proc(), 0);
        assert_eq!(mgr.borrow().pending_checks(), 1);
    }

    #[test]
    fn stale_checks_are_consumed_without_eviction() {
        let mgr = LruPoolManager::create();
        let list = fake(&mgr, &[2]);
        queue(&mgr, &list, 1);
        queue(&mgr, &list, 2);
        mgr.borrow_mut().set_gc_list(1);
        // check 1 is stale; the pass stops once list_count reaches 1
        assert_eq!(mgr.borrow_mut().proc(), 0);
        assert_eq!(mgr.borrow().list_count(), 1);
        assert_eq!(list.borrow().len(), 1);
    }

    #[test]
    fn expired_bucket_is_stale() {
        let mgr = LruPoolManager::create();
        {
            let list = fake(&mgr, &[1, 2]);
            queue(&mgr, &list, 1);
            queue(&mgr, &list, 2);
        }
        mgr.borrow_mut().set_gc_list(1);
        assert_eq!(mgr.borrow_mut().proc(), 0);
        assert_eq!(mgr.borrow().pending_checks(), 1);
    }

    #[test]
    fn empty_queue_resets_counters() {
        let mgr = LruPoolManager::create();
        {
            let mut m = mgr.borrow_mut();
            m.add_items(5);
            m.set_gc_item(1);
        }
        assert_eq!(mgr.borrow_mut().proc(), 0);
        let m = mgr.borrow();
        assert_eq!(m.item_count(), 0);
        assert_eq!(m.list_count(), 0);
        assert!(!m.is_armed());
    }

    #[test]
    fn over_budget_push_evicts_synchronously() {
        let mgr = LruPoolManager::create();
        mgr.borrow_mut().set_item_max_bound(2);
        let list = fake(&mgr, &[1, 2, 3]);
        queue(&mgr, &list, 1);
        queue(&mgr, &list, 2);
        assert_eq!(list.borrow().len(), 3);
        queue(&mgr, &list, 3);
        assert_eq!(list.borrow().len(), 2);
        assert_eq!(mgr.borrow().item_count(), 2);
    }

    #[test]
    fn gc_accelerates_unfinished_pass() {
        let mgr = LruPoolManager::create();
        {
            let mut m = mgr.borrow_mut();
            m.set_gc_list(5);
            m.set_proc_list_count(10);
            m.set_proc_item_count(3);
        }
        // one armed target is enough to accelerate only that batch size
        mgr.borrow_mut().gc();
        assert_eq!(mgr.borrow().proc_list_count(), 13);
        assert_eq!(mgr.borrow().proc_item_count(), 3);
    }

    #[test]
    fn eviction_is_charged_to_owning_manager() {
        let a = LruPoolManager::create();
        let b = LruPoolManager::create();
        let list = fake(&b, &[1]);
        b.borrow_mut().add_items(1);
        queue(&a, &list, 1);
        queue(&a, &list, 9);
        a.borrow_mut().set_gc_list(1);
        assert_eq!(a.borrow_mut().proc(), 1);
        assert_eq!(list.borrow().len(), 0);
        assert_eq!(b.borrow().item_count(), 0);
        assert_eq!(a.borrow().item_count(), 2);
    }
}
