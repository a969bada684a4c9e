//! Builder for LRU pool managers.
//!
//! Collects the manager's budgets and batch sizes, validates them, and
//! produces a plain or shared [`LruPoolManager`]. Unset values keep the
//! manager defaults (`item_min_bound = 0`, `item_max_bound = 1024`,
//! `list_bound = 2048`, both batch sizes `16`).
//!
//! ## Example
//!
//! ```rust
//! use slotkit::builder::LruManagerBuilder;
//! use slotkit::policy::LruPool;
//!
//! let mgr = LruManagerBuilder::new()
//!     .item_max_bound(64)
//!     .proc_item_count(8)
//!     .build_shared();
//!
//! let mut pool: LruPool<u32, String> = LruPool::new();
//! pool.init(mgr.clone());
//! pool.push(1, "hello".to_string());
//! assert_eq!(mgr.borrow().item_count(), 1);
//! assert_eq!(mgr.borrow().item_max_bound(), 64);
//! ```

use crate::error::ConfigError;
use crate::policy::lru_manager::{
    DEFAULT_ITEM_MAX_BOUND, DEFAULT_ITEM_MIN_BOUND, DEFAULT_LIST_BOUND, DEFAULT_PROC_ITEM_COUNT,
    DEFAULT_PROC_LIST_COUNT, LruPoolManager, SharedLruManager,
};

/// Builder for [`LruPoolManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LruManagerBuilder {
    item_min_bound: usize,
    item_max_bound: usize,
    list_bound: usize,
    proc_list_count: usize,
    proc_item_count: usize,
}

impl Default for LruManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LruManagerBuilder {
    /// Starts from the manager defaults.
    pub fn new() -> Self {
        Self {
            item_min_bound: DEFAULT_ITEM_MIN_BOUND,
            item_max_bound: DEFAULT_ITEM_MAX_BOUND,
            list_bound: DEFAULT_LIST_BOUND,
            proc_list_count: DEFAULT_PROC_LIST_COUNT,
            proc_item_count: DEFAULT_PROC_ITEM_COUNT,
        }
    }

    /// Item count a forced `gc()` pass evicts down to.
    pub fn item_min_bound(mut self, value: usize) -> Self {
        self.item_min_bound = value;
        self
    }

    /// Item count above which a push evicts synchronously.
    pub fn item_max_bound(mut self, value: usize) -> Self {
        self.item_max_bound = value;
        self
    }

    /// Queued-check count above which a push evicts synchronously.
    pub fn list_bound(mut self, value: usize) -> Self {
        self.list_bound = value;
        self
    }

    /// Checks examined per `proc()` call.
    pub fn proc_list_count(mut self, value: usize) -> Self {
        self.proc_list_count = value;
        self
    }

    /// Items evicted per `proc()` call.
    pub fn proc_item_count(mut self, value: usize) -> Self {
        self.proc_item_count = value;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.proc_list_count == 0 {
            return Err(ConfigError::new("proc_list_count must be > 0"));
        }
        if self.proc_item_count == 0 {
            return Err(ConfigError::new("proc_item_count must be > 0"));
        }
        if self.item_min_bound > self.item_max_bound {
            return Err(ConfigError::new(format!(
                "item_min_bound ({}) must not exceed item_max_bound ({})",
                self.item_min_bound, self.item_max_bound
            )));
        }
        Ok(())
    }

    /// Builds the manager.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if a batch size is zero or `item_min_bound` exceeds
    /// `item_max_bound`.
    pub fn try_build(self) -> Result<LruPoolManager, ConfigError> {
        self.validate()?;
        let mut mgr = LruPoolManager::new();
        mgr.set_item_min_bound(self.item_min_bound);
        mgr.set_item_max_bound(self.item_max_bound);
        mgr.set_list_bound(self.list_bound);
        mgr.set_proc_list_count(self.proc_list_count);
        mgr.set_proc_item_count(self.proc_item_count);
        Ok(mgr)
    }

    /// Builds the manager.
    ///
    /// # Panics
    ///
    /// Panics on an invalid configuration; see [`try_build`](Self::try_build).
    pub fn build(self) -> LruPoolManager {
        match self.try_build() {
            Ok(mgr) => mgr,
            Err(err) => panic!("invalid LRU manager configuration: {err}"),
        }
    }

    /// Builds a manager ready to be shared between pools.
    ///
    /// # Panics
    ///
    /// Panics on an invalid configuration; see [`try_build`](Self::try_build).
    pub fn build_shared(self) -> SharedLruManager {
        self.build().into_shared()
    }

    /// Fallible [`build_shared`](Self::build_shared).
    pub fn try_build_shared(self) -> Result<SharedLruManager, ConfigError> {
        self.try_build().map(LruPoolManager::into_shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_manager() {
        let built = LruManagerBuilder::new().build();
        let plain = LruPoolManager::new();
        assert_eq!(built.bounds(), plain.bounds());
        assert_eq!(built.proc_list_count(), plain.proc_list_count());
        assert_eq!(built.proc_item_count(), plain.proc_item_count());
    }

    #[test]
    fn setters_are_applied() {
        let mgr = LruManagerBuilder::new()
            .item_min_bound(2)
            .item_max_bound(10)
            .list_bound(20)
            .proc_list_count(3)
            .proc_item_count(4)
            .build();
        assert_eq!(mgr.item_min_bound(), 2);
        assert_eq!(mgr.item_max_bound(), 10);
        assert_eq!(mgr.list_bound(), 20);
        assert_eq!(mgr.proc_list_count(), 3);
        assert_eq!(mgr.proc_item_count(), 4);
        assert!(!mgr.is_armed());
    }

    #[test]
    fn rejects_zero_batches() {
        let err = LruManagerBuilder::new().proc_list_count(0).try_build().unwrap_err();
        assert!(err.message().contains("proc_list_count"));
        let err = LruManagerBuilder::new().proc_item_count(0).try_build().unwrap_err();
        assert!(err.message().contains("proc_item_count"));
    }

    #[test]
    fn rejects_inverted_item_bounds() {
        let err = LruManagerBuilder::new()
            .item_min_bound(11)
            .item_max_bound(10)
            .try_build_shared()
            .unwrap_err();
        assert!(err.message().contains("item_min_bound"));
    }

    #[test]
    #[should_panic(expected = "invalid LRU manager configuration")]
    fn build_panics_on_invalid_config() {
        let _ = LruManagerBuilder::new().proc_item_count(0).build();
    }
}
