//! Adaptive bounds and batch sizing for the LRU pool manager.
//!
//! These are the pure decision functions behind
//! [`LruPoolManager::gc`](crate::policy::lru_manager::LruPoolManager::gc);
//! the manager owns the state and the check queue, this module only computes
//! new numbers from old ones.
//!
//! ## Bound re-derivation
//!
//! At the start of a forced pass each bound moves halfway toward the load
//! observed right now:
//!
//! ```text
//!   item_min_bound' = (item_count + item_min_bound)     / 2
//!   item_max_bound' = (item_count + item_max_bound + 1) / 2
//!   list_bound'     = (list_count + list_bound     + 1) / 2
//! ```
//!
//! Repeated passes under a constant load converge on that load.
//!
//! ## Batch acceleration
//!
//! When a forced pass finds the previous one still unfinished, the per-call
//! batch sizes grow by 1.3× (at least +1) so that eviction catches up.

/// Budget bounds tracked by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub item_min_bound: usize,
    pub item_max_bound: usize,
    pub list_bound: usize,
}

/// Bounds after one forced pass observing `item_count` cached items and
/// `list_count` queued checks.
///
/// # Example
///
/// ```
/// use slotkit::policy::gc_policy::{Bounds, rederive_bounds};
///
/// let b = Bounds { item_min_bound: 0, item_max_bound: 1024, list_bound: 2048 };
/// let next = rederive_bounds(b, 100, 200);
/// assert_eq!(next, Bounds { item_min_bound: 50, item_max_bound: 562, list_bound: 1124 });
/// ```
pub fn rederive_bounds(bounds: Bounds, item_count: usize, list_count: usize) -> Bounds {
    Bounds {
        item_min_bound: midpoint(item_count, bounds.item_min_bound, false),
        item_max_bound: midpoint(item_count, bounds.item_max_bound, true),
        list_bound: midpoint(list_count, bounds.list_bound, true),
    }
}

#[inline]
fn midpoint(observed: usize, bound: usize, round_up: bool) -> usize {
    let sum = observed as u128 + bound as u128 + u128::from(round_up);
    (sum / 2) as usize
}

/// Batch size after one acceleration step.
///
/// ```
/// use slotkit::policy::gc_policy::accelerate;
///
/// assert_eq!(accelerate(16), 20);
/// assert_eq!(accelerate(1), 2);
/// ```
pub fn accelerate(count: usize) -> usize {
    (count.saturating_mul(13) / 10).max(count.saturating_add(1))
}
