pub mod gc_policy;
pub mod lru_manager;
pub mod lru_pool;

pub use gc_policy::Bounds;
pub use lru_manager::{LruPoolManager, SharedLruManager};
pub use lru_pool::{DropAction, LruAction, LruPool};
