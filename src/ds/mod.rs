pub mod free_list;
pub mod slot;

pub use free_list::{FixedFreeList, FreeList, Iter};
pub use slot::{ChainHeader, NPOS, Slot, SlotState};
