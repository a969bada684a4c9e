pub mod fixed;
pub mod growable;
pub mod region;
pub mod traits;

pub use fixed::FixedStorage;
pub use growable::GrowableStorage;
pub use region::{ShmRegion, ShmSafe};
pub use traits::SlotStorage;
