// Sat Oct 17 2026 - Alex

pub mod clock;
pub mod entry;
pub mod shared;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, SharedComputeData};
pub use shared::{CacheStats, SharedResultCache};
