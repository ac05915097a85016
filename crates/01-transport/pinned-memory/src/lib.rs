//! Page-locked memory shared with the simulator.
//!
//! * [`PinnedRegistry`] – fixed pool of lockable regions; at most one of them is
//!   held resident at a time, process wide.
//! * [`PageLocker`] – the platform page-lock primitive (`mlock`/`munlock` on unix).
//! * [`RegistryError`] – capacity, allocation and pinning failures.

mod error;
mod locker;
mod region;
mod registry;

pub use error::{RegistryError, RegistryResult};
pub use locker::{memlock_limits, MemlockLimits, PageLocker, SystemLocker};
pub use region::PinnedRegion;
pub use registry::{PinnedRegistry, RegionHandle, RegionInfo, RegistryStats, BUFFERS_LIMIT};
