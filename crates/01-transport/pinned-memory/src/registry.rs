//! Fixed pool of page-lockable regions.
//!
//! Locked memory is a system-wide resource with a hard cap, so the registry
//! keeps at most one region resident at any time and funnels every
//! allocate/release/lock/unlock through a single mutex. Transports share one
//! registry; [`PinnedRegistry::process`] hands out the process instance.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::locker::{PageLocker, SystemLocker};
use crate::region::PinnedRegion;
use crate::{RegistryError, RegistryResult};

/// Number of regions the process registry manages.
pub const BUFFERS_LIMIT: usize = 1;

/// Generation-checked token naming one registry slot.
///
/// A handle stops matching once its region is released, even if the slot is
/// later reused for a new allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegionHandle {
    index: u32,
    generation: u32,
}

impl RegionHandle {
    /// Slot index inside the registry.
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Location of a freshly allocated region, as shared with the simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionInfo {
    pub handle: RegionHandle,
    pub addr: usize,
    pub len: usize,
}

/// Counts of registry entry points, successful or not.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub allocations: u64,
    pub releases: u64,
    pub locks: u64,
    pub unlocks: u64,
}

impl RegistryStats {
    /// Total number of registry calls recorded.
    pub fn total(&self) -> u64 {
        self.allocations + self.releases + self.locks + self.unlocks
    }
}

#[derive(Default)]
struct Slot {
    generation: u32,
    region: Option<PinnedRegion>,
}

struct Inner {
    slots: Vec<Slot>,
    locked: Option<usize>,
    count: usize,
    stats: RegistryStats,
}

impl Inner {
    fn find(&self, handle: RegionHandle) -> Option<usize> {
        let idx = handle.index as usize;
        let slot = self.slots.get(idx)?;
        (slot.region.is_some() && slot.generation == handle.generation).then_some(idx)
    }

    fn handle(&self, idx: usize) -> RegionHandle {
        RegionHandle {
            index: idx as u32,
            generation: self.slots[idx].generation,
        }
    }
}

/// Mutex-guarded pool of lockable regions.
pub struct PinnedRegistry {
    inner: Mutex<Inner>,
    locker: Arc<dyn PageLocker>,
}

impl PinnedRegistry {
    /// Creates a registry with room for `capacity` regions.
    pub fn new(capacity: usize, locker: Arc<dyn PageLocker>) -> Self {
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        Self {
            inner: Mutex::new(Inner {
                slots,
                locked: None,
                count: 0,
                stats: RegistryStats::default(),
            }),
            locker,
        }
    }

    /// The process-wide registry, created on first use with [`BUFFERS_LIMIT`]
    /// slots and the host page locker.
    pub fn process() -> Arc<PinnedRegistry> {
        static PROCESS: OnceLock<Arc<PinnedRegistry>> = OnceLock::new();
        Arc::clone(
            PROCESS.get_or_init(|| Arc::new(Self::new(BUFFERS_LIMIT, Arc::new(SystemLocker)))),
        )
    }

    /// The page locker regions are pinned with.
    pub fn locker(&self) -> &Arc<dyn PageLocker> {
        &self.locker
    }

    /// Maximum number of live regions.
    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Number of live regions.
    pub fn len(&self) -> usize {
        self.inner.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RegistryStats {
        self.inner.lock().stats
    }

    /// Allocates a zeroed region of `size` bytes in the first free slot.
    pub fn allocate(&self, size: usize) -> RegistryResult<RegionInfo> {
        let mut inner = self.inner.lock();
        inner.stats.allocations += 1;
        tracing::debug!("allocating pinned region, size={size}");

        let limit = inner.slots.len();
        if inner.count >= limit {
            tracing::debug!("pinned region limit reached ({limit})");
            return Err(RegistryError::CapacityExceeded { limit });
        }

        let region = PinnedRegion::allocate(size).inspect_err(|err| {
            tracing::warn!("pinned region allocation failed: {err}");
        })?;
        let addr = region.as_ptr() as usize;

        let idx = inner
            .slots
            .iter()
            .position(|slot| slot.region.is_none())
            .ok_or(RegistryError::CapacityExceeded { limit })?;
        inner.slots[idx].region = Some(region);
        inner.count += 1;

        Ok(RegionInfo {
            handle: inner.handle(idx),
            addr,
            len: size,
        })
    }

    /// Frees the region named by `handle`, unpinning it first if needed.
    pub fn release(&self, handle: RegionHandle) -> RegistryResult<()> {
        let mut inner = self.inner.lock();
        inner.stats.releases += 1;

        let Some(idx) = inner.find(handle) else {
            tracing::warn!("failed to release pinned region {handle:?}: not found");
            return Err(RegistryError::NotFound(handle));
        };

        if inner.locked == Some(idx) {
            self.unlock_slot(&mut inner, idx);
        }

        let slot = &mut inner.slots[idx];
        slot.region = None;
        slot.generation = slot.generation.wrapping_add(1);
        inner.count -= 1;
        Ok(())
    }

    /// Pins the region named by `handle`, unpinning any other region first.
    ///
    /// Locking the region that is already pinned succeeds without touching
    /// the platform. On failure no region is left pinned.
    pub fn lock(&self, handle: RegionHandle) -> RegistryResult<()> {
        let mut inner = self.inner.lock();
        inner.stats.locks += 1;

        if let Some(current) = inner.locked {
            if inner.find(handle) == Some(current) {
                return Ok(());
            }
            self.unlock_slot(&mut inner, current);
        }

        let idx = inner.find(handle).ok_or(RegistryError::NotFound(handle))?;
        let (addr, len) = {
            let region = inner.slots[idx]
                .region
                .as_ref()
                .ok_or(RegistryError::NotFound(handle))?;
            (region.as_ptr(), region.len())
        };
        self.locker
            .lock(addr, len)
            .map_err(|source| RegistryError::PinFailed { handle, source })?;
        inner.locked = Some(idx);
        Ok(())
    }

    /// Unpins the currently pinned region, if any.
    pub fn unlock(&self) {
        let mut inner = self.inner.lock();
        inner.stats.unlocks += 1;
        if let Some(idx) = inner.locked {
            self.unlock_slot(&mut inner, idx);
        }
    }

    /// Handle of the currently pinned region.
    pub fn locked(&self) -> Option<RegionHandle> {
        let inner = self.inner.lock();
        inner.locked.map(|idx| inner.handle(idx))
    }

    pub fn is_locked(&self, handle: RegionHandle) -> bool {
        let inner = self.inner.lock();
        inner.locked.is_some() && inner.locked == inner.find(handle)
    }

    fn unlock_slot(&self, inner: &mut Inner, idx: usize) {
        if let Some(region) = inner.slots[idx].region.as_ref() {
            self.locker.unlock(region.as_ptr(), region.len());
        }
        inner.locked = None;
    }
}

impl Drop for PinnedRegistry {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Some(idx) = inner.locked.take() {
            if let Some(region) = inner.slots[idx].region.as_ref() {
                self.locker.unlock(region.as_ptr(), region.len());
            }
        }
    }
}
