//! Error surface for the pinned-region registry.

use std::io;

use thiserror::Error;

use crate::RegionHandle;

/// Convenience result alias for registry operations.
pub type RegistryResult<T, E = RegistryError> = Result<T, E>;

/// Errors surfaced by [`crate::PinnedRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Every slot of the pool already holds a region.
    #[error("pinned region limit of {limit} reached")]
    CapacityExceeded { limit: usize },

    /// The backing allocation for a region could not be satisfied.
    #[error("failed to allocate pinned region of {size} bytes")]
    OutOfMemory { size: usize },

    /// Zero-sized regions cannot be locked or shared.
    #[error("pinned regions must be at least one byte")]
    EmptyRegion,

    /// The handle does not name a live region.
    #[error("pinned region {0:?} not found")]
    NotFound(RegionHandle),

    /// The platform refused to keep the region resident.
    #[error("failed to pin region {handle:?}: {source}")]
    PinFailed {
        handle: RegionHandle,
        #[source]
        source: io::Error,
    },
}
