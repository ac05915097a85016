/// Staging size used when no hint is given.
pub const DEFAULT_STAGING_HINT: usize = 10_000;

/// Staging size the per-thread connection layer opens streams with.
pub const CONNECTION_STAGING_HINT: usize = 4 * 1024 * 1024;

/// Size of the region each stream shares with the simulator.
pub const GRAPHICS_MEM_SIZE: usize = 17 * 1024 * 1024;

/// Construction parameters for a [`crate::PipeStream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipeConfig {
    /// Initial staging capacity; the buffer grows past it on demand.
    pub staging_hint: usize,
    /// Bytes of pinned memory registered with the simulator.
    pub region_size: usize,
    /// Report `RLIMIT_MEMLOCK` to the simulator when the stream opens.
    pub report_memlock_limits: bool,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            staging_hint: DEFAULT_STAGING_HINT,
            region_size: GRAPHICS_MEM_SIZE,
            report_memlock_limits: true,
        }
    }
}

impl PipeConfig {
    pub fn connection() -> Self {
        Self::default().with_staging_hint(CONNECTION_STAGING_HINT)
    }

    pub fn with_staging_hint(mut self, staging_hint: usize) -> Self {
        self.staging_hint = staging_hint;
        self
    }

    pub fn with_region_size(mut self, region_size: usize) -> Self {
        self.region_size = region_size;
        self
    }

    pub fn with_memlock_report(mut self, enabled: bool) -> Self {
        self.report_memlock_limits = enabled;
        self
    }
}
