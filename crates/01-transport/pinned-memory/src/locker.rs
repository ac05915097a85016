//! Page-lock primitives.
//!
//! The simulator reads pinned memory by physical address, behind the guest
//! kernel's back. Regions it touches must stay resident for the duration of a
//! call, which is what `mlock(2)` guarantees on unix hosts. Other targets
//! report every lock request as unsupported so callers fall back to unpinned
//! transfers.

use std::io;

/// Keeps byte ranges resident in physical memory.
///
/// Implementations must tolerate unlocking a range that was never locked; the
/// registry only pairs calls for ranges it tracks.
pub trait PageLocker: Send + Sync {
    /// Requests that `[addr, addr + len)` stays resident.
    fn lock(&self, addr: *const u8, len: usize) -> io::Result<()>;

    /// Releases a residency request made through [`PageLocker::lock`].
    fn unlock(&self, addr: *const u8, len: usize);
}

/// [`PageLocker`] backed by the host's `mlock`/`munlock`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemLocker;

#[cfg(unix)]
impl PageLocker for SystemLocker {
    fn lock(&self, addr: *const u8, len: usize) -> io::Result<()> {
        // SAFETY: mlock only inspects the address range; an invalid range is
        // reported through errno rather than dereferenced.
        let rc = unsafe { libc::mlock(addr as *const libc::c_void, len) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn unlock(&self, addr: *const u8, len: usize) {
        // SAFETY: see `lock`; munlock on an unlocked range is a no-op.
        let rc = unsafe { libc::munlock(addr as *const libc::c_void, len) };
        if rc != 0 {
            tracing::debug!(
                "munlock({addr:p}, {len}) failed: {}",
                io::Error::last_os_error()
            );
        }
    }
}

#[cfg(not(unix))]
impl PageLocker for SystemLocker {
    fn lock(&self, _addr: *const u8, _len: usize) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "page locking is not available on this target",
        ))
    }

    fn unlock(&self, _addr: *const u8, _len: usize) {}
}

/// Soft and hard `RLIMIT_MEMLOCK` values for the current process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemlockLimits {
    pub soft: u64,
    pub hard: u64,
}

/// Queries how many bytes the process may keep locked.
///
/// Returns `None` when the limit cannot be read. Unlimited values are reported
/// as `u64::MAX`.
#[cfg(unix)]
pub fn memlock_limits() -> Option<MemlockLimits> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid, writable rlimit for the duration of the call.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, &mut limit) };
    if rc != 0 {
        return None;
    }
    Some(MemlockLimits {
        soft: rlim_to_u64(limit.rlim_cur),
        hard: rlim_to_u64(limit.rlim_max),
    })
}

#[cfg(not(unix))]
pub fn memlock_limits() -> Option<MemlockLimits> {
    None
}

#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
fn rlim_to_u64(value: libc::rlim_t) -> u64 {
    if value == libc::RLIM_INFINITY {
        u64::MAX
    } else {
        value as u64
    }
}
