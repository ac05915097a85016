use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use pinned_memory::PageLocker;

/// One page-lock request observed by [`ScriptedLocker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockEvent {
    Lock { addr: usize, len: usize, granted: bool },
    Unlock { addr: usize, len: usize },
}

#[derive(Default)]
struct LockerState {
    refuse: bool,
    resident: HashSet<usize>,
    events: Vec<LockEvent>,
}

/// [`PageLocker`] that records requests instead of touching the host.
///
/// Clones share state, so a test can keep one handle while the registry owns
/// another.
#[derive(Clone, Default)]
pub struct ScriptedLocker {
    state: Arc<Mutex<LockerState>>,
}

impl ScriptedLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locker that denies every lock request with `EPERM`.
    pub fn refusing() -> Self {
        let locker = Self::default();
        locker.set_refuse(true);
        locker
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    pub fn events(&self) -> Vec<LockEvent> {
        self.state.lock().events.clone()
    }

    pub fn lock_attempts(&self) -> usize {
        self.count(|event| matches!(event, LockEvent::Lock { .. }))
    }

    pub fn unlocks(&self) -> usize {
        self.count(|event| matches!(event, LockEvent::Unlock { .. }))
    }

    pub fn is_resident(&self, addr: usize) -> bool {
        self.state.lock().resident.contains(&addr)
    }

    pub fn resident_count(&self) -> usize {
        self.state.lock().resident.len()
    }

    fn count(&self, pred: impl Fn(&LockEvent) -> bool) -> usize {
        self.state.lock().events.iter().filter(|e| pred(e)).count()
    }
}

impl PageLocker for ScriptedLocker {
    fn lock(&self, addr: *const u8, len: usize) -> io::Result<()> {
        let mut state = self.state.lock();
        let addr = addr as usize;
        let granted = !state.refuse;
        state.events.push(LockEvent::Lock { addr, len, granted });
        if !granted {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        state.resident.insert(addr);
        Ok(())
    }

    fn unlock(&self, addr: *const u8, len: usize) {
        let mut state = self.state.lock();
        let addr = addr as usize;
        state.events.push(LockEvent::Unlock { addr, len });
        state.resident.remove(&addr);
    }
}
