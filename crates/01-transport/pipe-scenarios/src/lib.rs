#![allow(missing_docs)]

//! In-process stand-ins for the simulator side of a pipe stream.

mod locker;
mod peer;

pub use locker::{LockEvent, ScriptedLocker};
pub use peer::{RecordedCall, ScriptedPeer};

use std::sync::Arc;

use pinned_memory::PinnedRegistry;

/// Registry with `capacity` slots pinning through `locker`.
pub fn registry_with(locker: &ScriptedLocker, capacity: usize) -> Arc<PinnedRegistry> {
    Arc::new(PinnedRegistry::new(capacity, Arc::new(locker.clone())))
}
