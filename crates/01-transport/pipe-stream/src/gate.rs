//! The synchronous call into the simulator.

use crate::{CallArgs, OpCode};

/// Privileged call that hands an operation and its argument block to the
/// simulator.
///
/// Every invocation completes synchronously from the caller's point of view;
/// the implementation writes the simulator's answer into the block's result
/// slot before returning.
pub trait CallGate {
    fn invoke(&mut self, op: OpCode, args: &mut CallArgs);
}

impl<G: CallGate + ?Sized> CallGate for &mut G {
    fn invoke(&mut self, op: OpCode, args: &mut CallArgs) {
        (**self).invoke(op, args)
    }
}

impl<G: CallGate + ?Sized> CallGate for Box<G> {
    fn invoke(&mut self, op: OpCode, args: &mut CallArgs) {
        (**self).invoke(op, args)
    }
}

#[cfg(feature = "m5ops")]
mod m5 {
    use super::*;

    extern "C" {
        /// Graphics pseudo-instruction exported by the simulator's m5op library.
        fn m5_gpu(call: u64, params: u64);
    }

    /// [`CallGate`] that traps into the simulator through `m5_gpu`.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct M5Gate;

    impl CallGate for M5Gate {
        fn invoke(&mut self, op: OpCode, args: &mut CallArgs) {
            let mut raw = args.as_raw();
            // SAFETY: `raw` points into `args`, which outlives the call; the
            // simulator only writes the 4-byte result slot.
            unsafe { m5_gpu(op as u64, &mut raw as *mut _ as u64) };
        }
    }
}

#[cfg(feature = "m5ops")]
pub use m5::M5Gate;
