use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use pipe_stream::{CallArgs, CallGate, DebugCode, OpCode};

/// One gate invocation observed by [`ScriptedPeer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub op: OpCode,
    pub addr: usize,
    pub len: usize,
    pub pid: i32,
    pub tid: i32,
    /// Bytes the simulator read out of a `WriteFully` call.
    pub payload: Vec<u8>,
}

impl RecordedCall {
    pub fn debug_code(&self) -> Option<DebugCode> {
        if self.op != OpCode::Debug {
            return None;
        }
        DebugCode::from_u32(u32::try_from(self.addr).ok()?)
    }
}

#[derive(Default)]
struct PeerState {
    sim_active: bool,
    busy_probes: u32,
    statuses: HashMap<OpCode, i32>,
    inbound: VecDeque<u8>,
    calls: Vec<RecordedCall>,
}

/// Simulator stand-in driven by a small script.
///
/// * `Block` probes answer busy while the hold counter is non-zero.
/// * `IsSimulationActive` answers the configured flag.
/// * `WriteFully` copies the payload out and answers its length.
/// * `ReadFully`/`Read`/`Receive` copy queued inbound bytes into the caller's
///   buffer and answer the count delivered.
///
/// Any answer can be overridden per operation with [`ScriptedPeer::set_status`].
#[derive(Clone, Default)]
pub struct ScriptedPeer {
    state: Arc<Mutex<PeerState>>,
}

impl ScriptedPeer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active() -> Self {
        let peer = Self::default();
        peer.set_sim_active(true);
        peer
    }

    pub fn set_sim_active(&self, active: bool) {
        self.state.lock().sim_active = active;
    }

    /// Answers the next `probes` `Block` probes with "busy".
    pub fn hold_for(&self, probes: u32) {
        self.state.lock().busy_probes = probes;
    }

    pub fn set_status(&self, op: OpCode, status: i32) {
        self.state.lock().statuses.insert(op, status);
    }

    pub fn queue_inbound(&self, bytes: &[u8]) {
        self.state.lock().inbound.extend(bytes.iter().copied());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    pub fn ops(&self) -> Vec<OpCode> {
        self.state.lock().calls.iter().map(|call| call.op).collect()
    }

    pub fn count(&self, op: OpCode) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.op == op)
            .count()
    }

    /// Calls matching `op`, oldest first.
    pub fn calls_of(&self, op: OpCode) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.op == op)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().calls.clear();
    }
}

impl CallGate for ScriptedPeer {
    fn invoke(&mut self, op: OpCode, args: &mut CallArgs) {
        let addr = args.usize_arg(0).unwrap_or_default();
        let len = args.usize_arg(1).unwrap_or_default();
        let mut state = self.state.lock();
        let mut payload = Vec::new();

        let answer = match op {
            OpCode::Block => {
                if state.busy_probes > 0 {
                    state.busy_probes -= 1;
                    1
                } else {
                    0
                }
            }
            OpCode::IsSimulationActive => i32::from(state.sim_active),
            OpCode::WriteFully if addr != 0 && len > 0 => {
                // SAFETY: the stream passes a live, borrowed buffer of `len`
                // bytes for the duration of the call.
                let bytes = unsafe { std::slice::from_raw_parts(addr as *const u8, len) };
                payload.extend_from_slice(bytes);
                len as i32
            }
            OpCode::ReadFully | OpCode::Read | OpCode::Receive if addr != 0 && len > 0 => {
                let n = len.min(state.inbound.len());
                // SAFETY: as above, the caller's buffer is exclusively lent to
                // the call and holds at least `len` bytes.
                let dst = unsafe { std::slice::from_raw_parts_mut(addr as *mut u8, n) };
                for (slot, byte) in dst.iter_mut().zip(state.inbound.drain(..n)) {
                    *slot = byte;
                }
                n as i32
            }
            _ => 0,
        };

        let answer = state.statuses.get(&op).copied().unwrap_or(answer);
        state.calls.push(RecordedCall {
            op,
            addr,
            len,
            pid: args.pid(),
            tid: args.tid(),
            payload,
        });
        args.set_ret(answer);
    }
}
