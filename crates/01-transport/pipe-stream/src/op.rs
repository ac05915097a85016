//! Operation numbers understood by the simulator.
//!
//! These values are part of the wire contract; the simulator dispatches on
//! them directly.

/// First operation number reserved for graphics calls on the simulator side.
pub const CALLS_START: u32 = 100;

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    WriteFully = CALLS_START,
    ReadFully = CALLS_START + 1,
    Read = CALLS_START + 2,
    Receive = CALLS_START + 3,
    RegisterGraphicsMemory = CALLS_START + 4,
    Block = CALLS_START + 5,
    Debug = CALLS_START + 6,
    CallBufferFailed = CALLS_START + 7,
    IsSimulationActive = CALLS_START + 8,
}

impl OpCode {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value.checked_sub(CALLS_START)? {
            0 => OpCode::WriteFully,
            1 => OpCode::ReadFully,
            2 => OpCode::Read,
            3 => OpCode::Receive,
            4 => OpCode::RegisterGraphicsMemory,
            5 => OpCode::Block,
            6 => OpCode::Debug,
            7 => OpCode::CallBufferFailed,
            8 => OpCode::IsSimulationActive,
            _ => return None,
        })
    }

    /// Operations whose pointer argument addresses caller data the simulator
    /// reads or writes; the buffer is kept resident around these calls.
    pub fn moves_bulk_data(self) -> bool {
        matches!(
            self,
            OpCode::WriteFully | OpCode::ReadFully | OpCode::Read | OpCode::Receive
        )
    }
}

/// Sub-codes carried in the pointer argument of [`OpCode::Debug`] calls.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DebugCode {
    MemAllocFailed = 0,
    MemLockFailed = 1,
    PipeMemAllocFailed = 2,
    Info = 3,
}

impl DebugCode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(DebugCode::MemAllocFailed),
            1 => Some(DebugCode::MemLockFailed),
            2 => Some(DebugCode::PipeMemAllocFailed),
            3 => Some(DebugCode::Info),
            _ => None,
        }
    }
}
