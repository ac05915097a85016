//! Pipe transport between a guest process and the simulator.
//!
//! Command buffers are assembled in a page-primed staging buffer and handed to
//! the simulator through a synchronous call gate:
//! * [`PipeStream`] – staging buffer, flow-control handshake and pinning around
//!   every data call.
//! * [`CallGate`] / [`CallArgs`] – the opaque privileged call and its argument
//!   block.
//! * [`OpCode`] / [`DebugCode`] – wire-level operation numbers.
//! * [`IoStream`] – the interface the command encoders drive.

mod args;
mod config;
mod error;
mod gate;
mod io;
mod op;
mod staging;
mod stream;

pub use args::{CallArgs, RawCallArgs, RET_SLOT_LEN};
pub use config::{PipeConfig, CONNECTION_STAGING_HINT, DEFAULT_STAGING_HINT, GRAPHICS_MEM_SIZE};
pub use error::{StreamError, StreamResult};
#[cfg(feature = "m5ops")]
pub use gate::M5Gate;
pub use gate::CallGate;
pub use io::IoStream;
pub use op::{DebugCode, OpCode, CALLS_START};
pub use staging::{primed_offsets, StagingBuffer, PAGE_SIZE};
pub use stream::PipeStream;
