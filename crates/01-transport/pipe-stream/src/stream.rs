//! Pipe stream: staging buffer plus the simulator call protocol.
//!
//! Every operation runs the same handshake:
//! 1. spin on `Block` probes until the simulator lets us through,
//! 2. ask whether a simulation is active,
//! 3. if so, make sure our graphics region exists and is registered, then pin
//!    it through the shared registry,
//! 4. issue the call, keeping the caller's buffer resident for data calls,
//! 5. unpin what was pinned and decode the 4-byte result.

use std::sync::Arc;

use pinned_memory::{memlock_limits, PinnedRegistry, RegionInfo};

use crate::{
    CallArgs, CallGate, DebugCode, IoStream, OpCode, PipeConfig, StagingBuffer, StreamResult,
};

/// One logical connection to the simulator.
pub struct PipeStream<G: CallGate> {
    gate: G,
    registry: Arc<PinnedRegistry>,
    staging: StagingBuffer,
    region: Option<RegionInfo>,
    region_size: usize,
}

impl<G: CallGate> PipeStream<G> {
    pub fn new(config: PipeConfig, gate: G, registry: Arc<PinnedRegistry>) -> Self {
        tracing::debug!("opening pipe stream, staging hint {}", config.staging_hint);
        let mut stream = Self {
            gate,
            registry,
            staging: StagingBuffer::new(config.staging_hint),
            region: None,
            region_size: config.region_size,
        };

        if config.report_memlock_limits {
            if let Some(limits) = memlock_limits() {
                stream.report(DebugCode::Info, saturate(limits.soft));
                stream.report(DebugCode::Info, saturate(limits.hard));
            }
        }
        stream
    }

    /// Current staging capacity in bytes.
    pub fn staging_capacity(&self) -> usize {
        self.staging.capacity()
    }

    /// Graphics region registered with the simulator, once allocated.
    pub fn region(&self) -> Option<RegionInfo> {
        self.region
    }

    /// Returns a primed staging buffer of at least `min_size` bytes.
    pub fn acquire_staging_buffer(&mut self, min_size: usize) -> StreamResult<&mut [u8]> {
        tracing::trace!("acquire_staging_buffer({min_size})");
        if let Err(err) = self.staging.ensure(min_size) {
            self.report(DebugCode::PipeMemAllocFailed, 0);
            return Err(err);
        }
        Ok(self.staging.as_mut_slice())
    }

    /// Sends the first `size` staged bytes.
    pub fn commit(&mut self, size: usize) -> i32 {
        let staged = self.staging.as_slice();
        let len = if size > staged.len() {
            tracing::warn!(
                "commit of {size} bytes exceeds staging capacity {}",
                staged.len()
            );
            staged.len()
        } else {
            size
        };
        let addr = staged.as_ptr() as usize;
        tracing::trace!("commit {len} bytes from {addr:#x}");
        self.transact(OpCode::WriteFully, addr, len)
    }

    pub fn write_fully(&mut self, buf: &[u8]) -> i32 {
        tracing::trace!("write_fully {} bytes from {:p}", buf.len(), buf.as_ptr());
        self.transact(OpCode::WriteFully, buf.as_ptr() as usize, buf.len())
    }

    /// Asks the simulator to fill `buf` and returns its status word.
    pub fn read_fully(&mut self, buf: &mut [u8]) -> i32 {
        tracing::trace!("read_fully {} bytes into {:p}", buf.len(), buf.as_ptr());
        self.transact(OpCode::ReadFully, buf.as_mut_ptr() as usize, buf.len())
    }

    /// Reads up to `buf.len()` bytes; `None` when the simulator delivered
    /// nothing.
    pub fn read<'a>(&mut self, buf: &'a mut [u8]) -> Option<&'a mut [u8]> {
        tracing::trace!("read up to {} bytes into {:p}", buf.len(), buf.as_ptr());
        let delivered = self.transact(OpCode::Read, buf.as_mut_ptr() as usize, buf.len());
        if delivered <= 0 {
            return None;
        }
        let delivered = delivered as usize;
        if delivered > buf.len() {
            tracing::warn!(
                "simulator reported {delivered} bytes for a {} byte read",
                buf.len()
            );
        }
        let len = delivered.min(buf.len());
        Some(&mut buf[..len])
    }

    pub fn receive(&mut self, buf: &mut [u8]) -> i32 {
        tracing::trace!("receive {} bytes into {:p}", buf.len(), buf.as_ptr());
        self.transact(OpCode::Receive, buf.as_mut_ptr() as usize, buf.len())
    }

    fn transact(&mut self, op: OpCode, addr: usize, len: usize) -> i32 {
        let mut probes = 0u64;
        loop {
            probes += 1;
            if self.call(OpCode::Block, 0, 0, false) == 0 {
                break;
            }
        }
        tracing::trace!("cleared to send {op:?} after {probes} probe(s)");

        let sim_active = self.call(OpCode::IsSimulationActive, 0, 0, false) != 0;
        let region_pinned = sim_active && self.pin_region();

        let ret = self.call(op, addr, len, sim_active);

        if region_pinned {
            self.registry.unlock();
        }
        ret
    }

    fn pin_region(&mut self) -> bool {
        let region = match self.region {
            Some(region) => region,
            None => match self.allocate_region() {
                Ok(region) => region,
                Err(err) => {
                    tracing::warn!("failed to allocate graphics memory: {err}");
                    self.call(OpCode::Debug, DebugCode::MemAllocFailed as usize, 0, false);
                    return false;
                }
            },
        };

        match self.registry.lock(region.handle) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("failed to pin graphics memory: {err}");
                self.call(OpCode::Debug, DebugCode::MemLockFailed as usize, 0, false);
                false
            }
        }
    }

    fn allocate_region(&mut self) -> StreamResult<RegionInfo> {
        tracing::debug!("allocating {} bytes of graphics memory", self.region_size);
        let region = self.registry.allocate(self.region_size)?;
        self.region = Some(region);
        self.call(OpCode::RegisterGraphicsMemory, region.addr, region.len, false);
        Ok(region)
    }

    /// Issues one gate call. With `pin_buffer` set, data calls keep the
    /// caller's bytes resident for the duration of the call.
    fn call(&mut self, op: OpCode, addr: usize, len: usize, pin_buffer: bool) -> i32 {
        let mut args = CallArgs::transfer(addr, len);
        let locker = Arc::clone(self.registry.locker());
        let pin = pin_buffer && op.moves_bulk_data() && len > 0;

        let pinned = pin
            && match locker.lock(addr as *const u8, len) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!("failed to pin {len} byte buffer at {addr:#x}: {err}");
                    let mut notice = args.clone();
                    self.gate.invoke(OpCode::CallBufferFailed, &mut notice);
                    false
                }
            };

        self.gate.invoke(op, &mut args);

        if pinned {
            locker.unlock(addr as *const u8, len);
        }

        let ret = args.ret();
        tracing::trace!("{op:?}({addr:#x}, {len}) returned {ret:#x}");
        ret
    }

    fn report(&mut self, code: DebugCode, value: usize) {
        self.transact(OpCode::Debug, code as usize, value);
    }
}

impl<G: CallGate> IoStream for PipeStream<G> {
    fn alloc_buffer(&mut self, min_size: usize) -> StreamResult<&mut [u8]> {
        self.acquire_staging_buffer(min_size)
    }

    fn commit_buffer(&mut self, size: usize) -> i32 {
        self.commit(size)
    }

    fn write_fully(&mut self, buf: &[u8]) -> i32 {
        PipeStream::write_fully(self, buf)
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> i32 {
        PipeStream::read_fully(self, buf)
    }

    fn read<'a>(&mut self, buf: &'a mut [u8]) -> Option<&'a mut [u8]> {
        PipeStream::read(self, buf)
    }
}

impl<G: CallGate> Drop for PipeStream<G> {
    fn drop(&mut self) {
        if let Some(region) = self.region.take() {
            if let Err(err) = self.registry.release(region.handle) {
                tracing::warn!("failed to release graphics memory: {err}");
            }
        }
    }
}

fn saturate(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
