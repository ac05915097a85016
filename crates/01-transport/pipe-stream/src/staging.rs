//! Growable staging buffer with page priming.
//!
//! The simulator copies staged bytes while the guest is frozen inside the
//! call; a page fault at that point stalls the whole system. Every time the
//! buffer is handed out we touch one byte per page (and the final byte) so the
//! guest kernel has committed the backing beforehand.

use crate::{StreamError, StreamResult};

/// Page granularity assumed when priming.
pub const PAGE_SIZE: usize = 0x1000;

/// Offsets written by priming a buffer of `len` bytes, in ascending order.
///
/// Every page-aligned offset below `len`, followed by `len - 1` when it is not
/// already page aligned.
pub fn primed_offsets(len: usize) -> impl Iterator<Item = usize> {
    let tail = len
        .checked_sub(1)
        .filter(|last| last % PAGE_SIZE != 0);
    (0..len).step_by(PAGE_SIZE).chain(tail)
}

/// Reusable scratch buffer that only ever grows.
#[derive(Debug, Default)]
pub struct StagingBuffer {
    hint: usize,
    buf: Vec<u8>,
}

impl StagingBuffer {
    /// Creates an empty buffer; the first [`StagingBuffer::acquire`] allocates
    /// at least `hint` bytes.
    pub fn new(hint: usize) -> Self {
        Self {
            hint,
            buf: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Ensures at least `min_size` bytes and returns the primed buffer.
    pub fn acquire(&mut self, min_size: usize) -> StreamResult<&mut [u8]> {
        self.ensure(min_size)?;
        Ok(&mut self.buf)
    }

    /// Grows to at least `min_size` bytes and primes the whole extent,
    /// returning the resulting capacity.
    ///
    /// A failed grow drops the previous allocation as well; the buffer starts
    /// over empty and later requests allocate from scratch.
    pub fn ensure(&mut self, min_size: usize) -> StreamResult<usize> {
        let floor = if self.buf.is_empty() {
            self.hint
        } else {
            self.buf.len()
        };
        let target = floor.max(min_size);

        if target > self.buf.len() {
            let additional = target - self.buf.len();
            if let Err(err) = self.buf.try_reserve_exact(additional) {
                tracing::error!("staging buffer grow to {target} bytes failed: {err}");
                self.buf = Vec::new();
                return Err(StreamError::OutOfMemory { requested: target });
            }
            self.buf.resize(target, 0);
        }

        prime(&mut self.buf);
        Ok(self.buf.len())
    }
}

fn prime(buf: &mut [u8]) {
    for offset in primed_offsets(buf.len()) {
        buf[offset] = 0;
    }
}
