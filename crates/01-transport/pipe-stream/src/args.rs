//! Self-describing argument block passed with every gate call.
//!
//! Arguments are copied verbatim into one contiguous byte run while a parallel
//! array records each argument's length, so the simulator can unpack them
//! without knowing the caller's types. The block also names the calling
//! process and thread and carries a 4-byte slot for the result.

use std::os::raw::{c_char, c_int};

use smallvec::SmallVec;

/// Size of the result slot the simulator writes into.
pub const RET_SLOT_LEN: usize = std::mem::size_of::<i32>();

const INLINE_BYTES: usize = 2 * std::mem::size_of::<usize>();

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallArgs {
    pid: i32,
    tid: i32,
    bytes: SmallVec<[u8; INLINE_BYTES]>,
    lengths: SmallVec<[c_int; 2]>,
    ret: [u8; RET_SLOT_LEN],
}

impl CallArgs {
    /// Empty block stamped with the calling process and thread.
    pub fn new() -> Self {
        Self::with_caller(std::process::id() as i32, current_tid())
    }

    pub fn with_caller(pid: i32, tid: i32) -> Self {
        Self {
            pid,
            tid,
            bytes: SmallVec::new(),
            lengths: SmallVec::new(),
            ret: [0; RET_SLOT_LEN],
        }
    }

    /// The `(pointer, length)` pair every pipe operation sends.
    pub fn transfer(addr: usize, len: usize) -> Self {
        let mut args = Self::new();
        args.pack(&addr.to_ne_bytes());
        args.pack(&len.to_ne_bytes());
        args
    }

    /// Appends one argument's raw bytes.
    pub fn pack(&mut self, arg: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(arg);
        self.lengths.push(arg.len() as c_int);
        self
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn tid(&self) -> i32 {
        self.tid
    }

    pub fn num_args(&self) -> usize {
        self.lengths.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes of the `idx`-th argument.
    pub fn arg(&self, idx: usize) -> Option<&[u8]> {
        let len = *self.lengths.get(idx)? as usize;
        let start: usize = self.lengths[..idx].iter().map(|&l| l as usize).sum();
        self.bytes.get(start..start + len)
    }

    /// Decodes the `idx`-th argument as a native `usize`.
    pub fn usize_arg(&self, idx: usize) -> Option<usize> {
        let raw = self.arg(idx)?;
        Some(usize::from_ne_bytes(raw.try_into().ok()?))
    }

    pub fn set_ret(&mut self, value: i32) {
        self.ret = value.to_ne_bytes();
    }

    pub fn ret(&self) -> i32 {
        i32::from_ne_bytes(self.ret)
    }

    /// C view of the block for the privileged call.
    ///
    /// The returned struct borrows this block's storage; it must not outlive
    /// the borrow and the block must not be modified while it is in use.
    pub fn as_raw(&mut self) -> RawCallArgs {
        RawCallArgs {
            pid: self.pid,
            tid: self.tid,
            total_bytes: self.bytes.len() as c_int,
            num_args: self.lengths.len() as c_int,
            arg_lengths: self.lengths.as_mut_ptr(),
            args: self.bytes.as_mut_ptr() as *mut c_char,
            ret: self.ret.as_mut_ptr() as *mut c_char,
        }
    }
}

impl Default for CallArgs {
    fn default() -> Self {
        Self::new()
    }
}

/// Layout of the argument block as the simulator reads it from guest memory.
#[repr(C)]
#[derive(Debug)]
pub struct RawCallArgs {
    pub pid: c_int,
    pub tid: c_int,
    pub total_bytes: c_int,
    pub num_args: c_int,
    pub arg_lengths: *mut c_int,
    pub args: *mut c_char,
    pub ret: *mut c_char,
}

#[cfg(target_os = "linux")]
fn current_tid() -> i32 {
    // SAFETY: gettid takes no arguments and cannot fail.
    unsafe { libc::syscall(libc::SYS_gettid) as i32 }
}

#[cfg(not(target_os = "linux"))]
fn current_tid() -> i32 {
    0
}
