//! Backing memory for pinned regions.
//!
//! Regions are handed to the simulator by address, so they need to start on a
//! page boundary and never move. Native targets take anonymous `mmap` pages;
//! when the map is refused we fall back to a page-aligned heap allocation.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::{RegistryError, RegistryResult};

/// Alignment of every region; matches the page size the simulator assumes.
pub(crate) const PAGE_SIZE: usize = 0x1000;

#[derive(Debug)]
enum Backing {
    #[cfg(not(target_arch = "wasm32"))]
    Native(memmap2::MmapMut),
    Owned { ptr: NonNull<u8>, layout: Layout },
}

/// Exclusively owned, address-stable block of memory.
#[derive(Debug)]
pub struct PinnedRegion {
    len: usize,
    backing: Backing,
}

// SAFETY: the region owns its memory outright; the raw pointer in the heap
// backing is never shared outside of borrows tied to `&self`/`&mut self`.
unsafe impl Send for PinnedRegion {}
// SAFETY: shared access only hands out `*const u8`/`&[u8]`.
unsafe impl Sync for PinnedRegion {}

impl PinnedRegion {
    /// Allocates `len` zeroed bytes starting on a page boundary.
    pub fn allocate(len: usize) -> RegistryResult<Self> {
        if len == 0 {
            return Err(RegistryError::EmptyRegion);
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Some(map) = Self::mmap_backed(len) {
                return Ok(Self {
                    len,
                    backing: Backing::Native(map),
                });
            }
        }

        Self::heap_backed(len)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn mmap_backed(len: usize) -> Option<memmap2::MmapMut> {
        match memmap2::MmapOptions::new().len(len).map_anon() {
            Ok(map) if map.as_ptr() as usize % PAGE_SIZE == 0 => Some(map),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!("anonymous map of {len} bytes failed: {err}");
                None
            }
        }
    }

    fn heap_backed(len: usize) -> RegistryResult<Self> {
        let layout = Layout::from_size_align(len, PAGE_SIZE)
            .map_err(|_| RegistryError::OutOfMemory { size: len })?;
        // SAFETY: `layout` has a non-zero size, checked above.
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(RegistryError::OutOfMemory { size: len })?;
        Ok(Self {
            len,
            backing: Backing::Owned { ptr, layout },
        })
    }

    /// Number of bytes in the region.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Regions are never empty; present for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base address of the region.
    pub fn as_ptr(&self) -> *const u8 {
        match &self.backing {
            #[cfg(not(target_arch = "wasm32"))]
            Backing::Native(map) => map.as_ptr(),
            Backing::Owned { ptr, .. } => ptr.as_ptr(),
        }
    }

    /// View the region as an immutable slice.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the backing owns `len` initialised (zeroed) bytes.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }
}

impl Drop for PinnedRegion {
    fn drop(&mut self) {
        if let Backing::Owned { ptr, layout } = &self.backing {
            // SAFETY: `ptr` was produced by `alloc_zeroed(layout)`.
            unsafe { dealloc(ptr.as_ptr(), *layout) };
        }
    }
}
