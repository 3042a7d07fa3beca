//! # Memory Driver Contract
//!
//! The uniform interface through which higher layers (the kernel heap, the
//! boot code) consume page allocators without knowing which instance backs
//! them.

use crate::page_alloc::{PageAllocError, PageAllocator};
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::Mmu;

/// A source of whole pages at caller-chosen virtual addresses.
///
/// Object safe; heterogeneous instances are used as `&mut dyn MemoryDriver`.
pub trait MemoryDriver {
    /// Map `pages` units at `va` and return `va`.
    ///
    /// # Errors
    /// Implementation-specific; see [`PageAllocError`].
    fn alloc(&mut self, va: VirtualAddress, pages: u32) -> Result<VirtualAddress, PageAllocError>;

    /// Unmap `pages` units at `va`.
    ///
    /// # Errors
    /// Implementation-specific; see [`PageAllocError`].
    fn free(&mut self, va: VirtualAddress, pages: u32) -> Result<(), PageAllocError>;

    /// Make the driver's mappings visible (`true`) or hide them.
    ///
    /// # Errors
    /// Implementation-specific; see [`PageAllocError`].
    fn set_state(&mut self, enabled: bool) -> Result<(), PageAllocError>;

    /// Allocation granularity in bytes. Never zero.
    fn unit(&self) -> u32;

    /// Number of units needed to hold `bytes` bytes.
    fn pages_for(&self, bytes: u32) -> u32 {
        bytes.div_ceil(self.unit())
    }
}

impl<M: Mmu> MemoryDriver for PageAllocator<'_, M> {
    #[inline]
    fn alloc(&mut self, va: VirtualAddress, pages: u32) -> Result<VirtualAddress, PageAllocError> {
        Self::alloc(self, va, pages)
    }

    #[inline]
    fn free(&mut self, va: VirtualAddress, pages: u32) -> Result<(), PageAllocError> {
        Self::free(self, va, pages)
    }

    #[inline]
    fn set_state(&mut self, enabled: bool) -> Result<(), PageAllocError> {
        Self::set_state(self, enabled)
    }

    #[inline]
    fn unit(&self) -> u32 {
        Self::UNIT
    }
}
