//! # MMU Access
//!
//! The page directory is a process-wide resource shared by every allocator
//! instance, so all accesses go through the [`Mmu`] trait with `&self`
//! receivers. Page tables are owned by their allocator and written directly.

use crate::page_table::pd::{PdEntry, PdIndex};
use crate::page_table::pt::PageTable;
use crate::page_table::split_indices;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress, VirtualPage};

/// Hardware interface for the paging structures.
pub trait Mmu {
    /// Drop any cached translation for `page`.
    fn invalidate_page(&self, page: VirtualPage<Size4K>);

    /// Read directory slot `index`.
    fn directory_entry(&self, index: PdIndex) -> PdEntry;

    /// Overwrite directory slot `index`.
    fn set_directory_entry(&self, index: PdIndex, entry: PdEntry);

    /// Walk directory and table for `va`.
    ///
    /// `None` if either level is not present; otherwise the frame base plus
    /// the low 12 bits of `va`.
    fn physical_address_of(&self, va: VirtualAddress) -> Option<PhysicalAddress>;
}

impl<M: Mmu + ?Sized> Mmu for &M {
    #[inline]
    fn invalidate_page(&self, page: VirtualPage<Size4K>) {
        (**self).invalidate_page(page);
    }

    #[inline]
    fn directory_entry(&self, index: PdIndex) -> PdEntry {
        (**self).directory_entry(index)
    }

    #[inline]
    fn set_directory_entry(&self, index: PdIndex, entry: PdEntry) {
        (**self).set_directory_entry(index, entry);
    }

    #[inline]
    fn physical_address_of(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        (**self).physical_address_of(va)
    }
}

/// Two-level walk shared by all backends.
///
/// `table` maps the directory slot and the frame named by a present PDE to
/// the page table it can read; returning `None` makes the address unmapped.
#[inline]
pub fn translate<'t, F>(va: VirtualAddress, pde: PdEntry, table: F) -> Option<PhysicalAddress>
where
    F: FnOnce(PdIndex, PhysicalPage<Size4K>) -> Option<&'t PageTable>,
{
    if !pde.is_present() {
        return None;
    }
    let (pd, pt) = split_indices(va);
    table(pd, pde.table_frame())?.get(pt).resolve(va)
}

/// Point directory slot `slot` at the page table in `table`.
///
/// Performs no TLB invalidation of the covered window.
#[inline]
pub fn set_directory_entry<M: Mmu + ?Sized>(
    mmu: &M,
    slot: PdIndex,
    table: PhysicalPage<Size4K>,
    user: bool,
    writable: bool,
    present: bool,
) {
    mmu.set_directory_entry(slot, PdEntry::new(table, user, writable, present));
}

/// [`Mmu::physical_address_of`] with the raw sentinel
/// [`NOT_MAPPED`](crate::NOT_MAPPED) for unmapped addresses.
#[inline]
pub fn physical_address_or_sentinel<M: Mmu + ?Sized>(mmu: &M, va: VirtualAddress) -> u32 {
    mmu.physical_address_of(va)
        .map_or(crate::NOT_MAPPED, PhysicalAddress::as_u32)
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use recursive::RecursiveMmu;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod recursive {
    use super::{Mmu, translate};
    use crate::info::RECURSIVE_DIRECTORY_VA;
    use crate::page_table::pd::{PageDirectory, PdEntry, PdIndex};
    use crate::page_table::pt::PageTable;
    use crate::page_table::split_indices;
    use crate::recursive_table_va;
    use core::sync::atomic::{Ordering, compiler_fence};
    use kernel_memory_addresses::{PhysicalAddress, Size4K, VirtualAddress, VirtualPage};

    /// The live MMU, reached through the recursive directory slot.
    ///
    /// Not interrupt-safe: callers must not interleave directory updates from
    /// interrupt context with an update in progress.
    pub struct RecursiveMmu {
        _private: (),
    }

    impl RecursiveMmu {
        /// # Safety
        /// - Paging is enabled and the last directory slot maps the active
        ///   directory onto itself.
        /// - The caller runs in ring 0.
        #[must_use]
        pub const unsafe fn new() -> Self {
            Self { _private: () }
        }

        fn directory(&self) -> &PageDirectory {
            let ptr = core::ptr::with_exposed_provenance::<PageDirectory>(RECURSIVE_DIRECTORY_VA as usize);
            // SAFETY: the self-map keeps the directory visible at this address (see `new`).
            unsafe { &*ptr }
        }

        /// The table wired at `pd`. Only dereferenceable while that slot is present.
        fn table(&self, pd: PdIndex) -> &PageTable {
            let va = recursive_table_va(pd).as_u32();
            let ptr = core::ptr::with_exposed_provenance::<PageTable>(va as usize);
            // SAFETY: callers check the directory entry first.
            unsafe { &*ptr }
        }
    }

    impl Mmu for RecursiveMmu {
        fn invalidate_page(&self, page: VirtualPage<Size4K>) {
            // Entry stores must be emitted before the invalidation.
            compiler_fence(Ordering::SeqCst);
            // SAFETY: ring 0 is guaranteed by `new`.
            unsafe { kernel_registers::tlb::invalidate_page(page.base()) };
        }

        fn directory_entry(&self, index: PdIndex) -> PdEntry {
            self.directory().get(index)
        }

        fn set_directory_entry(&self, index: PdIndex, entry: PdEntry) {
            self.directory().set(index, entry);
            // The recursive view of this slot's table moved with the entry.
            self.invalidate_page(VirtualPage::containing_address(recursive_table_va(index)));
        }

        fn physical_address_of(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
            let (pd, _) = split_indices(va);
            translate(va, self.directory().get(pd), |pd, _| Some(self.table(pd)))
        }
    }
}
