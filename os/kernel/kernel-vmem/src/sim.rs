//! In-memory MMU for host tests.

use crate::mmu::{Mmu, translate};
use crate::page_table::pd::{PageDirectory, PdEntry, PdIndex};
use crate::page_table::split_indices;
use crate::page_table::{TableSlot, pt::PageTable};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::RefCell;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress, VirtualPage};

/// A page directory in host memory plus a log of TLB invalidations.
///
/// Page tables are not reachable from a physical frame number on the host, so
/// tables that take part in address translation must be registered with
/// [`SimulatedMmu::attach`] first.
pub struct SimulatedMmu<'t> {
    directory: Box<PageDirectory>,
    tables: RefCell<Vec<TableSlot<'t>>>,
    invalidations: RefCell<Vec<VirtualPage<Size4K>>>,
}

impl<'t> SimulatedMmu<'t> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            directory: Box::new(PageDirectory::zeroed()),
            tables: RefCell::new(Vec::new()),
            invalidations: RefCell::new(Vec::new()),
        }
    }

    /// Make `slot.table` resolvable through its frame and hand the slot back.
    pub fn attach(&self, slot: TableSlot<'t>) -> TableSlot<'t> {
        self.tables.borrow_mut().push(slot);
        slot
    }

    /// The simulated page directory.
    #[must_use]
    pub fn directory(&self) -> &PageDirectory {
        &self.directory
    }

    /// Every page invalidated so far, in order.
    #[must_use]
    pub fn invalidations(&self) -> Vec<VirtualPage<Size4K>> {
        self.invalidations.borrow().clone()
    }

    /// Drain the invalidation log.
    pub fn take_invalidations(&self) -> Vec<VirtualPage<Size4K>> {
        core::mem::take(&mut *self.invalidations.borrow_mut())
    }

    /// `true` if the page containing `va` has been invalidated.
    #[must_use]
    pub fn was_invalidated(&self, va: VirtualAddress) -> bool {
        let page = VirtualPage::containing_address(va);
        self.invalidations.borrow().contains(&page)
    }

    fn table_at(&self, frame: PhysicalPage<Size4K>) -> Option<&'t PageTable> {
        self.tables
            .borrow()
            .iter()
            .find(|slot| slot.frame == frame)
            .map(|slot| slot.table)
    }
}

impl Default for SimulatedMmu<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Mmu for SimulatedMmu<'_> {
    fn invalidate_page(&self, page: VirtualPage<Size4K>) {
        self.invalidations.borrow_mut().push(page);
    }

    fn directory_entry(&self, index: PdIndex) -> PdEntry {
        self.directory.get(index)
    }

    fn set_directory_entry(&self, index: PdIndex, entry: PdEntry) {
        self.directory.set(index, entry);
    }

    fn physical_address_of(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let (pd, _) = split_indices(va);
        translate(va, self.directory.get(pd), |_, frame| self.table_at(frame))
    }
}
