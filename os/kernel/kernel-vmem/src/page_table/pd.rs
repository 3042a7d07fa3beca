//! # Page Directory (PD)
//!
//! - [`PdIndex`]: index type for VA bits `[31:22]`.
//! - [`PdEntry`]: a directory entry pointing at a page table.
//! - [`PageDirectory`]: a 4 KiB-aligned array of 1024 PDEs.
//!
//! 4 MiB `PS=1` mappings are never created here; the kernel only wires page
//! tables into the directory.

use crate::PageEntryBits;
use crate::page_table::ENTRIES;
use core::sync::atomic::{AtomicU32, Ordering};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};

/// Index into the Page Directory (derived from VA bits `[31:22]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PdIndex(u16);

/// A single Page Directory entry (PDE).
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PdEntry(PageEntryBits);

/// The Page Directory: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [AtomicU32; ENTRIES],
}

impl PdIndex {
    /// Build an index from a virtual address (extracts bits `[31:22]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new((va.as_u32() >> 22) as u16)
    }

    /// Construct from a raw `u16`.
    ///
    /// ### Debug assertions
    /// - Asserts `v < 1024` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!(v < 1024);
        Self(v)
    }

    /// Construct from a raw slot number, or `None` if it is out of range.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn try_new(v: u32) -> Option<Self> {
        if v < 1024 { Some(Self(v as u16)) } else { None }
    }

    /// The first virtual address covered by this directory slot.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new(self.as_u32() << 22)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl PdEntry {
    /// Create a zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    /// Build an entry pointing at the page table stored in `table`.
    #[inline]
    #[must_use]
    pub const fn new(table: PhysicalPage<Size4K>, user: bool, writable: bool, present: bool) -> Self {
        Self(PageEntryBits::mapping(table, user, writable, present))
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// The frame of the page table this entry points at.
    #[inline]
    #[must_use]
    pub const fn table_frame(self) -> PhysicalPage<Size4K> {
        self.0.frame_page()
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.into_bits()
    }

    #[inline]
    #[must_use]
    pub const fn from_raw(v: u32) -> Self {
        Self(PageEntryBits::from_bits(v))
    }
}

impl PageDirectory {
    /// Create a fully zeroed directory (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [const { AtomicU32::new(0) }; ENTRIES],
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, i: PdIndex) -> PdEntry {
        PdEntry::from_raw(self.entries[i.as_usize()].load(Ordering::Relaxed))
    }

    /// Write the entry at `i`. No TLB maintenance is performed.
    #[inline]
    pub fn set(&self, i: PdIndex, e: PdEntry) {
        self.entries[i.as_usize()].store(e.raw(), Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub const fn index_of(va: VirtualAddress) -> PdIndex {
        PdIndex::from(va)
    }
}

impl Default for PageDirectory {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn directory_entry_layout() {
        let table = PhysicalPage::<Size4K>::from_frame_number(0x1F3);
        let e = PdEntry::new(table, false, true, true);
        assert_eq!(e.raw(), 0x001F_3003);
        assert_eq!(e.table_frame(), table);

        let dir = PageDirectory::zeroed();
        let slot = PageDirectory::index_of(VirtualAddress::new(0xE000_0000));
        assert_eq!(slot.as_usize(), 0x380);
        dir.set(slot, e);
        assert_eq!(dir.get(slot), e);
        assert_eq!(slot.base(), VirtualAddress::new(0xE000_0000));
    }
}
