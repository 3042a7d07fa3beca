//! # Page Table (PT)
//!
//! This module models the lower paging level.
//!
//! - [`PtIndex`]: index type for VA bits `[21:12]`.
//! - [`PtEntry`]: a PT entry (PTE); every present entry maps a 4 KiB frame.
//! - [`PageTable`]: a 4 KiB-aligned array of 1024 PTEs.
//!
//! ## Invariants & Notes
//!
//! - [`PageTable`] is 4 KiB-aligned and contains exactly 1024 entries.
//! - Writing an entry never touches the TLB; after modifying an active
//!   mapping the caller must invalidate the affected page.

use crate::PageEntryBits;
use crate::page_table::ENTRIES;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

/// Index into a Page Table (derived from VA bits `[21:12]`).
///
/// Strongly typed to avoid mixing with directory slots. Range is `0..1024`
/// (checked in debug builds).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PtIndex(u16);

/// A single Page Table entry (PTE).
///
/// A present PTE maps exactly one 4 KiB page.
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PtEntry(PageEntryBits);

/// The Page Table: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [AtomicU32; ENTRIES],
}

impl PtIndex {
    /// Build an index from a virtual address (extracts bits `[21:12]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u32() >> 12) & 0x3FF) as u16)
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

    /// Return the index as `usize` for table access.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub fn as_u32(self) -> u32 {
        u32::from(self.0)
    }
}

impl PtEntry {
    /// Create a zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    /// Build an entry mapping `frame`.
    #[inline]
    #[must_use]
    pub const fn new(frame: PhysicalPage<Size4K>, user: bool, writable: bool, present: bool) -> Self {
        Self(PageEntryBits::mapping(frame, user, writable, present))
    }

    /// Return `true` if the entry is marked present.
    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// Expose the underlying bitfield.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// The frame stored in this entry, whether present or not.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> PhysicalPage<Size4K> {
        self.0.frame_page()
    }

    /// If present, the physical address `va` resolves to through this entry.
    #[inline]
    #[must_use]
    pub const fn resolve(self, va: VirtualAddress) -> Option<PhysicalAddress> {
        if !self.is_present() {
            return None;
        }
        Some(self.frame().join(va.offset::<Size4K>()))
    }

    /// Return the raw 32-bit value (flags + frame).
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.into_bits()
    }

    /// Construct from a raw 32-bit value. No validation is performed.
    #[inline]
    #[must_use]
    pub const fn from_raw(v: u32) -> Self {
        Self(PageEntryBits::from_bits(v))
    }
}

impl PageTable {
    /// Create a fully zeroed Page Table (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [const { AtomicU32::new(0) }; ENTRIES],
        }
    }

    /// Read the entry at `i`.
    ///
    /// Plain load; does not imply any TLB synchronization.
    #[inline]
    #[must_use]
    pub fn get(&self, i: PtIndex) -> PtEntry {
        PtEntry::from_raw(self.entries[i.as_usize()].load(Ordering::Relaxed))
    }

    /// Write the entry at `i`.
    ///
    /// Caller must handle any required TLB invalidation when changing active mappings.
    #[inline]
    pub fn set(&self, i: PtIndex, e: PtEntry) {
        self.entries[i.as_usize()].store(e.raw(), Ordering::Relaxed);
    }

    /// Mark every entry not present.
    pub fn clear(&self) {
        for e in &self.entries {
            e.store(0, Ordering::Relaxed);
        }
    }

    /// Iterate over the present entries as `(slot, entry)` pairs.
    #[allow(clippy::cast_possible_truncation)]
    pub fn present_entries(&self) -> impl Iterator<Item = (PtIndex, PtEntry)> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, raw)| {
            let e = PtEntry::from_raw(raw.load(Ordering::Relaxed));
            e.is_present().then_some((PtIndex::new(i as u16), e))
        })
    }

    /// Derive the PT index from a virtual address.
    #[inline]
    #[must_use]
    pub const fn index_of(va: VirtualAddress) -> PtIndex {
        PtIndex::from(va)
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for PageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTable")
            .field("present", &self.present_entries().count())
            .finish()
    }
}

/// Write slot `slot` of `table`: the frame's high bits plus the present,
/// writable and user bits.
///
/// This is an unconditional overwrite and performs no TLB invalidation.
#[inline]
pub fn set_entry(
    table: &PageTable,
    slot: PtIndex,
    frame: PhysicalPage<Size4K>,
    user: bool,
    writable: bool,
    present: bool,
) {
    table.set(slot, PtEntry::new(frame, user, writable, present));
}
