//! # Page Directory and Page Tables
//!
//! i386 non-PAE paging uses two levels:
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PD   |  PT   | Offset |
//! ```
//!
//! Both levels are 4 KiB-aligned arrays of 1024 32-bit entries. A directory
//! entry selects a page table covering 4 MiB; a table entry maps one 4 KiB
//! frame.
//!
//! Entries are stored as atomics: tables are shared with the MMU (which sets
//! the accessed/dirty bits) and, through the recursive slot, are reachable
//! under a second virtual address. All accesses are plain 32-bit loads and
//! stores; no read-modify-write is needed.

pub mod pd;
pub mod pt;

use crate::page_table::pd::PdIndex;
use crate::page_table::pt::{PageTable, PtIndex};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};

/// Number of entries in either level.
pub const ENTRIES: usize = 1024;

/// Split a virtual address into its directory and table indices.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (PdIndex, PtIndex) {
    (PdIndex::from(va), PtIndex::from(va))
}

/// A page table together with the physical frame that holds it.
///
/// The table is written through its kernel virtual address; the frame is what
/// goes into the directory entry that wires the table in.
#[derive(Copy, Clone, Debug)]
pub struct TableSlot<'a> {
    pub table: &'a PageTable,
    pub frame: PhysicalPage<Size4K>,
}

impl<'a> TableSlot<'a> {
    #[inline]
    #[must_use]
    pub const fn new(table: &'a PageTable, frame: PhysicalPage<Size4K>) -> Self {
        Self { table, frame }
    }
}
