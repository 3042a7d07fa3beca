//! # Virtual Memory Support
//!
//! i386 two-level paging (no PAE) for a small protected-mode kernel.
//!
//! ## What you get
//! - A 32-bit [`PageEntryBits`] bitfield shared by directory and table entries.
//! - A 4 KiB-aligned [`PageTable`] / [`PageDirectory`] and typed indices
//!   ([`PtIndex`], [`PdIndex`]).
//! - [`set_entry`] and [`set_directory_entry`] to write entries bit-exactly.
//! - The [`Mmu`] trait through which the shared directory is read and
//!   written, the TLB is invalidated and addresses are translated.
//!   [`RecursiveMmu`] drives the real hardware; `SimulatedMmu` (feature
//!   `sim`) stands in for it on the host.
//!
//! ## Virtual Address → Physical Address Walk
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PD   |  PT   | Offset |
//!
//!  CR3 → PD ──PDE──► PT ──PTE──► 4 KiB frame
//! ```
//!
//! A translation exists only when both the PDE and the PTE are present.
//!
//! ## Recursive Self-Map
//!
//! The last directory slot points at the directory itself. With paging
//! enabled, the directory is then visible at `0xFFFF_F000` and the table
//! wired at slot `i` at `0xFFC0_0000 + i * 0x1000`. [`RecursiveMmu`] relies
//! on this to walk and edit the live structures without an identity map.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

#[cfg(any(test, feature = "sim"))]
extern crate alloc;

mod mmu;
mod page_entry_bits;
pub mod page_table;
#[cfg(any(test, feature = "sim"))]
mod sim;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use crate::mmu::RecursiveMmu;
pub use crate::mmu::{Mmu, physical_address_or_sentinel, set_directory_entry, translate};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::pd::{PageDirectory, PdEntry, PdIndex};
pub use crate::page_table::pt::{PageTable, PtEntry, PtIndex, set_entry};
pub use crate::page_table::{TableSlot, split_indices};
#[cfg(any(test, feature = "sim"))]
pub use crate::sim::SimulatedMmu;

use kernel_memory_addresses::VirtualAddress;

/// Re-export constants as info module.
pub use kernel_info::memory as info;

/// Raw "no translation" value for callers that deal in plain `u32`s.
pub const NOT_MAPPED: u32 = 0xFFFF_FFFF;

/// Where the table wired at directory slot `pd` is visible through the
/// recursive self-map.
#[inline]
#[must_use]
pub const fn recursive_table_va(pd: PdIndex) -> VirtualAddress {
    VirtualAddress::new(info::RECURSIVE_TABLES_VA + (pd.as_u32() << 12))
}
