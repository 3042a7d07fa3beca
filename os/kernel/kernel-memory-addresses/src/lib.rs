//! # Virtual and Physical Memory Address Types (i386)
//!
//! Strongly typed wrappers for raw 32-bit memory addresses and page bases used
//! in paging and memory management code.
//!
//! ## Overview
//!
//! Protected-mode x86 without PAE has a flat 32-bit virtual address space and
//! (for our purposes) a 32-bit physical address space. Both are plain `u32`s
//! at the hardware level, which makes it very easy to hand a virtual address
//! to code that expects a physical one. The types in this crate carry the
//! *kind* of an address at compile time while remaining zero-cost wrappers.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] / [`VirtualPage<S>`] | Refer to virtual (page-table translated) memory. |
//! | [`PhysicalAddress`] / [`PhysicalPage<S>`] | Refer to physical memory, page frames or MMIO. |
//! | [`MemoryAddressOffset<S>`] | An offset within a page of size `S`. |
//!
//! ## Page Sizes
//!
//! - [`Size4K`]: 4 KiB pages, mapped by a page-table entry.
//! - [`Size4M`]: 4 MiB, the span covered by one page-directory entry (and
//!   the size of a PSE large page).
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0xE000_1234);
//! let (page, off) = va.split::<Size4K>();
//! assert_eq!(page.base().as_u32(), 0xE000_1000);
//! assert_eq!(off.as_u32(), 0x234);
//! assert_eq!(page.join(off), va);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod memory_address_offset;
mod page_size;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

use core::fmt;

pub use crate::memory_address_offset::MemoryAddressOffset;
pub use crate::page_size::{PageSize, Size4K, Size4M};
pub use crate::physical_address::PhysicalAddress;
pub use crate::physical_page::PhysicalPage;
pub use crate::virtual_address::VirtualAddress;
pub use crate::virtual_page::VirtualPage;

/// Returned when an address was expected to be aligned to a page boundary
/// but was not.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MisalignedAddress {
    /// The raw offending address.
    pub address: u32,
    /// The required alignment in bytes.
    pub alignment: u32,
}

impl fmt::Display for MisalignedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "address 0x{:08X} is not aligned to {:#X} bytes",
            self.address, self.alignment
        )
    }
}
