//! # Window Ownership
//!
//! Every allocator instance, and every mapping that bypasses the allocators,
//! owns a contiguous run of page-directory slots (its *window*). The
//! [`WindowRegistry`] hands out one [`WindowToken`] per run and refuses
//! overlapping claims, so two owners can never write the same directory slot.

use kernel_memory_addresses::{PageSize, Size4K, Size4M, VirtualAddress, VirtualPage};
use kernel_vmem::{PdIndex, info};

const SLOTS: u32 = info::ENTRIES_PER_TABLE;
const SLOT_WORDS: usize = (SLOTS / u32::BITS) as usize;

/// A window claim was rejected.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum WindowError {
    #[error("window base {0} is not 4 MiB aligned")]
    Unaligned(VirtualAddress),
    #[error("window must span at least one table")]
    Empty,
    #[error("window at {base} with {tables} tables runs past the directory")]
    OutOfRange { base: VirtualAddress, tables: u32 },
    #[error("directory slot {slot} is already claimed")]
    Overlap { slot: u32 },
}

/// Proof of exclusive ownership of `tables` directory slots starting at `base`.
///
/// Deliberately neither `Clone` nor `Copy`.
#[derive(Debug, Eq, PartialEq)]
pub struct WindowToken {
    base: VirtualAddress,
    tables: u32,
}

impl WindowToken {
    /// First virtual address of the window.
    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    /// Number of page tables (directory slots) in the window.
    #[must_use]
    pub const fn tables(&self) -> u32 {
        self.tables
    }

    /// Number of 4 KiB pages the window can map.
    #[must_use]
    pub const fn pages(&self) -> u32 {
        self.tables * info::ENTRIES_PER_TABLE
    }

    /// Directory slot of the first table.
    #[must_use]
    pub const fn first_slot(&self) -> PdIndex {
        PdIndex::from(self.base)
    }

    /// Directory slot of table `i` of this window.
    #[must_use]
    pub const fn slot(&self, i: u32) -> Option<PdIndex> {
        if i >= self.tables {
            return None;
        }
        PdIndex::try_new(self.first_slot().as_u32() + i)
    }

    /// Page offset of `va` within the window, if it lies inside.
    #[must_use]
    pub fn page_index(&self, va: VirtualAddress) -> Option<u32> {
        let origin = VirtualPage::<Size4K>::containing_address(self.base);
        VirtualPage::<Size4K>::containing_address(va)
            .pages_since(origin)
            .filter(|&i| i < self.pages())
    }

    /// `true` if `pages` pages starting at `va` lie entirely inside the window.
    #[must_use]
    pub fn covers(&self, va: VirtualAddress, pages: u32) -> bool {
        self.page_index(va)
            .and_then(|first| first.checked_add(pages))
            .is_some_and(|end| end <= self.pages())
    }
}

/// Book-keeping of claimed directory slots.
///
/// The recursive self-map slot is reserved from the start.
#[derive(Debug)]
pub struct WindowRegistry {
    claimed: [u32; SLOT_WORDS],
}

impl WindowRegistry {
    #[must_use]
    pub const fn new() -> Self {
        let mut claimed = [0; SLOT_WORDS];
        let r = info::RECURSIVE_SLOT;
        claimed[(r / u32::BITS) as usize] |= 1 << (r % u32::BITS);
        Self { claimed }
    }

    /// Claim `tables` directory slots starting at `base`.
    ///
    /// # Errors
    /// - [`WindowError::Unaligned`] if `base` is not on a 4 MiB boundary.
    /// - [`WindowError::Empty`] for `tables == 0`.
    /// - [`WindowError::OutOfRange`] if the window would run past the directory.
    /// - [`WindowError::Overlap`] if any slot is already claimed.
    pub fn claim(&mut self, base: VirtualAddress, tables: u32) -> Result<WindowToken, WindowError> {
        if !base.is_aligned::<Size4M>() {
            return Err(WindowError::Unaligned(base));
        }
        if tables == 0 {
            return Err(WindowError::Empty);
        }
        let first = base.as_u32() >> Size4M::SHIFT;
        let end = first
            .checked_add(tables)
            .filter(|&end| end <= SLOTS)
            .ok_or(WindowError::OutOfRange { base, tables })?;

        if let Some(slot) = (first..end).find(|&s| self.is_claimed(s)) {
            return Err(WindowError::Overlap { slot });
        }
        for s in first..end {
            self.set(s, true);
        }
        log::debug!("claimed window {base} ({tables} tables, slots {first}..{end})");
        Ok(WindowToken { base, tables })
    }

    /// Return the slots of `token` to the registry.
    pub fn release(&mut self, token: WindowToken) {
        let first = token.first_slot().as_u32();
        for s in first..first + token.tables {
            self.set(s, false);
        }
        log::debug!("released window {}", token.base);
    }

    /// `true` if directory slot `slot` is owned by some token (or reserved).
    #[must_use]
    pub const fn is_claimed(&self, slot: u32) -> bool {
        slot < SLOTS && self.claimed[(slot / u32::BITS) as usize] & (1 << (slot % u32::BITS)) != 0
    }

    fn set(&mut self, slot: u32, claimed: bool) {
        let word = &mut self.claimed[(slot / u32::BITS) as usize];
        let mask = 1 << (slot % u32::BITS);
        if claimed {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAP: VirtualAddress = VirtualAddress::new(0xE000_0000);

    #[test]
    fn overlapping_claims_fail() {
        let mut reg = WindowRegistry::new();
        let heap = reg.claim(HEAP, 2).unwrap();
        assert_eq!(heap.first_slot().as_usize(), 0x380);

        assert_eq!(
            reg.claim(VirtualAddress::new(0xE040_0000), 1),
            Err(WindowError::Overlap { slot: 0x381 })
        );
        assert_eq!(
            reg.claim(VirtualAddress::new(0xDFC0_0000), 2),
            Err(WindowError::Overlap { slot: 0x380 })
        );
        assert!(reg.claim(VirtualAddress::new(0xDFC0_0000), 1).is_ok());
    }

    #[test]
    fn release_frees_slots() {
        let mut reg = WindowRegistry::new();
        let heap = reg.claim(HEAP, 2).unwrap();
        reg.release(heap);
        assert!(!reg.is_claimed(0x380));
        assert!(reg.claim(HEAP, 2).is_ok());
    }

    #[test]
    fn rejects_bad_windows() {
        let mut reg = WindowRegistry::new();
        assert_eq!(
            reg.claim(VirtualAddress::new(0xE000_1000), 1),
            Err(WindowError::Unaligned(VirtualAddress::new(0xE000_1000)))
        );
        assert_eq!(reg.claim(HEAP, 0), Err(WindowError::Empty));
        assert_eq!(
            reg.claim(VirtualAddress::new(0xFF80_0000), 3),
            Err(WindowError::OutOfRange {
                base: VirtualAddress::new(0xFF80_0000),
                tables: 3
            })
        );
        assert_eq!(
            reg.claim(VirtualAddress::new(0xFFC0_0000), 1),
            Err(WindowError::Overlap { slot: 1023 }),
            "the self-map slot is reserved"
        );
    }

    #[test]
    fn window_geometry() {
        let mut reg = WindowRegistry::new();
        let w = reg.claim(HEAP, 2).unwrap();
        assert_eq!(w.pages(), 2048);
        assert_eq!(w.page_index(VirtualAddress::new(0xE040_1000)), Some(1025));
        assert_eq!(w.page_index(VirtualAddress::new(0xE080_0000)), None);
        assert_eq!(w.page_index(VirtualAddress::new(0xDFFF_F000)), None);
        assert!(w.covers(VirtualAddress::new(0xE07F_F000), 1));
        assert!(!w.covers(VirtualAddress::new(0xE07F_F000), 2));
        assert_eq!(w.slot(1).map(PdIndex::as_usize), Some(0x381));
        assert_eq!(w.slot(2), None);
    }
}
