use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalPage, Size4K};

/// A single 32-bit i386 paging entry in its raw bitfield form.
///
/// Page-directory entries (PDEs) and page-table entries (PTEs) share this
/// layout in non-PAE paging. A PDE points at a page table (or, with `PS=1`,
/// maps a 4 MiB page); a PTE maps a single 4 KiB frame.
///
/// ### Bit layout
///
/// | Bits      | Name / Mnemonic   | Meaning |
/// |-----------|-------------------|----------|
/// | 0         | `P` (present)     | Valid entry if set |
/// | 1         | `RW`              | Writable if set |
/// | 2         | `US`              | User-mode accessible if set |
/// | 3         | `PWT`             | Write-through caching |
/// | 4         | `PCD`             | Disable caching |
/// | 5         | `A`               | Accessed |
/// | 6         | `D`               | Dirty (PTE only) |
/// | 7         | `PS` / `PAT`      | 4 MiB page in a PDE, PAT in a PTE |
/// | 8         | `G`               | Global (PTE only) |
/// | 9–11      | OS avail          | Reserved for OS use |
/// | 12–31     | `frame`           | Physical frame number |
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::{PhysicalPage, Size4K};
/// # use kernel_vmem::PageEntryBits;
/// let mut e = PageEntryBits::new();
/// e.set_present(true);
/// e.set_writable(true);
/// e.set_frame_page(PhysicalPage::<Size4K>::from_frame_number(0x800));
/// assert_eq!(e.into_bits(), 0x0080_0003);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    ///
    /// Set if the entry points to a valid page table or maps a valid page.
    /// Clear implies a not-present entry; all other bits are then ignored by
    /// the MMU.
    pub present: bool,

    /// Writable (RW, bit 1).
    ///
    /// Clear for read-only. The effective permission is the intersection of
    /// the PDE and PTE bits.
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    ///
    /// Set to allow ring 3 access; clear restricts to supervisor only.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5).
    ///
    /// Set by the CPU on first access through this entry.
    pub accessed: bool,

    /// Dirty (D, bit 6), PTE only.
    pub dirty: bool,

    /// Page Size (PS, bit 7) in a PDE; PAT in a PTE.
    pub large_page: bool,

    /// Global (G, bit 8), PTE only.
    pub global: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available: u8,

    /// Physical frame number (bits 12..=31).
    #[bits(20)]
    pub frame: u32,
}

impl PageEntryBits {
    /// Entry bits for a present mapping of `frame` with the given access flags.
    #[inline]
    #[must_use]
    pub const fn mapping(frame: PhysicalPage<Size4K>, user: bool, writable: bool, present: bool) -> Self {
        Self::new()
            .with_frame(frame.frame_number())
            .with_user_access(user)
            .with_writable(writable)
            .with_present(present)
    }

    #[inline]
    pub const fn set_frame_page(&mut self, frame: PhysicalPage<Size4K>) {
        self.set_frame(frame.frame_number());
    }

    #[inline]
    #[must_use]
    pub const fn frame_page(&self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_frame_number(self.frame())
    }
}
