#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// CR3: Page-Directory Base Register (32-bit paging, no PAE).
///
/// Holds the physical frame of the active page directory and the cache-control
/// flags used when the MMU reads directory entries.
#[bitfield(u32)]
pub struct Cr3 {
    /// Bits 0–2: Reserved (must be 0).
    #[bits(3)]
    pub reserved0: u8,

    /// Bit 3: PWT: Page-level Write-Through for the directory.
    pub pwt: bool,

    /// Bit 4: PCD: Page-level Cache Disable for the directory.
    pub pcd: bool,

    /// Bits 5–11: Reserved (must be 0 when written).
    #[bits(7)]
    pub reserved1: u8,

    /// Bits 12–31: page directory physical base >> 12.
    #[bits(20)]
    directory_frame: u32,
}

impl Cr3 {
    /// Create a `Cr3` value pointing at the directory stored in `directory`.
    #[must_use]
    pub const fn from_directory(directory: PhysicalPage<Size4K>, pwt: bool, pcd: bool) -> Self {
        Self::new()
            .with_pwt(pwt)
            .with_pcd(pcd)
            .with_directory_frame(directory.frame_number())
    }

    /// The frame that holds the page directory.
    #[must_use]
    pub const fn directory(&self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_frame_number(self.directory_frame())
    }

    /// Physical base address of the page directory.
    #[must_use]
    pub const fn directory_phys(&self) -> PhysicalAddress {
        self.directory().base()
    }
}

#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
impl LoadRegisterUnsafe for Cr3 {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn load_unsafe() -> Self {
        let mut cr3: usize;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3 as u32)
    }
}

#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
impl StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits() as usize;
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_roundtrip() {
        let dir = PhysicalPage::<Size4K>::from_frame_number(0x1F3);
        let cr3 = Cr3::from_directory(dir, false, true);
        assert_eq!(cr3.into_bits(), 0x001F_3010);
        assert_eq!(cr3.directory(), dir);
        assert_eq!(cr3.directory_phys(), PhysicalAddress::new(0x001F_3000));
    }
}
