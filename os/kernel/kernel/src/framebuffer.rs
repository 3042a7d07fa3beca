//! # Kernel Framebuffer Mapping
//!
//! The linear framebuffer is device memory owned by the firmware, not a pool
//! frame, so it is mapped directly through its own table instead of through a
//! page allocator.

use kernel_alloc::WindowToken;
use kernel_info::boot::FramebufferInfo;
use kernel_info::memory::{FRAMEBUFFER_MAX_PAGES, PAGE_SIZE};
use kernel_memory_addresses::{PhysicalAddress, Size4K, VirtualAddress, VirtualPage};
use kernel_vmem::{Mmu, PtIndex, TableSlot, set_directory_entry, set_entry};
use log::info;

/// The framebuffer could not be mapped.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FramebufferError {
    #[error("framebuffer needs {pages} pages, at most {FRAMEBUFFER_MAX_PAGES} fit one table")]
    TooLarge { pages: u64 },
    #[error("framebuffer at {0} runs past 4 GiB")]
    OutOfRange(PhysicalAddress),
}

/// A mapped framebuffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MappedFramebuffer {
    /// Virtual address of the first pixel.
    pub address: VirtualAddress,
    /// Number of 4 KiB pages mapped.
    pub pages: u32,
}

/// Map `fb` into the first table of `window` and wire that table in.
///
/// Entries are supervisor-only and writable. Any previous contents of
/// `table` are discarded.
///
/// # Errors
/// - [`FramebufferError::TooLarge`] if the framebuffer spans more than
///   [`FRAMEBUFFER_MAX_PAGES`] pages.
/// - [`FramebufferError::OutOfRange`] if its frames run past 4 GiB.
pub fn map_framebuffer<M: Mmu + ?Sized>(
    mmu: &M,
    table: TableSlot<'_>,
    window: &WindowToken,
    fb: &FramebufferInfo,
) -> Result<MappedFramebuffer, FramebufferError> {
    let address = PhysicalAddress::new(fb.address);
    let (first_frame, offset) = address.split::<Size4K>();

    let bytes = u64::from(offset.as_u32()) + u64::from(fb.pitch) * u64::from(fb.height);
    let pages = bytes.div_ceil(u64::from(PAGE_SIZE));
    let pages = match u32::try_from(pages) {
        Ok(p) if p <= FRAMEBUFFER_MAX_PAGES => p,
        _ => return Err(FramebufferError::TooLarge { pages }),
    };
    if pages > 0 && first_frame.checked_add(pages - 1).is_none() {
        return Err(FramebufferError::OutOfRange(address));
    }

    table.table.clear();
    let entries = (0..pages).filter_map(|i| Some((PtIndex::try_new(i)?, first_frame.checked_add(i)?)));
    for (slot, frame) in entries {
        set_entry(table.table, slot, frame, false, true, true);
    }
    set_directory_entry(mmu, window.first_slot(), table.frame, false, true, true);

    let base = window.base();
    for i in 0..pages {
        let page = VirtualPage::<Size4K>::containing_address(base + i * PAGE_SIZE);
        mmu.invalidate_page(page);
    }

    let mapped = MappedFramebuffer {
        address: base + offset.as_u32(),
        pages,
    };
    info!(
        "framebuffer {}x{}x{} ({:?}) at {} mapped to {} ({} pages)",
        fb.width,
        fb.height,
        fb.bpp,
        fb.kind,
        address,
        mapped.address,
        pages
    );
    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_alloc::WindowRegistry;
    use kernel_info::boot::FramebufferKind;
    use kernel_info::memory::FRAMEBUFFER_WINDOW_BASE;
    use kernel_memory_addresses::PhysicalPage;
    use kernel_vmem::{PageTable, PdIndex, SimulatedMmu};

    fn fb(address: u32, pitch: u32, height: u32) -> FramebufferInfo {
        FramebufferInfo {
            address,
            pitch,
            width: pitch / 4,
            height,
            bpp: 32,
            kind: FramebufferKind::Rgb,
        }
    }

    fn window() -> WindowToken {
        WindowRegistry::new()
            .claim(VirtualAddress::new(FRAMEBUFFER_WINDOW_BASE), 1)
            .unwrap()
    }

    #[test]
    fn maps_every_page_and_wires_the_table() {
        let pt = PageTable::zeroed();
        let mmu = SimulatedMmu::new();
        let slot = mmu.attach(TableSlot::new(&pt, PhysicalPage::from_frame_number(0x1F8)));
        let window = window();

        // 1024x768x32: exactly 768 pages.
        let mapped = map_framebuffer(&mmu, slot, &window, &fb(0xFD00_0000, 4096, 768)).unwrap();
        assert_eq!(mapped.pages, 768);
        assert_eq!(mapped.address, VirtualAddress::new(FRAMEBUFFER_WINDOW_BASE));
        assert_eq!(pt.present_entries().count(), 768);

        let pde = mmu.directory().get(PdIndex::from(mapped.address));
        assert!(pde.is_present());
        assert_eq!(pde.raw(), 0x001F_8003);

        let last = VirtualAddress::new(FRAMEBUFFER_WINDOW_BASE + 767 * 4096 + 0x10);
        assert_eq!(mmu.physical_address_of(last), Some(PhysicalAddress::new(0xFD2F_F010)));
        assert_eq!(mmu.physical_address_of(last + 4096), None);
        assert_eq!(mmu.invalidations().len(), 768);
        assert!(mmu.was_invalidated(last));
    }

    #[test]
    fn unaligned_base_keeps_its_offset() {
        let pt = PageTable::zeroed();
        let mmu = SimulatedMmu::new();
        let slot = mmu.attach(TableSlot::new(&pt, PhysicalPage::from_frame_number(0x1F8)));

        // 0x800 bytes of offset plus 4096 bytes of pixels straddle two pages.
        let mapped = map_framebuffer(&mmu, slot, &window(), &fb(0x000B_8800, 4096, 1)).unwrap();
        assert_eq!(mapped.pages, 2);
        assert_eq!(mapped.address, VirtualAddress::new(FRAMEBUFFER_WINDOW_BASE + 0x800));
        assert_eq!(
            mmu.physical_address_of(mapped.address),
            Some(PhysicalAddress::new(0x000B_8800))
        );
    }

    #[test]
    fn more_than_one_table_is_rejected() {
        let pt = PageTable::zeroed();
        let mmu = SimulatedMmu::new();
        let slot = TableSlot::new(&pt, PhysicalPage::from_frame_number(0x1F8));

        // 4 MiB plus one scanline.
        let err = map_framebuffer(&mmu, slot, &window(), &fb(0xE000_0000, 4096, 1025)).unwrap_err();
        assert_eq!(err, FramebufferError::TooLarge { pages: 1025 });
        assert_eq!(pt.present_entries().count(), 0);
        assert!(!mmu.directory().get(PdIndex::new(0x340)).is_present());
        assert!(mmu.invalidations().is_empty());
    }

    #[test]
    fn exactly_one_table_fits() {
        let pt = PageTable::zeroed();
        let mmu = SimulatedMmu::new();
        let slot = TableSlot::new(&pt, PhysicalPage::from_frame_number(0x1F8));

        let mapped = map_framebuffer(&mmu, slot, &window(), &fb(0xE000_0000, 4096, 1024)).unwrap();
        assert_eq!(mapped.pages, 1024);
        assert_eq!(pt.present_entries().count(), 1024);
    }

    #[test]
    fn frames_past_4_gib_are_rejected() {
        let pt = PageTable::zeroed();
        let mmu = SimulatedMmu::new();
        let slot = TableSlot::new(&pt, PhysicalPage::from_frame_number(0x1F8));

        let err = map_framebuffer(&mmu, slot, &window(), &fb(0xFFFF_F000, 4096, 2)).unwrap_err();
        assert_eq!(err, FramebufferError::OutOfRange(PhysicalAddress::new(0xFFFF_F000)));
    }
}
