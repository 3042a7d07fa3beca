//! A byte heap growing through the memory driver contract, the way the
//! kernel heap consumes its page allocator.

use kernel_alloc::{
    FramePool, MemoryDriver, MemoryFlags, PageAllocError, PageAllocator, PageAllocatorConfig,
    WindowRegistry,
};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualAddress};
use kernel_vmem::{PageTable, SimulatedMmu, TableSlot};

/// Bump heap: hands out bytes from `[base, top)` and maps more units on demand.
struct BumpHeap<'d> {
    driver: &'d mut dyn MemoryDriver,
    base: VirtualAddress,
    next: u32,
    mapped_units: u32,
}

impl<'d> BumpHeap<'d> {
    fn new(driver: &'d mut dyn MemoryDriver, base: VirtualAddress) -> Self {
        Self {
            driver,
            base,
            next: 0,
            mapped_units: 0,
        }
    }

    fn alloc(&mut self, bytes: u32) -> Result<VirtualAddress, PageAllocError> {
        let end = self.next + bytes;
        let needed = self.driver.pages_for(end);
        if needed > self.mapped_units {
            let grow_at = VirtualAddress::new(self.base.as_u32() + self.mapped_units * self.driver.unit());
            self.driver.alloc(grow_at, needed - self.mapped_units)?;
            self.mapped_units = needed;
        }
        let at = VirtualAddress::new(self.base.as_u32() + self.next);
        self.next = end;
        Ok(at)
    }
}

#[test]
fn heap_grows_in_whole_units() {
    let pt = PageTable::zeroed();
    let mmu = SimulatedMmu::new();
    let tables = [mmu.attach(TableSlot::new(&pt, PhysicalPage::from_frame_number(0x1F0)))];
    let mut words = [0u32; 1];
    let mut registry = WindowRegistry::new();
    let base = VirtualAddress::new(0xE000_0000);

    let mut pages = PageAllocator::new(
        &mmu,
        PageAllocatorConfig {
            tables: &tables,
            pool: FramePool::new(PhysicalPage::from_frame_number(0x800), 4),
            bitmap: &mut words,
            window: registry.claim(base, 1).unwrap(),
            flags: MemoryFlags::empty(),
        },
    )
    .unwrap();
    pages.init();
    pages.set_state(true).unwrap();

    {
        let mut heap = BumpHeap::new(&mut pages, base);
        assert_eq!(heap.alloc(100), Ok(base));
        assert_eq!(heap.mapped_units, 1);
        assert_eq!(heap.alloc(5000), Ok(VirtualAddress::new(0xE000_0064)));
        assert_eq!(heap.mapped_units, 2);
        assert_eq!(
            heap.alloc(3 * 4096),
            Err(PageAllocError::OutOfFrames { requested: 3, free: 2 })
        );
        assert_eq!(heap.mapped_units, 2);
    }

    assert_eq!(pages.used_frames(), 2);
    assert!(pages.entry(VirtualAddress::new(0xE000_1000)).unwrap().is_present());
}

#[test]
fn heterogeneous_instances_share_the_directory() {
    let boot_pt = PageTable::zeroed();
    let heap_pt = [PageTable::zeroed(), PageTable::zeroed()];
    let mmu = SimulatedMmu::new();
    let boot_tables = [mmu.attach(TableSlot::new(&boot_pt, PhysicalPage::from_frame_number(0x1F0)))];
    let heap_tables = [
        mmu.attach(TableSlot::new(&heap_pt[0], PhysicalPage::from_frame_number(0x1F1))),
        mmu.attach(TableSlot::new(&heap_pt[1], PhysicalPage::from_frame_number(0x1F2))),
    ];
    let mut boot_words = [0u32; 1];
    let mut heap_words = [0u32; 1];
    let mut registry = WindowRegistry::new();

    let mut boot = PageAllocator::new(
        &mmu,
        PageAllocatorConfig {
            tables: &boot_tables,
            pool: FramePool::new(PhysicalPage::from_frame_number(0x800), 16),
            bitmap: &mut boot_words,
            window: registry.claim(VirtualAddress::new(0xDFC0_0000), 1).unwrap(),
            flags: MemoryFlags::empty(),
        },
    )
    .unwrap();
    let mut heap = PageAllocator::new(
        &mmu,
        PageAllocatorConfig {
            tables: &heap_tables,
            pool: FramePool::new(PhysicalPage::from_frame_number(0x810), 16),
            bitmap: &mut heap_words,
            window: registry.claim(VirtualAddress::new(0xE000_0000), 2).unwrap(),
            flags: MemoryFlags::USER,
        },
    )
    .unwrap();
    boot.init();
    heap.init();

    let drivers: [&mut dyn MemoryDriver; 2] = [&mut boot, &mut heap];
    let bases = [0xDFC0_0000, 0xE000_0000];
    for (driver, base) in drivers.into_iter().zip(bases) {
        driver.set_state(true).unwrap();
        driver.alloc(VirtualAddress::new(base), 2).unwrap();
    }

    assert_eq!(boot.used_frames(), 2);
    assert_eq!(heap.used_frames(), 2);
    let boot_pa = kernel_vmem::Mmu::physical_address_of(&mmu, VirtualAddress::new(0xDFC0_1000));
    let heap_pa = kernel_vmem::Mmu::physical_address_of(&mmu, VirtualAddress::new(0xE000_1000));
    assert_eq!(boot_pa.map(PhysicalAddress::as_u32), Some(0x0080_1000));
    assert_eq!(heap_pa.map(PhysicalAddress::as_u32), Some(0x0081_1000));
}
