use kernel::memory::{BootTables, BringUpError, MemoryPlan, bring_up};
use kernel::{MappedFramebuffer, map_framebuffer};
use kernel_alloc::{
    AllocatorState, BitmapError, MemoryDriver, PageAllocError, WindowError, WindowRegistry,
};
use kernel_info::boot::{BootMemoryInfo, FramebufferInfo, FramebufferKind};
use kernel_info::memory::{BOOT_WINDOW_BASE, FRAMEBUFFER_WINDOW_BASE, HEAP_WINDOW_BASE};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
use kernel_vmem::{Mmu, PageTable, PdIndex, SimulatedMmu, TableSlot};
use std::cell::Cell;

fn frame(n: u32) -> PhysicalPage<Size4K> {
    PhysicalPage::from_frame_number(n)
}

/// Heap bitmap storage on the host: the simulated boot window is not backed
/// by addressable memory.
fn leaked<'a>(_va: VirtualAddress, words: usize) -> &'a mut [u32] {
    Box::leak(vec![u32::MAX; words].into_boxed_slice())
}

#[test]
fn boot_and_heap_allocators_come_up() {
    let boot_pt = PageTable::zeroed();
    let heap_pts = [PageTable::zeroed(), PageTable::zeroed()];
    let mmu = SimulatedMmu::new();
    let boot_tables = [mmu.attach(TableSlot::new(&boot_pt, frame(0x1F0)))];
    let heap_tables = [
        mmu.attach(TableSlot::new(&heap_pts[0], frame(0x1F1))),
        mmu.attach(TableSlot::new(&heap_pts[1], frame(0x1F2))),
    ];
    let mut boot_words = [0u32; 32];
    let mut registry = WindowRegistry::new();
    let requested = Cell::new(None);

    let boot_info = BootMemoryInfo {
        lower_kib: 639,
        upper_kib: 63 * 1024,
    };
    let plan = MemoryPlan::from_boot_info(&boot_info).unwrap();
    let mut allocs = bring_up(
        &mmu,
        &mut registry,
        &plan,
        BootTables {
            boot: &boot_tables,
            heap: &heap_tables,
        },
        &mut boot_words,
        |va, words| {
            requested.set(Some((va, words)));
            leaked(va, words)
        },
    )
    .unwrap();

    // The heap bitmap went into the first boot page, backed by the first pool frame.
    assert_eq!(requested.get(), Some((VirtualAddress::new(BOOT_WINDOW_BASE), 416)));
    assert_eq!(allocs.boot.used_frames(), 1);
    assert_eq!(
        mmu.physical_address_of(VirtualAddress::new(BOOT_WINDOW_BASE)),
        Some(PhysicalAddress::new(0x0080_0000))
    );

    // The leaked storage started dirty; init must have cleared it.
    assert_eq!(allocs.heap.state(), AllocatorState::Enabled);
    assert_eq!(allocs.heap.used_frames(), 0);
    assert_eq!(allocs.heap.free_frames(), 0x4000 - 0xC00);
    for slot in [0x37F, 0x380, 0x381] {
        assert!(mmu.directory().get(PdIndex::new(slot)).is_present());
    }

    // The kernel heap grows through the driver contract.
    let heap: &mut dyn MemoryDriver = &mut allocs.heap;
    let base = VirtualAddress::new(HEAP_WINDOW_BASE);
    let pages = heap.pages_for(3 * 4096 + 1);
    assert_eq!(heap.alloc(base, pages), Ok(base));
    assert_eq!(
        mmu.physical_address_of(base + 3 * 4096 + 8),
        Some(PhysicalAddress::new(0x00C0_3008))
    );
    assert_eq!(heap.free(base, pages), Ok(()));
}

#[test]
fn small_machine_gets_an_empty_heap() {
    let boot_pt = PageTable::zeroed();
    let heap_pts = [PageTable::zeroed(), PageTable::zeroed()];
    let mmu = SimulatedMmu::new();
    let boot_tables = [TableSlot::new(&boot_pt, frame(0x1F0))];
    let heap_tables = [
        TableSlot::new(&heap_pts[0], frame(0x1F1)),
        TableSlot::new(&heap_pts[1], frame(0x1F2)),
    ];
    let mut boot_words = [0u32; 32];
    let mut registry = WindowRegistry::new();
    let called = Cell::new(false);

    let plan = MemoryPlan::from_upper_memory(8 * 1024).unwrap();
    let mut allocs = bring_up(
        &mmu,
        &mut registry,
        &plan,
        BootTables {
            boot: &boot_tables,
            heap: &heap_tables,
        },
        &mut boot_words,
        |va, words| {
            called.set(true);
            leaked(va, words)
        },
    )
    .unwrap();

    assert!(!called.get());
    assert_eq!(allocs.boot.free_frames(), 256);
    assert_eq!(
        allocs.heap.alloc(VirtualAddress::new(HEAP_WINDOW_BASE), 1),
        Err(PageAllocError::OutOfFrames {
            requested: 1,
            free: 0
        })
    );
}

#[test]
fn claimed_boot_window_is_refused() {
    let boot_pt = PageTable::zeroed();
    let heap_pts = [PageTable::zeroed(), PageTable::zeroed()];
    let mmu = SimulatedMmu::new();
    let boot_tables = [TableSlot::new(&boot_pt, frame(0x1F0))];
    let heap_tables = [
        TableSlot::new(&heap_pts[0], frame(0x1F1)),
        TableSlot::new(&heap_pts[1], frame(0x1F2)),
    ];
    let mut boot_words = [0u32; 32];
    let mut registry = WindowRegistry::new();
    let _taken = registry
        .claim(VirtualAddress::new(BOOT_WINDOW_BASE), 1)
        .unwrap();

    let plan = MemoryPlan::from_upper_memory(63 * 1024).unwrap();
    let result = bring_up(
        &mmu,
        &mut registry,
        &plan,
        BootTables {
            boot: &boot_tables,
            heap: &heap_tables,
        },
        &mut boot_words,
        leaked,
    );
    assert!(matches!(
        result,
        Err(BringUpError::Window(WindowError::Overlap { slot: 0x37F }))
    ));
    assert!(!mmu.directory().get(PdIndex::new(0x37F)).is_present());
    assert!(!registry.is_claimed(0x380));
}

#[test]
fn heap_table_count_must_match_its_window() {
    let boot_pt = PageTable::zeroed();
    let heap_pt = PageTable::zeroed();
    let mmu = SimulatedMmu::new();
    let boot_tables = [TableSlot::new(&boot_pt, frame(0x1F0))];
    let heap_tables = [TableSlot::new(&heap_pt, frame(0x1F1))];
    let mut boot_words = [0u32; 32];
    let mut registry = WindowRegistry::new();

    let plan = MemoryPlan::from_upper_memory(63 * 1024).unwrap();
    let result = bring_up(
        &mmu,
        &mut registry,
        &plan,
        BootTables {
            boot: &boot_tables,
            heap: &heap_tables,
        },
        &mut boot_words,
        leaked,
    );
    assert!(matches!(
        result,
        Err(BringUpError::Alloc(PageAllocError::TableCount {
            window: 2,
            supplied: 1
        }))
    ));
    // Rejected before anything was claimed or wired.
    for slot in [0x37F, 0x380, 0x381] {
        assert!(!registry.is_claimed(slot));
        assert!(!mmu.directory().get(PdIndex::new(u16::try_from(slot).unwrap())).is_present());
    }
}

#[test]
fn failed_heap_stage_releases_the_boot_window() {
    let boot_pt = PageTable::zeroed();
    let heap_pts = [PageTable::zeroed(), PageTable::zeroed()];
    let mmu = SimulatedMmu::new();
    let boot_tables = [mmu.attach(TableSlot::new(&boot_pt, frame(0x1F0)))];
    let heap_tables = [
        TableSlot::new(&heap_pts[0], frame(0x1F1)),
        TableSlot::new(&heap_pts[1], frame(0x1F2)),
    ];
    let mut boot_words = [0u32; 32];
    let mut registry = WindowRegistry::new();
    let heap_taken = registry
        .claim(VirtualAddress::new(HEAP_WINDOW_BASE), 2)
        .unwrap();

    let plan = MemoryPlan::from_upper_memory(63 * 1024).unwrap();
    let result = bring_up(
        &mmu,
        &mut registry,
        &plan,
        BootTables {
            boot: &boot_tables,
            heap: &heap_tables,
        },
        &mut boot_words,
        leaked,
    );
    assert!(matches!(
        result,
        Err(BringUpError::Window(WindowError::Overlap { slot: 0x380 }))
    ));

    // The boot allocator was unwired and its bitmap page flushed.
    assert!(!registry.is_claimed(0x37F));
    assert!(!mmu.directory().get(PdIndex::new(0x37F)).is_present());
    assert_eq!(mmu.physical_address_of(VirtualAddress::new(BOOT_WINDOW_BASE)), None);
    assert!(mmu.was_invalidated(VirtualAddress::new(BOOT_WINDOW_BASE)));

    // The window can be claimed again.
    registry.release(heap_taken);
    assert!(
        registry
            .claim(VirtualAddress::new(BOOT_WINDOW_BASE), 1)
            .is_ok()
    );
}

#[test]
fn short_heap_bitmap_is_rejected_before_claiming_the_heap_window() {
    let boot_pt = PageTable::zeroed();
    let heap_pts = [PageTable::zeroed(), PageTable::zeroed()];
    let mmu = SimulatedMmu::new();
    let boot_tables = [mmu.attach(TableSlot::new(&boot_pt, frame(0x1F0)))];
    let heap_tables = [
        TableSlot::new(&heap_pts[0], frame(0x1F1)),
        TableSlot::new(&heap_pts[1], frame(0x1F2)),
    ];
    let mut boot_words = [0u32; 32];
    let mut registry = WindowRegistry::new();

    let plan = MemoryPlan::from_upper_memory(63 * 1024).unwrap();
    let result = bring_up(
        &mmu,
        &mut registry,
        &plan,
        BootTables {
            boot: &boot_tables,
            heap: &heap_tables,
        },
        &mut boot_words,
        |va, words| leaked(va, words - 1),
    );
    assert!(matches!(
        result,
        Err(BringUpError::Alloc(PageAllocError::Bitmap(
            BitmapError::StorageTooSmall { words: 415, .. }
        )))
    ));
    for slot in [0x37F, 0x380, 0x381] {
        assert!(!registry.is_claimed(slot));
    }
}

#[test]
fn framebuffer_window_coexists_with_the_allocators() {
    let boot_pt = PageTable::zeroed();
    let heap_pts = [PageTable::zeroed(), PageTable::zeroed()];
    let fb_pt = PageTable::zeroed();
    let mmu = SimulatedMmu::new();
    let boot_tables = [mmu.attach(TableSlot::new(&boot_pt, frame(0x1F0)))];
    let heap_tables = [
        mmu.attach(TableSlot::new(&heap_pts[0], frame(0x1F1))),
        mmu.attach(TableSlot::new(&heap_pts[1], frame(0x1F2))),
    ];
    let fb_table = mmu.attach(TableSlot::new(&fb_pt, frame(0x1F3)));
    let mut boot_words = [0u32; 32];
    let mut registry = WindowRegistry::new();

    let plan = MemoryPlan::from_upper_memory(63 * 1024).unwrap();
    let mut allocs = bring_up(
        &mmu,
        &mut registry,
        &plan,
        BootTables {
            boot: &boot_tables,
            heap: &heap_tables,
        },
        &mut boot_words,
        leaked,
    )
    .unwrap();

    let window = registry
        .claim(VirtualAddress::new(FRAMEBUFFER_WINDOW_BASE), 1)
        .unwrap();
    let fb = FramebufferInfo {
        address: 0xFD00_0000,
        pitch: 800 * 4,
        width: 800,
        height: 600,
        bpp: 32,
        kind: FramebufferKind::Rgb,
    };
    let mapped = map_framebuffer(&mmu, fb_table, &window, &fb).unwrap();
    assert_eq!(
        mapped,
        MappedFramebuffer {
            address: VirtualAddress::new(FRAMEBUFFER_WINDOW_BASE),
            pages: 469,
        }
    );

    // Framebuffer frames are not pool frames: no bitmap moved.
    assert_eq!(allocs.boot.used_frames(), 1);
    assert_eq!(allocs.heap.used_frames(), 0);
    allocs
        .heap
        .alloc(VirtualAddress::new(HEAP_WINDOW_BASE), 1)
        .unwrap();
    assert_eq!(
        mmu.physical_address_of(VirtualAddress::new(FRAMEBUFFER_WINDOW_BASE + 0x1000)),
        Some(PhysicalAddress::new(0xFD00_1000))
    );
}
