//! # Memory Layout
//!
//! Fixed virtual windows and physical ranges of the 32-bit kernel. Every
//! window starts on a 4 MiB boundary so that it is backed by whole page
//! directory slots.

/// Where the kernel executes (VMA). The first 4 MiB of physical memory are
/// mapped here by the boot code.
pub const KERNEL_BASE: u32 = 0xC000_0000;

/// First physical frame handed to the page allocators. Everything below
/// belongs to the kernel image, BIOS data and low-memory devices.
pub const POOL_BASE: u32 = 0x0080_0000; // 8 MiB

/// The size of a page (and of a page frame) in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// Number of entries in a page table or the page directory.
pub const ENTRIES_PER_TABLE: u32 = 1024;

/// Bytes of virtual address space covered by one page table.
pub const TABLE_SPAN: u32 = PAGE_SIZE * ENTRIES_PER_TABLE; // 4 MiB

/// Window of the boot-time page allocator.
///
/// One table; the heap allocator's bitmap lives in pages mapped here.
pub const BOOT_WINDOW_BASE: u32 = 0xDFC0_0000;

/// Number of page tables backing [`BOOT_WINDOW_BASE`].
pub const BOOT_WINDOW_TABLES: u32 = 1;

/// Frames reserved for the boot-time allocator (one full table).
pub const BOOT_POOL_FRAMES: u32 = ENTRIES_PER_TABLE;

/// Window of the heap-backing page allocator (`kmalloc` grows into it).
pub const HEAP_WINDOW_BASE: u32 = 0xE000_0000;

/// Number of page tables backing [`HEAP_WINDOW_BASE`].
pub const HEAP_WINDOW_TABLES: u32 = 2;

/// Where the linear framebuffer is remapped.
pub const FRAMEBUFFER_WINDOW_BASE: u32 = 0xD000_0000;

/// The framebuffer is mapped through a single table.
pub const FRAMEBUFFER_MAX_PAGES: u32 = ENTRIES_PER_TABLE;

/// Directory slot that maps the page directory onto itself.
pub const RECURSIVE_SLOT: u32 = 1023;

/// The page directory as seen through the recursive slot.
pub const RECURSIVE_DIRECTORY_VA: u32 = 0xFFFF_F000;

/// Page table `i` is visible at `RECURSIVE_TABLES_VA + i * PAGE_SIZE`.
pub const RECURSIVE_TABLES_VA: u32 = 0xFFC0_0000;

/// I/O port base of the first serial port.
pub const COM1_PORT: u16 = 0x3F8;

const _: () = {
    assert!(POOL_BASE.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_BASE.is_multiple_of(TABLE_SPAN));
    assert!(BOOT_WINDOW_BASE.is_multiple_of(TABLE_SPAN));
    assert!(HEAP_WINDOW_BASE.is_multiple_of(TABLE_SPAN));
    assert!(FRAMEBUFFER_WINDOW_BASE.is_multiple_of(TABLE_SPAN));
    assert!(BOOT_WINDOW_BASE + BOOT_WINDOW_TABLES * TABLE_SPAN <= HEAP_WINDOW_BASE);
    assert!(FRAMEBUFFER_WINDOW_BASE + TABLE_SPAN <= BOOT_WINDOW_BASE);
    assert!(KERNEL_BASE + TABLE_SPAN <= FRAMEBUFFER_WINDOW_BASE);
    assert!(RECURSIVE_TABLES_VA == RECURSIVE_SLOT * TABLE_SPAN);
    assert!(RECURSIVE_DIRECTORY_VA == RECURSIVE_TABLES_VA + RECURSIVE_SLOT * PAGE_SIZE);
};
