//! # Boot Memory Bring-Up
//!
//! Two page allocators manage all frames above [`POOL_BASE`]:
//!
//! - the **boot** allocator: one table at [`BOOT_WINDOW_BASE`] over at most
//!   [`BOOT_POOL_FRAMES`] frames, with its bitmap in static storage;
//! - the **heap** allocator: [`HEAP_WINDOW_TABLES`] tables at
//!   [`HEAP_WINDOW_BASE`] over every remaining frame. Its bitmap is too large
//!   for static storage, so it lives in pages handed out by the boot
//!   allocator.
//!
//! ```text
//! physical   POOL_BASE                     +BOOT_POOL_FRAMES
//!            │ boot pool (≤ 1024 frames)   │ heap pool (rest)           │
//!            └─────────────┬───────────────┴──────────────┬─────────────┘
//!                          │ backs                        │ backs
//! virtual    BOOT_WINDOW: heap bitmap pages   HEAP_WINDOW: kernel heap
//! ```
//!
//! The pools are disjoint, so each frame is tracked by exactly one bitmap.

use kernel_alloc::{
    BitmapError, FrameBitmap, FramePool, MemoryFlags, PageAllocError, PageAllocator,
    PageAllocatorConfig, WindowError, WindowRegistry,
};
use kernel_info::boot::BootMemoryInfo;
use kernel_info::memory::{
    BOOT_POOL_FRAMES, BOOT_WINDOW_BASE, BOOT_WINDOW_TABLES, HEAP_WINDOW_BASE, HEAP_WINDOW_TABLES,
    PAGE_SIZE, POOL_BASE,
};
use kernel_memory_addresses::{PhysicalPage, VirtualAddress};
use kernel_vmem::{Mmu, TableSlot};
use log::{info, warn};

/// Upper memory starts at 1 MiB.
const UPPER_MEMORY_BASE: u64 = 0x10_0000;

/// One past the last frame reachable with 32-bit physical addresses.
const FRAME_LIMIT: u32 = 1 << 20;

/// Memory bring-up failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BringUpError {
    #[error("no memory above the pool base ({upper_kib} KiB of upper memory reported)")]
    NoUsableMemory { upper_kib: u32 },
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Alloc(#[from] PageAllocError),
}

/// How the frames above [`POOL_BASE`] are split between the two allocators.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryPlan {
    pub boot_pool: FramePool,
    pub heap_pool: FramePool,
    /// `u32` words of the heap allocator's bitmap.
    pub heap_bitmap_words: usize,
    /// Boot-window pages that hold the heap bitmap.
    pub heap_bitmap_pages: u32,
}

impl MemoryPlan {
    /// Plan the pools for `upper_kib` KiB of memory above 1 MiB.
    ///
    /// # Errors
    /// [`BringUpError::NoUsableMemory`] if no frame lies above the pool base.
    pub fn from_upper_memory(upper_kib: u32) -> Result<Self, BringUpError> {
        let end = UPPER_MEMORY_BASE + u64::from(upper_kib) * 1024;
        // Frames past 4 GiB are not addressable without PAE.
        let end_frame = u32::try_from(end / u64::from(PAGE_SIZE))
            .unwrap_or(FRAME_LIMIT)
            .min(FRAME_LIMIT);
        let first_frame = POOL_BASE / PAGE_SIZE;

        let total = end_frame.saturating_sub(first_frame);
        if total == 0 {
            return Err(BringUpError::NoUsableMemory { upper_kib });
        }

        let boot_frames = total.min(BOOT_POOL_FRAMES);
        let heap_frames = total - boot_frames;
        let heap_bitmap_words = FrameBitmap::words_for(heap_frames);
        let bitmap_bytes = u32::try_from(heap_bitmap_words * size_of::<u32>()).unwrap_or(u32::MAX);

        Ok(Self {
            boot_pool: FramePool::new(PhysicalPage::from_frame_number(first_frame), boot_frames),
            heap_pool: FramePool::new(
                PhysicalPage::from_frame_number(first_frame + boot_frames),
                heap_frames,
            ),
            heap_bitmap_words,
            heap_bitmap_pages: bitmap_bytes.div_ceil(PAGE_SIZE),
        })
    }

    /// Plan the pools from the bootloader's memory report.
    ///
    /// # Errors
    /// See [`from_upper_memory`](Self::from_upper_memory).
    pub fn from_boot_info(info: &BootMemoryInfo) -> Result<Self, BringUpError> {
        Self::from_upper_memory(info.upper_kib)
    }

    /// Total frames managed by both allocators.
    #[must_use]
    pub const fn total_frames(&self) -> u32 {
        self.boot_pool.frames + self.heap_pool.frames
    }
}

/// The page tables backing both windows.
pub struct BootTables<'a> {
    /// [`BOOT_WINDOW_TABLES`] table.
    pub boot: &'a [TableSlot<'a>],
    /// [`HEAP_WINDOW_TABLES`] tables, in window order.
    pub heap: &'a [TableSlot<'a>],
}

/// Both allocators, enabled.
pub struct MemoryAllocators<'a, M: Mmu> {
    pub boot: PageAllocator<'a, M>,
    pub heap: PageAllocator<'a, M>,
}

/// Build, initialize and enable the boot and heap allocators.
///
/// `heap_bitmap` turns the boot-window address of the freshly mapped bitmap
/// pages into `words` words of storage. On hardware that is a raw slice over
/// the mapped pages:
///
/// ```rust,ignore
/// let heap_bitmap = |va: VirtualAddress, words| unsafe {
///     core::slice::from_raw_parts_mut(va.as_mut_ptr::<u32>(), words)
/// };
/// ```
///
/// Table counts and the boot bitmap are checked before any window is
/// claimed. If the heap stage fails, the boot allocator is unwired and its
/// window released again.
///
/// # Errors
/// - [`BringUpError::Window`] if either window is already claimed.
/// - [`BringUpError::Alloc`] if a table slice does not match its window, a
///   bitmap is too small, or the boot pool cannot hold the heap bitmap.
pub fn bring_up<'a, M, F>(
    mmu: &'a M,
    registry: &mut WindowRegistry,
    plan: &MemoryPlan,
    tables: BootTables<'a>,
    boot_bitmap: &'a mut [u32],
    heap_bitmap: F,
) -> Result<MemoryAllocators<'a, M>, BringUpError>
where
    M: Mmu,
    F: FnOnce(VirtualAddress, usize) -> &'a mut [u32],
{
    check_tables(tables.boot, BOOT_WINDOW_TABLES)?;
    check_tables(tables.heap, HEAP_WINDOW_TABLES)?;
    check_bitmap(boot_bitmap.len(), plan.boot_pool.frames)?;

    let boot_window = registry.claim(VirtualAddress::new(BOOT_WINDOW_BASE), BOOT_WINDOW_TABLES)?;
    let mut boot = PageAllocator::new(
        mmu,
        PageAllocatorConfig {
            tables: tables.boot,
            pool: plan.boot_pool,
            bitmap: boot_bitmap,
            window: boot_window,
            flags: MemoryFlags::empty(),
        },
    )?;
    boot.init();
    boot.set_state(true)?;

    match bring_up_heap(mmu, &mut boot, registry, plan, tables.heap, heap_bitmap) {
        Ok(heap) => {
            log_layout(plan);
            Ok(MemoryAllocators { boot, heap })
        }
        Err(err) => {
            warn!("heap bring-up failed, releasing the boot window: {err}");
            registry.release(boot.into_window());
            Err(err)
        }
    }
}

/// Map the heap bitmap through `boot`, then build and enable the heap allocator.
fn bring_up_heap<'a, M, F>(
    mmu: &'a M,
    boot: &mut PageAllocator<'a, M>,
    registry: &mut WindowRegistry,
    plan: &MemoryPlan,
    tables: &'a [TableSlot<'a>],
    heap_bitmap: F,
) -> Result<PageAllocator<'a, M>, BringUpError>
where
    M: Mmu,
    F: FnOnce(VirtualAddress, usize) -> &'a mut [u32],
{
    let storage: &'a mut [u32] = if plan.heap_bitmap_pages == 0 {
        &mut []
    } else {
        let va = boot.alloc(boot.window().base(), plan.heap_bitmap_pages)?;
        info!(
            "heap bitmap: {} words in {} pages at {va}",
            plan.heap_bitmap_words, plan.heap_bitmap_pages
        );
        heap_bitmap(va, plan.heap_bitmap_words)
    };
    check_bitmap(storage.len(), plan.heap_pool.frames)?;

    let heap_window = registry.claim(VirtualAddress::new(HEAP_WINDOW_BASE), HEAP_WINDOW_TABLES)?;
    let mut heap = PageAllocator::new(
        mmu,
        PageAllocatorConfig {
            tables,
            pool: plan.heap_pool,
            bitmap: storage,
            window: heap_window,
            flags: MemoryFlags::empty(),
        },
    )?;
    heap.init();
    heap.set_state(true)?;
    Ok(heap)
}

const fn check_tables(tables: &[TableSlot<'_>], window: u32) -> Result<(), PageAllocError> {
    if tables.len() == window as usize {
        Ok(())
    } else {
        Err(PageAllocError::TableCount {
            window,
            supplied: tables.len(),
        })
    }
}

fn check_bitmap(words: usize, frames: u32) -> Result<(), PageAllocError> {
    if words < FrameBitmap::words_for(frames) {
        return Err(BitmapError::StorageTooSmall { words, frames }.into());
    }
    Ok(())
}

fn log_layout(plan: &MemoryPlan) {
    info!(
        "boot pool at {} ({} frames) -> window {:#010X}",
        plan.boot_pool.base.base(),
        plan.boot_pool.frames,
        BOOT_WINDOW_BASE
    );
    info!(
        "heap pool at {} ({} frames) -> window {:#010X}",
        plan.heap_pool.base.base(),
        plan.heap_pool.frames,
        HEAP_WINDOW_BASE
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_for_64_mib() {
        // 63 MiB above 1 MiB: frames 0x800..0x4000.
        let plan = MemoryPlan::from_upper_memory(63 * 1024).unwrap();
        assert_eq!(plan.boot_pool.base.frame_number(), 0x800);
        assert_eq!(plan.boot_pool.frames, 1024);
        assert_eq!(plan.heap_pool.base.frame_number(), 0xC00);
        assert_eq!(plan.heap_pool.frames, 0x4000 - 0xC00);
        assert_eq!(plan.heap_bitmap_words, 416);
        assert_eq!(plan.heap_bitmap_pages, 1);
        assert_eq!(plan.total_frames(), 0x4000 - 0x800);
    }

    #[test]
    fn small_machine_has_no_heap_pool() {
        // 9 MiB total: 256 frames above the pool base.
        let plan = MemoryPlan::from_upper_memory(8 * 1024).unwrap();
        assert_eq!(plan.boot_pool.frames, 256);
        assert_eq!(plan.heap_pool.frames, 0);
        assert_eq!(plan.heap_bitmap_words, 0);
        assert_eq!(plan.heap_bitmap_pages, 0);
    }

    #[test]
    fn memory_below_pool_base_is_rejected() {
        assert_eq!(
            MemoryPlan::from_upper_memory(7 * 1024),
            Err(BringUpError::NoUsableMemory { upper_kib: 7 * 1024 })
        );
        assert!(MemoryPlan::from_upper_memory(0).is_err());
    }

    #[test]
    fn bitmap_spills_into_several_pages() {
        // 3 GiB above 1 MiB.
        let plan = MemoryPlan::from_upper_memory(3 * 1024 * 1024).unwrap();
        let frames = plan.heap_pool.frames;
        assert_eq!(plan.heap_bitmap_words, frames.div_ceil(32) as usize);
        assert_eq!(plan.heap_bitmap_pages, 24);
    }

    #[test]
    fn frames_past_4_gib_are_dropped() {
        let plan = MemoryPlan::from_upper_memory(u32::MAX).unwrap();
        let pool = plan.heap_pool;
        assert_eq!(pool.frame(pool.frames - 1).unwrap().frame_number(), 0xF_FFFF);
        assert_eq!(plan.total_frames(), FRAME_LIMIT - 0x800);
    }
}
