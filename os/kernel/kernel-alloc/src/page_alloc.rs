//! # Paging Page Allocator
//!
//! Hands out 4 KiB frames from a fixed physical pool by mapping them into a
//! fixed virtual window. The allocator owns the page tables backing that
//! window and a [`FrameBitmap`] over the pool; the page directory is shared
//! and reached through an [`Mmu`].
//!
//! ## Lifecycle
//!
//! ```text
//!                 init               set_state(true)
//! Uninitialized ───────► Disabled ◄──────────────────► Enabled
//!                                    set_state(false)
//! ```
//!
//! - `init` zeroes every owned table entry and the bitmap.
//! - `set_state` writes (or clears) the directory entries that wire the
//!   owned tables in. It is the only place directory visibility changes;
//!   table contents are left untouched, so mappings survive a
//!   disable/enable round trip.
//! - `alloc`/`free` edit table entries and invalidate each touched page.
//! - Unwiring (`set_state(false)`, `init` or `into_window` on an enabled
//!   allocator) and zeroing live entries invalidate every mapped page.
//!
//! ## Invariants
//!
//! - A bit is set in the bitmap exactly when one present entry in the owned
//!   tables maps the corresponding frame.
//! - `alloc` either maps all requested pages or leaves the allocator as it
//!   found it.
//!
//! ## Concurrency
//!
//! None of the mutating operations are interrupt-safe. Do not call them from
//! an interrupt handler that may preempt another call on the same instance.

use crate::frame_alloc::{BitmapError, FrameBitmap, FrameIndex};
use crate::window::WindowToken;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress, VirtualPage};
use kernel_vmem::{
    Mmu, PageTable, PdIndex, PtEntry, PtIndex, TableSlot, info, set_directory_entry, set_entry,
    translate,
};
use log::{debug, trace, warn};

bitflags::bitflags! {
    /// Access flags applied to every mapping of an allocator instance.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct MemoryFlags: u8 {
        /// Pages are accessible from ring 3 (`US = 1`).
        const USER = 1;

        /// Pages are mapped read-only (`RW = 0`).
        const READ_ONLY = 2;
    }
}

impl MemoryFlags {
    #[inline]
    #[must_use]
    pub const fn user(self) -> bool {
        self.contains(Self::USER)
    }

    #[inline]
    #[must_use]
    pub const fn writable(self) -> bool {
        !self.contains(Self::READ_ONLY)
    }
}

/// A contiguous run of physical frames owned by one allocator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FramePool {
    pub base: PhysicalPage<Size4K>,
    pub frames: u32,
}

impl FramePool {
    #[must_use]
    pub const fn new(base: PhysicalPage<Size4K>, frames: u32) -> Self {
        Self { base, frames }
    }

    /// Index of `frame` within the pool, or `None` if it lies outside.
    #[must_use]
    pub const fn index_of(&self, frame: PhysicalPage<Size4K>) -> Option<FrameIndex> {
        match frame.frame_number().checked_sub(self.base.frame_number()) {
            Some(i) if i < self.frames => Some(i),
            _ => None,
        }
    }

    /// The frame at `index`.
    #[must_use]
    pub const fn frame(&self, index: FrameIndex) -> Option<PhysicalPage<Size4K>> {
        if index >= self.frames {
            return None;
        }
        self.base.checked_add(index)
    }

    /// The first frame after the pool.
    #[must_use]
    pub const fn end(&self) -> Option<PhysicalPage<Size4K>> {
        self.base.checked_add(self.frames)
    }
}

/// Lifecycle state of a [`PageAllocator`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AllocatorState {
    /// Constructed, `init` not yet run.
    Uninitialized,
    /// Tables are not wired into the directory.
    Disabled,
    /// Every table of the window is wired into the directory.
    Enabled,
}

/// Errors reported by [`PageAllocator`].
///
/// Every error except [`OutOfFrames`](Self::OutOfFrames) is raised before any
/// state is touched; `OutOfFrames` is raised after rolling back.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PageAllocError {
    #[error("out of frames: {requested} pages requested, {free} free")]
    OutOfFrames { requested: u32, free: u32 },
    #[error("address {0} is not page aligned")]
    Unaligned(VirtualAddress),
    #[error("request for zero pages")]
    ZeroPages,
    #[error("{pages} pages at {va} do not fit the allocator window")]
    OutsideWindow { va: VirtualAddress, pages: u32 },
    #[error("page {0} is already mapped")]
    AlreadyMapped(VirtualAddress),
    #[error("page {0} is not mapped")]
    NotMapped(VirtualAddress),
    #[error("allocator used before init")]
    Uninitialized,
    #[error("window spans {window} tables but {supplied} were supplied")]
    TableCount { window: u32, supplied: usize },
    #[error(transparent)]
    Bitmap(#[from] BitmapError),
}

/// Everything an allocator instance is built from.
pub struct PageAllocatorConfig<'a> {
    /// One table per 4 MiB of the window, in window order.
    pub tables: &'a [TableSlot<'a>],
    /// Frames this instance hands out.
    pub pool: FramePool,
    /// Bitmap storage, at least `FrameBitmap::words_for(pool.frames)` words.
    pub bitmap: &'a mut [u32],
    /// The directory slots this instance owns.
    pub window: WindowToken,
    pub flags: MemoryFlags,
}

/// Paging-based page allocator over one pool and one window.
pub struct PageAllocator<'a, M: Mmu> {
    mmu: &'a M,
    tables: &'a [TableSlot<'a>],
    bitmap: FrameBitmap<'a>,
    pool: FramePool,
    window: WindowToken,
    flags: MemoryFlags,
    state: AllocatorState,
}

impl<'a, M: Mmu> PageAllocator<'a, M> {
    /// Allocation granularity in bytes.
    pub const UNIT: u32 = info::PAGE_SIZE;

    /// Build an allocator. It stays unusable until [`init`](Self::init).
    ///
    /// # Errors
    /// - [`PageAllocError::TableCount`] if the number of tables does not match
    ///   the window.
    /// - [`PageAllocError::Bitmap`] if the bitmap storage is too small.
    pub fn new(mmu: &'a M, config: PageAllocatorConfig<'a>) -> Result<Self, PageAllocError> {
        let PageAllocatorConfig {
            tables,
            pool,
            bitmap,
            window,
            flags,
        } = config;

        if tables.len() != window.tables() as usize {
            return Err(PageAllocError::TableCount {
                window: window.tables(),
                supplied: tables.len(),
            });
        }
        let bitmap = FrameBitmap::new(bitmap, pool.frames)?;

        Ok(Self {
            mmu,
            tables,
            bitmap,
            pool,
            window,
            flags,
            state: AllocatorState::Uninitialized,
        })
    }

    /// Zero every owned table entry and the bitmap; the allocator is then
    /// [`Disabled`](AllocatorState::Disabled).
    ///
    /// Re-initializing an enabled allocator unwires its tables first.
    pub fn init(&mut self) {
        if self.state == AllocatorState::Enabled {
            self.write_directory(false);
        }
        self.unmap_all();
        for slot in self.tables {
            slot.table.clear();
        }
        self.bitmap.clear();
        self.state = AllocatorState::Disabled;
        debug!(
            "page allocator at {} initialized: {} tables, pool {} (+{} frames)",
            self.window.base(),
            self.tables.len(),
            self.pool.base,
            self.pool.frames
        );
    }

    /// Wire the owned tables into the directory (`true`) or unwire them.
    ///
    /// # Errors
    /// [`PageAllocError::Uninitialized`] before [`init`](Self::init).
    pub fn set_state(&mut self, enable: bool) -> Result<(), PageAllocError> {
        self.ensure_initialized()?;
        self.write_directory(enable);
        if !enable {
            self.invalidate_mapped();
        }
        self.state = if enable {
            AllocatorState::Enabled
        } else {
            AllocatorState::Disabled
        };
        debug!("page allocator at {} {:?}", self.window.base(), self.state);
        Ok(())
    }

    /// Map `pages` fresh frames at `va`, lowest free frame first.
    ///
    /// Returns `va` on success. If the pool runs dry part-way, the pages
    /// mapped so far are released again before the error is returned.
    ///
    /// # Errors
    /// - [`PageAllocError::Uninitialized`], [`PageAllocError::Unaligned`],
    ///   [`PageAllocError::ZeroPages`], [`PageAllocError::OutsideWindow`] and
    ///   [`PageAllocError::AlreadyMapped`] for invalid requests (nothing changed).
    /// - [`PageAllocError::OutOfFrames`] when the pool is exhausted (rolled back).
    pub fn alloc(&mut self, va: VirtualAddress, pages: u32) -> Result<VirtualAddress, PageAllocError> {
        let first = self.validate(va, pages)?;
        if let Some(k) = (0..pages).find(|&k| self.slot_entry(first + k).is_present()) {
            return Err(PageAllocError::AlreadyMapped(page_va(va, k)));
        }

        let user = self.flags.user();
        let writable = self.flags.writable();
        for k in 0..pages {
            let Some(frame_index) = self.bitmap.find_free() else {
                let free = self.bitmap.free_count() + k;
                warn!("page allocator at {}: out of frames after {k} of {pages} pages", self.window.base());
                if k > 0 {
                    self.release(va, first, k);
                }
                return Err(PageAllocError::OutOfFrames { requested: pages, free });
            };
            // Only fails if the pool runs past 4 GiB.
            let Some(frame) = self.pool.frame(frame_index) else {
                if k > 0 {
                    self.release(va, first, k);
                }
                return Err(PageAllocError::OutOfFrames { requested: pages, free: 0 });
            };

            self.bitmap.mark(frame_index, true);
            let (table, slot) = self.locate(first + k);
            set_entry(table, slot, frame, user, writable, true);
            let page = page_va(va, k);
            self.mmu.invalidate_page(VirtualPage::containing_address(page));
            trace!("mapped {page} -> {frame}");
        }
        Ok(va)
    }

    /// Unmap `pages` pages at `va` and return their frames to the pool.
    ///
    /// Entries whose frame lies outside this allocator's pool are left in
    /// place and skipped.
    ///
    /// # Errors
    /// - [`PageAllocError::Uninitialized`], [`PageAllocError::Unaligned`],
    ///   [`PageAllocError::ZeroPages`], [`PageAllocError::OutsideWindow`] for
    ///   invalid requests.
    /// - [`PageAllocError::NotMapped`] if any page of the range is not mapped
    ///   (e.g. a double free). Nothing is changed in either case.
    pub fn free(&mut self, va: VirtualAddress, pages: u32) -> Result<(), PageAllocError> {
        let first = self.validate(va, pages)?;
        if let Some(k) = (0..pages).find(|&k| !self.slot_entry(first + k).is_present()) {
            return Err(PageAllocError::NotMapped(page_va(va, k)));
        }
        self.release(va, first, pages);
        Ok(())
    }

    /// Allocation granularity in bytes (always 4096).
    #[must_use]
    pub const fn unit(&self) -> u32 {
        Self::UNIT
    }

    #[must_use]
    pub const fn state(&self) -> AllocatorState {
        self.state
    }

    #[must_use]
    pub fn used_frames(&self) -> u32 {
        self.bitmap.used_count()
    }

    #[must_use]
    pub fn free_frames(&self) -> u32 {
        self.bitmap.free_count()
    }

    /// Number of present entries across all owned tables.
    #[must_use]
    pub fn mapped_pages(&self) -> usize {
        self.tables.iter().map(|t| t.table.present_entries().count()).sum()
    }

    /// The owned table entry for `va`, or `None` outside the window.
    #[must_use]
    pub fn entry(&self, va: VirtualAddress) -> Option<PtEntry> {
        self.window.page_index(va).map(|i| self.slot_entry(i))
    }

    /// Translate `va` through the directory and this allocator's tables.
    ///
    /// `None` outside the window, while disabled, or for unmapped pages.
    #[must_use]
    pub fn physical_address_of(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.window.page_index(va)?;
        let pde = self.mmu.directory_entry(PdIndex::from(va));
        translate(va, pde, |_, frame| {
            self.tables.iter().find(|t| t.frame == frame).map(|t| t.table)
        })
    }

    #[must_use]
    pub const fn window(&self) -> &WindowToken {
        &self.window
    }

    #[must_use]
    pub const fn pool(&self) -> FramePool {
        self.pool
    }

    #[must_use]
    pub const fn flags(&self) -> MemoryFlags {
        self.flags
    }

    #[must_use]
    pub const fn bitmap(&self) -> &FrameBitmap<'a> {
        &self.bitmap
    }

    /// Tear the allocator down and hand back its window.
    ///
    /// The tables are unwired first if the allocator is enabled; mapped
    /// frames are not returned anywhere.
    #[must_use]
    pub fn into_window(self) -> WindowToken {
        if self.state == AllocatorState::Enabled {
            self.write_directory(false);
            self.invalidate_mapped();
        }
        self.window
    }

    fn ensure_initialized(&self) -> Result<(), PageAllocError> {
        if self.state == AllocatorState::Uninitialized {
            return Err(PageAllocError::Uninitialized);
        }
        Ok(())
    }

    /// Check a request and return the window page index of `va`.
    fn validate(&self, va: VirtualAddress, pages: u32) -> Result<u32, PageAllocError> {
        self.ensure_initialized()?;
        if !va.is_aligned::<Size4K>() {
            return Err(PageAllocError::Unaligned(va));
        }
        if pages == 0 {
            return Err(PageAllocError::ZeroPages);
        }
        if !self.window.covers(va, pages) {
            return Err(PageAllocError::OutsideWindow { va, pages });
        }
        self.window
            .page_index(va)
            .ok_or(PageAllocError::OutsideWindow { va, pages })
    }

    fn write_directory(&self, present: bool) {
        let user = self.flags.user();
        let writable = self.flags.writable();
        for (i, table) in (0..).zip(self.tables) {
            if let Some(slot) = self.window.slot(i) {
                set_directory_entry(self.mmu, slot, table.frame, user, writable, present);
            }
        }
    }

    /// Window address of every present entry in the owned tables.
    fn mapped_pages_iter(&self) -> impl Iterator<Item = (&'a PageTable, PtIndex, VirtualAddress)> + '_ {
        let base = self.window.base();
        (0u32..).zip(self.tables).flat_map(move |(i, slot)| {
            let table = slot.table;
            table.present_entries().map(move |(index, _)| {
                let page = i * info::ENTRIES_PER_TABLE + index.as_u32();
                (table, index, page_va(base, page))
            })
        })
    }

    fn invalidate_mapped(&self) {
        for (_, _, page) in self.mapped_pages_iter() {
            self.mmu.invalidate_page(VirtualPage::containing_address(page));
        }
    }

    /// Zero every present entry and invalidate its page.
    fn unmap_all(&self) {
        for (table, index, page) in self.mapped_pages_iter() {
            table.set(index, PtEntry::zero());
            self.mmu.invalidate_page(VirtualPage::containing_address(page));
        }
    }

    /// Owned table and entry slot for window page `index`. `index` must be
    /// inside the window.
    #[allow(clippy::cast_possible_truncation)]
    fn locate(&self, index: u32) -> (&'a PageTable, PtIndex) {
        let per_table = info::ENTRIES_PER_TABLE;
        let TableSlot { table, .. } = self.tables[(index / per_table) as usize];
        (table, PtIndex::new((index % per_table) as u16))
    }

    fn slot_entry(&self, index: u32) -> PtEntry {
        let (table, slot) = self.locate(index);
        table.get(slot)
    }

    /// Unmap `pages` validated pages starting at window page `first`.
    fn release(&mut self, va: VirtualAddress, first: u32, pages: u32) {
        for k in 0..pages {
            let (table, slot) = self.locate(first + k);
            let frame = table.get(slot).frame();
            let Some(index) = self.pool.index_of(frame) else {
                trace!("skipping {} -> {frame}: not in pool", page_va(va, k));
                continue;
            };
            self.bitmap.mark(index, false);
            table.set(slot, PtEntry::zero());
            let page = page_va(va, k);
            self.mmu.invalidate_page(VirtualPage::containing_address(page));
            trace!("unmapped {page} (frame {frame})");
        }
    }
}

/// Address of page `k` after `va`. Callers have checked the range.
const fn page_va(va: VirtualAddress, k: u32) -> VirtualAddress {
    VirtualAddress::new(va.as_u32() + k * info::PAGE_SIZE)
}
