//! # Kernel Page Allocation
//!
//! Physical page allocation through the paging structures: frames are handed
//! out by mapping them into fixed virtual windows, so callers only ever see
//! virtual addresses.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        Memory driver contract ([`driver`])          │
//! │    • alloc / free / set_state / unit                │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │          Page allocator ([`page_alloc`])            │
//! │    • owns the tables of one window                  │
//! │    • lowest-free-frame-first, atomic rollback       │
//! │    • per-page TLB invalidation                      │
//! └───────┬─────────────────────────────┬───────────────┘
//!         │                             │
//! ┌───────▼───────────────┐   ┌─────────▼───────────────┐
//! │ Frame bitmap          │   │ Window registry         │
//! │ ([`frame_alloc`])     │   │ ([`window`])            │
//! └───────────────────────┘   └─────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::{FramePool, MemoryFlags, PageAllocator, PageAllocatorConfig, WindowRegistry};
//! use kernel_memory_addresses::{PhysicalPage, VirtualAddress};
//! use kernel_vmem::{PageTable, SimulatedMmu, TableSlot};
//!
//! let table = PageTable::zeroed();
//! let mmu = SimulatedMmu::new();
//! let tables = [mmu.attach(TableSlot::new(&table, PhysicalPage::from_frame_number(0x1F0)))];
//! let mut words = [0u32; 1];
//! let mut registry = WindowRegistry::new();
//!
//! let mut heap = PageAllocator::new(&mmu, PageAllocatorConfig {
//!     tables: &tables,
//!     pool: FramePool::new(PhysicalPage::from_frame_number(0x800), 8),
//!     bitmap: &mut words,
//!     window: registry.claim(VirtualAddress::new(0xE000_0000), 1).unwrap(),
//!     flags: MemoryFlags::empty(),
//! }).unwrap();
//!
//! heap.init();
//! heap.set_state(true).unwrap();
//! let va = heap.alloc(VirtualAddress::new(0xE000_0000), 2).unwrap();
//! assert_eq!(heap.used_frames(), 2);
//! heap.free(va, 2).unwrap();
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod driver;
pub mod frame_alloc;
pub mod page_alloc;
pub mod window;

pub use crate::driver::MemoryDriver;
pub use crate::frame_alloc::{BitmapError, FrameBitmap, FrameIndex};
pub use crate::page_alloc::{
    AllocatorState, FramePool, MemoryFlags, PageAllocError, PageAllocator, PageAllocatorConfig,
};
pub use crate::window::{WindowError, WindowRegistry, WindowToken};
