//! # Kernel Memory Bring-Up
//!
//! Boot-time glue between the bootloader handoff and the page allocators:
//!
//! * [`memory`] splits the frames above the pool base between a boot and a
//!   heap allocator, relocates the heap bitmap into boot-allocated pages and
//!   enables both.
//! * [`framebuffer`] remaps the linear framebuffer into its own window,
//!   bypassing every bitmap.
//! * [`paging`] installs the recursive self-map and turns paging on.
//! * [`logging`] installs the COM1 logger (x86 only).
//!
//! ## Boot sequence
//!
//! ```text
//! init_logging()
//!     ↓
//! install_self_map(..) + enable_paging(..)
//!     ↓
//! MemoryPlan::from_boot_info(&boot_memory)
//!     ↓
//! bring_up(..)  →  boot allocator ─► heap bitmap pages
//!                  heap allocator ─► kernel heap
//!     ↓
//! map_framebuffer(..)
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod framebuffer;
#[cfg(all(feature = "serial", any(target_arch = "x86", target_arch = "x86_64")))]
pub mod logging;
pub mod memory;
pub mod paging;

pub use framebuffer::{FramebufferError, MappedFramebuffer, map_framebuffer};
pub use memory::{BootTables, BringUpError, MemoryAllocators, MemoryPlan, bring_up};
