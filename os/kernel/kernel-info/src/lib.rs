//! # Kernel Configuration and Boot Interface
//!
//! The memory layout constants and boot-information records shared by the
//! paging, allocation and bring-up crates.
//!
//! ## Virtual Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │   Low memory, kernel image      │
//! POOL_BASE   ├─────────────────────────────────┤ 0x0080_0000 (physical)
//!             │   Frames managed by allocators  │
//!             ~                                 ~
//! KERNEL_BASE ├─────────────────────────────────┤ 0xC000_0000
//!             │   Kernel text & data            │
//! FRAMEBUFFER ├─────────────────────────────────┤ 0xD000_0000
//!             │   Linear framebuffer (≤ 4 MiB)  │
//! BOOT_WINDOW ├─────────────────────────────────┤ 0xDFC0_0000
//!             │   Boot allocator (1 table)      │
//! HEAP_WINDOW ├─────────────────────────────────┤ 0xE000_0000
//!             │   Heap allocator (2 tables)     │
//!             ~                                 ~
//! RECURSIVE   ├─────────────────────────────────┤ 0xFFC0_0000
//!             │   Page tables via self-map      │
//! 0xFFFF_F000 │   Page directory via self-map   │
//!             └─────────────────────────────────┘
//! ```
//!
//! All windows are 4 MiB aligned; the compile-time assertions in [`memory`]
//! keep them from overlapping.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
