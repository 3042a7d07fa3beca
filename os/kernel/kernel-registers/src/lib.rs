//! # Typed i386 Control Registers
//!
//! Bitfield models of the control registers the paging code touches
//! (`CR0`, `CR3`) plus the single TLB maintenance instruction it needs.
//!
//! The register layouts are plain data and can be built and inspected on
//! any host. Actually moving values into or out of the CPU requires the
//! `asm` feature and an x86 target.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr3")]
pub mod cr3;

#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
pub mod tlb;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn store_unsafe(self);
}
