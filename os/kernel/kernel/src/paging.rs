//! # Enabling Paging
//!
//! The boot directory gets its recursive slot before paging is switched on;
//! from then on [`RecursiveMmu`](kernel_vmem::RecursiveMmu) edits it through
//! the self-map.

use kernel_info::memory::RECURSIVE_SLOT;
use kernel_memory_addresses::{PhysicalPage, Size4K};
use kernel_registers::cr0::Cr0;
use kernel_registers::cr3::Cr3;
use kernel_vmem::{PageDirectory, PdEntry, PdIndex};

/// The directory slot that maps the directory onto itself.
#[allow(clippy::cast_possible_truncation)]
pub const SELF_MAP_SLOT: PdIndex = PdIndex::new(RECURSIVE_SLOT as u16);

/// Point the last slot of `directory`, stored in `frame`, at itself.
///
/// Supervisor-only and writable, so the kernel can edit tables through it.
pub fn install_self_map(directory: &PageDirectory, frame: PhysicalPage<Size4K>) {
    directory.set(SELF_MAP_SLOT, PdEntry::new(frame, false, true, true));
}

/// CR0 with protection, paging and supervisor write protection turned on.
#[must_use]
pub const fn paging_cr0(current: Cr0) -> Cr0 {
    current
        .with_pe_protection_enable(true)
        .with_wp_write_protect(true)
        .with_pg_paging(true)
}

/// Load `directory` into CR3 and set CR0.PG.
///
/// # Safety
/// - Runs in ring 0 with interrupts disabled.
/// - `directory` holds a valid directory whose mappings cover the running
///   code, its stack and the self-map installed by [`install_self_map`].
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub unsafe fn enable_paging(directory: PhysicalPage<Size4K>) {
    use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};

    unsafe {
        directory_cr3(directory).store_unsafe();
        paging_cr0(Cr0::load_unsafe()).store_unsafe();
    }
    log::info!("paging enabled, directory at {}", directory.base());
}

/// CR3 value for `directory` with default caching.
#[must_use]
pub const fn directory_cr3(directory: PhysicalPage<Size4K>) -> Cr3 {
    Cr3::from_directory(directory, false, false)
}
