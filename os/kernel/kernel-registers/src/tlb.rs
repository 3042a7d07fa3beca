//! TLB maintenance.

use kernel_memory_addresses::VirtualAddress;

/// Drop the cached translation for the page containing `va` (`invlpg`).
///
/// # Safety
/// Must run in ring 0.
#[inline]
pub unsafe fn invalidate_page(va: VirtualAddress) {
    let addr = va.as_u32() as usize;
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) addr, options(nostack, preserves_flags));
    }
}
