/// Byte-wide access to the legacy I/O port space.
///
/// Methods take `&self`: a port has no state on the Rust side, and the
/// logger calls into it through a shared reference.
pub trait PortIo {
    /// Read one byte from `port`.
    fn read_port(&self, port: u16) -> u8;

    /// Write `value` to `port`.
    fn write_port(&self, port: u16, value: u8);
}

impl<P: PortIo + ?Sized> PortIo for &P {
    #[inline]
    fn read_port(&self, port: u16) -> u8 {
        (**self).read_port(port)
    }

    #[inline]
    fn write_port(&self, port: u16, value: u8) {
        (**self).write_port(port, value);
    }
}

/// The CPU's I/O port bus, accessed with `in al, dx` / `out dx, al`.
///
/// Only usable at CPL0 (or with a matching I/O permission bitmap); anything
/// else raises `#GP`.
#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
#[derive(Debug, Default, Copy, Clone)]
pub struct X86Ports;

#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
impl PortIo for X86Ports {
    #[inline]
    fn read_port(&self, port: u16) -> u8 {
        let value: u8;
        // SAFETY: Reading a port has no memory effects; the kernel runs at CPL0.
        unsafe {
            core::arch::asm!("in al, dx", in("dx") port, out("al") value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    #[inline]
    fn write_port(&self, port: u16, value: u8) {
        // SAFETY: As above. Callers only address ports of devices they own.
        unsafe {
            core::arch::asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
        }
    }
}
