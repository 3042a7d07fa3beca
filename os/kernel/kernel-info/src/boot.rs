//! # Boot Information
//!
//! The subset of the bootloader handoff the memory code consumes. Parsing the
//! multiboot tag list happens elsewhere; these records carry the results.

/// Memory size reported by the bootloader.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BootMemoryInfo {
    /// KiB of conventional memory below 1 MiB.
    pub lower_kib: u32,

    /// KiB of contiguous memory starting at 1 MiB.
    pub upper_kib: u32,
}

/// Linear framebuffer geometry, as described by the bootloader.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FramebufferInfo {
    /// Physical base address of the framebuffer. Page aligned.
    pub address: u32,

    /// Bytes per scanline. May exceed `width * bpp / 8` due to padding.
    pub pitch: u32,

    /// Visible width in pixels.
    pub width: u32,

    /// Visible height in pixels.
    pub height: u32,

    /// Bits per pixel.
    pub bpp: u8,

    /// Pixel layout.
    pub kind: FramebufferKind,
}

/// Framebuffer type tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FramebufferKind {
    /// Direct color with RGB bit fields.
    Rgb,
    /// 80x25 style EGA text buffer.
    EgaText,
    /// Anything else (indexed palettes and unknown tags).
    Other,
}
