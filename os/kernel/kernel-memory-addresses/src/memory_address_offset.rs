use crate::PageSize;
use core::fmt;
use core::marker::PhantomData;

/// The offset within a page of size `S` (`0..S::SIZE`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryAddressOffset<S: PageSize> {
    value: u32,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> MemoryAddressOffset<S> {
    /// Create from a raw value, asserting it is < `S::SIZE` in debug.
    ///
    /// Release builds mask the value into range.
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        debug_assert!(value < S::SIZE, "offset must be < page size");
        Self::from_raw(value)
    }

    /// Keep only the offset bits of a full 32-bit address.
    #[inline]
    #[must_use]
    pub const fn from_raw(addr: u32) -> Self {
        Self {
            value: addr & S::OFFSET_MASK,
            _phantom: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.value
    }
}

impl<S: PageSize> fmt::Debug for MemoryAddressOffset<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset<{}>({:#X})", S::as_str(), self.value)
    }
}
