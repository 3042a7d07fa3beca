use crate::{MemoryAddressOffset, MisalignedAddress, PageSize, PhysicalAddress};
use core::fmt;
use core::marker::PhantomData;

/// Physical memory page base (a *frame*) for size `S`.
///
/// ### Invariants
/// - The low `S::SHIFT` bits of the base are always zero (page aligned).
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x00C1_2345);
/// let pp = pa.page::<Size4M>();
/// assert_eq!(pp.base().as_u32(), 0x00C0_0000);
/// assert_eq!(pp.join(pa.offset::<Size4M>()), pa);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage<S: PageSize> {
    base: u32,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> PhysicalPage<S> {
    /// Frame that contains `p` (aligns down).
    #[inline]
    #[must_use]
    pub const fn from_addr(p: PhysicalAddress) -> Self {
        Self {
            base: p.as_u32() & !S::OFFSET_MASK,
            _phantom: PhantomData,
        }
    }

    /// Frame with the given number, i.e. base `n << S::SHIFT`.
    ///
    /// Bits that do not fit into 32 bits are discarded.
    #[inline]
    #[must_use]
    pub const fn from_frame_number(n: u32) -> Self {
        Self {
            base: n << S::SHIFT,
            _phantom: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn frame_number(self) -> u32 {
        self.base >> S::SHIFT
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.base)
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: MemoryAddressOffset<S>) -> PhysicalAddress {
        PhysicalAddress::new(self.base | off.as_u32())
    }

    /// The frame `count` frames after this one, or `None` past 4 GiB.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, count: u32) -> Option<Self> {
        match self.frame_number().checked_add(count) {
            Some(n) if n <= (u32::MAX >> S::SHIFT) => Some(Self::from_frame_number(n)),
            _ => None,
        }
    }
}

impl<S> fmt::Display for PhysicalPage<S>
where
    S: PageSize,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}/{}", self.base, S::as_str())
    }
}

impl<S: PageSize> fmt::Debug for PhysicalPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage<{}>(0x{:08X})", S::as_str(), self.base)
    }
}

impl<S: PageSize> TryFrom<PhysicalAddress> for PhysicalPage<S> {
    type Error = MisalignedAddress;

    #[inline]
    fn try_from(pa: PhysicalAddress) -> Result<Self, Self::Error> {
        if pa.is_aligned::<S>() {
            Ok(pa.page())
        } else {
            Err(MisalignedAddress {
                address: pa.as_u32(),
                alignment: S::SIZE,
            })
        }
    }
}
