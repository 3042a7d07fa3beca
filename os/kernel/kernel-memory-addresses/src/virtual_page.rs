use crate::{MemoryAddressOffset, MisalignedAddress, PageSize, VirtualAddress};
use core::fmt;
use core::marker::PhantomData;

/// Virtual memory page base for size `S`.
///
/// A `VirtualPage<S>` represents the **page-aligned base** of a virtual page of
/// size `S` (`S::SIZE` bytes).
///
/// ### Invariants
/// - The low `S::SHIFT` bits of the base are always zero (page aligned).
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0xDFC0_1234);
/// let vp = va.page::<Size4K>();
/// assert_eq!(vp.base().as_u32(), 0xDFC0_1000);
/// assert_eq!(vp.join(va.offset::<Size4K>()), va);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage<S: PageSize> {
    base: u32,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> VirtualPage<S> {
    /// Page that contains `addr` (aligns down to page boundary).
    #[inline]
    #[must_use]
    pub const fn containing_address(addr: VirtualAddress) -> Self {
        Self {
            base: addr.as_u32() & !S::OFFSET_MASK,
            _phantom: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new(self.base)
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: MemoryAddressOffset<S>) -> VirtualAddress {
        VirtualAddress::new(self.base | off.as_u32())
    }

    /// The page `count` pages after this one, or `None` past 4 GiB.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, count: u32) -> Option<Self> {
        let Some(bytes) = count.checked_mul(S::SIZE) else {
            return None;
        };
        match self.base.checked_add(bytes) {
            Some(base) => Some(Self {
                base,
                _phantom: PhantomData,
            }),
            None => None,
        }
    }

    /// Number of whole pages from `origin` up to this page, or `None` if this
    /// page lies below `origin`.
    #[inline]
    #[must_use]
    pub const fn pages_since(self, origin: Self) -> Option<u32> {
        match self.base.checked_sub(origin.base) {
            Some(delta) => Some(delta >> S::SHIFT),
            None => None,
        }
    }
}

impl<S> fmt::Display for VirtualPage<S>
where
    S: PageSize,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}/{}", self.base, S::as_str())
    }
}

impl<S: PageSize> fmt::Debug for VirtualPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage<{}>(0x{:08X})", S::as_str(), self.base)
    }
}

impl<S: PageSize> TryFrom<VirtualAddress> for VirtualPage<S> {
    type Error = MisalignedAddress;

    #[inline]
    fn try_from(va: VirtualAddress) -> Result<Self, Self::Error> {
        if va.is_aligned::<S>() {
            Ok(va.page())
        } else {
            Err(MisalignedAddress {
                address: va.as_u32(),
                alignment: S::SIZE,
            })
        }
    }
}
