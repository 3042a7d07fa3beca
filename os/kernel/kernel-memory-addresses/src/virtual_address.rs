use crate::{MemoryAddressOffset, PageSize, VirtualPage};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Virtual memory address.
///
/// A thin wrapper around a `u32` that denotes **virtual** addresses. It only
/// carries the *kind* of address at the type level so you don't accidentally
/// mix virtual and physical values.
///
/// ### Semantics
/// - Use [`VirtualAddress::page`] / [`VirtualAddress::offset`] / [`VirtualAddress::split`]
///   to derive the page base and the in-page offset for a concrete [`PageSize`].
/// - Combine a [`VirtualPage<S>`] and a [`MemoryAddressOffset<S>`] with
///   [`VirtualPage::join`] to reconstruct a `VirtualAddress`.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0xC00B_8010);
/// assert!(!va.is_aligned::<Size4K>());
/// assert_eq!(va.page::<Size4K>().base(), VirtualAddress::new(0xC00B_8000));
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u32);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    /// Address of a pointer in the current address space.
    ///
    /// Returns `None` when the pointer does not fit into 32 bits, which only
    /// happens when running on a 64-bit host.
    #[inline]
    #[must_use]
    pub fn try_from_ptr<T>(ptr: *const T) -> Option<Self> {
        u32::try_from(ptr.addr()).ok().map(Self::new)
    }

    /// Turn this address back into a raw pointer.
    ///
    /// Dereferencing the result is only sound if the address is mapped in the
    /// active page tables.
    #[inline]
    #[must_use]
    pub fn as_mut_ptr<T>(self) -> *mut T {
        core::ptr::with_exposed_provenance_mut(self.0 as usize)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn page<S: PageSize>(self) -> VirtualPage<S> {
        VirtualPage::containing_address(self)
    }

    #[inline]
    #[must_use]
    pub const fn offset<S: PageSize>(self) -> MemoryAddressOffset<S> {
        MemoryAddressOffset::from_raw(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn split<S: PageSize>(self) -> (VirtualPage<S>, MemoryAddressOffset<S>) {
        (self.page::<S>(), self.offset::<S>())
    }

    /// `true` if the address is a multiple of `S::SIZE`.
    #[inline]
    #[must_use]
    pub const fn is_aligned<S: PageSize>(self) -> bool {
        self.0 & S::OFFSET_MASK == 0
    }

    /// Add `bytes`, returning `None` if the result wraps past 4 GiB.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, bytes: u32) -> Option<Self> {
        match self.0.checked_add(bytes) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:08X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for VirtualAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl From<VirtualAddress> for u32 {
    #[inline]
    fn from(v: VirtualAddress) -> Self {
        v.as_u32()
    }
}

impl<S> From<VirtualPage<S>> for VirtualAddress
where
    S: PageSize,
{
    fn from(value: VirtualPage<S>) -> Self {
        value.base()
    }
}

impl Add<u32> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}
