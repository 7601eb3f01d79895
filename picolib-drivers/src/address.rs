//! Bus address value types
//!
//! A device address exists in two forms. The numeric form is the number a
//! datasheet gives; the transmitted form is the same number shifted into its
//! on-the-wire position, with the direction bit clear:
//!
//! ```text
//!   numeric      0 a6 a5 a4 a3 a2 a1 a0
//!   transmitted a6 a5 a4 a3 a2 a1 a0  0
//! ```
//!
//! The valid range depends on the device class and is carried in the type
//! through an [`AddressRange`] marker. Construction from an out-of-range
//! value traps `InvalidArgument`; `new_unchecked` skips the check.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

use picolib_core::{expect, ErrorCode};

/// Numeric address bounds of a device class
pub trait AddressRange {
    /// Smallest valid numeric address
    const NUMERIC_MIN: u8;
    /// Largest valid numeric address
    const NUMERIC_MAX: u8;
}

/// Address in numeric form
pub struct Numeric<R> {
    address: u8,
    _range: PhantomData<fn() -> R>,
}

/// Address in transmitted form
pub struct Transmitted<R> {
    address: u8,
    _range: PhantomData<fn() -> R>,
}

impl<R: AddressRange> Numeric<R> {
    /// Smallest valid address
    pub const MIN: Self = Self::new_unchecked(R::NUMERIC_MIN);
    /// Largest valid address
    pub const MAX: Self = Self::new_unchecked(R::NUMERIC_MAX);

    /// Traps `InvalidArgument` if `address` is out of range
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn new(address: u8) -> Self {
        expect(
            (R::NUMERIC_MIN..=R::NUMERIC_MAX).contains(&address),
            ErrorCode::InvalidArgument,
        );
        Self::new_unchecked(address)
    }

    /// Construct without checking the range
    pub const fn new_unchecked(address: u8) -> Self {
        Self {
            address,
            _range: PhantomData,
        }
    }

    pub const fn as_unsigned_integer(self) -> u8 {
        self.address
    }
}

impl<R: AddressRange> Transmitted<R> {
    /// Smallest valid address
    pub const MIN: Self = Self::new_unchecked(R::NUMERIC_MIN << 1);
    /// Largest valid address
    pub const MAX: Self = Self::new_unchecked(R::NUMERIC_MAX << 1);

    /// Traps `InvalidArgument` if `address` is out of range or has the
    /// direction bit set
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn new(address: u8) -> Self {
        expect(
            (Self::MIN.address..=Self::MAX.address).contains(&address) && address & 0b1 == 0,
            ErrorCode::InvalidArgument,
        );
        Self::new_unchecked(address)
    }

    /// Construct without checking the range
    pub const fn new_unchecked(address: u8) -> Self {
        Self {
            address,
            _range: PhantomData,
        }
    }

    pub const fn as_unsigned_integer(self) -> u8 {
        self.address
    }
}

impl<R: AddressRange> From<Numeric<R>> for Transmitted<R> {
    fn from(address: Numeric<R>) -> Self {
        Self::new_unchecked(address.address << 1)
    }
}

impl<R: AddressRange> From<Transmitted<R>> for Numeric<R> {
    fn from(address: Transmitted<R>) -> Self {
        Self::new_unchecked(address.address >> 1)
    }
}

// The range marker is a phantom, so these are implemented by hand to avoid
// bounds on `R`.
macro_rules! impl_value_traits {
    ($name:ident) => {
        impl<R> Clone for $name<R> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<R> Copy for $name<R> {}

        impl<R> PartialEq for $name<R> {
            fn eq(&self, other: &Self) -> bool {
                self.address == other.address
            }
        }

        impl<R> Eq for $name<R> {}

        impl<R> PartialOrd for $name<R> {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl<R> Ord for $name<R> {
            fn cmp(&self, other: &Self) -> Ordering {
                self.address.cmp(&other.address)
            }
        }

        impl<R> Hash for $name<R> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.address.hash(state);
            }
        }

        impl<R> fmt::Debug for $name<R> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#04x})"), self.address)
            }
        }

        #[cfg(feature = "defmt")]
        impl<R> defmt::Format for $name<R> {
            fn format(&self, f: defmt::Formatter) {
                defmt::write!(f, "{=u8:#04x}", self.address)
            }
        }
    };
}

impl_value_traits!(Numeric);
impl_value_traits!(Transmitted);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Narrow;

    impl AddressRange for Narrow {
        const NUMERIC_MIN: u8 = 0x10;
        const NUMERIC_MAX: u8 = 0x17;
    }

    #[test]
    fn test_bounds() {
        assert_eq!(Numeric::<Narrow>::MIN.as_unsigned_integer(), 0x10);
        assert_eq!(Numeric::<Narrow>::MAX.as_unsigned_integer(), 0x17);
        assert_eq!(Transmitted::<Narrow>::MIN.as_unsigned_integer(), 0x20);
        assert_eq!(Transmitted::<Narrow>::MAX.as_unsigned_integer(), 0x2E);
    }

    #[test]
    fn test_ordering() {
        let low = Numeric::<Narrow>::new(0x11);
        let high = Numeric::<Narrow>::new(0x15);
        assert!(low < high);
        assert_eq!(low.max(high), high);
        assert!(Transmitted::from(low) < Transmitted::from(high));
        assert_ne!(low, high);
    }

    #[test]
    fn test_unchecked_construction_skips_range() {
        assert_eq!(Numeric::<Narrow>::new_unchecked(0x7F).as_unsigned_integer(), 0x7F);
    }

    #[test]
    fn test_debug() {
        let text = std::format!("{:?}", Numeric::<Narrow>::new(0x12));
        assert_eq!(text, "Numeric(0x12)");
    }

    #[test]
    #[should_panic(expected = "InvalidArgument")]
    fn test_numeric_below_range() {
        Numeric::<Narrow>::new(0x0F);
    }

    #[cfg(feature = "trap-location")]
    #[test]
    fn test_numeric_trap_names_caller() {
        let file = crate::testing::trap_location(|| {
            Numeric::<Narrow>::new(0x18);
        });
        assert_eq!(file.as_deref(), Some(file!()));
    }

    #[test]
    #[should_panic(expected = "InvalidArgument")]
    fn test_transmitted_direction_bit_set() {
        Transmitted::<Narrow>::new(0x21);
    }

    proptest! {
        #[test]
        fn prop_numeric_round_trip(address in 0x10u8..=0x17) {
            let numeric = Numeric::<Narrow>::new(address);
            prop_assert_eq!(Numeric::from(Transmitted::from(numeric)), numeric);
        }

        #[test]
        fn prop_transmitted_round_trip(address in (0x10u8..=0x17).prop_map(|a| a << 1)) {
            let transmitted = Transmitted::<Narrow>::new(address);
            prop_assert_eq!(Transmitted::from(Numeric::from(transmitted)), transmitted);
        }
    }
}
