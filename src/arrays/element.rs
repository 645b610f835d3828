//! Element traits for huge collections.
//!
//! Every collection is generic over [`Element`]; arithmetic and bitwise
//! operations are only available for [`NumericElement`] and [`IntegerElement`].

/// Value storable in a huge collection. The default value is the zero element.
pub trait Element: Clone + Default + Send + Sync + 'static {}

impl<T: Clone + Default + Send + Sync + 'static> Element for T {}

/// Element supporting addition and ordering.
pub trait NumericElement: Element + Copy + PartialOrd {
    /// Additive identity.
    const ZERO: Self;

    /// Sum of `self` and `rhs`; integers wrap on overflow.
    fn add(self, rhs: Self) -> Self;
}

/// Integer element supporting bitwise updates.
pub trait IntegerElement: NumericElement {
    /// Bitwise or.
    fn bit_or(self, rhs: Self) -> Self;

    /// Bitwise and.
    fn bit_and(self, rhs: Self) -> Self;

    /// Bitwise exclusive or.
    fn bit_xor(self, rhs: Self) -> Self;
}

/// Element constructible from its own global index.
pub trait FromIndex {
    /// Value stored at `index` by an identity initialization.
    fn from_index(index: usize) -> Self;
}

macro_rules! integer_element {
    ($($ty:ty),*) => {$(
        impl NumericElement for $ty {
            const ZERO: Self = 0;

            #[inline]
            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
        }

        impl IntegerElement for $ty {
            #[inline]
            fn bit_or(self, rhs: Self) -> Self {
                self | rhs
            }

            #[inline]
            fn bit_and(self, rhs: Self) -> Self {
                self & rhs
            }

            #[inline]
            fn bit_xor(self, rhs: Self) -> Self {
                self ^ rhs
            }
        }

        impl FromIndex for $ty {
            #[inline]
            fn from_index(index: usize) -> Self {
                index as $ty
            }
        }
    )*};
}

macro_rules! float_element {
    ($($ty:ty),*) => {$(
        impl NumericElement for $ty {
            const ZERO: Self = 0.0;

            #[inline]
            fn add(self, rhs: Self) -> Self {
                self + rhs
            }
        }

        impl FromIndex for $ty {
            #[inline]
            fn from_index(index: usize) -> Self {
                index as $ty
            }
        }
    )*};
}

integer_element!(i8, i16, i32, i64, u8, u16, u32, u64, usize);
float_element!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_wrap() {
        assert_eq!(NumericElement::add(i8::MAX, 1), i8::MIN);
        assert_eq!(NumericElement::add(u64::MAX, 2), 1);
        assert_eq!(0b1010u8.bit_or(0b0101), 0b1111);
        assert_eq!(0b1010i32.bit_and(0b0110), 0b0010);
    }

    #[test]
    fn floats_add() {
        assert_eq!(NumericElement::add(1.5f64, 2.25), 3.75);
        assert_eq!(f32::ZERO, 0.0);
        assert_eq!(f64::from_index(7), 7.0);
    }
}
