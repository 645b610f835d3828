//! Memory estimation helpers.
//!
//! Estimates are computed from sizes alone so callers can decide whether a
//! collection fits before allocating it. The formulas mirror the allocation
//! paths exactly: a freshly created collection reports the same footprint.

use std::fmt;
use std::mem;
use std::ops::Add;

/// Bytes occupied by `len` elements of `T` stored contiguously.
#[inline]
pub const fn size_of_array<T>(len: usize) -> usize {
    len.saturating_mul(mem::size_of::<T>())
}

/// Bytes occupied by a page table of `num_pages` page handles of type `P`.
#[inline]
pub const fn size_of_page_table<P>(num_pages: usize) -> usize {
    num_pages.saturating_mul(mem::size_of::<P>())
}

/// Bytes occupied by an instance of `T` itself, excluding heap buffers.
#[inline]
pub const fn size_of_instance<T>() -> usize {
    mem::size_of::<T>()
}

/// Closed interval of byte counts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MemoryRange {
    min: usize,
    max: usize,
}

impl MemoryRange {
    /// Range covering exactly `bytes`.
    pub const fn of(bytes: usize) -> Self {
        Self {
            min: bytes,
            max: bytes,
        }
    }

    /// Range between `min` and `max`; the bounds are swapped if inverted.
    pub const fn of_range(min: usize, max: usize) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Empty range.
    pub const fn empty() -> Self {
        Self::of(0)
    }

    /// Lower bound.
    pub const fn min(&self) -> usize {
        self.min
    }

    /// Upper bound.
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Whether both bounds are zero.
    pub const fn is_empty(&self) -> bool {
        self.min == 0 && self.max == 0
    }

    /// Sum of two ranges.
    pub const fn add(self, other: Self) -> Self {
        Self {
            min: self.min.saturating_add(other.min),
            max: self.max.saturating_add(other.max),
        }
    }

    /// Range scaled by `count` instances.
    pub const fn times(self, count: usize) -> Self {
        Self {
            min: self.min.saturating_mul(count),
            max: self.max.saturating_mul(count),
        }
    }

    /// Smallest range containing both.
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl Add for MemoryRange {
    type Output = MemoryRange;

    fn add(self, rhs: Self) -> Self::Output {
        MemoryRange::add(self, rhs)
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", human_readable(self.min))
        } else {
            write!(
                f,
                "[{} ... {}]",
                human_readable(self.min),
                human_readable(self.max)
            )
        }
    }
}

/// Formats a byte count with a binary unit suffix.
pub fn human_readable(bytes: usize) -> String {
    const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    if bytes < 1024 {
        return format!("{bytes} Bytes");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    value /= 1024.0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.0} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_and_table_sizes() {
        assert_eq!(size_of_array::<i64>(10), 80);
        assert_eq!(size_of_array::<u8>(10), 10);
        assert_eq!(size_of_page_table::<Box<[i64]>>(3), 3 * mem::size_of::<Box<[i64]>>());
    }

    #[test]
    fn range_arithmetic() {
        let a = MemoryRange::of_range(10, 20);
        let b = MemoryRange::of(5);
        assert_eq!(a + b, MemoryRange::of_range(15, 25));
        assert_eq!(a.times(3), MemoryRange::of_range(30, 60));
        assert_eq!(a.union(MemoryRange::of_range(2, 12)), MemoryRange::of_range(2, 20));
        assert_eq!(MemoryRange::of_range(9, 1), MemoryRange::of_range(1, 9));
        assert!(MemoryRange::empty().is_empty());
    }

    #[test]
    fn human_readable_units() {
        assert_eq!(human_readable(512), "512 Bytes");
        assert_eq!(human_readable(2048), "2 KiB");
        assert_eq!(human_readable(3 * 1024 * 1024), "3 MiB");
        assert_eq!(MemoryRange::of_range(1024, 2048).to_string(), "[1 KiB ... 2 KiB]");
    }
}
