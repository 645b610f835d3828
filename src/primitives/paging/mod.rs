//! Page arithmetic shared by every huge collection.
//!
//! A logical index `i` lives on page `i >> shift` at offset `i & mask`, where the
//! page size is `1 << shift`. Every page of a table is full except possibly the
//! last one, which holds `exclusive_index_of_page(size, mask)` elements.

use std::mem;

use tracing::warn;

use crate::error::{HugeError, Result};

/// Default page budget in bytes; the element page size is derived from it.
pub const PAGE_SIZE_IN_BYTES: usize = 32 * 1024;

/// Largest number of elements stored in a single-page representation.
pub const MAX_ARRAY_LENGTH: usize = 1 << 28;

/// Page holding global index `index`.
#[inline]
pub const fn page_index(index: usize, page_shift: u32) -> usize {
    index >> page_shift
}

/// Offset of `index` within its page.
#[inline]
pub const fn index_in_page(index: usize, page_mask: usize) -> usize {
    index & page_mask
}

/// Number of pages needed to hold `size` elements.
#[inline]
pub const fn number_of_pages(size: usize, page_shift: u32) -> usize {
    let mask = (1usize << page_shift) - 1;
    (size >> page_shift) + ((size & mask != 0) as usize)
}

/// Length of the last page of a table holding `size` elements.
///
/// A size that is a multiple of the page size yields a full last page, not an
/// empty one. A size of zero has no pages and yields zero.
#[inline]
pub const fn exclusive_index_of_page(size: usize, page_mask: usize) -> usize {
    if size == 0 {
        return 0;
    }
    ((size - 1) & page_mask) + 1
}

/// Number of elements addressable by `num_pages` full pages.
#[inline]
pub const fn capacity_for(num_pages: usize, page_shift: u32) -> usize {
    num_pages << page_shift
}

/// Largest power-of-two element count whose pages fit in `page_size_in_bytes`.
pub const fn page_size_for(page_size_in_bytes: usize, size_of_element: usize) -> usize {
    let element = if size_of_element == 0 { 1 } else { size_of_element };
    let elements = page_size_in_bytes / element;
    if elements <= 1 {
        return 1;
    }
    1usize << (usize::BITS - 1 - elements.leading_zeros())
}

/// Shift matching a power-of-two `page_size`.
#[inline]
pub const fn page_shift_for(page_size: usize) -> u32 {
    page_size.trailing_zeros()
}

/// Page geometry for one element type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageLayout {
    shift: u32,
    mask: usize,
}

impl PageLayout {
    /// Layout with pages of `1 << shift` elements.
    pub const fn with_shift(shift: u32) -> Self {
        Self {
            shift,
            mask: (1usize << shift) - 1,
        }
    }

    /// Layout for `T` given a page budget in bytes.
    pub const fn for_element<T>(page_size_in_bytes: usize) -> Self {
        let page_size = page_size_for(page_size_in_bytes, mem::size_of::<T>());
        Self::with_shift(page_shift_for(page_size))
    }

    /// Page shift (log2 of the page size).
    #[inline]
    pub const fn shift(&self) -> u32 {
        self.shift
    }

    /// Mask extracting the in-page offset.
    #[inline]
    pub const fn mask(&self) -> usize {
        self.mask
    }

    /// Elements per full page.
    #[inline]
    pub const fn page_size(&self) -> usize {
        1usize << self.shift
    }

    /// Page holding the global `index`.
    #[inline]
    pub const fn page_index(&self, index: usize) -> usize {
        page_index(index, self.shift)
    }

    /// Offset of `index` within its page.
    #[inline]
    pub const fn index_in_page(&self, index: usize) -> usize {
        index_in_page(index, self.mask)
    }

    /// Pages needed for `size` elements.
    #[inline]
    pub const fn number_of_pages(&self, size: usize) -> usize {
        number_of_pages(size, self.shift)
    }

    /// Length of the last page of an array of `size` elements.
    #[inline]
    pub const fn exclusive_index_of_page(&self, size: usize) -> usize {
        exclusive_index_of_page(size, self.mask)
    }

    /// Elements held by `num_pages` full pages.
    #[inline]
    pub const fn capacity_for(&self, num_pages: usize) -> usize {
        capacity_for(num_pages, self.shift)
    }

    /// Global index of the first element of `page`.
    #[inline]
    pub const fn base_of(&self, page: usize) -> usize {
        page << self.shift
    }
}

/// Allocates a page of `len` copies of `value`, reporting failure instead of aborting.
pub fn allocate_page<T: Clone>(len: usize, value: T) -> Result<Box<[T]>> {
    let mut page = allocate_vec::<T>(len)?;
    page.resize(len, value);
    Ok(page.into_boxed_slice())
}

/// Allocates a page of `len` elements produced by `init`.
pub fn allocate_page_with<T>(len: usize, init: impl FnMut() -> T) -> Result<Box<[T]>> {
    let mut page = allocate_vec::<T>(len)?;
    page.resize_with(len, init);
    Ok(page.into_boxed_slice())
}

/// Empty vector with room for exactly `len` elements.
pub fn allocate_vec<T>(len: usize) -> Result<Vec<T>> {
    let mut vec = Vec::new();
    if let Err(err) = vec.try_reserve_exact(len) {
        let bytes = len.saturating_mul(mem::size_of::<T>());
        warn!(len, bytes, error = %err, "huge.pages.allocation_failed");
        return Err(HugeError::Allocation { bytes });
    }
    Ok(vec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trip() {
        let layout = PageLayout::with_shift(12);
        for i in [0usize, 1, 4095, 4096, 4097, 8191, 8192, 1_000_000] {
            let page = layout.page_index(i);
            let offset = layout.index_in_page(i);
            assert_eq!(page * layout.page_size() + offset, i);
        }
    }

    #[test]
    fn last_page_is_full_on_exact_multiple() {
        let layout = PageLayout::with_shift(12);
        assert_eq!(layout.exclusive_index_of_page(4096), 4096);
        assert_eq!(layout.exclusive_index_of_page(8192), 4096);
        assert_eq!(layout.exclusive_index_of_page(4097), 1);
        assert_eq!(layout.exclusive_index_of_page(1), 1);
    }

    #[test]
    fn zero_size_has_no_pages() {
        let layout = PageLayout::with_shift(12);
        assert_eq!(layout.number_of_pages(0), 0);
        assert_eq!(layout.exclusive_index_of_page(0), 0);
    }

    #[test]
    fn number_of_pages_rounds_up() {
        assert_eq!(number_of_pages(1, 12), 1);
        assert_eq!(number_of_pages(4096, 12), 1);
        assert_eq!(number_of_pages(4097, 12), 2);
        assert_eq!(number_of_pages(usize::MAX, 12), (usize::MAX >> 12) + 1);
    }

    #[test]
    fn page_size_is_power_of_two() {
        assert_eq!(page_size_for(PAGE_SIZE_IN_BYTES, 8), 4096);
        assert_eq!(page_size_for(PAGE_SIZE_IN_BYTES, 1), 32 * 1024);
        assert_eq!(page_size_for(PAGE_SIZE_IN_BYTES, 24), 1024);
        assert_eq!(page_size_for(PAGE_SIZE_IN_BYTES, 0), 32 * 1024);
        assert_eq!(page_size_for(4, 8), 1);
        assert_eq!(PageLayout::for_element::<i64>(PAGE_SIZE_IN_BYTES).shift(), 12);
    }
}
