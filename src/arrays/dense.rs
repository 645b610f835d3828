//! Fixed-size huge arrays with single-page and paged storage.
//!
//! [`HugeArray`] holds `size` elements that all start at `T::default()`. Sizes up
//! to [`HugeOptions::max_single_page_len`] are stored in one contiguous buffer and
//! skip page arithmetic entirely; larger sizes are split into power-of-two pages.
//! Both representations answer the same operations identically.
//!
//! Writes take `&mut self`; concurrent writers should use
//! [`HugeAtomicArray`](crate::arrays::HugeAtomicArray) instead.

use std::fmt;
use std::slice;

use tracing::debug;

use crate::arrays::cursor::HugeCursor;
use crate::arrays::element::{Element, IntegerElement, NumericElement};
use crate::arrays::options::HugeOptions;
use crate::arrays::page_creator::{PageCreator, PassThroughPageCreator};
use crate::error::{check_index, check_range, HugeError, Result};
use crate::primitives::estimate::{size_of_array, size_of_instance, size_of_page_table};
use crate::primitives::paging::{allocate_page, allocate_vec, PageLayout};

/// Storage layout currently backing an array.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Representation {
    /// One contiguous buffer of exactly `size` elements.
    Single,
    /// A table of fixed-size pages.
    Paged,
    /// Pages were dropped by `release`.
    Released,
}

enum Storage<T> {
    Single(Box<[T]>),
    Paged {
        pages: Box<[Box<[T]>]>,
        layout: PageLayout,
    },
    Released,
}

/// Fixed-size, randomly accessible array addressed beyond a single allocation.
pub struct HugeArray<T> {
    size: usize,
    storage: Storage<T>,
}

/// Huge array of `i64`.
pub type HugeLongArray = HugeArray<i64>;
/// Huge array of `i32`.
pub type HugeIntArray = HugeArray<i32>;
/// Huge array of `i16`.
pub type HugeShortArray = HugeArray<i16>;
/// Huge array of `i8`.
pub type HugeByteArray = HugeArray<i8>;
/// Huge array of `f64`.
pub type HugeDoubleArray = HugeArray<f64>;
/// Huge array of `f32`.
pub type HugeFloatArray = HugeArray<f32>;
/// Huge array of optional objects; unset slots read as `None`.
pub type HugeObjectArray<T> = HugeArray<Option<T>>;

impl<T: Element> HugeArray<T> {
    /// Creates an array of `size` default elements with default options.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_options(size, &HugeOptions::default())
    }

    /// Creates an array of `size` default elements, choosing the representation
    /// from `options`.
    pub fn with_options(size: usize, options: &HugeOptions) -> Result<Self> {
        if options.fits_single_page(size) {
            Self::new_single_with(size, options)
        } else {
            Self::new_paged_with(size, options)
        }
    }

    /// Forces the single-page representation.
    pub fn new_single(size: usize) -> Result<Self> {
        Self::new_single_with(size, &HugeOptions::default())
    }

    /// Forces the single-page representation; fails above `max_single_page_len`.
    pub fn new_single_with(size: usize, options: &HugeOptions) -> Result<Self> {
        if !options.fits_single_page(size) {
            return Err(HugeError::Capacity {
                requested: size,
                max: options.max_single_page_len,
            });
        }
        let page = allocate_page(size, T::default())?;
        Ok(Self::from_single(page, options))
    }

    /// Forces the paged representation.
    pub fn new_paged(size: usize) -> Result<Self> {
        Self::new_paged_with(size, &HugeOptions::default())
    }

    /// Forces the paged representation using `options` for page geometry.
    pub fn new_paged_with(size: usize, options: &HugeOptions) -> Result<Self> {
        let creator = PassThroughPageCreator::new(options.concurrency);
        Self::paged_with_creator(size, options, &creator)
    }

    /// Creates an array whose contents are produced by `creator`.
    pub fn with_page_creator(
        size: usize,
        options: &HugeOptions,
        creator: &dyn PageCreator<T>,
    ) -> Result<Self> {
        if options.fits_single_page(size) {
            let mut page = allocate_page(size, T::default())?;
            creator.fill_page(&mut page, 0);
            Ok(Self::from_single(page, options))
        } else {
            Self::paged_with_creator(size, options, creator)
        }
    }

    /// Creates an array holding a copy of `values`.
    pub fn from_values(values: &[T]) -> Result<Self> {
        Self::from_values_with(values, &HugeOptions::default())
    }

    /// Creates an array holding a copy of `values` using `options`.
    pub fn from_values_with(values: &[T], options: &HugeOptions) -> Result<Self> {
        let mut array = Self::with_options(values.len(), options)?;
        let mut written = 0;
        while written < values.len() {
            let run = array.run_mut(written);
            let len = run.len().min(values.len() - written);
            run[..len].clone_from_slice(&values[written..written + len]);
            written += len;
        }
        Ok(array)
    }

    /// Wraps pre-built pages laid out by `options` as a paged array of `size`.
    ///
    /// Every page but the last must be full; the last must hold exactly the
    /// remainder of `size`.
    pub fn from_pages(pages: Vec<Box<[T]>>, size: usize, options: &HugeOptions) -> Result<Self> {
        let layout = options.layout_for::<T>();
        let expected_pages = layout.number_of_pages(size);
        if pages.len() != expected_pages {
            return Err(HugeError::InvalidArgument(format!(
                "expected {expected_pages} pages for size {size}, got {}",
                pages.len()
            )));
        }
        let last_page_size = layout.exclusive_index_of_page(size);
        for (page_index, page) in pages.iter().enumerate() {
            let expected = if page_index + 1 == expected_pages {
                last_page_size
            } else {
                layout.page_size()
            };
            if page.len() != expected {
                return Err(HugeError::InvalidArgument(format!(
                    "page {page_index} holds {} elements, expected {expected}",
                    page.len()
                )));
            }
        }
        Ok(Self {
            size,
            storage: Storage::Paged {
                pages: pages.into_boxed_slice(),
                layout,
            },
        })
    }

    fn from_single(page: Box<[T]>, options: &HugeOptions) -> Self {
        let size = page.len();
        options.metrics.pages_allocated(1, size_of_array::<T>(size));
        debug!(size, representation = "single", "huge.array.allocate");
        Self {
            size,
            storage: Storage::Single(page),
        }
    }

    fn paged_with_creator<C>(size: usize, options: &HugeOptions, creator: &C) -> Result<Self>
    where
        C: PageCreator<T> + ?Sized,
    {
        let layout = options.layout_for::<T>();
        let num_pages = layout.number_of_pages(size);
        let mut pages = allocate_vec::<Box<[T]>>(num_pages)?;
        pages.resize_with(num_pages, Box::default);
        creator.fill(
            &mut pages,
            layout.exclusive_index_of_page(size),
            layout.shift(),
        )?;
        let array = Self {
            size,
            storage: Storage::Paged {
                pages: pages.into_boxed_slice(),
                layout,
            },
        };
        let bytes = array.data_bytes();
        options.metrics.pages_allocated(num_pages, bytes);
        debug!(
            size,
            pages = num_pages,
            page_size = layout.page_size(),
            bytes,
            representation = "paged",
            "huge.array.allocate"
        );
        Ok(array)
    }

    /// Logical number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current storage layout.
    pub fn representation(&self) -> Representation {
        match self.storage {
            Storage::Single(_) => Representation::Single,
            Storage::Paged { .. } => Representation::Paged,
            Storage::Released => Representation::Released,
        }
    }

    /// Whether [`release`](Self::release) was called.
    pub fn is_released(&self) -> bool {
        matches!(self.storage, Storage::Released)
    }

    #[inline]
    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            Err(HugeError::Released)
        } else {
            Ok(())
        }
    }

    /// Returns a clone of the element at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Result<T> {
        self.get_ref(index).cloned()
    }

    /// Returns a reference to the element at `index`.
    #[inline]
    pub fn get_ref(&self, index: usize) -> Result<&T> {
        match &self.storage {
            Storage::Single(page) => page
                .get(index)
                .ok_or(HugeError::out_of_bounds(index, self.size)),
            Storage::Paged { pages, layout } => {
                check_index(index, self.size)?;
                Ok(&pages[layout.page_index(index)][layout.index_in_page(index)])
            }
            Storage::Released => Err(HugeError::Released),
        }
    }

    /// Returns a mutable reference to the element at `index`.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        let size = self.size;
        match &mut self.storage {
            Storage::Single(page) => page
                .get_mut(index)
                .ok_or(HugeError::out_of_bounds(index, size)),
            Storage::Paged { pages, layout } => {
                check_index(index, size)?;
                Ok(&mut pages[layout.page_index(index)][layout.index_in_page(index)])
            }
            Storage::Released => Err(HugeError::Released),
        }
    }

    /// Overwrites the element at `index`.
    #[inline]
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        *self.get_mut(index)? = value;
        Ok(())
    }

    /// Overwrites every element with `generator(index)`, page by page in index order.
    pub fn set_all(&mut self, mut generator: impl FnMut(usize) -> T) -> Result<()> {
        self.ensure_live()?;
        let mut base = 0;
        for page in self.pages_mut() {
            for (offset, slot) in page.iter_mut().enumerate() {
                *slot = generator(base + offset);
            }
            base += page.len();
        }
        Ok(())
    }

    /// Overwrites every element with `value`.
    pub fn fill(&mut self, value: T) -> Result<()> {
        self.ensure_live()?;
        for page in self.pages_mut() {
            page.fill(value.clone());
        }
        Ok(())
    }

    /// Copies the first `min(length, size, dest.size)` elements into `dest` and
    /// resets every remaining slot of `dest` to the default value.
    pub fn copy_to(&self, dest: &mut HugeArray<T>, length: usize) -> Result<()> {
        self.ensure_live()?;
        dest.ensure_live()?;
        let length = length.min(self.size).min(dest.size);
        let mut copied = 0;
        while copied < length {
            let src = self.run(copied);
            let dst = dest.run_mut(copied);
            let len = src.len().min(dst.len()).min(length - copied);
            dst[..len].clone_from_slice(&src[..len]);
            copied += len;
        }
        let dest_size = dest.size;
        dest.fill_range(length, dest_size, T::default());
        Ok(())
    }

    /// Returns a new array of `new_length` holding a prefix copy of this one.
    pub fn copy_of(&self, new_length: usize) -> Result<Self> {
        self.copy_of_with(new_length, &HugeOptions::default())
    }

    /// Like [`copy_of`](Self::copy_of) with explicit options for the new array.
    pub fn copy_of_with(&self, new_length: usize, options: &HugeOptions) -> Result<Self> {
        self.ensure_live()?;
        let mut copy = Self::with_options(new_length, options)?;
        self.copy_to(&mut copy, new_length)?;
        Ok(copy)
    }

    fn fill_range(&mut self, start: usize, end: usize, value: T) {
        let mut index = start;
        while index < end {
            let run = self.run_mut(index);
            let len = run.len().min(end - index);
            run[..len].fill(value.clone());
            index += len;
        }
    }

    /// Contents as a flat vector.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.ensure_live()?;
        let mut out = allocate_vec::<T>(self.size)?;
        for page in self.pages() {
            out.extend_from_slice(page);
        }
        Ok(out)
    }

    /// Iterates elements in index order; a released array yields nothing.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.pages().iter().flat_map(|page| page.iter())
    }

    /// Drops all pages and returns the number of bytes freed.
    ///
    /// Subsequent calls return 0 and every later access fails with
    /// [`HugeError::Released`].
    pub fn release(&mut self) -> usize {
        if self.is_released() {
            return 0;
        }
        let freed = self.data_bytes();
        self.storage = Storage::Released;
        debug!(size = self.size, freed, "huge.array.release");
        freed
    }

    /// Measured footprint in bytes, instance included.
    pub fn size_of(&self) -> usize {
        size_of_instance::<Self>() + self.data_bytes()
    }

    fn data_bytes(&self) -> usize {
        match &self.storage {
            Storage::Single(page) => size_of_array::<T>(page.len()),
            Storage::Paged { pages, .. } => {
                size_of_page_table::<Box<[T]>>(pages.len())
                    + pages
                        .iter()
                        .map(|page| size_of_array::<T>(page.len()))
                        .sum::<usize>()
            }
            Storage::Released => 0,
        }
    }

    /// Footprint of an array of `size` created with default options.
    pub fn memory_estimation(size: usize) -> usize {
        Self::memory_estimation_with(size, &HugeOptions::default())
    }

    /// Footprint of an array of `size` created with `options`.
    ///
    /// Accounts for the instance, the page table (paged only), the full pages and
    /// the partial last page. Heap data owned by the elements is not included.
    pub fn memory_estimation_with(size: usize, options: &HugeOptions) -> usize {
        let instance = size_of_instance::<Self>();
        if options.fits_single_page(size) {
            return instance + size_of_array::<T>(size);
        }
        let layout = options.layout_for::<T>();
        let num_pages = layout.number_of_pages(size);
        if num_pages == 0 {
            return instance;
        }
        instance
            + size_of_page_table::<Box<[T]>>(num_pages)
            + (num_pages - 1) * size_of_array::<T>(layout.page_size())
            + size_of_array::<T>(layout.exclusive_index_of_page(size))
    }

    /// Cursor covering the whole array.
    pub fn new_cursor(&self) -> Result<HugeCursor<'_, T>> {
        let mut cursor = HugeCursor::empty();
        self.init_cursor(&mut cursor)?;
        Ok(cursor)
    }

    /// Points `cursor` at this array, covering all of it.
    pub fn init_cursor<'a>(&'a self, cursor: &mut HugeCursor<'a, T>) -> Result<()> {
        if cursor.is_closed() {
            return Err(HugeError::CursorClosed);
        }
        match &self.storage {
            Storage::Single(page) => cursor.retarget_single(page, self.size),
            Storage::Paged { pages, layout } => {
                cursor.retarget_paged(pages, layout.shift(), self.size)
            }
            Storage::Released => return Err(HugeError::Released),
        }
        Ok(())
    }

    /// Points `cursor` at `[start, end)` of this array.
    pub fn init_cursor_range<'a>(
        &'a self,
        cursor: &mut HugeCursor<'a, T>,
        start: usize,
        end: usize,
    ) -> Result<()> {
        check_range(start, end, self.size)?;
        self.init_cursor(cursor)?;
        cursor.set_range(start, end)
    }

    fn pages(&self) -> &[Box<[T]>] {
        match &self.storage {
            Storage::Single(page) => slice::from_ref(page),
            Storage::Paged { pages, .. } => pages,
            Storage::Released => &[],
        }
    }

    fn pages_mut(&mut self) -> &mut [Box<[T]>] {
        match &mut self.storage {
            Storage::Single(page) => slice::from_mut(page),
            Storage::Paged { pages, .. } => pages,
            Storage::Released => &mut [],
        }
    }

    /// Contiguous elements from `index` to the end of its page.
    fn run(&self, index: usize) -> &[T] {
        match &self.storage {
            Storage::Single(page) => &page[index..],
            Storage::Paged { pages, layout } => {
                &pages[layout.page_index(index)][layout.index_in_page(index)..]
            }
            Storage::Released => &[],
        }
    }

    fn run_mut(&mut self, index: usize) -> &mut [T] {
        match &mut self.storage {
            Storage::Single(page) => &mut page[index..],
            Storage::Paged { pages, layout } => {
                &mut pages[layout.page_index(index)][layout.index_in_page(index)..]
            }
            Storage::Released => &mut [],
        }
    }
}

impl<T: NumericElement> HugeArray<T> {
    /// Adds `delta` to the element at `index`. Fresh slots start at zero.
    #[inline]
    pub fn add_to(&mut self, index: usize, delta: T) -> Result<()> {
        let slot = self.get_mut(index)?;
        *slot = slot.add(delta);
        Ok(())
    }

    /// Returns the highest index `i` with `self[i] <= target` on an ascending array.
    ///
    /// This is a floor search, not a membership test: a missing `target` still
    /// yields the index of its largest predecessor. `None` means `target` is
    /// smaller than every element (or the array is empty).
    pub fn binary_search(&self, target: T) -> Result<Option<usize>> {
        self.ensure_live()?;
        let mut low = 0;
        let mut high = self.size;
        while low < high {
            let mid = low + (high - low) / 2;
            if self.run(mid)[0] <= target {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(low.checked_sub(1))
    }
}

impl<T: IntegerElement> HugeArray<T> {
    /// Bitwise-ors `mask` into the element at `index`.
    #[inline]
    pub fn or(&mut self, index: usize, mask: T) -> Result<()> {
        let slot = self.get_mut(index)?;
        *slot = slot.bit_or(mask);
        Ok(())
    }

    /// Bitwise-ands `mask` into the element at `index` and returns the result.
    #[inline]
    pub fn and(&mut self, index: usize, mask: T) -> Result<T> {
        let slot = self.get_mut(index)?;
        *slot = slot.bit_and(mask);
        Ok(*slot)
    }
}

impl<T: Element> HugeArray<Option<T>> {
    /// Returns the object at `index`, or `default` when the slot is unset.
    pub fn get_or(&self, index: usize, default: T) -> Result<T> {
        Ok(self.get_ref(index)?.clone().unwrap_or(default))
    }

    /// Stores `value` only if the slot at `index` is unset. Returns whether it was stored.
    pub fn set_if_absent(&mut self, index: usize, value: T) -> Result<bool> {
        let slot = self.get_mut(index)?;
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(value);
        Ok(true)
    }
}

impl<T: Element> fmt::Debug for HugeArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HugeArray")
            .field("size", &self.size)
            .field("representation", &self.representation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_pages() -> HugeOptions {
        HugeOptions::new()
            .page_size_in_bytes(64)
            .max_single_page_len(16)
    }

    #[test]
    fn picks_representation_by_size() {
        let opts = small_pages();
        let single = HugeLongArray::with_options(16, &opts).unwrap();
        let paged = HugeLongArray::with_options(17, &opts).unwrap();
        assert_eq!(single.representation(), Representation::Single);
        assert_eq!(paged.representation(), Representation::Paged);
        assert!(matches!(
            HugeLongArray::new_single_with(17, &opts),
            Err(HugeError::Capacity { requested: 17, max: 16 })
        ));
    }

    #[test]
    fn debug_reports_representation() {
        let mut array = HugeLongArray::new_paged(4).unwrap();
        assert_eq!(
            format!("{array:?}"),
            "HugeArray { size: 4, representation: Paged }"
        );
        array.release();
        assert!(format!("{array:?}").contains("Released"));
    }

    #[test]
    fn runs_stop_at_page_boundaries() {
        let opts = small_pages();
        let array = HugeLongArray::new_paged_with(20, &opts).unwrap();
        assert_eq!(array.run(0).len(), 8);
        assert_eq!(array.run(5).len(), 3);
        assert_eq!(array.run(16).len(), 4);
    }

    #[test]
    fn from_pages_rejects_ragged_tables() {
        let opts = small_pages();
        let pages = vec![vec![1i64; 8].into_boxed_slice(), vec![2i64; 3].into_boxed_slice()];
        let array = HugeLongArray::from_pages(pages, 11, &opts).unwrap();
        assert_eq!(array.get(10).unwrap(), 2);
        let ragged = vec![vec![1i64; 7].into_boxed_slice(), vec![2i64; 4].into_boxed_slice()];
        assert!(matches!(
            HugeLongArray::from_pages(ragged, 11, &opts),
            Err(HugeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn object_array_helpers() {
        let mut names: HugeObjectArray<String> = HugeArray::new(4).unwrap();
        assert_eq!(names.get_or(1, "none".into()).unwrap(), "none");
        assert!(names.set_if_absent(1, "a".into()).unwrap());
        assert!(!names.set_if_absent(1, "b".into()).unwrap());
        assert_eq!(names.get(1).unwrap().as_deref(), Some("a"));
    }
}
