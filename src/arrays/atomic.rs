//! Lock-free huge arrays.
//!
//! [`HugeAtomicArray`] uses the same page layout as [`HugeArray`] but stores
//! every element in a std atomic cell. Plain `get`/`set` are atomic loads and
//! stores; every read-modify-write operation runs one read-compute-CAS loop:
//! read the current value, compute the candidate, compare-and-exchange, and on
//! failure retry with the freshly observed value. Updates to one slot are
//! linearizable; nothing is ordered across different slots.

use std::fmt;
use std::slice;
use std::sync::atomic::{
    AtomicI16, AtomicI32, AtomicI64, AtomicI8, AtomicU32, AtomicU64, AtomicU8, Ordering,
};

use tracing::debug;

use crate::arrays::cursor::HugeCursor;
use crate::arrays::dense::{HugeArray, Representation};
use crate::arrays::element::{Element, IntegerElement, NumericElement};
use crate::arrays::options::HugeOptions;
use crate::error::{check_index, HugeError, Result};
use crate::primitives::estimate::{size_of_array, size_of_instance, size_of_page_table};
use crate::primitives::paging::{allocate_page_with, allocate_vec, PageLayout};

/// Value type with a matching atomic cell.
///
/// Floating point values are stored by bit pattern, so compare-and-exchange
/// compares bits rather than numeric equality.
pub trait AtomicElement: Element + Copy + PartialEq {
    /// Atomic storage cell.
    type Atomic: Send + Sync + 'static;

    /// New cell holding `value`.
    fn new_atomic(value: Self) -> Self::Atomic;

    /// Atomic load.
    fn load(cell: &Self::Atomic) -> Self;

    /// Atomic store.
    fn store(cell: &Self::Atomic, value: Self);

    /// Strong compare-and-exchange; `Err` carries the witnessed value.
    fn compare_exchange(cell: &Self::Atomic, current: Self, new: Self) -> CasResult<Self>;

    /// Weak compare-and-exchange, allowed to fail spuriously inside retry loops.
    fn compare_exchange_weak(cell: &Self::Atomic, current: Self, new: Self) -> CasResult<Self>;
}

/// Outcome of a compare-and-exchange: `Ok(previous)` or `Err(witness)`.
pub type CasResult<T> = std::result::Result<T, T>;

macro_rules! atomic_integer {
    ($($ty:ty => $atomic:ty),*) => {$(
        impl AtomicElement for $ty {
            type Atomic = $atomic;

            #[inline]
            fn new_atomic(value: Self) -> Self::Atomic {
                <$atomic>::new(value)
            }

            #[inline]
            fn load(cell: &Self::Atomic) -> Self {
                cell.load(Ordering::Acquire)
            }

            #[inline]
            fn store(cell: &Self::Atomic, value: Self) {
                cell.store(value, Ordering::Release)
            }

            #[inline]
            fn compare_exchange(cell: &Self::Atomic, current: Self, new: Self) -> CasResult<Self> {
                cell.compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            }

            #[inline]
            fn compare_exchange_weak(cell: &Self::Atomic, current: Self, new: Self) -> CasResult<Self> {
                cell.compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire)
            }
        }
    )*};
}

macro_rules! atomic_float {
    ($($ty:ty => $atomic:ty),*) => {$(
        impl AtomicElement for $ty {
            type Atomic = $atomic;

            #[inline]
            fn new_atomic(value: Self) -> Self::Atomic {
                <$atomic>::new(value.to_bits())
            }

            #[inline]
            fn load(cell: &Self::Atomic) -> Self {
                <$ty>::from_bits(cell.load(Ordering::Acquire))
            }

            #[inline]
            fn store(cell: &Self::Atomic, value: Self) {
                cell.store(value.to_bits(), Ordering::Release)
            }

            #[inline]
            fn compare_exchange(cell: &Self::Atomic, current: Self, new: Self) -> CasResult<Self> {
                cell.compare_exchange(
                    current.to_bits(),
                    new.to_bits(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .map(<$ty>::from_bits)
                .map_err(<$ty>::from_bits)
            }

            #[inline]
            fn compare_exchange_weak(cell: &Self::Atomic, current: Self, new: Self) -> CasResult<Self> {
                cell.compare_exchange_weak(
                    current.to_bits(),
                    new.to_bits(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .map(<$ty>::from_bits)
                .map_err(<$ty>::from_bits)
            }
        }
    )*};
}

atomic_integer!(
    i8 => AtomicI8,
    i16 => AtomicI16,
    i32 => AtomicI32,
    i64 => AtomicI64,
    u8 => AtomicU8,
    u32 => AtomicU32,
    u64 => AtomicU64
);
atomic_float!(f32 => AtomicU32, f64 => AtomicU64);

enum Storage<A> {
    Single(Box<[A]>),
    Paged {
        pages: Box<[Box<[A]>]>,
        layout: PageLayout,
    },
    Released,
}

/// Fixed-size huge array with lock-free element updates.
pub struct HugeAtomicArray<T: AtomicElement> {
    size: usize,
    storage: Storage<T::Atomic>,
}

/// Atomic huge array of `i64`.
pub type HugeAtomicLongArray = HugeAtomicArray<i64>;
/// Atomic huge array of `i32`.
pub type HugeAtomicIntArray = HugeAtomicArray<i32>;
/// Atomic huge array of `f64`.
pub type HugeAtomicDoubleArray = HugeAtomicArray<f64>;

impl<T: AtomicElement> HugeAtomicArray<T> {
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

    /// Forces the single-page representation with default options.
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
        let page = allocate_page_with(size, || T::new_atomic(T::default()))?;
        options
            .metrics
            .pages_allocated(1, size_of_array::<T::Atomic>(size));
        debug!(size, representation = "single", "huge.atomic.allocate");
        Ok(Self {
            size,
            storage: Storage::Single(page),
        })
    }

    /// Forces the paged representation with default options.
    pub fn new_paged(size: usize) -> Result<Self> {
        Self::new_paged_with(size, &HugeOptions::default())
    }

    /// Forces the paged representation using `options` for page geometry.
    pub fn new_paged_with(size: usize, options: &HugeOptions) -> Result<Self> {
        let layout = options.layout_for::<T::Atomic>();
        let num_pages = layout.number_of_pages(size);
        let mut pages = allocate_vec::<Box<[T::Atomic]>>(num_pages)?;
        for page_index in 0..num_pages {
            let len = if page_index + 1 == num_pages {
                layout.exclusive_index_of_page(size)
            } else {
                layout.page_size()
            };
            pages.push(allocate_page_with(len, || T::new_atomic(T::default()))?);
        }
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
            bytes,
            representation = "paged",
            "huge.atomic.allocate"
        );
        Ok(array)
    }

    /// Creates an array holding `values`.
    pub fn from_values(values: &[T]) -> Result<Self> {
        let array = Self::new(values.len())?;
        for (index, value) in values.iter().enumerate() {
            array.set(index, *value)?;
        }
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

    #[inline]
    fn cell(&self, index: usize) -> Result<&T::Atomic> {
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

    /// Atomic load of the element at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Result<T> {
        Ok(T::load(self.cell(index)?))
    }

    /// Atomic store of `value` at `index`.
    #[inline]
    pub fn set(&self, index: usize, value: T) -> Result<()> {
        T::store(self.cell(index)?, value);
        Ok(())
    }

    /// Stores `update` if the slot holds `expected`; returns whether it did.
    pub fn compare_and_set(&self, index: usize, expected: T, update: T) -> Result<bool> {
        Ok(T::compare_exchange(self.cell(index)?, expected, update).is_ok())
    }

    /// Stores `update` if the slot holds `expected` and returns the value
    /// witnessed before the attempt; the exchange succeeded iff it equals `expected`.
    pub fn compare_and_exchange(&self, index: usize, expected: T, update: T) -> Result<T> {
        match T::compare_exchange(self.cell(index)?, expected, update) {
            Ok(previous) | Err(previous) => Ok(previous),
        }
    }

    /// Read-compute-CAS loop; returns `(previous, stored)`.
    fn cas_loop(&self, index: usize, mut f: impl FnMut(T) -> T) -> Result<(T, T)> {
        let cell = self.cell(index)?;
        let mut current = T::load(cell);
        loop {
            let next = f(current);
            match T::compare_exchange_weak(cell, current, next) {
                Ok(_) => return Ok((current, next)),
                Err(witness) => current = witness,
            }
        }
    }

    /// Atomically replaces the slot with `f(current)` and returns the new value.
    ///
    /// `f` may run several times under contention and must be side-effect free.
    pub fn update(&self, index: usize, f: impl FnMut(T) -> T) -> Result<T> {
        self.cas_loop(index, f).map(|(_, next)| next)
    }

    /// Atomically replaces the slot with `f(current)` and returns the previous value.
    pub fn get_and_update(&self, index: usize, f: impl FnMut(T) -> T) -> Result<T> {
        self.cas_loop(index, f).map(|(previous, _)| previous)
    }

    /// Atomically stores `value` and returns the previous value.
    pub fn get_and_replace(&self, index: usize, value: T) -> Result<T> {
        self.get_and_update(index, |_| value)
    }

    /// Stores `value` into every slot. Not atomic as a whole.
    pub fn set_all(&self, value: T) -> Result<()> {
        self.ensure_live()?;
        for page in self.pages() {
            for cell in page.iter() {
                T::store(cell, value);
            }
        }
        Ok(())
    }

    /// Copies the first `min(length, size, dest.size)` elements into `dest` and
    /// resets every remaining slot of `dest` to the default value.
    pub fn copy_to(&self, dest: &HugeAtomicArray<T>, length: usize) -> Result<()> {
        self.ensure_live()?;
        dest.ensure_live()?;
        let length = length.min(self.size).min(dest.size);
        for index in 0..length {
            dest.set(index, self.get(index)?)?;
        }
        for index in length..dest.size {
            dest.set(index, T::default())?;
        }
        Ok(())
    }

    /// Snapshot into a plain [`HugeArray`] with the same size.
    pub fn to_huge_array(&self) -> Result<HugeArray<T>> {
        self.to_huge_array_with(&HugeOptions::default())
    }

    /// Snapshot into a plain [`HugeArray`] created with `options`.
    pub fn to_huge_array_with(&self, options: &HugeOptions) -> Result<HugeArray<T>> {
        self.ensure_live()?;
        let mut dense = HugeArray::with_options(self.size, options)?;
        let mut cursor = self.new_cursor()?;
        while cursor.next() {
            let base = cursor.base();
            for offset in cursor.offset()..cursor.limit() {
                dense.set(base + offset, T::load(&cursor.array()[offset]))?;
            }
        }
        Ok(dense)
    }

    /// Cursor over the atomic cells, covering the whole array.
    pub fn new_cursor(&self) -> Result<HugeCursor<'_, T::Atomic>> {
        let mut cursor = HugeCursor::empty();
        self.init_cursor(&mut cursor)?;
        Ok(cursor)
    }

    /// Points `cursor` at this array, covering all of it.
    pub fn init_cursor<'a>(&'a self, cursor: &mut HugeCursor<'a, T::Atomic>) -> Result<()> {
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

    /// Drops all pages and returns the number of bytes freed; 0 on later calls.
    pub fn release(&mut self) -> usize {
        if matches!(self.storage, Storage::Released) {
            return 0;
        }
        let freed = self.data_bytes();
        self.storage = Storage::Released;
        debug!(size = self.size, freed, "huge.atomic.release");
        freed
    }

    /// Measured footprint in bytes, instance included.
    pub fn size_of(&self) -> usize {
        size_of_instance::<Self>() + self.data_bytes()
    }

    /// Footprint of an array of `size` created with default options.
    pub fn memory_estimation(size: usize) -> usize {
        Self::memory_estimation_with(size, &HugeOptions::default())
    }

    /// Footprint of an array of `size` created with `options`.
    pub fn memory_estimation_with(size: usize, options: &HugeOptions) -> usize {
        let instance = size_of_instance::<Self>();
        if options.fits_single_page(size) {
            return instance + size_of_array::<T::Atomic>(size);
        }
        let layout = options.layout_for::<T::Atomic>();
        let num_pages = layout.number_of_pages(size);
        if num_pages == 0 {
            return instance;
        }
        instance
            + size_of_page_table::<Box<[T::Atomic]>>(num_pages)
            + (num_pages - 1) * size_of_array::<T::Atomic>(layout.page_size())
            + size_of_array::<T::Atomic>(layout.exclusive_index_of_page(size))
    }

    fn data_bytes(&self) -> usize {
        match &self.storage {
            Storage::Single(page) => size_of_array::<T::Atomic>(page.len()),
            Storage::Paged { pages, .. } => {
                size_of_page_table::<Box<[T::Atomic]>>(pages.len())
                    + pages
                        .iter()
                        .map(|page| size_of_array::<T::Atomic>(page.len()))
                        .sum::<usize>()
            }
            Storage::Released => 0,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        match self.storage {
            Storage::Released => Err(HugeError::Released),
            _ => Ok(()),
        }
    }

    fn pages(&self) -> &[Box<[T::Atomic]>] {
        match &self.storage {
            Storage::Single(page) => slice::from_ref(page),
            Storage::Paged { pages, .. } => pages,
            Storage::Released => &[],
        }
    }
}

impl<T: AtomicElement + NumericElement> HugeAtomicArray<T> {
    /// Atomically adds `delta` and returns the previous value.
    pub fn get_and_add(&self, index: usize, delta: T) -> Result<T> {
        self.get_and_update(index, |current| current.add(delta))
    }

    /// Atomically adds `delta` and returns the new value.
    pub fn add_to(&self, index: usize, delta: T) -> Result<T> {
        self.update(index, |current| current.add(delta))
    }
}

impl<T: AtomicElement + IntegerElement> HugeAtomicArray<T> {
    /// Atomically ors `mask` into the slot and returns the new value.
    pub fn or(&self, index: usize, mask: T) -> Result<T> {
        self.update(index, |current| current.bit_or(mask))
    }

    /// Atomically ands `mask` into the slot and returns the new value.
    pub fn and(&self, index: usize, mask: T) -> Result<T> {
        self.update(index, |current| current.bit_and(mask))
    }

    /// Atomically xors `mask` into the slot and returns the previous value.
    pub fn get_and_xor(&self, index: usize, mask: T) -> Result<T> {
        self.get_and_update(index, |current| current.bit_xor(mask))
    }
}

impl<T: AtomicElement> fmt::Debug for HugeAtomicArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HugeAtomicArray")
            .field("size", &self.size)
            .field("representation", &self.representation())
            .finish()
    }
}
