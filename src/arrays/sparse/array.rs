use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::arrays::atomic::AtomicElement;
use crate::arrays::element::{Element, NumericElement};
use crate::arrays::options::HugeOptions;
use crate::arrays::sparse::drain::DrainingIterator;
use crate::arrays::sparse::{estimate_sparse, grow_table, table_bytes, PageSlot};
use crate::error::Result;
use crate::metrics::AllocationMetrics;
use crate::primitives::estimate::{size_of_array, size_of_instance, MemoryRange};
use crate::primitives::paging::{allocate_page_with, allocate_vec, PageLayout};

/// Immutable sparse array produced by [`HugeSparseArrayBuilder::build`].
pub struct HugeSparseArray<T> {
    pages: Box<[PageSlot<T>]>,
    layout: PageLayout,
    default_value: T,
}

impl<T: Element> HugeSparseArray<T> {
    /// Value at `index`, or the default when its page was never written.
    pub fn get(&self, index: usize) -> T {
        self.get_ref(index).clone()
    }

    /// Reference to the value at `index`, or to the default.
    pub fn get_ref(&self, index: usize) -> &T {
        match self.pages.get(self.layout.page_index(index)) {
            Some(Some(page)) => &page[self.layout.index_in_page(index)],
            _ => &self.default_value,
        }
    }

    /// Exclusive upper bound of the indices backed by the page table.
    pub fn capacity(&self) -> usize {
        self.layout.capacity_for(self.pages.len())
    }

    /// Value reported for indices that were never written.
    pub fn default_value(&self) -> &T {
        &self.default_value
    }

    /// Measured footprint in bytes.
    pub fn size_of(&self) -> usize {
        size_of_instance::<Self>() + table_bytes(&self.pages)
    }

    /// Footprint range of an array holding `max_entries` values below `max_index`.
    pub fn memory_estimation(max_index: usize, max_entries: usize) -> MemoryRange {
        Self::memory_estimation_with(max_index, max_entries, &HugeOptions::default())
    }

    /// Like [`memory_estimation`](Self::memory_estimation) with explicit page geometry.
    pub fn memory_estimation_with(
        max_index: usize,
        max_entries: usize,
        options: &HugeOptions,
    ) -> MemoryRange {
        estimate_sparse::<Self, T>(max_index, max_entries, options.layout_for::<T>())
    }

    /// Consumes the array into an iterator over its allocated pages.
    pub fn into_draining_iterator(self) -> DrainingIterator<T> {
        DrainingIterator::new(self.pages.into_vec(), self.layout.shift())
    }
}

impl<T: Element + PartialEq> HugeSparseArray<T> {
    /// Whether `index` lies in an allocated page and holds a non-default value.
    pub fn contains(&self, index: usize) -> bool {
        match self.pages.get(self.layout.page_index(index)) {
            Some(Some(page)) => page[self.layout.index_in_page(index)] != self.default_value,
            _ => false,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for HugeSparseArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HugeSparseArray")
            .field("pages", &self.pages.len())
            .field("allocated", &self.pages.iter().flatten().count())
            .field("default_value", &self.default_value)
            .finish()
    }
}

/// Thread-safe builder for [`HugeSparseArray`].
///
/// Writers share the builder by reference. Element updates are lock-free CAS
/// operations on atomic cells; the page table sits behind a read-write lock
/// whose write side is taken only to extend the table or publish a new page.
pub struct HugeSparseArrayBuilder<T: AtomicElement> {
    pages: RwLock<Vec<PageSlot<T::Atomic>>>,
    layout: PageLayout,
    default_value: T,
    metrics: Arc<dyn AllocationMetrics>,
}

impl<T: AtomicElement> HugeSparseArrayBuilder<T> {
    /// Empty builder reporting `default_value` for untouched indices.
    pub fn new(default_value: T) -> Self {
        let options = HugeOptions::default();
        Self {
            pages: RwLock::new(Vec::new()),
            layout: options.layout_for::<T::Atomic>(),
            default_value,
            metrics: options.metrics,
        }
    }

    /// Builder whose page table initially covers `initial_capacity` indices.
    ///
    /// Only the table is sized up front; pages are still allocated on first write.
    pub fn with_options(
        default_value: T,
        initial_capacity: usize,
        options: &HugeOptions,
    ) -> Result<Self> {
        let layout = options.layout_for::<T::Atomic>();
        let num_pages = layout.number_of_pages(initial_capacity);
        let mut pages = allocate_vec::<PageSlot<T::Atomic>>(num_pages)?;
        pages.resize_with(num_pages, || None);
        Ok(Self {
            pages: RwLock::new(pages),
            layout,
            default_value,
            metrics: Arc::clone(&options.metrics),
        })
    }

    /// Value at `index`, or the default when its page was never written.
    pub fn get(&self, index: usize) -> T {
        let pages = self.pages.read();
        match pages.get(self.layout.page_index(index)) {
            Some(Some(page)) => T::load(&page[self.layout.index_in_page(index)]),
            _ => self.default_value,
        }
    }

    /// Whether `index` lies in an allocated page and holds a non-default value.
    pub fn contains(&self, index: usize) -> bool {
        let pages = self.pages.read();
        match pages.get(self.layout.page_index(index)) {
            Some(Some(page)) => {
                T::load(&page[self.layout.index_in_page(index)]) != self.default_value
            }
            _ => false,
        }
    }

    /// Stores `value` at `index`, allocating its page if needed.
    pub fn set(&self, index: usize, value: T) -> Result<()> {
        self.with_cell(index, |cell| T::store(cell, value))
    }

    /// Stores `value` only if the slot still holds the default; returns whether it did.
    ///
    /// The check and the store are one compare-and-exchange.
    pub fn set_if_absent(&self, index: usize, value: T) -> Result<bool> {
        let default_value = self.default_value;
        self.with_cell(index, |cell| {
            T::compare_exchange(cell, default_value, value).is_ok()
        })
    }

    /// Exclusive upper bound of the indices backed by the page table.
    pub fn capacity(&self) -> usize {
        self.layout.capacity_for(self.pages.read().len())
    }

    /// Value reported for indices that were never written.
    pub fn default_value(&self) -> T {
        self.default_value
    }

    /// Snapshot of the current contents.
    ///
    /// Cells are copied page by page, so writes racing with `build` may or may
    /// not be visible. The builder remains usable afterwards.
    pub fn build(&self) -> Result<HugeSparseArray<T>> {
        let pages = self.pages.read();
        let mut snapshot = allocate_vec::<PageSlot<T>>(pages.len())?;
        for slot in pages.iter() {
            let copy = match slot {
                Some(page) => {
                    let mut cells = page.iter();
                    let default_value = self.default_value;
                    Some(allocate_page_with(page.len(), || {
                        cells.next().map_or(default_value, T::load)
                    })?)
                }
                None => None,
            };
            snapshot.push(copy);
        }
        Ok(HugeSparseArray {
            pages: snapshot.into_boxed_slice(),
            layout: self.layout,
            default_value: self.default_value,
        })
    }

    /// Measured footprint in bytes.
    pub fn size_of(&self) -> usize {
        size_of_instance::<Self>() + table_bytes(&self.pages.read())
    }

    /// Runs `op` on the cell of `index` under the read lock, first allocating
    /// the page if it is missing.
    fn with_cell<R>(&self, index: usize, op: impl FnOnce(&T::Atomic) -> R) -> Result<R> {
        let page_index = self.layout.page_index(index);
        let offset = self.layout.index_in_page(index);
        loop {
            {
                let pages = self.pages.read();
                if let Some(Some(page)) = pages.get(page_index) {
                    return Ok(op(&page[offset]));
                }
            }
            self.allocate_page(page_index)?;
        }
    }

    fn allocate_page(&self, page_index: usize) -> Result<()> {
        let mut pages = self.pages.write();
        grow_table(&mut pages, page_index, self.metrics.as_ref())?;
        let slot = &mut pages[page_index];
        if slot.is_none() {
            let page_size = self.layout.page_size();
            let default_value = self.default_value;
            *slot = Some(allocate_page_with(page_size, || T::new_atomic(default_value))?);
            self.metrics
                .pages_allocated(1, size_of_array::<T::Atomic>(page_size));
        }
        Ok(())
    }
}

impl<T: AtomicElement + NumericElement> HugeSparseArrayBuilder<T> {
    /// Atomically adds `delta` to the slot at `index` and returns the new value.
    ///
    /// Untouched slots start from the default value.
    pub fn add_to(&self, index: usize, delta: T) -> Result<T> {
        self.with_cell(index, |cell| {
            let mut current = T::load(cell);
            loop {
                let next = current.add(delta);
                match T::compare_exchange_weak(cell, current, next) {
                    Ok(_) => return next,
                    Err(witness) => current = witness,
                }
            }
        })
    }
}

impl<T: AtomicElement + fmt::Debug> fmt::Debug for HugeSparseArrayBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HugeSparseArrayBuilder")
            .field("capacity", &self.capacity())
            .field("default_value", &self.default_value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::estimate::size_of_page_table;

    fn tiny_pages() -> HugeOptions {
        HugeOptions::new().page_size_in_bytes(32)
    }

    #[test]
    fn untouched_slots_read_default() {
        let builder = HugeSparseArrayBuilder::<i64>::new(-1);
        assert_eq!(builder.get(5), -1);
        assert!(!builder.contains(5));
        builder.set(5, 42).unwrap();
        assert_eq!(builder.get(5), 42);
        assert!(builder.contains(5));
        assert!(!builder.contains(4));
        assert_eq!(builder.get(1 << 40), -1);
    }

    #[test]
    fn capacity_grows_to_power_of_two_pages() {
        let builder = HugeSparseArrayBuilder::<i64>::with_options(0, 0, &tiny_pages()).unwrap();
        assert_eq!(builder.capacity(), 0);
        builder.set(9, 1).unwrap();
        assert_eq!(builder.capacity(), 4 * 4);
        builder.set(100, 1).unwrap();
        assert_eq!(builder.capacity(), 32 * 4);
    }

    #[test]
    fn build_is_a_snapshot() {
        let builder = HugeSparseArrayBuilder::<i32>::with_options(0, 0, &tiny_pages()).unwrap();
        builder.set(3, 7).unwrap();
        let first = builder.build().unwrap();
        builder.set(3, 8).unwrap();
        builder.add_to(40, 2).unwrap();
        let second = builder.build().unwrap();
        assert_eq!(first.get(3), 7);
        assert_eq!(first.get(40), 0);
        assert_eq!(second.get(3), 8);
        assert_eq!(second.get(40), 2);
        assert!(second.capacity() > first.capacity());
    }

    #[test]
    fn set_if_absent_only_replaces_default() {
        let builder = HugeSparseArrayBuilder::<u64>::new(0);
        assert!(builder.set_if_absent(1, 3).unwrap());
        assert!(!builder.set_if_absent(1, 4).unwrap());
        assert_eq!(builder.get(1), 3);
    }

    #[test]
    fn size_of_counts_allocated_pages() {
        let builder = HugeSparseArrayBuilder::<i64>::with_options(0, 0, &tiny_pages()).unwrap();
        builder.set(0, 1).unwrap();
        let array = builder.build().unwrap();
        assert_eq!(
            array.size_of(),
            size_of_instance::<HugeSparseArray<i64>>()
                + size_of_page_table::<PageSlot<i64>>(1)
                + 4 * 8
        );
    }
}
