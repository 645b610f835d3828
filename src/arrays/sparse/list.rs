use std::fmt;
use std::mem;
use std::sync::Arc;

use crate::arrays::element::{Element, NumericElement};
use crate::arrays::options::HugeOptions;
use crate::arrays::sparse::drain::DrainingIterator;
use crate::arrays::sparse::{estimate_sparse, grow_table, table_bytes, PageSlot};
use crate::error::Result;
use crate::metrics::AllocationMetrics;
use crate::primitives::estimate::{size_of_array, size_of_instance, MemoryRange};
use crate::primitives::paging::{allocate_page, allocate_vec, PageLayout};

/// Mutable sparse list for a single writer.
///
/// Pages are allocated on the first write that touches them. Reads never fail:
/// untouched indices, including those beyond [`capacity`](Self::capacity),
/// report the default value.
pub struct HugeSparseList<T> {
    pages: Vec<PageSlot<T>>,
    layout: PageLayout,
    default_value: T,
    metrics: Arc<dyn AllocationMetrics>,
}

impl<T: Element + PartialEq> HugeSparseList<T> {
    /// Empty list reporting `default_value` for untouched indices.
    pub fn new(default_value: T) -> Self {
        let options = HugeOptions::default();
        Self {
            pages: Vec::new(),
            layout: options.layout_for::<T>(),
            default_value,
            metrics: options.metrics,
        }
    }

    /// List whose page table initially covers `initial_capacity` indices.
    pub fn with_options(
        default_value: T,
        initial_capacity: usize,
        options: &HugeOptions,
    ) -> Result<Self> {
        let layout = options.layout_for::<T>();
        let num_pages = layout.number_of_pages(initial_capacity);
        let mut pages = allocate_vec::<PageSlot<T>>(num_pages)?;
        pages.resize_with(num_pages, || None);
        Ok(Self {
            pages,
            layout,
            default_value,
            metrics: Arc::clone(&options.metrics),
        })
    }

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

    /// Whether `index` lies in an allocated page and holds a non-default value.
    pub fn contains(&self, index: usize) -> bool {
        match self.pages.get(self.layout.page_index(index)) {
            Some(Some(page)) => page[self.layout.index_in_page(index)] != self.default_value,
            _ => false,
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

    /// Stores `value` at `index`, allocating its page if needed.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        *self.slot_mut(index)? = value;
        Ok(())
    }

    /// Stores `value` only if the slot holds the default; returns whether it did.
    pub fn set_if_absent(&mut self, index: usize, value: T) -> Result<bool> {
        if self.contains(index) {
            return Ok(false);
        }
        self.set(index, value)?;
        Ok(true)
    }

    /// Calls `consumer` for every non-default value in index order.
    ///
    /// Only allocated pages are visited.
    pub fn for_all(&self, mut consumer: impl FnMut(usize, &T)) {
        for (page_index, page) in self.pages.iter().enumerate() {
            let Some(page) = page else { continue };
            let base = self.layout.base_of(page_index);
            for (offset, value) in page.iter().enumerate() {
                if *value != self.default_value {
                    consumer(base + offset, value);
                }
            }
        }
    }

    /// Moves every page into a [`DrainingIterator`].
    ///
    /// The list is left empty and reports the default value everywhere.
    pub fn draining_iterator(&mut self) -> DrainingIterator<T> {
        let pages = mem::take(&mut self.pages);
        DrainingIterator::new(pages, self.layout.shift())
    }

    /// Measured footprint in bytes.
    pub fn size_of(&self) -> usize {
        size_of_instance::<Self>() + table_bytes(&self.pages)
    }

    /// Footprint range of a list holding `max_entries` values below `max_index`.
    pub fn memory_estimation(max_index: usize, max_entries: usize) -> MemoryRange {
        estimate_sparse::<Self, T>(
            max_index,
            max_entries,
            HugeOptions::default().layout_for::<T>(),
        )
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut T> {
        let page_index = self.layout.page_index(index);
        grow_table(&mut self.pages, page_index, self.metrics.as_ref())?;
        let slot = &mut self.pages[page_index];
        let page = match slot.take() {
            Some(page) => page,
            None => {
                let page_size = self.layout.page_size();
                let page = allocate_page(page_size, self.default_value.clone())?;
                self.metrics.pages_allocated(1, size_of_array::<T>(page_size));
                page
            }
        };
        let page = slot.insert(page);
        Ok(&mut page[self.layout.index_in_page(index)])
    }
}

impl<T: NumericElement> HugeSparseList<T> {
    /// Adds `delta` to the value at `index`; untouched slots start from the default.
    pub fn add_to(&mut self, index: usize, delta: T) -> Result<()> {
        let slot = self.slot_mut(index)?;
        *slot = slot.add(delta);
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for HugeSparseList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HugeSparseList")
            .field("pages", &self.pages.len())
            .field("allocated", &self.pages.iter().flatten().count())
            .field("default_value", &self.default_value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::sparse::DrainingBatch;

    fn tiny_pages() -> HugeOptions {
        HugeOptions::new().page_size_in_bytes(32)
    }

    #[test]
    fn writes_allocate_whole_pages() {
        let mut list = HugeSparseList::with_options(-1i64, 0, &tiny_pages()).unwrap();
        list.set(5, 42).unwrap();
        assert_eq!(list.get(5), 42);
        assert!(list.contains(5));
        assert!(!list.contains(4));
        assert_eq!(list.get(4), -1);
        assert_eq!(list.capacity(), 8);
        assert_eq!(list.get(1_000_000), -1);
    }

    #[test]
    fn add_to_starts_from_default() {
        let mut list = HugeSparseList::new(10u32);
        list.add_to(3, 5).unwrap();
        list.add_to(3, 5).unwrap();
        assert_eq!(list.get(3), 20);
        assert!(!list.set_if_absent(3, 1).unwrap());
        assert!(list.set_if_absent(4, 1).unwrap());
    }

    #[test]
    fn for_all_skips_defaults() {
        let mut list = HugeSparseList::with_options(0i32, 0, &tiny_pages()).unwrap();
        list.set(2, 9).unwrap();
        list.set(17, 4).unwrap();
        let mut seen = Vec::new();
        list.for_all(|index, value| seen.push((index, *value)));
        assert_eq!(seen, vec![(2, 9), (17, 4)]);
    }

    #[test]
    fn draining_empties_the_list() {
        let mut list = HugeSparseList::with_options(0i64, 0, &tiny_pages()).unwrap();
        list.set(1, 1).unwrap();
        list.set(9, 2).unwrap();
        let drain = list.draining_iterator();
        assert_eq!(list.get(1), 0);
        assert!(!list.contains(9));
        assert_eq!(list.capacity(), 0);

        let mut batch = DrainingBatch::new();
        let mut offsets = Vec::new();
        while drain.drain(&mut batch) {
            offsets.push(batch.offset());
        }
        assert_eq!(offsets, vec![0, 8]);
    }
}
