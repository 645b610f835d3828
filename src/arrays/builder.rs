//! Growable page table for assembling a [`HugeArray`] from bulk writes.

use std::fmt;

use tracing::debug;

use crate::arrays::dense::HugeArray;
use crate::arrays::element::Element;
use crate::arrays::options::HugeOptions;
use crate::error::{HugeError, Result};
use crate::primitives::estimate::size_of_array;
use crate::primitives::paging::{allocate_page, PageLayout};

/// Collects values into full-size pages and freezes them into a paged [`HugeArray`].
///
/// Growth allocates every new page before the page table is touched. If an
/// allocation fails, the builder keeps its previous pages and returns
/// [`HugeError::Allocation`].
pub struct HugeArrayBuilder<T> {
    pages: Vec<Box<[T]>>,
    layout: PageLayout,
    size: usize,
    options: HugeOptions,
}

impl<T: Element> HugeArrayBuilder<T> {
    /// Empty builder with default options.
    pub fn new() -> Self {
        Self::with_options(&HugeOptions::default())
    }

    /// Empty builder laying out pages by `options`.
    pub fn with_options(options: &HugeOptions) -> Self {
        Self {
            pages: Vec::new(),
            layout: options.layout_for::<T>(),
            size: 0,
            options: options.clone(),
        }
    }

    /// Writes `values` starting at global index `start`, growing as needed.
    pub fn allocate(&mut self, start: usize, values: &[T]) -> Result<()> {
        let end = start.checked_add(values.len()).ok_or_else(|| {
            HugeError::InvalidArgument(format!("range {start}+{} overflows", values.len()))
        })?;
        self.ensure_capacity(end)?;

        let mut written = 0;
        while written < values.len() {
            let index = start + written;
            let page = &mut self.pages[self.layout.page_index(index)];
            let offset = self.layout.index_in_page(index);
            let len = (page.len() - offset).min(values.len() - written);
            page[offset..offset + len].clone_from_slice(&values[written..written + len]);
            written += len;
        }
        self.size = self.size.max(end);
        Ok(())
    }

    fn ensure_capacity(&mut self, capacity: usize) -> Result<()> {
        let old_pages = self.pages.len();
        let new_pages = self.layout.number_of_pages(capacity);
        if new_pages <= old_pages {
            return Ok(());
        }
        let page_size = self.layout.page_size();
        let mut staged: Vec<Box<[T]>> = Vec::new();
        staged
            .try_reserve_exact(new_pages - old_pages)
            .map_err(|_| HugeError::Allocation {
                bytes: size_of_array::<Box<[T]>>(new_pages - old_pages),
            })?;
        for _ in old_pages..new_pages {
            staged.push(allocate_page(page_size, T::default())?);
        }
        self.pages
            .try_reserve_exact(staged.len())
            .map_err(|_| HugeError::Allocation {
                bytes: size_of_array::<Box<[T]>>(staged.len()),
            })?;
        self.pages.append(&mut staged);

        let added = new_pages - old_pages;
        let metrics = &self.options.metrics;
        metrics.pages_allocated(added, added * size_of_array::<T>(page_size));
        metrics.page_table_grown(old_pages, new_pages);
        debug!(old_pages, new_pages, page_size, "huge.builder.grow");
        Ok(())
    }

    /// Number of indices covered by allocated pages.
    pub fn capacity(&self) -> usize {
        self.layout.capacity_for(self.pages.len())
    }

    /// One past the highest index written so far.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Freezes the first `size` elements into a paged [`HugeArray`].
    ///
    /// Indices never written hold the default value. Pages beyond `size` are
    /// dropped and the last page is shrunk to the remainder.
    pub fn build(mut self, size: usize) -> Result<HugeArray<T>> {
        self.ensure_capacity(size)?;
        let num_pages = self.layout.number_of_pages(size);
        self.pages.truncate(num_pages);
        if let Some(last) = self.pages.last_mut() {
            let last_len = self.layout.exclusive_index_of_page(size);
            if last.len() != last_len {
                *last = last[..last_len].to_vec().into_boxed_slice();
            }
        }
        HugeArray::from_pages(self.pages, size, &self.options)
    }
}

impl<T: Element> Default for HugeArrayBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HugeArrayBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HugeArrayBuilder")
            .field("pages", &self.pages.len())
            .field("size", &self.size)
            .finish()
    }
}
