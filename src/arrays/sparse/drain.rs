use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::arrays::sparse::PageSlot;

/// Page handed out by [`DrainingIterator::drain`].
#[derive(Debug)]
pub struct DrainingBatch<T> {
    page: Box<[T]>,
    offset: usize,
}

impl<T> DrainingBatch<T> {
    /// Empty batch, filled by the next successful `drain` call.
    pub fn new() -> Self {
        Self {
            page: Box::default(),
            offset: 0,
        }
    }

    /// Elements of the drained page.
    pub fn page(&self) -> &[T] {
        &self.page
    }

    /// Global index of `page()[0]`.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Takes ownership of the drained page, leaving the batch empty.
    pub fn take_page(&mut self) -> Box<[T]> {
        std::mem::take(&mut self.page)
    }
}

impl<T> Default for DrainingBatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumes the pages of a sparse structure exactly once.
///
/// Consumers share one iterator by reference and call [`drain`](Self::drain)
/// until it returns `false`. Each call claims the next page ticket atomically, so
/// no page is delivered twice and none is skipped regardless of how many
/// threads pull concurrently. Pages that were never allocated are passed over.
pub struct DrainingIterator<T> {
    pages: Box<[Mutex<PageSlot<T>>]>,
    next_page: AtomicUsize,
    shift: u32,
}

impl<T> DrainingIterator<T> {
    pub(crate) fn new(pages: impl IntoIterator<Item = PageSlot<T>>, shift: u32) -> Self {
        Self {
            pages: pages.into_iter().map(Mutex::new).collect(),
            next_page: AtomicUsize::new(0),
            shift,
        }
    }

    /// Moves the next allocated page into `batch`.
    ///
    /// Returns `false` once every page was handed out, and on every call after that.
    pub fn drain(&self, batch: &mut DrainingBatch<T>) -> bool {
        loop {
            let page_index = self.next_page.fetch_add(1, Ordering::AcqRel);
            let Some(slot) = self.pages.get(page_index) else {
                // Pin the ticket so repeated calls cannot wrap around.
                self.next_page.store(self.pages.len(), Ordering::Release);
                return false;
            };
            if let Some(page) = slot.lock().take() {
                batch.page = page;
                batch.offset = page_index << self.shift;
                return true;
            }
        }
    }

    /// Number of page slots, allocated or not, in the drained table.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_unallocated_pages() {
        let pages = vec![
            Some(vec![1u32, 2].into_boxed_slice()),
            None,
            Some(vec![5u32, 6].into_boxed_slice()),
        ];
        let iter = DrainingIterator::new(pages, 1);
        let mut batch = DrainingBatch::new();
        let mut seen = Vec::new();
        while iter.drain(&mut batch) {
            seen.push((batch.offset(), batch.page().to_vec()));
        }
        assert_eq!(seen, vec![(0, vec![1, 2]), (4, vec![5, 6])]);
        assert!(!iter.drain(&mut batch));
    }
}
