//! Page-at-a-time cursors over huge arrays.
//!
//! A cursor exposes one page per [`HugeCursor::next`] call together with the
//! valid `[offset, limit)` window inside it and the global index of the page's
//! first element. Traversal is zero-copy: callers read `array()[offset..limit]`
//! directly.
//!
//! ```text
//! for each cursor.next():
//!     for i in cursor.offset()..cursor.limit():
//!         global index = cursor.base() + i
//! ```
//!
//! Cursors borrow the page table and never own it. They are not shared across
//! threads; each worker keeps its own and re-points it with
//! `init_cursor`/`set_range` before every scan.

use crate::error::{check_range, HugeError, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CursorState {
    Unpositioned,
    Positioned,
    Exhausted,
    Closed,
}

enum Pages<'a, T> {
    Single(&'a [T]),
    Paged { pages: &'a [Box<[T]>], shift: u32 },
    Closed,
}

/// Reusable iteration handle over a single-page or paged array.
pub struct HugeCursor<'a, T> {
    pages: Pages<'a, T>,
    size: usize,
    state: CursorState,
    array: &'a [T],
    offset: usize,
    limit: usize,
    base: usize,
    next_page: usize,
    last_page: usize,
    first_offset: usize,
    last_limit: usize,
}

impl<'a, T> HugeCursor<'a, T> {
    /// Cursor over no pages; positioned later through an array's `init_cursor`.
    pub fn empty() -> Self {
        Self::with_pages(Pages::Single(&[]), 0)
    }

    pub(crate) fn single(page: &'a [T], size: usize) -> Self {
        Self::with_pages(Pages::Single(page), size)
    }

    pub(crate) fn paged(pages: &'a [Box<[T]>], shift: u32, size: usize) -> Self {
        Self::with_pages(Pages::Paged { pages, shift }, size)
    }

    fn with_pages(pages: Pages<'a, T>, size: usize) -> Self {
        let mut cursor = Self {
            pages,
            size,
            state: CursorState::Unpositioned,
            array: &[],
            offset: 0,
            limit: 0,
            base: 0,
            next_page: 0,
            last_page: 0,
            first_offset: 0,
            last_limit: 0,
        };
        cursor.position(0, size);
        cursor
    }

    /// Re-targets this cursor at another page table, covering it entirely.
    pub(crate) fn retarget_single(&mut self, page: &'a [T], size: usize) {
        self.pages = Pages::Single(page);
        self.size = size;
        self.position(0, size);
    }

    pub(crate) fn retarget_paged(&mut self, pages: &'a [Box<[T]>], shift: u32, size: usize) {
        self.pages = Pages::Paged { pages, shift };
        self.size = size;
        self.position(0, size);
    }

    /// Restricts iteration to `[start, end)` and restarts it.
    pub fn set_range(&mut self, start: usize, end: usize) -> Result<()> {
        if self.state == CursorState::Closed {
            return Err(HugeError::CursorClosed);
        }
        check_range(start, end, self.size)?;
        self.position(start, end);
        Ok(())
    }

    /// Restarts iteration over the whole array.
    pub fn reset(&mut self) -> Result<()> {
        self.set_range(0, self.size)
    }

    fn position(&mut self, start: usize, end: usize) {
        self.array = &[];
        self.offset = 0;
        self.limit = 0;
        self.base = 0;
        if start >= end {
            self.next_page = 1;
            self.last_page = 0;
            self.state = CursorState::Exhausted;
            return;
        }
        match self.pages {
            Pages::Single(_) => {
                self.next_page = 0;
                self.last_page = 0;
                self.first_offset = start;
                self.last_limit = end;
            }
            Pages::Paged { shift, .. } => {
                let mask = (1usize << shift) - 1;
                self.next_page = start >> shift;
                self.last_page = (end - 1) >> shift;
                self.first_offset = start & mask;
                self.last_limit = ((end - 1) & mask) + 1;
            }
            Pages::Closed => {
                self.state = CursorState::Closed;
                return;
            }
        }
        self.state = CursorState::Unpositioned;
    }

    /// Advances to the next page intersecting the range.
    ///
    /// Returns `false` once every page was visited, and on every call after that.
    pub fn next(&mut self) -> bool {
        match self.state {
            CursorState::Exhausted | CursorState::Closed => return false,
            CursorState::Unpositioned | CursorState::Positioned => {}
        }
        if self.next_page > self.last_page {
            self.finish();
            return false;
        }
        let current = self.next_page;
        let first = self.state == CursorState::Unpositioned;
        match self.pages {
            Pages::Single(page) => {
                self.array = page;
                self.base = 0;
            }
            Pages::Paged { pages, shift } => {
                self.array = &pages[current];
                self.base = current << shift;
            }
            Pages::Closed => {
                self.state = CursorState::Closed;
                return false;
            }
        }
        self.offset = if first { self.first_offset } else { 0 };
        self.limit = if current == self.last_page {
            self.last_limit
        } else {
            self.array.len()
        };
        self.next_page += 1;
        self.state = CursorState::Positioned;
        true
    }

    fn finish(&mut self) {
        self.array = &[];
        self.offset = 0;
        self.limit = 0;
        self.state = CursorState::Exhausted;
    }

    /// Drops every page reference. The cursor cannot be used afterwards.
    pub fn close(&mut self) {
        self.pages = Pages::Closed;
        self.array = &[];
        self.offset = 0;
        self.limit = 0;
        self.base = 0;
        self.size = 0;
        self.state = CursorState::Closed;
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    /// Current page; empty unless positioned.
    #[inline]
    pub fn array(&self) -> &'a [T] {
        self.array
    }

    /// First valid offset inside [`array`](Self::array).
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Exclusive end of the valid window inside [`array`](Self::array).
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Global index of `array()[0]`.
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    /// The valid window `array()[offset..limit]`.
    #[inline]
    pub fn values(&self) -> &'a [T] {
        &self.array[self.offset..self.limit]
    }

    /// Logical size of the array behind this cursor.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl<T> Default for HugeCursor<'_, T> {
    fn default() -> Self {
        Self::empty()
    }
}
