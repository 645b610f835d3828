//! Page-lazy sparse arrays.
//!
//! Sparse structures address indices through the same page layout as the dense
//! arrays but keep a table of optional pages. A page is allocated, filled with
//! the structure's default value, only when a write first touches it. Reads of
//! untouched indices return the default and never fail, even beyond the current
//! capacity.
//!
//! - [`HugeSparseArrayBuilder`] accepts concurrent writers and produces immutable
//!   [`HugeSparseArray`] snapshots.
//! - [`HugeSparseList`] is the single-writer mutable variant.
//! - [`DrainingIterator`] hands out every allocated page exactly once across any
//!   number of consumers.

mod array;
mod drain;
mod list;

pub use array::{HugeSparseArray, HugeSparseArrayBuilder};
pub use drain::{DrainingBatch, DrainingIterator};
pub use list::HugeSparseList;

use tracing::debug;

use crate::error::{HugeError, Result};
use crate::metrics::AllocationMetrics;
use crate::primitives::estimate::{
    size_of_array, size_of_instance, size_of_page_table, MemoryRange,
};
use crate::primitives::paging::PageLayout;

/// Optional page slot of a sparse page table.
pub(crate) type PageSlot<T> = Option<Box<[T]>>;

/// Extends `table` so that `page_index` is addressable.
///
/// The table grows to the next power of two of the touched page count. Existing
/// pages are moved by pointer and never copied.
pub(crate) fn grow_table<T>(
    table: &mut Vec<PageSlot<T>>,
    page_index: usize,
    metrics: &dyn AllocationMetrics,
) -> Result<()> {
    let old_pages = table.len();
    if page_index < old_pages {
        return Ok(());
    }
    let needed = page_index.saturating_add(1);
    let new_pages = needed.checked_next_power_of_two().unwrap_or(needed);
    let additional = new_pages - old_pages;
    table.try_reserve_exact(additional).map_err(|_| HugeError::Allocation {
        bytes: size_of_page_table::<PageSlot<T>>(additional),
    })?;
    table.resize_with(new_pages, || None);
    metrics.page_table_grown(old_pages, new_pages);
    debug!(old_pages, new_pages, "huge.sparse.grow");
    Ok(())
}

/// Bytes held by the page table and its allocated pages.
pub(crate) fn table_bytes<T>(table: &[PageSlot<T>]) -> usize {
    size_of_page_table::<PageSlot<T>>(table.len())
        + table
            .iter()
            .flatten()
            .map(|page| size_of_array::<T>(page.len()))
            .sum::<usize>()
}

/// Memory range of a sparse structure `S` over elements `T`.
///
/// `max_index` is the exclusive upper bound of the indices written and
/// `max_entries` the number of distinct indices written. The lower bound packs
/// the entries densely into as few pages as possible; the upper bound places
/// every entry on its own page and accounts for the power-of-two table growth.
pub(crate) fn estimate_sparse<S, T>(
    max_index: usize,
    max_entries: usize,
    layout: PageLayout,
) -> MemoryRange {
    let instance = size_of_instance::<S>();
    let num_pages = layout.number_of_pages(max_index);
    let entries = max_entries.min(max_index);
    let page_bytes = size_of_array::<T>(layout.page_size());

    let min_pages = layout.number_of_pages(entries);
    let max_pages = entries.min(num_pages);
    let min_table = size_of_page_table::<PageSlot<T>>(num_pages);
    let grown_pages = match num_pages {
        0 => 0,
        n => n.checked_next_power_of_two().unwrap_or(n),
    };
    let max_table = size_of_page_table::<PageSlot<T>>(grown_pages);

    MemoryRange::of_range(
        instance + min_table + min_pages * page_bytes,
        instance + max_table + max_pages * page_bytes,
    )
}
