//! Allocation observers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Observer for page allocation performed by huge collections.
///
/// Implementations must be cheap; they are invoked on allocation paths.
pub trait AllocationMetrics: Send + Sync {
    /// Records `pages` freshly allocated pages totalling `bytes`.
    fn pages_allocated(&self, pages: usize, bytes: usize);

    /// Records a page table growing from `old_pages` to `new_pages` slots.
    fn page_table_grown(&self, old_pages: usize, new_pages: usize);
}

/// Discards every observation.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl AllocationMetrics for NoopMetrics {
    fn pages_allocated(&self, _pages: usize, _bytes: usize) {}
    fn page_table_grown(&self, _old_pages: usize, _new_pages: usize) {}
}

/// Thread-safe counters for allocation activity.
#[derive(Debug, Default)]
pub struct CounterMetrics {
    /// Number of pages allocated.
    pub pages_allocated: AtomicU64,

    /// Bytes allocated for pages.
    pub bytes_allocated: AtomicU64,

    /// Number of page table growth events.
    pub page_table_growths: AtomicU64,
}

impl CounterMetrics {
    /// Current page count.
    pub fn pages(&self) -> u64 {
        self.pages_allocated.load(Ordering::Relaxed)
    }

    /// Current byte count.
    pub fn bytes(&self) -> u64 {
        self.bytes_allocated.load(Ordering::Relaxed)
    }

    /// Current growth count.
    pub fn growths(&self) -> u64 {
        self.page_table_growths.load(Ordering::Relaxed)
    }
}

impl AllocationMetrics for CounterMetrics {
    fn pages_allocated(&self, pages: usize, bytes: usize) {
        self.pages_allocated
            .fetch_add(pages as u64, Ordering::Relaxed);
        self.bytes_allocated
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn page_table_grown(&self, _old_pages: usize, _new_pages: usize) {
        self.page_table_growths.fetch_add(1, Ordering::Relaxed);
    }
}
