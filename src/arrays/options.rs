//! Construction options shared by the huge collection factories.

use std::fmt;
use std::sync::Arc;

use crate::metrics::{AllocationMetrics, NoopMetrics};
use crate::primitives::concurrency::Concurrency;
use crate::primitives::paging::{PageLayout, MAX_ARRAY_LENGTH, PAGE_SIZE_IN_BYTES};

/// Configuration shared by the huge collection factories.
#[derive(Clone)]
pub struct HugeOptions {
    /// Page budget in bytes; element pages hold the largest power of two that fits.
    pub page_size_in_bytes: usize,
    /// Sizes up to this bound use the single-page representation.
    pub max_single_page_len: usize,
    /// Workers used to allocate and initialize pages.
    pub concurrency: Concurrency,
    /// Allocation observer.
    pub metrics: Arc<dyn AllocationMetrics>,
}

impl HugeOptions {
    /// Options with default settings.
    pub fn new() -> Self {
        Self {
            page_size_in_bytes: PAGE_SIZE_IN_BYTES,
            max_single_page_len: MAX_ARRAY_LENGTH,
            concurrency: Concurrency::available(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Sets the page budget in bytes.
    pub fn page_size_in_bytes(mut self, bytes: usize) -> Self {
        self.page_size_in_bytes = bytes;
        self
    }

    /// Sets the largest size kept in a single page.
    pub fn max_single_page_len(mut self, len: usize) -> Self {
        self.max_single_page_len = len;
        self
    }

    /// Sets the page creation concurrency.
    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the allocation observer.
    pub fn metrics(mut self, metrics: Arc<dyn AllocationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Page geometry for elements of type `T`.
    pub fn layout_for<T>(&self) -> PageLayout {
        PageLayout::for_element::<T>(self.page_size_in_bytes)
    }

    /// Whether `size` elements use the single-page representation.
    pub fn fits_single_page(&self, size: usize) -> bool {
        size <= self.max_single_page_len
    }
}

impl Default for HugeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HugeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HugeOptions")
            .field("page_size_in_bytes", &self.page_size_in_bytes)
            .field("max_single_page_len", &self.max_single_page_len)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}
