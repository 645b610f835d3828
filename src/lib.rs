//! Huge collections for graph-analytics workloads.
//!
//! Fixed-size arrays addressed far beyond a single allocation, built from
//! power-of-two pages with near-primitive per-element overhead:
//!
//! - [`HugeArray`] dense arrays in single-page or paged representation,
//! - [`HugeAtomicArray`] and [`HugeAtomicBitSet`] with lock-free CAS updates,
//! - [`HugeSparseArrayBuilder`], [`HugeSparseArray`] and [`HugeSparseList`]
//!   allocating pages only when first written,
//! - [`HugeCursor`] for zero-copy page-at-a-time traversal,
//! - memory estimation formulas that match what allocation actually uses.

pub mod arrays;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod primitives;

pub use arrays::{
    AtomicElement, DrainingBatch, DrainingIterator, Element, GeneratorPageCreator, HugeArray,
    HugeArrayBuilder, HugeAtomicArray, HugeAtomicBitSet, HugeAtomicDoubleArray,
    HugeAtomicIntArray, HugeAtomicLongArray, HugeByteArray, HugeCursor, HugeDoubleArray,
    HugeFloatArray, HugeIntArray, HugeLongArray, HugeObjectArray, HugeOptions, HugeShortArray,
    HugeSparseArray, HugeSparseArrayBuilder, HugeSparseList, IdentityPageCreator,
    IntegerElement, NumericElement, PageCreator, PassThroughPageCreator, Representation,
};
pub use error::{HugeError, Result};
pub use logging::{init_default_logging, init_logging, DEFAULT_DIRECTIVE};
pub use metrics::{AllocationMetrics, CounterMetrics, NoopMetrics};
pub use primitives::concurrency::Concurrency;
pub use primitives::estimate::{human_readable, MemoryRange};
pub use primitives::paging::{PageLayout, MAX_ARRAY_LENGTH, PAGE_SIZE_IN_BYTES};
