//! Low-level primitives shared by every huge collection.
//!
//! Includes page index arithmetic, memory estimation formulas and the
//! worker-count configuration used for parallel page creation.

/// Worker-count configuration and rayon pool construction.
///
/// Page creators fan out across the configured number of workers.
pub mod concurrency;

/// Memory estimation formulas.
///
/// Byte counts for arrays, page tables and instances, plus [`estimate::MemoryRange`].
pub mod estimate;

/// Page index arithmetic.
///
/// Decomposes global indices into page and in-page offsets for power-of-two pages.
pub mod paging;
