//! Error taxonomy for huge collections.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HugeError>;

/// Errors raised by huge collections.
///
/// Bounds and state errors are raised synchronously to the immediate caller.
/// Compare-and-exchange contention is retried internally and never surfaces here.
#[derive(Debug, Error)]
pub enum HugeError {
    /// Index outside `[0, len)`.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Logical length of the collection.
        len: usize,
    },
    /// The collection was released and its pages dropped.
    #[error("huge array has been released")]
    Released,
    /// The cursor was closed and can no longer be positioned.
    #[error("cursor has been closed")]
    CursorClosed,
    /// A single-page representation was requested for a size it cannot hold.
    #[error("requested {requested} elements but a single page holds at most {max}")]
    Capacity {
        /// Requested element count.
        requested: usize,
        /// Maximum single-page length.
        max: usize,
    },
    /// A fallible allocation could not be satisfied.
    #[error("failed to allocate {bytes} bytes")]
    Allocation {
        /// Size of the failed request in bytes.
        bytes: usize,
    },
    /// Malformed argument such as an inverted range or a ragged page table.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The worker pool used for parallel page creation could not be built.
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl HugeError {
    pub(crate) fn out_of_bounds(index: usize, len: usize) -> Self {
        HugeError::IndexOutOfBounds { index, len }
    }
}

#[inline]
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(HugeError::out_of_bounds(index, len))
    }
}

#[inline]
pub(crate) fn check_range(start: usize, end: usize, len: usize) -> Result<()> {
    if start > end {
        return Err(HugeError::InvalidArgument(format!(
            "range start {start} is greater than end {end}"
        )));
    }
    if end > len {
        return Err(HugeError::out_of_bounds(end, len));
    }
    Ok(())
}
