use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};
use std::thread;

use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{HugeError, Result};

static AVAILABLE_PARALLELISM: OnceLock<NonZeroUsize> = OnceLock::new();
static PAGE_POOLS: OnceLock<Mutex<HashMap<usize, Arc<ThreadPool>>>> = OnceLock::new();

/// Number of workers used for parallel page creation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Concurrency(NonZeroUsize);

impl Concurrency {
    /// Concurrency of `workers` threads; zero is rejected.
    pub fn new(workers: usize) -> Result<Self> {
        NonZeroUsize::new(workers)
            .map(Self)
            .ok_or_else(|| HugeError::InvalidArgument("concurrency must be at least 1".into()))
    }

    /// Sequential execution on the calling thread.
    pub const fn single() -> Self {
        Self(NonZeroUsize::MIN)
    }

    /// One worker per available core, falling back to one. Queried once per process.
    pub fn available() -> Self {
        Self(*AVAILABLE_PARALLELISM.get_or_init(|| {
            thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
        }))
    }

    /// Worker count.
    pub fn value(&self) -> usize {
        self.0.get()
    }

    /// Whether work runs on the calling thread only.
    pub fn is_single(&self) -> bool {
        self.0.get() == 1
    }

    /// Shared pool with this many workers, or `None` when execution is sequential.
    ///
    /// Pools are built on first use and reused by every later call with the
    /// same worker count for the rest of the process.
    pub fn pool(&self) -> Result<Option<Arc<ThreadPool>>> {
        if self.is_single() {
            return Ok(None);
        }
        let threads = self.value();
        let mut pools = PAGE_POOLS.get_or_init(Default::default).lock();
        if let Some(pool) = pools.get(&threads) {
            return Ok(Some(Arc::clone(pool)));
        }
        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(move |idx| format!("huge-pages-{threads}-{idx}"))
                .build()?,
        );
        pools.insert(threads, Arc::clone(&pool));
        debug!(threads, "huge.pool.built");
        Ok(Some(pool))
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::available()
    }
}
