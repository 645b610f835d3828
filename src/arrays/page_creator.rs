//! Strategies for allocating and initializing page tables.

use std::mem;

use rayon::prelude::*;
use tracing::debug;

use crate::arrays::element::{Element, FromIndex};
use crate::error::Result;
use crate::primitives::concurrency::Concurrency;
use crate::primitives::paging::allocate_page;

/// Allocates the pages of a huge array and optionally initializes them.
pub trait PageCreator<T: Element>: Send + Sync {
    /// Allocates every slot of `pages`.
    ///
    /// All pages except the last hold `1 << page_shift` elements and are created
    /// across [`concurrency`](Self::concurrency) workers; the last page holds
    /// `last_page_size` elements. Each slot is written by exactly one worker. If
    /// an allocation fails the error is returned; slots assigned before the
    /// failure stay valid and the remaining slots keep their previous value.
    fn fill(&self, pages: &mut [Box<[T]>], last_page_size: usize, page_shift: u32) -> Result<()> {
        fill_pages(self, pages, last_page_size, page_shift)
    }

    /// Initializes `page`, whose first element has global index `base`.
    fn fill_page(&self, page: &mut [T], base: usize);

    /// Workers used by [`fill`](Self::fill).
    fn concurrency(&self) -> Concurrency {
        Concurrency::single()
    }
}

fn fill_pages<T, C>(
    creator: &C,
    pages: &mut [Box<[T]>],
    last_page_size: usize,
    page_shift: u32,
) -> Result<()>
where
    T: Element,
    C: PageCreator<T> + ?Sized,
{
    let Some((last, full)) = pages.split_last_mut() else {
        return Ok(());
    };
    let page_size = 1usize << page_shift;
    let create = |page_index: usize, slot: &mut Box<[T]>| -> Result<()> {
        let mut page = allocate_page(page_size, T::default())?;
        creator.fill_page(&mut page, page_index << page_shift);
        *slot = page;
        Ok(())
    };

    let concurrency = creator.concurrency();
    match concurrency.pool()? {
        Some(pool) => pool.install(|| {
            full.par_iter_mut()
                .enumerate()
                .try_for_each(|(page_index, slot)| create(page_index, slot))
        })?,
        None => {
            for (page_index, slot) in full.iter_mut().enumerate() {
                create(page_index, slot)?;
            }
        }
    }

    let last_index = full.len();
    let mut page = allocate_page(last_page_size, T::default())?;
    creator.fill_page(&mut page, last_index << page_shift);
    *last = page;

    debug!(
        pages = last_index + 1,
        page_size,
        last_page_size,
        bytes = (last_index * page_size + last_page_size) * mem::size_of::<T>(),
        workers = concurrency.value(),
        "huge.pages.fill"
    );
    Ok(())
}

/// Leaves every element at its default value.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThroughPageCreator {
    concurrency: Concurrency,
}

impl PassThroughPageCreator {
    /// Creator allocating across `concurrency` workers.
    pub fn new(concurrency: Concurrency) -> Self {
        Self { concurrency }
    }
}

impl<T: Element> PageCreator<T> for PassThroughPageCreator {
    fn fill_page(&self, _page: &mut [T], _base: usize) {}

    fn concurrency(&self) -> Concurrency {
        self.concurrency
    }
}

/// Stores each element's own global index.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityPageCreator {
    concurrency: Concurrency,
}

impl IdentityPageCreator {
    /// Creator allocating across `concurrency` workers.
    pub fn new(concurrency: Concurrency) -> Self {
        Self { concurrency }
    }
}

impl<T: Element + FromIndex> PageCreator<T> for IdentityPageCreator {
    fn fill_page(&self, page: &mut [T], base: usize) {
        for (offset, slot) in page.iter_mut().enumerate() {
            *slot = T::from_index(base + offset);
        }
    }

    fn concurrency(&self) -> Concurrency {
        self.concurrency
    }
}

/// Computes each element from its global index with a caller-supplied generator.
pub struct GeneratorPageCreator<F> {
    concurrency: Concurrency,
    generator: F,
}

impl<F> GeneratorPageCreator<F> {
    /// Creator applying `generator` across `concurrency` workers.
    pub fn new(concurrency: Concurrency, generator: F) -> Self {
        Self {
            concurrency,
            generator,
        }
    }
}

impl<T, F> PageCreator<T> for GeneratorPageCreator<F>
where
    T: Element,
    F: Fn(usize) -> T + Send + Sync,
{
    fn fill_page(&self, page: &mut [T], base: usize) {
        for (offset, slot) in page.iter_mut().enumerate() {
            *slot = (self.generator)(base + offset);
        }
    }

    fn concurrency(&self) -> Concurrency {
        self.concurrency
    }
}
