use huge_collections::{
    human_readable, HugeArray, HugeAtomicBitSet, HugeAtomicLongArray, HugeIntArray,
    HugeLongArray, HugeOptions, HugeSparseArray, HugeSparseArrayBuilder, MemoryRange,
    Representation, Result,
};
use std::mem;

fn small_pages() -> HugeOptions {
    HugeOptions::new()
        .page_size_in_bytes(64)
        .max_single_page_len(16)
}

#[test]
fn estimation_matches_measurement() -> Result<()> {
    let opts = small_pages();
    for size in [0, 1, 15, 16, 17, 24, 25, 1_000] {
        let array = HugeLongArray::with_options(size, &opts)?;
        assert_eq!(
            array.size_of(),
            HugeLongArray::memory_estimation_with(size, &opts),
            "long size {size}"
        );
        let ints = HugeIntArray::with_options(size, &opts)?;
        assert_eq!(
            ints.size_of(),
            HugeIntArray::memory_estimation_with(size, &opts),
            "int size {size}"
        );
        let atomic = HugeAtomicLongArray::with_options(size, &opts)?;
        assert_eq!(
            atomic.size_of(),
            HugeAtomicLongArray::memory_estimation_with(size, &opts),
            "atomic size {size}"
        );
    }
    Ok(())
}

#[test]
fn paged_estimation_counts_table_and_last_page() {
    let opts = small_pages();
    let instance = mem::size_of::<HugeLongArray>();
    let table = 3 * mem::size_of::<Box<[i64]>>();
    assert_eq!(
        HugeLongArray::memory_estimation_with(20, &opts),
        instance + table + 2 * 8 * 8 + 4 * 8
    );
    assert_eq!(
        HugeLongArray::memory_estimation_with(16, &opts),
        instance + 16 * 8
    );
}

#[test]
fn threshold_switches_representation() -> Result<()> {
    let opts = small_pages();
    let at = HugeLongArray::with_options(16, &opts)?;
    let above = HugeLongArray::with_options(17, &opts)?;
    assert_eq!(at.representation(), Representation::Single);
    assert_eq!(above.representation(), Representation::Paged);
    assert!(above.size_of() > at.size_of());
    Ok(())
}

#[test]
fn release_reports_freed_bytes_once() -> Result<()> {
    let size = 1_000;
    let mut single = HugeLongArray::new(size)?;
    assert_eq!(single.release(), 8 * size);
    assert_eq!(single.release(), 0);
    assert_eq!(single.size_of(), mem::size_of::<HugeLongArray>());

    let opts = small_pages();
    let mut paged = HugeLongArray::with_options(size, &opts)?;
    let before = paged.size_of();
    let freed = paged.release();
    assert_eq!(freed, before - mem::size_of::<HugeLongArray>());
    assert!(freed >= 8 * size);
    assert_eq!(paged.release(), 0);
    Ok(())
}

#[test]
fn object_arrays_estimate_slots_only() {
    let estimate = HugeArray::<Option<String>>::memory_estimation(10);
    assert_eq!(
        estimate,
        mem::size_of::<HugeArray<Option<String>>>() + 10 * mem::size_of::<Option<String>>()
    );
}

#[test]
fn sparse_estimation_brackets_measurement() -> Result<()> {
    let opts = HugeOptions::new().page_size_in_bytes(64);
    let builder = HugeSparseArrayBuilder::<i64>::with_options(0, 0, &opts)?;
    for index in [3usize, 40, 41, 200] {
        builder.set(index, 1)?;
    }
    let array = builder.build()?;
    let range = HugeSparseArray::<i64>::memory_estimation_with(201, 4, &opts);
    assert!(range.min() <= array.size_of(), "{range} vs {}", array.size_of());
    assert!(array.size_of() <= range.max(), "{range} vs {}", array.size_of());
    Ok(())
}

#[test]
fn bitset_estimation_matches_measurement() -> Result<()> {
    let opts = small_pages().max_single_page_len(0);
    for bits in [0, 1, 64, 65, 10_000] {
        let set = HugeAtomicBitSet::with_options(bits, &opts)?;
        assert_eq!(
            set.size_of(),
            HugeAtomicBitSet::memory_estimation_with(bits, &opts)
        );
    }
    Ok(())
}

#[test]
fn memory_ranges_compose() {
    let page = MemoryRange::of(4096);
    let table = MemoryRange::of_range(64, 16);
    let total = page.times(3) + table;
    assert_eq!(total.min(), 3 * 4096 + 16);
    assert_eq!(total.max(), 3 * 4096 + 64);
    assert_eq!(human_readable(2048), "2 KiB");
}
