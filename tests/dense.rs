use huge_collections::{
    Concurrency, CounterMetrics, GeneratorPageCreator, HugeArray, HugeArrayBuilder,
    HugeDoubleArray, HugeError, HugeIntArray, HugeLongArray, HugeOptions, IdentityPageCreator,
    Representation, Result,
};
use std::sync::Arc;

fn small_pages() -> HugeOptions {
    HugeOptions::new()
        .page_size_in_bytes(64)
        .max_single_page_len(16)
}

#[test]
fn fresh_arrays_read_default() -> Result<()> {
    let opts = small_pages();
    for size in [0, 1, 16, 17, 100] {
        let array = HugeLongArray::with_options(size, &opts)?;
        assert_eq!(array.size(), size);
        assert!(array.iter().all(|&v| v == 0));
    }
    Ok(())
}

#[test]
fn single_and_paged_agree() -> Result<()> {
    let opts = small_pages().max_single_page_len(1000);
    let mut single = HugeIntArray::new_single_with(100, &opts)?;
    let mut paged = HugeIntArray::new_paged_with(100, &opts)?;
    assert_eq!(single.representation(), Representation::Single);
    assert_eq!(paged.representation(), Representation::Paged);

    for array in [&mut single, &mut paged] {
        array.set_all(|i| (i * 3) as i32)?;
        array.add_to(7, 5)?;
        array.or(9, 0b100)?;
        array.set(99, -1)?;
    }
    assert_eq!(single.to_vec()?, paged.to_vec()?);
    assert_eq!(paged.get(7)?, 26);
    assert_eq!(paged.get(9)?, 27 | 0b100);
    assert_eq!(paged.and(9, 0b11)?, (27 | 0b100) & 0b11);
    Ok(())
}

#[test]
fn add_to_accumulates() -> Result<()> {
    let mut array = HugeLongArray::new(10)?;
    array.add_to(3, 7)?;
    array.add_to(3, 7)?;
    assert_eq!(array.get(3)?, 14);
    Ok(())
}

#[test]
fn out_of_bounds_is_an_error() -> Result<()> {
    let mut array = HugeLongArray::with_options(40, &small_pages())?;
    assert!(matches!(
        array.get(40),
        Err(HugeError::IndexOutOfBounds { index: 40, len: 40 })
    ));
    assert!(array.set(1 << 40, 1).is_err());
    let single = HugeLongArray::new(3)?;
    assert!(matches!(
        single.get(3),
        Err(HugeError::IndexOutOfBounds { index: 3, len: 3 })
    ));
    Ok(())
}

#[test]
fn copy_to_pads_with_default() -> Result<()> {
    let source = HugeLongArray::from_values(&[1, 2, 3])?;
    let mut dest = HugeLongArray::from_values(&[9, 9, 9, 9, 9])?;
    source.copy_to(&mut dest, 3)?;
    assert_eq!(dest.to_vec()?, vec![1, 2, 3, 0, 0]);

    let opts = small_pages();
    let source = HugeLongArray::with_page_creator(
        40,
        &opts,
        &GeneratorPageCreator::new(Concurrency::single(), |i: usize| i as i64 + 1),
    )?;
    let mut dest = HugeLongArray::with_options(30, &opts)?;
    dest.fill(-5)?;
    source.copy_to(&mut dest, 25)?;
    let copied = dest.to_vec()?;
    assert_eq!(&copied[..25], &(1..=25).collect::<Vec<i64>>()[..]);
    assert!(copied[25..].iter().all(|&v| v == 0));
    Ok(())
}

#[test]
fn copy_of_grows_and_shrinks() -> Result<()> {
    let array = HugeIntArray::from_values(&[4, 5, 6])?;
    assert_eq!(array.copy_of(5)?.to_vec()?, vec![4, 5, 6, 0, 0]);
    assert_eq!(array.copy_of(2)?.to_vec()?, vec![4, 5]);
    Ok(())
}

#[test]
fn binary_search_is_a_floor_search() -> Result<()> {
    let array = HugeLongArray::from_values(&[10, 20, 20, 30])?;
    assert_eq!(array.binary_search(15)?, Some(0));
    assert_eq!(array.binary_search(20)?, Some(2));
    assert_eq!(array.binary_search(5)?, None);
    assert_eq!(array.binary_search(100)?, Some(3));

    let paged = HugeLongArray::with_page_creator(
        1000,
        &small_pages(),
        &GeneratorPageCreator::new(Concurrency::single(), |i: usize| (i * 2) as i64),
    )?;
    assert_eq!(paged.binary_search(501)?, Some(250));
    assert_eq!(paged.binary_search(-1)?, None);
    Ok(())
}

#[test]
fn parallel_identity_creator_fills_every_page() -> Result<()> {
    let opts = small_pages().concurrency(Concurrency::new(4)?);
    let array: HugeArray<u64> =
        HugeArray::with_page_creator(1003, &opts, &IdentityPageCreator::new(opts.concurrency))?;
    assert_eq!(array.representation(), Representation::Paged);
    for (i, &v) in array.iter().enumerate() {
        assert_eq!(v, i as u64);
    }
    Ok(())
}

#[test]
fn released_array_rejects_access() -> Result<()> {
    let mut array = HugeDoubleArray::with_options(100, &small_pages())?;
    array.set(3, 1.5)?;
    assert!(array.release() > 0);
    assert_eq!(array.release(), 0);
    assert_eq!(array.representation(), Representation::Released);
    assert!(matches!(array.get(3), Err(HugeError::Released)));
    assert!(matches!(array.set(3, 2.0), Err(HugeError::Released)));
    assert!(matches!(array.to_vec(), Err(HugeError::Released)));
    assert_eq!(array.iter().count(), 0);
    Ok(())
}

#[test]
fn allocation_metrics_count_pages() -> Result<()> {
    let metrics = Arc::new(CounterMetrics::default());
    let opts = small_pages().metrics(metrics.clone());
    HugeLongArray::with_options(20, &opts)?;
    assert_eq!(metrics.pages(), 3);
    assert_eq!(metrics.bytes(), 3 * 16 + 20 * 8);
    HugeLongArray::with_options(10, &opts)?;
    assert_eq!(metrics.pages(), 4);
    Ok(())
}

#[test]
fn object_arrays_hold_owned_values() -> Result<()> {
    let mut names: HugeArray<Option<String>> = HugeArray::with_options(40, &small_pages())?;
    assert!(names.set_if_absent(33, "n33".to_string())?);
    assert!(!names.set_if_absent(33, "other".to_string())?);
    assert_eq!(names.get_or(33, String::new())?, "n33");
    assert_eq!(names.get_or(0, "missing".to_string())?, "missing");
    Ok(())
}

#[test]
fn repeated_parallel_allocations_share_one_pool() -> Result<()> {
    let workers = Concurrency::new(4)?;
    let opts = small_pages().max_single_page_len(0).concurrency(workers);
    for round in 0..64 {
        let array = HugeLongArray::with_options(100 + round, &opts)?;
        assert_eq!(array.representation(), Representation::Paged);
    }
    let first = workers.pool()?.expect("parallel pool");
    let second = workers.pool()?.expect("parallel pool");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.current_num_threads(), 4);
    Ok(())
}

#[test]
fn failed_builder_growth_keeps_existing_pages() -> Result<()> {
    // One element per page, so the page table for a huge index overflows.
    let opts = HugeOptions::new().page_size_in_bytes(1);
    let mut builder = HugeArrayBuilder::<u8>::with_options(&opts);
    builder.allocate(0, &[1, 2, 3])?;
    assert_eq!(builder.capacity(), 3);

    let err = builder.allocate(usize::MAX / 2, &[9]).unwrap_err();
    assert!(matches!(err, HugeError::Allocation { .. }), "{err:?}");
    assert_eq!(builder.capacity(), 3);
    assert_eq!(builder.size(), 3);

    let array = builder.build(3)?;
    assert_eq!(array.to_vec()?, vec![1, 2, 3]);
    Ok(())
}
