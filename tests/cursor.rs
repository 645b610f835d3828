use huge_collections::{
    Concurrency, GeneratorPageCreator, HugeAtomicLongArray, HugeCursor, HugeError, HugeLongArray,
    HugeOptions, Result,
};

fn small_pages() -> HugeOptions {
    HugeOptions::new()
        .page_size_in_bytes(64)
        .max_single_page_len(16)
}

fn indexed(size: usize, opts: &HugeOptions) -> Result<HugeLongArray> {
    HugeLongArray::with_page_creator(
        size,
        opts,
        &GeneratorPageCreator::new(Concurrency::single(), |i: usize| i as i64),
    )
}

fn collect(cursor: &mut HugeCursor<'_, i64>) -> Vec<i64> {
    let mut out = Vec::new();
    while cursor.next() {
        for offset in cursor.offset()..cursor.limit() {
            assert_eq!(cursor.array()[offset], (cursor.base() + offset) as i64);
            out.push(cursor.array()[offset]);
        }
    }
    out
}

#[test]
fn full_scan_visits_every_index_once() -> Result<()> {
    let opts = small_pages();
    for size in [0, 1, 7, 8, 16, 17, 64, 65, 100] {
        let array = indexed(size, &opts)?;
        let mut cursor = array.new_cursor()?;
        let expected: Vec<i64> = (0..size as i64).collect();
        assert_eq!(collect(&mut cursor), expected, "size {size}");
    }
    Ok(())
}

#[test]
fn range_scans_match_slices() -> Result<()> {
    let opts = small_pages();
    let array = indexed(100, &opts)?;
    let mut cursor = HugeCursor::empty();
    for (start, end) in [(0, 100), (3, 9), (8, 16), (15, 17), (50, 50), (99, 100)] {
        array.init_cursor_range(&mut cursor, start, end)?;
        let expected: Vec<i64> = (start as i64..end as i64).collect();
        assert_eq!(collect(&mut cursor), expected, "range {start}..{end}");
    }
    Ok(())
}

#[test]
fn paged_cursor_steps_page_by_page() -> Result<()> {
    let array = indexed(20, &small_pages())?;
    let mut cursor = array.new_cursor()?;
    let mut windows = Vec::new();
    while cursor.next() {
        windows.push((cursor.base(), cursor.offset(), cursor.limit()));
    }
    assert_eq!(windows, vec![(0, 0, 8), (8, 0, 8), (16, 0, 4)]);
    assert!(!cursor.next());
    Ok(())
}

#[test]
fn single_page_cursor_needs_one_step() -> Result<()> {
    let array = indexed(10, &small_pages())?;
    let mut cursor = array.new_cursor()?;
    cursor.set_range(2, 5)?;
    assert!(cursor.next());
    assert_eq!(cursor.values(), &[2, 3, 4]);
    assert!(!cursor.next());
    Ok(())
}

#[test]
fn invalid_ranges_are_rejected() -> Result<()> {
    let array = indexed(10, &small_pages())?;
    let mut cursor = array.new_cursor()?;
    assert!(matches!(
        cursor.set_range(4, 3),
        Err(HugeError::InvalidArgument(_))
    ));
    assert!(matches!(
        cursor.set_range(0, 11),
        Err(HugeError::IndexOutOfBounds { .. })
    ));
    Ok(())
}

#[test]
fn closed_cursor_cannot_be_reused() -> Result<()> {
    let array = indexed(10, &small_pages())?;
    let mut cursor = array.new_cursor()?;
    cursor.close();
    assert!(!cursor.next());
    assert!(matches!(array.init_cursor(&mut cursor), Err(HugeError::CursorClosed)));
    assert!(matches!(cursor.set_range(0, 1), Err(HugeError::CursorClosed)));
    Ok(())
}

#[test]
fn one_cursor_reused_across_arrays() -> Result<()> {
    let first = indexed(30, &small_pages())?;
    let second = indexed(5, &small_pages())?;
    let mut cursor = HugeCursor::empty();
    first.init_cursor(&mut cursor)?;
    assert_eq!(collect(&mut cursor).len(), 30);
    second.init_cursor(&mut cursor)?;
    assert_eq!(collect(&mut cursor), vec![0, 1, 2, 3, 4]);
    Ok(())
}

#[test]
fn atomic_cursor_exposes_cells() -> Result<()> {
    let array = HugeAtomicLongArray::with_options(20, &small_pages())?;
    array.set(19, 5)?;
    let mut cursor = array.new_cursor()?;
    let mut last = 0;
    while cursor.next() {
        for cell in cursor.values() {
            last = cell.load(std::sync::atomic::Ordering::Acquire);
        }
    }
    assert_eq!(last, 5);
    Ok(())
}
