use huge_collections::{init_logging, HugeError, HugeLongArray, HugeSparseList};

// One test per binary: the global subscriber can only be installed once.
#[test]
fn init_logging_installs_once() {
    init_logging("huge_collections=debug").expect("first install succeeds");

    // Allocation and growth events go through the installed subscriber.
    let mut array = HugeLongArray::new(32).expect("allocate");
    assert_eq!(array.release(), 32 * 8);
    let mut list = HugeSparseList::new(0i64);
    list.set(1 << 20, 1).expect("grow");

    assert!(matches!(
        init_logging("info"),
        Err(HugeError::InvalidArgument(message)) if message.contains("already")
    ));
}
