//! Huge collections: dense, atomic and sparse arrays over paged storage.

pub mod atomic;
pub mod bitset;
pub mod builder;
pub mod cursor;
pub mod dense;
pub mod element;
pub mod options;
pub mod page_creator;
pub mod sparse;

pub use atomic::{
    AtomicElement, CasResult, HugeAtomicArray, HugeAtomicDoubleArray, HugeAtomicIntArray,
    HugeAtomicLongArray,
};
pub use bitset::HugeAtomicBitSet;
pub use builder::HugeArrayBuilder;
pub use cursor::HugeCursor;
pub use dense::{
    HugeArray, HugeByteArray, HugeDoubleArray, HugeFloatArray, HugeIntArray, HugeLongArray,
    HugeObjectArray, HugeShortArray, Representation,
};
pub use element::{Element, FromIndex, IntegerElement, NumericElement};
pub use options::HugeOptions;
pub use page_creator::{
    GeneratorPageCreator, IdentityPageCreator, PageCreator, PassThroughPageCreator,
};
pub use sparse::{
    DrainingBatch, DrainingIterator, HugeSparseArray, HugeSparseArrayBuilder, HugeSparseList,
};
