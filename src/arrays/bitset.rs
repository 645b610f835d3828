//! Lock-free bit set over atomic 64-bit words.

use std::sync::atomic::AtomicU64;

use crate::arrays::atomic::{AtomicElement, HugeAtomicArray};
use crate::arrays::options::HugeOptions;
use crate::error::{check_index, check_range, Result};
use crate::primitives::estimate::size_of_instance;

const WORD_BITS: usize = u64::BITS as usize;
const WORD_SHIFT: u32 = 6;
const WORD_MASK: usize = WORD_BITS - 1;

/// Fixed-size bit set with lock-free single-bit updates.
///
/// Bits live in the 64-bit words of a [`HugeAtomicArray<u64>`]; every mutation
/// is a CAS loop on one word. Whole-set reads ([`for_each_set_bit`],
/// [`cardinality`], [`is_empty`], [`all_set`]) and [`clear_all`] are not
/// thread-safe: call them only while no mutation is in flight.
///
/// [`for_each_set_bit`]: Self::for_each_set_bit
/// [`cardinality`]: Self::cardinality
/// [`is_empty`]: Self::is_empty
/// [`all_set`]: Self::all_set
/// [`clear_all`]: Self::clear_all
pub struct HugeAtomicBitSet {
    words: HugeAtomicArray<u64>,
    num_bits: usize,
}

#[inline]
fn word_index(index: usize) -> usize {
    index >> WORD_SHIFT
}

#[inline]
fn bit_mask(index: usize) -> u64 {
    1u64 << (index & WORD_MASK)
}

#[inline]
fn word_count(num_bits: usize) -> usize {
    num_bits.div_ceil(WORD_BITS)
}

impl HugeAtomicBitSet {
    /// Bit set of `num_bits` cleared bits.
    pub fn new(num_bits: usize) -> Result<Self> {
        Self::with_options(num_bits, &HugeOptions::default())
    }

    /// Bit set of `num_bits` cleared bits laid out by `options`.
    pub fn with_options(num_bits: usize, options: &HugeOptions) -> Result<Self> {
        let words = HugeAtomicArray::with_options(word_count(num_bits), options)?;
        Ok(Self { words, num_bits })
    }

    /// Number of bits.
    pub fn size(&self) -> usize {
        self.num_bits
    }

    /// Whether the bit at `index` is set.
    pub fn get(&self, index: usize) -> Result<bool> {
        check_index(index, self.num_bits)?;
        Ok(self.words.get(word_index(index))? & bit_mask(index) != 0)
    }

    /// Sets the bit at `index`.
    pub fn set(&self, index: usize) -> Result<()> {
        check_index(index, self.num_bits)?;
        self.words.or(word_index(index), bit_mask(index))?;
        Ok(())
    }

    /// Sets every bit in `[start, end)`.
    ///
    /// Interior words receive a full mask; only the boundary words need partial masks.
    pub fn set_range(&self, start: usize, end: usize) -> Result<()> {
        check_range(start, end, self.num_bits)?;
        if start == end {
            return Ok(());
        }
        let start_word = word_index(start);
        let end_word = word_index(end - 1);
        let start_mask = u64::MAX << (start & WORD_MASK);
        let end_mask = u64::MAX >> (WORD_MASK - ((end - 1) & WORD_MASK));
        if start_word == end_word {
            self.words.or(start_word, start_mask & end_mask)?;
            return Ok(());
        }
        self.words.or(start_word, start_mask)?;
        for word in start_word + 1..end_word {
            self.words.or(word, u64::MAX)?;
        }
        self.words.or(end_word, end_mask)?;
        Ok(())
    }

    /// Sets the bit at `index` and returns whether it was already set.
    pub fn get_and_set(&self, index: usize) -> Result<bool> {
        check_index(index, self.num_bits)?;
        let mask = bit_mask(index);
        let previous = self
            .words
            .get_and_update(word_index(index), |word| word | mask)?;
        Ok(previous & mask != 0)
    }

    /// Toggles the bit at `index`.
    pub fn flip(&self, index: usize) -> Result<()> {
        check_index(index, self.num_bits)?;
        self.words.get_and_xor(word_index(index), bit_mask(index))?;
        Ok(())
    }

    /// Clears the bit at `index`.
    pub fn clear(&self, index: usize) -> Result<()> {
        check_index(index, self.num_bits)?;
        self.words.and(word_index(index), !bit_mask(index))?;
        Ok(())
    }

    /// Clears every bit. Not thread-safe.
    pub fn clear_all(&self) -> Result<()> {
        self.words.set_all(0)
    }

    /// Calls `consumer` with the index of every set bit in ascending order.
    /// Not thread-safe.
    pub fn for_each_set_bit(&self, mut consumer: impl FnMut(usize)) -> Result<()> {
        let mut cursor = self.words.new_cursor()?;
        while cursor.next() {
            let base = cursor.base();
            for offset in cursor.offset()..cursor.limit() {
                let mut word = load(&cursor.array()[offset]);
                let word_base = (base + offset) << WORD_SHIFT;
                while word != 0 {
                    consumer(word_base + word.trailing_zeros() as usize);
                    word &= word - 1;
                }
            }
        }
        Ok(())
    }

    /// Number of set bits. Not thread-safe.
    pub fn cardinality(&self) -> Result<usize> {
        let mut count = 0;
        self.for_each_word(|_, word| {
            count += word.count_ones() as usize;
            true
        })?;
        Ok(count)
    }

    /// Whether no bit is set. Not thread-safe.
    pub fn is_empty(&self) -> Result<bool> {
        let mut empty = true;
        self.for_each_word(|_, word| {
            empty = word == 0;
            empty
        })?;
        Ok(empty)
    }

    /// Whether every bit is set. Not thread-safe.
    pub fn all_set(&self) -> Result<bool> {
        let last_word = word_count(self.num_bits).saturating_sub(1);
        let remainder = self.num_bits & WORD_MASK;
        let last_mask = if remainder == 0 {
            u64::MAX
        } else {
            u64::MAX >> (WORD_BITS - remainder)
        };
        let mut full = true;
        self.for_each_word(|index, word| {
            let expected = if index == last_word { last_mask } else { u64::MAX };
            full = word & expected == expected;
            full
        })?;
        Ok(full)
    }

    /// Visits words in order until `visitor` returns `false`.
    fn for_each_word(&self, mut visitor: impl FnMut(usize, u64) -> bool) -> Result<()> {
        let mut cursor = self.words.new_cursor()?;
        while cursor.next() {
            let base = cursor.base();
            for offset in cursor.offset()..cursor.limit() {
                if !visitor(base + offset, load(&cursor.array()[offset])) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Measured footprint in bytes.
    pub fn size_of(&self) -> usize {
        size_of_instance::<Self>() - size_of_instance::<HugeAtomicArray<u64>>() + self.words.size_of()
    }

    /// Footprint of a bit set of `num_bits` created with default options.
    pub fn memory_estimation(num_bits: usize) -> usize {
        Self::memory_estimation_with(num_bits, &HugeOptions::default())
    }

    /// Footprint of a bit set of `num_bits` created with `options`.
    pub fn memory_estimation_with(num_bits: usize, options: &HugeOptions) -> usize {
        size_of_instance::<Self>() - size_of_instance::<HugeAtomicArray<u64>>()
            + HugeAtomicArray::<u64>::memory_estimation_with(word_count(num_bits), options)
    }
}

#[inline]
fn load(cell: &AtomicU64) -> u64 {
    <u64 as AtomicElement>::load(cell)
}
