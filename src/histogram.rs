//! Bit-packed histogram of converter codes.
//!
//! Each bin is a `BITS_PER_BIN`-bit counter. Counters are packed LSB-first
//! into `u32` words with no padding, so a counter may straddle two words.

use zeroize::Zeroize;

use crate::fix16::ErrorLatch;
use crate::{BINS, BITS_PER_BIN};

const WORD_BITS: usize = 32;

/// Number of storage words for the whole histogram.
pub const HISTOGRAM_WORDS: usize = (BINS * BITS_PER_BIN as usize + WORD_BITS - 1) / WORD_BITS;

/// Largest count a single bin can hold.
pub const BIN_CAPACITY: u32 = (1 << BITS_PER_BIN) - 1;

/// Histogram of `BINS` counters packed into `HISTOGRAM_WORDS` words.
#[derive(Clone)]
pub struct PackedHistogram {
    words: [u32; HISTOGRAM_WORDS],
    total: u32,
    overflowed: bool,
}

impl Default for PackedHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for PackedHistogram {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PackedHistogram")
            .field("total", &self.total)
            .field("overflowed", &self.overflowed)
            .finish_non_exhaustive()
    }
}

impl PackedHistogram {
    pub const fn new() -> Self {
        Self {
            words: [0; HISTOGRAM_WORDS],
            total: 0,
            overflowed: false,
        }
    }

    /// Wipe every bin, the sample count and the overflow flag.
    pub fn clear(&mut self) {
        self.words.zeroize();
        self.total = 0;
        self.overflowed = false;
    }

    /// Samples absorbed through [`increment`](Self::increment) since the last clear.
    #[inline]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Whether a write was ever discarded for exceeding [`BIN_CAPACITY`].
    #[inline]
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Word index and bit offset of the first bit of `index`.
    #[inline]
    fn locate(index: usize) -> (usize, u32) {
        let bit = index * BITS_PER_BIN as usize;
        (bit / WORD_BITS, (bit % WORD_BITS) as u32)
    }

    /// Count stored in bin `index`. Out-of-range reads raise `latch` and return zero.
    pub fn get(&self, index: usize, latch: &mut ErrorLatch) -> u32 {
        if index >= BINS {
            latch.raise();
            return 0;
        }
        let (word, shift) = Self::locate(index);
        let low_bits = WORD_BITS as u32 - shift;
        let mut value = self.words[word] >> shift;
        if low_bits < BITS_PER_BIN {
            value |= self.words[word + 1] << low_bits;
        }
        value & BIN_CAPACITY
    }

    /// Store `value` in bin `index`.
    ///
    /// Values above [`BIN_CAPACITY`] set the overflow flag and are discarded.
    /// Out-of-range indices raise `latch` and write nothing.
    pub fn put(&mut self, index: usize, value: u32, latch: &mut ErrorLatch) {
        if index >= BINS {
            latch.raise();
            return;
        }
        if value > BIN_CAPACITY {
            self.overflowed = true;
            return;
        }
        let (word, shift) = Self::locate(index);
        let low_bits = WORD_BITS as u32 - shift;
        self.words[word] = (self.words[word] & !(BIN_CAPACITY << shift)) | (value << shift);
        if low_bits < BITS_PER_BIN {
            let high_mask = BIN_CAPACITY >> low_bits;
            self.words[word + 1] = (self.words[word + 1] & !high_mask) | (value >> low_bits);
        }
    }

    /// Count one more sample in bin `index`.
    pub fn increment(&mut self, index: usize, latch: &mut ErrorLatch) {
        let count = self.get(index, latch);
        self.put(index, count + 1, latch);
        self.total = self.total.wrapping_add(1);
    }
}
