//! Select-augmented bitvector for fast select queries.
//!
//! Every 64th set bit's position is sampled; `select(k)` jumps to the
//! nearest sample at or below `k` and finishes with a word-popcount scan.
//! Queries are 1-indexed: `select(1)` is the position of the first set bit.

#[cfg(not(test))]
use alloc::vec::Vec;

use alloc::borrow::Cow;

use crate::bitvec::BitVector;

/// Every `SELECT_SAMPLE_INTERVAL`-th set bit is sampled.
pub(crate) const SELECT_SAMPLE_INTERVAL: usize = 64;

/// A bitvector composed with a sampled select index.
#[derive(Clone, Debug)]
pub struct SelectVector<'a> {
    bits: BitVector<'a>,
    samples: Cow<'a, [u32]>,
    num_ones: usize,
}

impl<'a> SelectVector<'a> {
    /// Augment a bitvector with a select index.
    pub fn new(bits: BitVector<'a>) -> Self {
        let (samples, num_ones) = build_samples(&bits);
        SelectVector {
            bits,
            samples: Cow::Owned(samples),
            num_ones,
        }
    }

    /// Reassemble from deserialized parts.
    pub(crate) fn from_parts(bits: BitVector<'a>, samples: &'a [u32], num_ones: usize) -> Self {
        SelectVector {
            bits,
            samples: Cow::Borrowed(samples),
            num_ones,
        }
    }

    /// The underlying bitvector.
    #[inline]
    pub fn bits(&self) -> &BitVector<'a> {
        &self.bits
    }

    /// The sampled positions (for serialization).
    #[inline]
    pub(crate) fn samples(&self) -> &[u32] {
        &self.samples
    }

    /// Number of bits.
    #[inline]
    pub fn num_bits(&self) -> usize {
        self.bits.num_bits()
    }

    /// Total number of set bits.
    #[inline]
    pub fn num_ones(&self) -> usize {
        self.num_ones
    }

    /// Position of the `k`-th set bit, 1-indexed.
    ///
    /// # Panics
    ///
    /// Panics if `k == 0` or `k > num_ones()`.
    pub fn select(&self, k: usize) -> usize {
        assert!(
            k >= 1 && k <= self.num_ones,
            "select rank {} out of range (ones={})",
            k,
            self.num_ones
        );

        let sample_idx = (k - 1) / SELECT_SAMPLE_INTERVAL;
        let pos = self.samples[sample_idx] as usize;
        let mut remaining = (k - 1) % SELECT_SAMPLE_INTERVAL;
        if remaining == 0 {
            return pos;
        }

        let words = self.bits.words();
        let mut word_id = pos / 64;
        let offset = pos % 64;
        // Drop the sampled bit and everything above it in its word.
        let mut w = if offset == 63 {
            0
        } else {
            words[word_id] & (u64::MAX >> (offset + 1))
        };
        loop {
            let pop = w.count_ones() as usize;
            if pop >= remaining {
                return word_id * 64 + select_in_word(w, (remaining - 1) as u32) as usize;
            }
            remaining -= pop;
            word_id += 1;
            w = words[word_id];
        }
    }
}

/// Position (from the MSB) of the `r`-th set bit of `w`, 0-indexed.
/// Returns 64 if `w` has fewer than `r + 1` set bits.
#[inline]
fn select_in_word(mut w: u64, r: u32) -> u32 {
    let mut remaining = r;
    loop {
        if w == 0 {
            return 64;
        }
        let lz = w.leading_zeros();
        if remaining == 0 {
            return lz;
        }
        remaining -= 1;
        w &= !(1u64 << (63 - lz));
    }
}

fn build_samples(bits: &BitVector<'_>) -> (Vec<u32>, usize) {
    let mut samples = Vec::new();
    let mut count = 0usize;
    for (word_id, &word) in bits.words().iter().enumerate() {
        let pop = word.count_ones() as usize;
        let mut needed = samples.len() * SELECT_SAMPLE_INTERVAL + 1;
        while needed <= count + pop {
            let in_word = select_in_word(word, (needed - count - 1) as u32);
            samples.push((word_id * 64 + in_word as usize) as u32);
            needed = samples.len() * SELECT_SAMPLE_INTERVAL + 1;
        }
        count += pop;
    }
    (samples, count)
}
