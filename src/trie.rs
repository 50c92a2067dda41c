//! The two-tier succinct trie index.
//!
//! [`Trie`] owns a [dense](crate::dense) tier for the levels near the root
//! and a [sparse](crate::sparse) tier for everything below; [`TrieIter`]
//! stitches the two cursors into one ordered, bidirectional iterator.

#[cfg(not(test))]
use alloc::vec::Vec;

use crate::binary::{Reader, Writer};
use crate::bitvec::BitVector;
use crate::builder::Builder;
use crate::dense::{DenseCursor, DenseResult, LoudsDense};
use crate::error::{Error, Result};
use crate::labels::LabelVector;
use crate::rank::{RankVector, RANK_BLOCK_BITS};
use crate::select::{SelectVector, SELECT_SAMPLE_INTERVAL};
use crate::sparse::{LoudsSparse, SparseCursor};
use crate::Config;

/// An immutable, ordered byte-key → `u64` index on a succinct trie.
///
/// Built once from a sorted key list, then queried concurrently: point
/// lookups walk the dense bitmaps and sparse labels in O(|key|) words read;
/// [`seek`](Trie::seek) and [`range`](Trie::range) hand out bidirectional
/// iterators.
///
/// The lifetime parameter tracks borrowed storage: [`Trie::build`] returns
/// `Trie<'static>` (owned), while [`Trie::deserialize`] returns a trie that
/// aliases the caller's buffer.
///
/// # Example
///
/// ```
/// use trieste::Trie;
///
/// let keys: &[&[u8]] = &[b"apple", b"banana", b"cherry"];
/// let trie = Trie::build(keys, &[10, 20, 30]).unwrap();
///
/// assert_eq!(trie.lookup(b"banana"), Some(20));
/// assert_eq!(trie.lookup(b"grape"), None);
///
/// let mut iter = trie.seek(b"b", true);
/// assert_eq!(iter.key(), b"banana");
/// iter.next();
/// assert_eq!(iter.key(), b"cherry");
/// ```
pub struct Trie<'a> {
    dense: LoudsDense<'a>,
    sparse: LoudsSparse<'a>,
}

impl Trie<'static> {
    /// Build a trie from sorted keys and their values, with the default
    /// configuration.
    ///
    /// Keys must be byte-sorted; consecutive duplicates collapse to their
    /// first occurrence. Empty keys and keys containing the reserved byte
    /// `0xff` are rejected.
    pub fn build<K: AsRef<[u8]>>(keys: &[K], values: &[u64]) -> Result<Trie<'static>> {
        Self::build_with_config(keys, values, &Config::default())
    }

    /// Build with an explicit [`Config`].
    pub fn build_with_config<K: AsRef<[u8]>>(
        keys: &[K],
        values: &[u64],
        config: &Config,
    ) -> Result<Trie<'static>> {
        Self::build_with_skip_prefix(keys, values, 0, config)
    }

    /// Build over key suffixes: the caller has verified that all keys share
    /// their first `skip_prefix` bytes, and trie level 0 indexes byte
    /// `skip_prefix` of each key. Queries against the resulting trie use
    /// the stripped suffixes.
    pub fn build_with_skip_prefix<K: AsRef<[u8]>>(
        keys: &[K],
        values: &[u64],
        skip_prefix: usize,
        config: &Config,
    ) -> Result<Trie<'static>> {
        let key_slices: Vec<&[u8]> = keys.iter().map(AsRef::as_ref).collect();
        let mut builder = Builder::new(config);
        builder.build(&key_slices, values, skip_prefix)?;
        Ok(Trie {
            dense: LoudsDense::from_builder(&mut builder),
            sparse: LoudsSparse::from_builder(&mut builder),
        })
    }
}

impl<'a> Trie<'a> {
    /// Exact point lookup.
    pub fn lookup(&self, key: &[u8]) -> Option<u64> {
        match self.dense.lookup(key) {
            DenseResult::Value(v) => Some(v),
            DenseResult::Absent => None,
            DenseResult::Sparse(node) => self.sparse.lookup(key, node),
        }
    }

    /// Position an iterator at the first key ≥ `probe` (or > `probe` when
    /// `inclusive` is false). The iterator is invalid when no such key
    /// exists.
    pub fn seek(&self, probe: &[u8], inclusive: bool) -> TrieIter<'_> {
        let mut iter = TrieIter::new(self);
        if self.dense.height() == 0 {
            self.sparse.seek(probe, inclusive, &mut iter.sparse);
            return iter;
        }

        self.dense.seek(probe, inclusive, &mut iter.dense);
        if iter.dense.valid && !iter.dense.complete {
            if iter.dense.search_in_sparse {
                // The probe's dense prefix matched exactly; the comparison
                // continues in the sparse subtree.
                iter.sparse.reset_with_start(iter.dense.send_out_node);
                self.sparse.seek(probe, inclusive, &mut iter.sparse);
                if !iter.sparse.valid {
                    iter.advance_dense();
                }
            } else {
                // The dense walk already moved past the probe.
                iter.enter_sparse_leftmost();
            }
        }
        iter
    }

    /// Iterators over `[lo, hi]` with per-bound inclusiveness: the first
    /// iterator sits on the smallest key in range, the second on the first
    /// key past the range. Both are invalid when `lo > hi`.
    pub fn range(
        &self,
        lo: &[u8],
        lo_inclusive: bool,
        hi: &[u8],
        hi_inclusive: bool,
    ) -> (TrieIter<'_>, TrieIter<'_>) {
        if lo > hi {
            return (TrieIter::new(self), TrieIter::new(self));
        }
        (self.seek(lo, lo_inclusive), self.seek(hi, !hi_inclusive))
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.dense.num_values() + self.sparse.num_values()
    }

    /// Whether the trie stores no keys. A successful build always stores at
    /// least one.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Trie height: the length of the longest stored key path (terminator
    /// edges included).
    pub fn height(&self) -> usize {
        self.sparse.height()
    }

    /// First level encoded by the sparse tier; levels below it are dense.
    pub fn sparse_start_level(&self) -> usize {
        self.sparse.start_level()
    }

    /// Approximate resident size of the frozen structures, in bytes.
    pub fn memory_usage(&self) -> usize {
        self.dense.memory_usage() + self.sparse.memory_usage()
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize into a byte buffer: native-endian words, 8-byte-aligned
    /// sections. See [`Trie::deserialize`] for the aliasing contract.
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u64(self.sparse.height() as u64);
        w.put_u64(self.sparse.start_level() as u64);
        w.put_u64(self.sparse.node_count_dense() as u64);
        w.put_u64(self.sparse.child_count_dense() as u64);

        write_rank(&mut w, self.dense.label_bitmaps());
        write_rank(&mut w, self.dense.child_bitmaps());
        write_rank(&mut w, self.dense.prefixkey_bits());
        w.put_u64(self.dense.values().len() as u64);
        w.put_u64s(self.dense.values());

        w.put_u64(self.sparse.labels().len() as u64);
        w.put_bytes(self.sparse.labels().bytes());
        write_rank(&mut w, self.sparse.child_bits());
        write_select(&mut w, self.sparse.louds_bits());
        w.put_u64(self.sparse.values().len() as u64);
        w.put_u64s(self.sparse.values());

        w.into_bytes()
    }

    /// Reconstruct a trie from a buffer produced by [`Trie::serialize`].
    ///
    /// The trie aliases label bytes, bitvector words and value arrays
    /// directly out of `buf`, so the buffer must outlive the trie and must
    /// start on an 8-byte boundary. Nothing is recomputed; corrupt or
    /// truncated buffers are rejected.
    pub fn deserialize(buf: &'a [u8]) -> Result<Trie<'a>> {
        let mut r = Reader::new(buf)?;
        let height = r.take_len()?;
        let start_level = r.take_len()?;
        let node_count_dense = r.take_len()?;
        let child_count_dense = r.take_len()?;
        if start_level > height {
            return Err(Error::Corrupted("sparse start level exceeds height"));
        }

        let label_bitmaps = read_rank(&mut r)?;
        let child_bitmaps = read_rank(&mut r)?;
        let prefixkey_bits = read_rank(&mut r)?;
        if label_bitmaps.num_bits() != child_bitmaps.num_bits()
            || label_bitmaps.num_bits() != prefixkey_bits.num_bits() * crate::FANOUT
        {
            return Err(Error::Corrupted("dense bitmap sizes disagree"));
        }
        let dense_value_count = r.take_len()?;
        let dense_values = r.take_u64s(dense_value_count)?;

        let label_count = r.take_len()?;
        let label_bytes = r.take_bytes(label_count)?;
        let child_bits = read_rank(&mut r)?;
        let louds_bits = read_select(&mut r)?;
        if child_bits.num_bits() != label_count || louds_bits.num_bits() != label_count {
            return Err(Error::Corrupted("sparse vector sizes disagree"));
        }
        let sparse_value_count = r.take_len()?;
        let sparse_values = r.take_u64s(sparse_value_count)?;

        Ok(Trie {
            dense: LoudsDense::from_parts(
                start_level,
                label_bitmaps,
                child_bitmaps,
                prefixkey_bits,
                dense_values,
            ),
            sparse: LoudsSparse::from_parts(
                height,
                start_level,
                node_count_dense,
                child_count_dense,
                LabelVector::from_borrowed(label_bytes),
                child_bits,
                louds_bits,
                sparse_values,
            ),
        })
    }
}

fn write_rank(w: &mut Writer, rv: &RankVector<'_>) {
    w.put_u64(rv.num_bits() as u64);
    w.put_u64s(rv.bits().words());
    w.put_u64(rv.block_ranks().len() as u64);
    w.put_u32s(rv.block_ranks());
}

fn read_rank<'a>(r: &mut Reader<'a>) -> Result<RankVector<'a>> {
    let num_bits = r.take_len()?;
    let words = r.take_u64s(num_bits.div_ceil(64))?;
    let rank_count = r.take_len()?;
    if rank_count != num_bits.div_ceil(RANK_BLOCK_BITS) + 1 {
        return Err(Error::Corrupted("rank directory has wrong size"));
    }
    let block_ranks = r.take_u32s(rank_count)?;
    Ok(RankVector::from_parts(
        BitVector::from_borrowed(words, num_bits),
        block_ranks,
    ))
}

fn write_select(w: &mut Writer, sv: &SelectVector<'_>) {
    w.put_u64(sv.num_bits() as u64);
    w.put_u64s(sv.bits().words());
    w.put_u64(sv.num_ones() as u64);
    w.put_u64(sv.samples().len() as u64);
    w.put_u32s(sv.samples());
}

fn read_select<'a>(r: &mut Reader<'a>) -> Result<SelectVector<'a>> {
    let num_bits = r.take_len()?;
    let words = r.take_u64s(num_bits.div_ceil(64))?;
    let num_ones = r.take_len()?;
    if num_ones > num_bits {
        return Err(Error::Corrupted("select index counts more ones than bits"));
    }
    let sample_count = r.take_len()?;
    if sample_count != num_ones.div_ceil(SELECT_SAMPLE_INTERVAL) {
        return Err(Error::Corrupted("select index has wrong sample count"));
    }
    let samples = r.take_u32s(sample_count)?;
    Ok(SelectVector::from_parts(
        BitVector::from_borrowed(words, num_bits),
        samples,
        num_ones,
    ))
}

/// A bidirectional cursor over the trie's keys in byte order.
///
/// An iterator is either *valid* (it denotes a stored key) or *invalid*
/// (moved past either end). [`next`](TrieIter::next) and
/// [`prev`](TrieIter::prev) on an invalid iterator are no-ops; two
/// iterators compare equal when both are invalid or both denote the same
/// key.
#[derive(Clone)]
pub struct TrieIter<'t> {
    trie: &'t Trie<'t>,
    dense: DenseCursor,
    sparse: SparseCursor,
}

impl<'t> TrieIter<'t> {
    fn new(trie: &'t Trie<'t>) -> Self {
        TrieIter {
            trie,
            dense: DenseCursor::new(),
            sparse: SparseCursor::new(),
        }
    }

    /// Whether the iterator denotes a key.
    pub fn is_valid(&self) -> bool {
        if self.trie.dense.height() == 0 {
            self.sparse.valid
        } else {
            self.dense.valid && (self.dense.complete || self.sparse.valid)
        }
    }

    /// The current key. Empty when the iterator is invalid.
    pub fn key(&self) -> Vec<u8> {
        if !self.is_valid() {
            return Vec::new();
        }
        if self.trie.dense.height() == 0 {
            return self.sparse.key_slice().to_vec();
        }
        let mut key = self.dense.key_slice().to_vec();
        if !self.dense.complete {
            key.extend_from_slice(self.sparse.key_slice());
        }
        key
    }

    /// The current key's value.
    ///
    /// # Panics
    ///
    /// Panics in debug builds when the iterator is invalid.
    pub fn value(&self) -> u64 {
        debug_assert!(self.is_valid());
        if self.trie.dense.height() != 0 && self.dense.complete {
            self.trie.dense.value(&self.dense)
        } else {
            self.trie.sparse.value(&self.sparse)
        }
    }

    /// Move to the successor key; the iterator becomes invalid past the
    /// last key.
    pub fn next(&mut self) {
        if !self.is_valid() {
            return;
        }
        if self.trie.dense.height() == 0 {
            self.trie.sparse.next(&mut self.sparse);
            return;
        }
        if self.dense.complete {
            self.advance_dense();
        } else {
            self.trie.sparse.next(&mut self.sparse);
            if !self.sparse.valid {
                self.advance_dense();
            }
        }
    }

    /// Move to the predecessor key; the iterator becomes invalid before the
    /// first key.
    pub fn prev(&mut self) {
        if !self.is_valid() {
            return;
        }
        if self.trie.dense.height() == 0 {
            self.trie.sparse.prev(&mut self.sparse);
            return;
        }
        if self.dense.complete {
            self.retreat_dense();
        } else {
            self.trie.sparse.prev(&mut self.sparse);
            if !self.sparse.valid {
                self.retreat_dense();
            }
        }
    }

    /// Advance the dense cursor and re-enter the sparse tier if the new
    /// position points into a sparse subtree.
    fn advance_dense(&mut self) {
        self.trie.dense.next(&mut self.dense);
        if self.dense.valid && !self.dense.complete {
            self.enter_sparse_leftmost();
        }
    }

    fn retreat_dense(&mut self) {
        self.trie.dense.prev(&mut self.dense);
        if self.dense.valid && !self.dense.complete {
            self.sparse.reset_with_start(self.dense.send_out_node);
            self.trie.sparse.rightmost(&mut self.sparse);
            debug_assert!(self.sparse.valid);
        }
    }

    fn enter_sparse_leftmost(&mut self) {
        self.sparse.reset_with_start(self.dense.send_out_node);
        self.trie.sparse.leftmost(&mut self.sparse);
        debug_assert!(self.sparse.valid);
    }
}

impl PartialEq for TrieIter<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_valid(), other.is_valid()) {
            (false, false) => true,
            (true, true) => self.key() == other.key(),
            _ => false,
        }
    }
}

impl core::fmt::Debug for TrieIter<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_valid() {
            f.debug_struct("TrieIter")
                .field("key", &self.key())
                .field("value", &self.value())
                .finish()
        } else {
            f.debug_struct("TrieIter").field("valid", &false).finish()
        }
    }
}
