//! Single-pass trie construction from a sorted key list.
//!
//! The builder fills per-level label/child/LOUDS vectors by comparing each
//! key against its predecessor: shared prefix bytes promote existing edges
//! to internal edges (child bit set), and the remaining bytes are appended
//! as new edges. A key that is a proper prefix of its successor stays
//! addressable through a terminator edge (byte 0xff, child bit clear) in a
//! fresh node below its last byte.
//!
//! After the sparse vectors exist, the dense/sparse cutoff level is chosen
//! by the configured memory ratio and the dense bitmaps are synthesized
//! from the sparse vectors for every level below the cutoff.

#[cfg(not(test))]
use alloc::vec;
#[cfg(not(test))]
use alloc::vec::Vec;

use crate::bitvec::{read_word_bit, set_word_bit};
use crate::error::{Error, Result};
use crate::{Config, FANOUT, TERMINATOR};

pub(crate) struct Builder {
    include_dense: bool,
    sparse_dense_ratio: u32,
    pub(crate) sparse_start_level: usize,

    // LOUDS-Sparse vectors, one entry per level.
    pub(crate) labels: Vec<Vec<u8>>,
    pub(crate) child_indicator_bits: Vec<Vec<u64>>,
    pub(crate) louds_bits: Vec<Vec<u64>>,
    pub(crate) node_counts: Vec<usize>,
    values: Vec<Vec<u64>>,
    last_item_is_terminator: Vec<bool>,

    // LOUDS-Dense bitmaps for levels below the cutoff.
    pub(crate) bitmap_labels: Vec<Vec<u64>>,
    pub(crate) bitmap_child_bits: Vec<Vec<u64>>,
    pub(crate) prefixkey_bits: Vec<Vec<u64>>,

    pub(crate) values_dense: Vec<u64>,
    pub(crate) values_sparse: Vec<u64>,
}

impl Builder {
    pub(crate) fn new(config: &Config) -> Self {
        Builder {
            include_dense: config.include_dense,
            sparse_dense_ratio: config.sparse_dense_ratio,
            sparse_start_level: 0,
            labels: Vec::new(),
            child_indicator_bits: Vec::new(),
            louds_bits: Vec::new(),
            node_counts: Vec::new(),
            values: Vec::new(),
            last_item_is_terminator: Vec::new(),
            bitmap_labels: Vec::new(),
            bitmap_child_bits: Vec::new(),
            prefixkey_bits: Vec::new(),
            values_dense: Vec::new(),
            values_sparse: Vec::new(),
        }
    }

    /// Build all vectors from a sorted key list. `skip_prefix` bytes of
    /// every key have already been stripped by the caller, so trie level 0
    /// corresponds to byte `skip_prefix`.
    pub(crate) fn build(
        &mut self,
        keys: &[&[u8]],
        values: &[u64],
        skip_prefix: usize,
    ) -> Result<()> {
        self.validate(keys, values, skip_prefix)?;
        self.build_sparse(keys, values, skip_prefix);
        self.determine_cutoff_level();
        self.split_values();
        self.build_dense();
        Ok(())
    }

    pub(crate) fn height(&self) -> usize {
        self.labels.len()
    }

    fn validate(&self, keys: &[&[u8]], values: &[u64], skip_prefix: usize) -> Result<()> {
        if keys.len() != values.len() {
            return Err(Error::KeyValueLengthMismatch {
                keys: keys.len(),
                values: values.len(),
            });
        }
        if keys.is_empty() {
            return Err(Error::EmptyInput);
        }
        for (index, key) in keys.iter().enumerate() {
            if key.len() <= skip_prefix {
                return Err(if skip_prefix == 0 {
                    Error::EmptyKey { index }
                } else {
                    Error::KeyShorterThanPrefix { index, skip_prefix }
                });
            }
            if key[skip_prefix..].contains(&TERMINATOR) {
                return Err(Error::ReservedLabelByte { index });
            }
            if index > 0 && key[skip_prefix..] < keys[index - 1][skip_prefix..] {
                return Err(Error::UnsortedKeys { index });
            }
        }
        Ok(())
    }

    fn build_sparse(&mut self, keys: &[&[u8]], values: &[u64], skip: usize) {
        let mut i = 0;
        while i < keys.len() {
            let key = keys[i];
            // Equal keys collapse to their first occurrence.
            let mut j = i + 1;
            while j < keys.len() && keys[j][skip..] == key[skip..] {
                j += 1;
            }
            let next_key = keys.get(j).copied();
            let level = self.skip_common_prefix(key, skip);
            self.insert_key(key, values[i], next_key, level, skip);
            i = j;
        }
    }

    /// Walk down the partially built trie along `key`'s shared prefix with
    /// the previous key (the last item at each level), promoting each shared
    /// edge to an internal edge. Returns the first level where `key`
    /// diverges.
    fn skip_common_prefix(&mut self, key: &[u8], skip: usize) -> usize {
        let mut level = 0;
        while skip + level < key.len() && self.is_char_common_prefix(key[skip + level], level) {
            let last = self.num_items(level) - 1;
            set_word_bit(&mut self.child_indicator_bits[level], last);
            level += 1;
        }
        level
    }

    fn is_char_common_prefix(&self, c: u8, level: usize) -> bool {
        level < self.height()
            && !self.last_item_is_terminator[level]
            && self.labels[level].last() == Some(&c)
    }

    fn insert_key(
        &mut self,
        key: &[u8],
        value: u64,
        next_key: Option<&[u8]>,
        start_level: usize,
        skip: usize,
    ) {
        debug_assert!(skip + start_level < key.len());

        // The divergence byte joins the node the previous key ended in;
        // every byte after it starts a fresh singleton node.
        let mut level = start_level;
        let is_start_of_node = self.is_level_empty(level);
        self.insert_key_byte(key[skip + level], level, is_start_of_node, false);
        level += 1;
        while skip + level < key.len() {
            self.insert_key_byte(key[skip + level], level, true, false);
            level += 1;
        }

        if let Some(next) = next_key {
            if next.len() > key.len() && next[skip..].starts_with(&key[skip..]) {
                self.insert_key_byte(TERMINATOR, level, true, true);
                level += 1;
            }
        }
        self.values[level - 1].push(value);
    }

    fn insert_key_byte(&mut self, c: u8, level: usize, is_start_of_node: bool, is_term: bool) {
        if level >= self.height() {
            self.add_level();
        }
        debug_assert!(level < self.height());

        // This edge's parent gains a subtree.
        if level > 0 {
            let parent_last = self.num_items(level - 1) - 1;
            set_word_bit(&mut self.child_indicator_bits[level - 1], parent_last);
        }

        self.labels[level].push(c);
        if is_start_of_node {
            let last = self.num_items(level) - 1;
            set_word_bit(&mut self.louds_bits[level], last);
            self.node_counts[level] += 1;
        }
        self.last_item_is_terminator[level] = is_term;
        self.reserve_bit_slot(level);
    }

    fn is_level_empty(&self, level: usize) -> bool {
        level >= self.height() || self.labels[level].is_empty()
    }

    fn num_items(&self, level: usize) -> usize {
        self.labels[level].len()
    }

    fn add_level(&mut self) {
        self.labels.push(Vec::new());
        self.child_indicator_bits.push(vec![0]);
        self.louds_bits.push(vec![0]);
        self.values.push(Vec::new());
        self.node_counts.push(0);
        self.last_item_is_terminator.push(false);
    }

    /// Keep a spare word in the level's bit vectors once the current one
    /// fills up.
    fn reserve_bit_slot(&mut self, level: usize) {
        if self.num_items(level) % 64 == 0 {
            self.child_indicator_bits[level].push(0);
            self.louds_bits[level].push(0);
        }
    }

    /// Pick the smallest cutoff level whose dense encoding, scaled by the
    /// configured ratio, is no longer cheaper than the sparse encoding of
    /// everything below it.
    fn determine_cutoff_level(&mut self) {
        if !self.include_dense {
            self.sparse_start_level = 0;
            return;
        }
        let mut cutoff = 0;
        while cutoff < self.height()
            && self.dense_mem(cutoff) * (self.sparse_dense_ratio as u64) < self.sparse_mem(cutoff)
        {
            cutoff += 1;
        }
        self.sparse_start_level = cutoff;
    }

    fn dense_mem(&self, downto_level: usize) -> u64 {
        let mut mem = 0u64;
        for level in 0..downto_level {
            mem += 2 * FANOUT as u64 * self.node_counts[level] as u64;
            if level > 0 {
                mem += self.node_counts[level - 1] as u64 / 8 + 1;
            }
        }
        mem
    }

    fn sparse_mem(&self, start_level: usize) -> u64 {
        let mut mem = 0u64;
        for level in start_level..self.height() {
            let num_items = self.labels[level].len() as u64;
            mem += num_items + 2 * num_items / 8 + 1;
        }
        mem
    }

    fn split_values(&mut self) {
        for level in 0..self.sparse_start_level {
            self.values_dense.append(&mut self.values[level]);
        }
        for level in self.sparse_start_level..self.height() {
            self.values_sparse.append(&mut self.values[level]);
        }
        self.values.clear();
    }

    /// Synthesize the dense bitmaps for every level below the cutoff from
    /// the sparse vectors.
    fn build_dense(&mut self) {
        for level in 0..self.sparse_start_level {
            self.init_dense_level(level);
            if self.num_items(level) == 0 {
                continue;
            }
            let mut node_num = 0;
            if self.is_terminator(level, 0) {
                set_word_bit(&mut self.prefixkey_bits[level], 0);
            } else {
                self.set_dense_label_and_child(level, node_num, 0);
            }
            for pos in 1..self.num_items(level) {
                if self.is_start_of_node(level, pos) {
                    node_num += 1;
                    if self.is_terminator(level, pos) {
                        set_word_bit(&mut self.prefixkey_bits[level], node_num);
                        continue;
                    }
                }
                self.set_dense_label_and_child(level, node_num, pos);
            }
        }
    }

    fn init_dense_level(&mut self, level: usize) {
        let nodes = self.node_counts[level];
        let bitmap_words = nodes * (FANOUT / 64);
        self.bitmap_labels.push(vec![0; bitmap_words]);
        self.bitmap_child_bits.push(vec![0; bitmap_words]);
        self.prefixkey_bits.push(vec![0; nodes.div_ceil(64)]);
    }

    fn set_dense_label_and_child(&mut self, level: usize, node_num: usize, pos: usize) {
        let label = self.labels[level][pos] as usize;
        set_word_bit(&mut self.bitmap_labels[level], node_num * FANOUT + label);
        if read_word_bit(&self.child_indicator_bits[level], pos) {
            set_word_bit(&mut self.bitmap_child_bits[level], node_num * FANOUT + label);
        }
    }

    fn is_start_of_node(&self, level: usize, pos: usize) -> bool {
        read_word_bit(&self.louds_bits[level], pos)
    }

    fn is_terminator(&self, level: usize, pos: usize) -> bool {
        self.labels[level][pos] == TERMINATOR
            && !read_word_bit(&self.child_indicator_bits[level], pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_only() -> Config {
        Config {
            include_dense: false,
            ..Config::default()
        }
    }

    fn build(keys: &[&[u8]], config: &Config) -> Builder {
        let values: Vec<u64> = (0..keys.len() as u64).collect();
        let mut b = Builder::new(config);
        b.build(keys, &values, 0).unwrap();
        b
    }

    #[test]
    fn test_single_key() {
        let b = build(&[b"ab"], &sparse_only());
        assert_eq!(b.height(), 2);
        assert_eq!(b.labels[0], vec![b'a']);
        assert_eq!(b.labels[1], vec![b'b']);
        assert!(read_word_bit(&b.child_indicator_bits[0], 0));
        assert!(!read_word_bit(&b.child_indicator_bits[1], 0));
        assert!(read_word_bit(&b.louds_bits[0], 0));
        assert!(read_word_bit(&b.louds_bits[1], 0));
        assert_eq!(b.values_sparse, vec![0]);
    }

    #[test]
    fn test_sibling_keys_share_node() {
        let b = build(&[b"ab", b"ac"], &sparse_only());
        assert_eq!(b.labels[1], vec![b'b', b'c']);
        // 'c' joined 'b''s node: only one LOUDS bit at level 1.
        assert!(read_word_bit(&b.louds_bits[1], 0));
        assert!(!read_word_bit(&b.louds_bits[1], 1));
        assert_eq!(b.node_counts[1], 1);
        assert_eq!(b.values_sparse, vec![0, 1]);
    }

    #[test]
    fn test_full_keys_are_stored() {
        // Divergence is at byte 0; every remaining byte must still land in
        // the trie, one singleton node per level.
        let b = build(&[b"abcde", b"x"], &sparse_only());
        assert_eq!(b.height(), 5);
        assert_eq!(b.labels[0], vec![b'a', b'x']);
        assert_eq!(b.labels[4], vec![b'e']);
        assert_eq!(b.node_counts[4], 1);
        // Values sit at the levels of the terminal bytes: 'e' at level 4,
        // 'x' at level 0, flattened in level order.
        assert_eq!(b.values_sparse, vec![1, 0]);
    }

    #[test]
    fn test_prefix_key_gets_terminator() {
        let b = build(&[b"app", b"apple"], &sparse_only());
        // "app" is a proper prefix of "apple": a terminator edge keeps it
        // addressable, and "apple"'s 'l' joins the terminator's node.
        assert_eq!(b.labels[3], vec![TERMINATOR, b'l']);
        assert!(!read_word_bit(&b.child_indicator_bits[3], 0));
        assert!(read_word_bit(&b.child_indicator_bits[3], 1));
        assert!(read_word_bit(&b.louds_bits[3], 0));
        assert!(!read_word_bit(&b.louds_bits[3], 1));
        // "app"'s last byte became an internal edge.
        assert!(read_word_bit(&b.child_indicator_bits[2], 0));
        assert_eq!(b.values_sparse, vec![0, 1]);
    }

    #[test]
    fn test_chained_prefix_keys() {
        let b = build(&[b"a", b"ab", b"abc"], &sparse_only());
        assert_eq!(b.labels[1], vec![TERMINATOR, b'b']);
        assert_eq!(b.labels[2], vec![TERMINATOR, b'c']);
        // Values in level order: "a" at level 1, "ab" and "abc" at level 2.
        assert_eq!(b.values_sparse, vec![0, 1, 2]);
    }

    #[test]
    fn test_duplicate_keys_deduplicated() {
        let b = build(&[b"ab", b"ab", b"cd"], &sparse_only());
        assert_eq!(b.labels[0], vec![b'a', b'c']);
        // First occurrence's value wins.
        assert_eq!(b.values_sparse, vec![0, 2]);
    }

    #[test]
    fn test_node_counts_match_louds_bits() {
        let b = build(
            &[b"aaa", b"aab", b"abc", b"bcd", b"bce", b"bxy"],
            &sparse_only(),
        );
        for level in 0..b.height() {
            let set = (0..b.labels[level].len())
                .filter(|&p| read_word_bit(&b.louds_bits[level], p))
                .count();
            assert_eq!(set, b.node_counts[level], "level {}", level);
        }
    }

    #[test]
    fn test_child_counts_match_next_level_nodes() {
        let b = build(
            &[b"aaa", b"aab", b"abc", b"bcd", b"bce", b"bxy"],
            &sparse_only(),
        );
        for level in 0..b.height() - 1 {
            let children = (0..b.labels[level].len())
                .filter(|&p| read_word_bit(&b.child_indicator_bits[level], p))
                .count();
            assert_eq!(children, b.node_counts[level + 1], "level {}", level);
        }
    }

    #[test]
    fn test_labels_sorted_within_nodes() {
        let b = build(
            &[b"bar", b"baz", b"bit", b"foo", b"fox", b"fur"],
            &sparse_only(),
        );
        for level in 0..b.height() {
            let n = b.labels[level].len();
            for pos in 1..n {
                if !read_word_bit(&b.louds_bits[level], pos) {
                    let prev = b.labels[level][pos - 1];
                    let cur = b.labels[level][pos];
                    // Strictly increasing after an optional leading terminator.
                    assert!(prev == TERMINATOR || prev < cur, "level {} pos {}", level, pos);
                }
            }
        }
    }

    #[test]
    fn test_dense_synthesis_marks_prefix_keys() {
        let config = Config {
            include_dense: true,
            sparse_dense_ratio: 1,
        };
        // "a" plus 640 three-byte extensions: levels 0 and 1 go dense, the
        // wide level 2 stays sparse.
        let mut owned: Vec<Vec<u8>> = vec![b"a".to_vec()];
        for x in 0..16u8 {
            for y in 0..40u8 {
                owned.push(vec![b'a', b'a' + x, b'a' + y]);
            }
        }
        let keys: Vec<&[u8]> = owned.iter().map(|k| k.as_slice()).collect();
        let b = build(&keys, &config);
        assert_eq!(b.sparse_start_level, 2);

        // Root node: only 'a', internal.
        assert!(read_word_bit(&b.bitmap_labels[0], b'a' as usize));
        assert!(read_word_bit(&b.bitmap_child_bits[0], b'a' as usize));
        // "a"'s terminator became the level-1 node's prefix-key bit; the
        // real labels all carry children.
        assert!(read_word_bit(&b.prefixkey_bits[1], 0));
        for x in 0..16u8 {
            let label = (b'a' + x) as usize;
            assert!(read_word_bit(&b.bitmap_labels[1], label));
            assert!(read_word_bit(&b.bitmap_child_bits[1], label));
        }
        // Only "a" terminates in the dense tier.
        assert_eq!(b.values_dense, vec![0]);
        assert_eq!(b.values_sparse.len(), 640);
    }

    #[test]
    fn test_cutoff_forced_to_zero_without_dense() {
        let b = build(&[b"abc", b"abd"], &sparse_only());
        assert_eq!(b.sparse_start_level, 0);
        assert!(b.bitmap_labels.is_empty());
        assert_eq!(b.values_dense, Vec::<u64>::new());
    }

    #[test]
    fn test_skip_prefix_strips_shared_bytes() {
        let keys: Vec<&[u8]> = vec![b"zzab", b"zzac"];
        let values = vec![7u64, 8];
        let mut b = Builder::new(&sparse_only());
        b.build(&keys, &values, 2).unwrap();
        assert_eq!(b.height(), 2);
        assert_eq!(b.labels[0], vec![b'a']);
        assert_eq!(b.labels[1], vec![b'b', b'c']);
    }

    #[test]
    fn test_validation_errors() {
        let mut b = Builder::new(&sparse_only());
        assert_eq!(
            b.build(&[], &[], 0),
            Err(Error::EmptyInput)
        );

        let mut b = Builder::new(&sparse_only());
        assert_eq!(
            b.build(&[b"a".as_slice()], &[1, 2], 0),
            Err(Error::KeyValueLengthMismatch { keys: 1, values: 2 })
        );

        let mut b = Builder::new(&sparse_only());
        assert_eq!(
            b.build(&[b"b".as_slice(), b"a".as_slice()], &[1, 2], 0),
            Err(Error::UnsortedKeys { index: 1 })
        );

        let mut b = Builder::new(&sparse_only());
        assert_eq!(
            b.build(&[b"".as_slice()], &[1], 0),
            Err(Error::EmptyKey { index: 0 })
        );

        let mut b = Builder::new(&sparse_only());
        assert_eq!(
            b.build(&[[b'a', TERMINATOR].as_slice()], &[1], 0),
            Err(Error::ReservedLabelByte { index: 0 })
        );

        let mut b = Builder::new(&sparse_only());
        assert_eq!(
            b.build(&[b"ab".as_slice()], &[1], 2),
            Err(Error::KeyShorterThanPrefix { index: 0, skip_prefix: 2 })
        );
    }
}
