//! LOUDS-Sparse tier: the lower trie levels as a flat label vector with
//! LOUDS and child-indicator bitvectors.
//!
//! A node is the run of label positions between two set LOUDS bits. The
//! child indicator carries a rank directory (child numbering and value
//! indexing), the LOUDS bits carry a select index (node number → first
//! label position). Node numbers continue the dense tier's numbering, so
//! every position calculation offsets by `node_count_dense`.

#[cfg(not(test))]
use alloc::vec::Vec;

use alloc::borrow::Cow;
use core::mem;

use crate::bitvec::BitVector;
use crate::builder::Builder;
use crate::labels::LabelVector;
use crate::rank::RankVector;
use crate::select::SelectVector;
use crate::TERMINATOR;

pub(crate) struct LoudsSparse<'a> {
    /// Total trie height.
    height: usize,
    /// First level encoded by this tier (the dense/sparse cutoff).
    start_level: usize,
    node_count_dense: usize,
    child_count_dense: usize,
    labels: LabelVector<'a>,
    child_bits: RankVector<'a>,
    louds_bits: SelectVector<'a>,
    values: Cow<'a, [u64]>,
}

impl<'a> LoudsSparse<'a> {
    pub(crate) fn from_builder(builder: &mut Builder) -> LoudsSparse<'static> {
        let height = builder.height();
        let start_level = builder.sparse_start_level;

        let node_count_dense: usize = builder.node_counts[..start_level].iter().sum();
        let child_count_dense = if start_level == 0 {
            0
        } else if start_level < height {
            node_count_dense + builder.node_counts[start_level] - 1
        } else {
            node_count_dense.saturating_sub(1)
        };

        let bits_per_level: Vec<usize> = builder.labels.iter().map(Vec::len).collect();
        LoudsSparse {
            height,
            start_level,
            node_count_dense,
            child_count_dense,
            labels: LabelVector::from_levels(&builder.labels, start_level, height),
            child_bits: RankVector::new(BitVector::from_levels(
                &builder.child_indicator_bits,
                &bits_per_level,
                start_level,
                height,
            )),
            louds_bits: SelectVector::new(BitVector::from_levels(
                &builder.louds_bits,
                &bits_per_level,
                start_level,
                height,
            )),
            values: Cow::Owned(mem::take(&mut builder.values_sparse)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        height: usize,
        start_level: usize,
        node_count_dense: usize,
        child_count_dense: usize,
        labels: LabelVector<'a>,
        child_bits: RankVector<'a>,
        louds_bits: SelectVector<'a>,
        values: &'a [u64],
    ) -> Self {
        LoudsSparse {
            height,
            start_level,
            node_count_dense,
            child_count_dense,
            labels,
            child_bits,
            louds_bits,
            values: Cow::Borrowed(values),
        }
    }

    #[inline]
    pub(crate) fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub(crate) fn start_level(&self) -> usize {
        self.start_level
    }

    #[inline]
    pub(crate) fn node_count_dense(&self) -> usize {
        self.node_count_dense
    }

    #[inline]
    pub(crate) fn child_count_dense(&self) -> usize {
        self.child_count_dense
    }

    #[inline]
    pub(crate) fn num_items(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub(crate) fn num_values(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn labels(&self) -> &LabelVector<'a> {
        &self.labels
    }

    pub(crate) fn child_bits(&self) -> &RankVector<'a> {
        &self.child_bits
    }

    pub(crate) fn louds_bits(&self) -> &SelectVector<'a> {
        &self.louds_bits
    }

    pub(crate) fn values(&self) -> &[u64] {
        &self.values
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.labels.len()
            + self.child_bits.bits().num_words() * 8
            + self.louds_bits.bits().num_words() * 8
            + self.values.len() * 8
    }

    /// Point lookup continuing a dense walk at `in_node` with key bytes
    /// from `start_level` on.
    pub(crate) fn lookup(&self, key: &[u8], in_node: usize) -> Option<u64> {
        if self.labels.is_empty() {
            return None;
        }
        let mut pos = self.first_label_pos(in_node);
        for level in self.start_level..key.len() {
            let mut p = pos;
            if !self.labels.search(key[level], &mut p, self.node_size(pos)) {
                return None;
            }
            if !self.child_bits.read(p) {
                // Terminal edge: a hit only if this is the key's last byte.
                return (level + 1 == key.len()).then(|| self.value_at(p));
            }
            pos = self.first_label_pos(self.child_node(p));
        }
        // Key consumed on an internal edge: a leading terminator in the
        // child node is the key's terminal.
        if self.labels.read(pos) == TERMINATOR && !self.child_bits.read(pos) {
            return Some(self.value_at(pos));
        }
        None
    }

    /// First label position of `node` (a global node number).
    fn first_label_pos(&self, node: usize) -> usize {
        self.louds_bits.select(node + 1 - self.node_count_dense)
    }

    /// Last label position of `node`.
    fn last_label_pos(&self, node: usize) -> usize {
        let next_rank = node + 2 - self.node_count_dense;
        if next_rank > self.louds_bits.num_ones() {
            self.num_items() - 1
        } else {
            self.louds_bits.select(next_rank) - 1
        }
    }

    /// Number of labels in the node starting at `pos`.
    fn node_size(&self, pos: usize) -> usize {
        debug_assert!(self.louds_bits.bits().read(pos));
        self.louds_bits.bits().distance_to_next_set_bit(pos)
    }

    fn is_end_of_node(&self, pos: usize) -> bool {
        pos == self.num_items() - 1 || self.louds_bits.bits().read(pos + 1)
    }

    /// Global number of the node the edge at `pos` leads to.
    fn child_node(&self, pos: usize) -> usize {
        self.child_bits.rank1(pos + 1) + self.child_count_dense
    }

    fn value_at(&self, pos: usize) -> u64 {
        self.values[pos - self.child_bits.rank1(pos)]
    }

    // ------------------------------------------------------------------
    // Cursor operations
    // ------------------------------------------------------------------

    /// Position `cursor` at the smallest key ≥ `probe` (or > `probe` when
    /// `inclusive` is false) within the subtree rooted at the cursor's
    /// start node. The dense tier has already matched the first
    /// `start_level` probe bytes exactly.
    pub(crate) fn seek(&self, probe: &[u8], inclusive: bool, cursor: &mut SparseCursor) {
        if self.labels.is_empty() {
            cursor.valid = false;
            return;
        }
        let mut pos = self.first_label_pos(cursor.start_node);
        for level in self.start_level..probe.len() {
            let node_size = self.node_size(pos);
            let mut p = pos;
            if !self.labels.search(probe[level], &mut p, node_size) {
                self.move_to_left_in_next_subtree(pos, node_size, probe[level], cursor);
                return;
            }
            cursor.push(self.labels.read(p), p);
            if !self.child_bits.read(p) {
                // Exact-path terminal: the stored key is probe[..=level].
                if level + 1 == probe.len() && inclusive {
                    self.arrive(cursor, p);
                } else {
                    self.next(cursor);
                }
                return;
            }
            pos = self.first_label_pos(self.child_node(p));
        }

        // Probe consumed on an internal edge: a leading terminator in the
        // child node is exactly equal to the probe.
        if self.labels.read(pos) == TERMINATOR
            && !self.child_bits.read(pos)
            && !self.is_end_of_node(pos)
        {
            cursor.push(TERMINATOR, pos);
            if inclusive {
                self.arrive(cursor, pos);
            } else {
                self.next(cursor);
            }
            return;
        }

        // Every key under this edge extends the probe and is greater.
        self.leftmost(cursor);
    }

    /// On a failed label match, either descend into the subtree of the next
    /// greater label or advance out of an exhausted node.
    fn move_to_left_in_next_subtree(
        &self,
        pos: usize,
        node_size: usize,
        label: u8,
        cursor: &mut SparseCursor,
    ) {
        let mut p = pos;
        if self.labels.search_greater_than(label, &mut p, node_size) {
            cursor.push(self.labels.read(p), p);
            self.leftmost(cursor);
        } else {
            let last = pos + node_size - 1;
            cursor.push(self.labels.read(last), last);
            self.next(cursor);
        }
    }

    /// Descend along first labels to the leftmost key at or below the
    /// cursor's position (or below its start node when the cursor is empty).
    pub(crate) fn leftmost(&self, cursor: &mut SparseCursor) {
        if self.labels.is_empty() {
            cursor.valid = false;
            return;
        }
        if cursor.depth == 0 {
            let pos = self.first_label_pos(cursor.start_node);
            cursor.push(self.labels.read(pos), pos);
        }
        let mut pos = cursor.pos[cursor.depth - 1];
        loop {
            if !self.child_bits.read(pos) {
                self.arrive(cursor, pos);
                return;
            }
            pos = self.first_label_pos(self.child_node(pos));
            cursor.push(self.labels.read(pos), pos);
        }
    }

    /// Descend along last labels to the rightmost key at or below the
    /// cursor's position.
    pub(crate) fn rightmost(&self, cursor: &mut SparseCursor) {
        if self.labels.is_empty() {
            cursor.valid = false;
            return;
        }
        if cursor.depth == 0 {
            let pos = self.last_label_pos(cursor.start_node);
            cursor.push(self.labels.read(pos), pos);
        }
        let mut pos = cursor.pos[cursor.depth - 1];
        loop {
            if !self.child_bits.read(pos) {
                self.arrive(cursor, pos);
                return;
            }
            pos = self.last_label_pos(self.child_node(pos));
            cursor.push(self.labels.read(pos), pos);
        }
    }

    /// Advance to the next key in the cursor's subtree. Invalidates the
    /// cursor when the subtree is exhausted.
    pub(crate) fn next(&self, cursor: &mut SparseCursor) {
        debug_assert!(cursor.depth > 0);
        cursor.at_terminator = false;
        cursor.valid = false;
        let mut pos = cursor.pos[cursor.depth - 1] + 1;
        // A set LOUDS bit means the current node ended.
        while pos >= self.num_items() || self.louds_bits.bits().read(pos) {
            cursor.depth -= 1;
            if cursor.depth == 0 {
                return;
            }
            pos = cursor.pos[cursor.depth - 1] + 1;
        }
        cursor.set(cursor.depth - 1, self.labels.read(pos), pos);
        self.leftmost(cursor);
    }

    /// Retreat to the previous key in the cursor's subtree. Invalidates the
    /// cursor when nothing precedes it.
    pub(crate) fn prev(&self, cursor: &mut SparseCursor) {
        debug_assert!(cursor.depth > 0);
        cursor.at_terminator = false;
        cursor.valid = false;
        let mut pos = cursor.pos[cursor.depth - 1];
        loop {
            if pos == 0 {
                return;
            }
            if !self.louds_bits.bits().read(pos) {
                break;
            }
            cursor.depth -= 1;
            if cursor.depth == 0 {
                return;
            }
            pos = cursor.pos[cursor.depth - 1];
        }
        cursor.set(cursor.depth - 1, self.labels.read(pos - 1), pos - 1);
        self.rightmost(cursor);
    }

    /// Terminal bookkeeping: flag terminators and cache the value index.
    fn arrive(&self, cursor: &mut SparseCursor, pos: usize) {
        if self.labels.read(pos) == TERMINATOR && !self.is_end_of_node(pos) {
            cursor.at_terminator = true;
        }
        cursor.value_pos[cursor.depth - 1] = pos - self.child_bits.rank1(pos);
        cursor.valid = true;
    }

    /// Value at the cursor's terminal.
    pub(crate) fn value(&self, cursor: &SparseCursor) -> u64 {
        debug_assert!(cursor.valid);
        self.values[cursor.value_pos[cursor.depth - 1]]
    }
}

/// Iterator state for the sparse tier.
#[derive(Clone, Debug, Default)]
pub(crate) struct SparseCursor {
    pub(crate) valid: bool,
    /// Node at which the sparse traversal begins (from the dense tier).
    pub(crate) start_node: usize,
    pub(crate) depth: usize,
    key: Vec<u8>,
    pos: Vec<usize>,
    value_pos: Vec<usize>,
    /// The current terminal is a prefix-key terminator; its byte is not
    /// part of the key.
    pub(crate) at_terminator: bool,
}

impl SparseCursor {
    pub(crate) fn new() -> Self {
        SparseCursor::default()
    }

    pub(crate) fn clear(&mut self) {
        self.valid = false;
        self.depth = 0;
        self.at_terminator = false;
        self.start_node = 0;
    }

    pub(crate) fn reset_with_start(&mut self, start_node: usize) {
        self.clear();
        self.start_node = start_node;
    }

    /// Key bytes accumulated by the sparse walk (terminator excluded).
    pub(crate) fn key_slice(&self) -> &[u8] {
        &self.key[..self.depth - self.at_terminator as usize]
    }

    fn push(&mut self, label: u8, pos: usize) {
        if self.depth == self.key.len() {
            self.key.push(label);
            self.pos.push(pos);
            self.value_pos.push(0);
        } else {
            self.key[self.depth] = label;
            self.pos[self.depth] = pos;
        }
        self.depth += 1;
    }

    fn set(&mut self, depth: usize, label: u8, pos: usize) {
        self.key[depth] = label;
        self.pos[depth] = pos;
    }
}
