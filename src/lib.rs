//! # Trieste
//!
//! A read-optimized, ordered byte-key → `u64` index on a succinct trie.
//!
//! Keys live in a two-tier LOUDS encoding: levels near the root, where
//! fanout is dense, use one 256-bit bitmap per node (LOUDS-Dense); lower
//! levels store only the occupied edge labels next to LOUDS and
//! child-indicator bitvectors (LOUDS-Sparse). Rank and select directories
//! over those bitvectors make a point lookup O(|key|) in words read.
//!
//! The index is built once from a sorted key list and is immutable
//! afterwards; a frozen trie supports any number of concurrent readers.
//!
//! ## Quick Start
//!
//! ```
//! use trieste::Trie;
//!
//! let keys: &[&[u8]] = &[b"ape", b"apple", b"cherry"];
//! let trie = Trie::build(keys, &[0, 1, 2]).unwrap();
//!
//! assert_eq!(trie.lookup(b"apple"), Some(1));
//! assert_eq!(trie.lookup(b"app"), None);
//!
//! // Ordered scans via bidirectional iterators.
//! let mut iter = trie.seek(b"app", true);
//! assert_eq!(iter.key(), b"apple");
//! iter.prev();
//! assert_eq!(iter.key(), b"ape");
//! ```
//!
//! ## Features
//!
//! - `std` (default) - Standard library support
//! - `serde` - Serialization support for [`Config`]

// Use no_std unless std feature is enabled or we're in test mode
#![cfg_attr(not(any(test, feature = "std")), no_std)]

// When using no_std, we need to explicitly link the alloc crate
#[cfg(not(any(test, feature = "std")))]
extern crate alloc;

// When using std, re-export alloc types from std for compatibility
#[cfg(any(test, feature = "std"))]
extern crate std as alloc;

mod binary;
mod bitvec;
mod builder;
mod dense;
mod error;
mod labels;
mod rank;
mod select;
#[cfg(target_arch = "x86_64")]
mod simd;
mod sparse;
mod trie;

pub use bitvec::BitVector;
pub use error::{Error, Result};
pub use rank::RankVector;
pub use select::SelectVector;
pub use trie::{Trie, TrieIter};

/// Fanout of a trie node: one slot per possible label byte.
pub(crate) const FANOUT: usize = 256;

/// The reserved label byte marking a key that is a proper prefix of other
/// stored keys. Keys containing this byte are rejected at build time.
pub const TERMINATOR: u8 = 0xff;

/// Configuration for building a [`Trie`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Encode upper levels with per-node 256-bit bitmaps. When false, the
    /// whole trie uses the sparse encoding.
    pub include_dense: bool,
    /// Cutoff control: levels stay dense while their bitmap storage, scaled
    /// by this ratio, is below the sparse storage of the levels beneath
    /// them. Smaller values keep more levels dense.
    pub sparse_dense_ratio: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_dense: true,
            sparse_dense_ratio: 16,
        }
    }
}
