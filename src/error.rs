//! Error types for trie construction and deserialization.

use thiserror::Error;

/// Error variants for building and loading a trie index.
///
/// Queries never produce errors: a missing key is `None`, and an iterator
/// that runs off either end simply becomes invalid.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The key and value slices passed to `build` differ in length.
    #[error("keys and values differ in length: {keys} keys, {values} values")]
    KeyValueLengthMismatch { keys: usize, values: usize },

    /// `build` was called with no keys.
    #[error("cannot build an index from an empty key set")]
    EmptyInput,

    /// A key has no bytes. Level 0 of the trie must hold a key's first byte,
    /// so empty keys cannot be represented.
    #[error("key {index} is empty")]
    EmptyKey { index: usize },

    /// A key contains the reserved label byte `0xff` (the prefix-key
    /// terminator).
    #[error("key {index} contains the reserved label byte 0xff")]
    ReservedLabelByte { index: usize },

    /// A key is smaller than its predecessor. Input must be sorted;
    /// consecutive duplicates are tolerated and deduplicated.
    #[error("key {index} is out of order")]
    UnsortedKeys { index: usize },

    /// A key does not extend past the skipped common prefix.
    #[error("key {index} is not longer than the skipped prefix ({skip_prefix} bytes)")]
    KeyShorterThanPrefix { index: usize, skip_prefix: usize },

    /// A serialized index ended before all sections could be read.
    #[error("serialized index is truncated")]
    Truncated,

    /// The deserialization buffer does not start on an 8-byte boundary.
    /// The index aliases words directly out of the buffer, so alignment is
    /// a hard requirement.
    #[error("serialized index buffer is not 8-byte aligned")]
    Misaligned,

    /// A serialized section is internally inconsistent.
    #[error("serialized index is corrupted: {0}")]
    Corrupted(&'static str),
}

/// A specialized Result type for trie operations.
pub type Result<T> = core::result::Result<T, Error>;
