//! Cached block types.
//!
//! A block holds one fixed-size chunk of a backing file's content and is the
//! unit of movement between the cache segments. The final block of a file may
//! carry a shorter payload.

use bytes::Bytes;

/// Identifies which segment a block currently resides in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Entry segment: every insertion and every promotion lands here.
    New,
    /// Middle segment: absorbs blocks demoted off the tail of `new`.
    Mid,
    /// Final segment: absorbs demotions from `mid`; the only segment that
    /// ever evicts.
    Old,
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentKind::New => write!(f, "new"),
            SegmentKind::Mid => write!(f, "mid"),
            SegmentKind::Old => write!(f, "old"),
        }
    }
}

/// A single cached block.
///
/// Identity is `(file, index)`: an opaque file key (the canonical backing
/// path) plus the zero-based block index within that file. At most one live
/// block per identity exists across all segments combined; the holding
/// segment owns the block exclusively.
#[derive(Debug, Clone)]
pub struct Block {
    /// Opaque file identity, as supplied by the dispatch layer.
    pub file: String,

    /// Zero-based block index within the file.
    pub index: u64,

    /// Incremented once per cache hit served from `mid` or `old`, never on
    /// insertion or on a hit inside `new`.
    pub usage_count: u64,

    /// Owned payload. May be shorter than the configured block size for the
    /// final block of a file.
    pub payload: Bytes,
}

impl Block {
    /// Create a freshly fetched block. New blocks start with a usage count
    /// of one.
    pub fn new(file: impl Into<String>, index: u64, payload: Bytes) -> Self {
        Self {
            file: file.into(),
            index,
            usage_count: 1,
            payload,
        }
    }

    /// Bytes actually held by this block.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Identity test without allocating.
    pub fn matches(&self, file: &str, index: u64) -> bool {
        self.index == index && self.file == file
    }
}

/// One row of a cache table snapshot (the diagnostic dump).
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub segment: SegmentKind,
    pub file: String,
    pub index: u64,
    pub usage_count: u64,
    pub payload_len: usize,
}
