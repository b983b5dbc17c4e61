//! A single bounded cache segment.
//!
//! Each segment is an ordered sequence of blocks with the most recently
//! touched block at the head. Segments never enforce their own capacity;
//! [`TieredCache`](crate::cache::tiered::TieredCache) rebalances after every
//! mutation so that `len <= max_len` holds between public operations.

use std::collections::VecDeque;

use crate::cache::block::{Block, SegmentKind, SnapshotEntry};

#[derive(Debug)]
pub struct Segment {
    kind: SegmentKind,
    blocks: VecDeque<Block>,
    max_len: usize,
}

impl Segment {
    pub fn new(kind: SegmentKind, max_len: usize) -> Self {
        Self {
            kind,
            blocks: VecDeque::new(),
            max_len,
        }
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Whether the segment currently holds more blocks than its budget.
    pub fn is_over_capacity(&self) -> bool {
        self.blocks.len() > self.max_len
    }

    /// Push a block at the head (most recently touched position).
    pub fn push_front(&mut self, block: Block) {
        self.blocks.push_front(block);
    }

    /// Remove and return the tail (least recently touched) block.
    pub fn pop_back(&mut self) -> Option<Block> {
        self.blocks.pop_back()
    }

    /// Whether a block with the given identity is present.
    pub fn contains(&self, file: &str, index: u64) -> bool {
        self.blocks.iter().any(|b| b.matches(file, index))
    }

    /// Remove the block with the given identity, preserving the order of the
    /// remaining blocks.
    pub fn take(&mut self, file: &str, index: u64) -> Option<Block> {
        let pos = self.blocks.iter().position(|b| b.matches(file, index))?;
        self.blocks.remove(pos)
    }

    /// Remove the block with the highest usage count.
    ///
    /// Scans head to tail; a candidate replaces the current maximum when its
    /// usage count is greater than *or equal to* it, so among ties the block
    /// nearest the tail wins. Demotions push at the head, which makes the
    /// tie winner the block that entered this segment earliest. This exact
    /// selection is load-bearing for compatibility with the original cache;
    /// do not swap it for a least-frequently-used rule.
    pub fn evict_highest_usage(&mut self) -> Option<Block> {
        if self.blocks.is_empty() {
            return None;
        }
        let mut max_pos = 0;
        for (pos, block) in self.blocks.iter().enumerate().skip(1) {
            if block.usage_count >= self.blocks[max_pos].usage_count {
                max_pos = pos;
            }
        }
        self.blocks.remove(max_pos)
    }

    /// Rewrite the file identity of every block currently keyed by `old`.
    /// Returns the number of blocks rewritten.
    pub fn rename_identity(&mut self, old: &str, new: &str) -> usize {
        let mut renamed = 0;
        for block in &mut self.blocks {
            if block.file == old {
                block.file = new.to_owned();
                renamed += 1;
            }
        }
        renamed
    }

    /// Head-to-tail snapshot rows for the diagnostic cache table.
    pub fn snapshot(&self) -> impl Iterator<Item = SnapshotEntry> + '_ {
        self.blocks.iter().map(|b| SnapshotEntry {
            segment: self.kind,
            file: b.file.clone(),
            index: b.index,
            usage_count: b.usage_count,
            payload_len: b.payload_len(),
        })
    }

    /// Identities in head-to-tail order. Test and bench helper.
    pub fn order(&self) -> Vec<(String, u64)> {
        self.blocks
            .iter()
            .map(|b| (b.file.clone(), b.index))
            .collect()
    }
}
