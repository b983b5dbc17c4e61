//! The tiered block cache.
//!
//! Three bounded segments (`new`, `mid`, `old`) hold cached blocks with the
//! most recently touched block at each segment's head. Every insertion and
//! every promotion enters at the head of `new`; overflow cascades tail-first
//! down through `mid` into `old`, and only `old` ever evicts. The eviction
//! victim is the block in `old` with the highest usage count (ties go to the
//! block that entered `old` earliest), which is deliberately the complement
//! of a least-frequently-used policy.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::block::{Block, SegmentKind, SnapshotEntry};
use crate::cache::segment::Segment;
use crate::config::{CacheConfig, ConfigError, SegmentCapacities};

/// Running counters for monitoring and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Lookups served from any segment.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Blocks accepted by `insert`.
    pub insertions: u64,
    /// Blocks discarded from `old` to make room.
    pub evictions: u64,
}

/// The aggregate of the three segments plus the session block size.
///
/// Constructed once per mounted session; dropping it releases every held
/// payload buffer.
#[derive(Debug)]
pub struct TieredCache {
    new: Segment,
    mid: Segment,
    old: Segment,
    block_size: usize,
    stats: CacheStats,
}

impl TieredCache {
    /// Build a cache from validated configuration.
    ///
    /// Capacity derivation and its validation live in
    /// [`CacheConfig::segment_capacities`]; violations surface here as
    /// [`ConfigError`] and are never re-checked per operation.
    pub fn new(config: &CacheConfig) -> Result<Self, ConfigError> {
        let caps = config.segment_capacities()?;
        if caps.mid_max == 0 {
            warn!(
                total_blocks = config.total_blocks,
                "mid segment capacity is zero; demotions will skip straight to old"
            );
        }
        info!(
            new_max = caps.new_max,
            mid_max = caps.mid_max,
            old_max = caps.old_max,
            block_size = config.block_size,
            "Tiered cache constructed"
        );
        Ok(Self {
            new: Segment::new(SegmentKind::New, caps.new_max),
            mid: Segment::new(SegmentKind::Mid, caps.mid_max),
            old: Segment::new(SegmentKind::Old, caps.old_max),
            block_size: config.block_size,
            stats: CacheStats::default(),
        })
    }

    /// Bytes per cached block, fixed for the session.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Total blocks currently held across all segments.
    pub fn len(&self) -> usize {
        self.new.len() + self.mid.len() + self.old.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current length of one segment. Mostly for tests and diagnostics.
    pub fn segment_len(&self, kind: SegmentKind) -> usize {
        match kind {
            SegmentKind::New => self.new.len(),
            SegmentKind::Mid => self.mid.len(),
            SegmentKind::Old => self.old.len(),
        }
    }

    /// The derived per-segment budgets.
    pub fn capacities(&self) -> SegmentCapacities {
        SegmentCapacities {
            new_max: self.new.max_len(),
            mid_max: self.mid.max_len(),
            old_max: self.old.max_len(),
        }
    }

    /// Look up a block, promoting it on a hit.
    ///
    /// Segments are searched in `new`, `mid`, `old` order. A hit in `new`
    /// only moves the block to the head; a hit in `mid` or `old` moves it to
    /// the head of `new`, increments its usage count, and cascades one tail
    /// block down per displaced segment so no segment grows. A miss mutates
    /// nothing.
    pub fn lookup(&mut self, file: &str, index: u64) -> Option<Bytes> {
        if let Some(block) = self.new.take(file, index) {
            let payload = block.payload.clone();
            self.new.push_front(block);
            self.stats.hits += 1;
            return Some(payload);
        }

        if let Some(mut block) = self.mid.take(file, index) {
            block.usage_count += 1;
            let payload = block.payload.clone();
            debug!(file, index, usage = block.usage_count, "Promoted block from mid");
            self.new.push_front(block);
            if self.new.is_over_capacity() {
                if let Some(tail) = self.new.pop_back() {
                    self.mid.push_front(tail);
                }
            }
            self.stats.hits += 1;
            return Some(payload);
        }

        if let Some(mut block) = self.old.take(file, index) {
            block.usage_count += 1;
            let payload = block.payload.clone();
            debug!(file, index, usage = block.usage_count, "Promoted block from old");
            self.new.push_front(block);
            if self.new.is_over_capacity() {
                if let Some(tail) = self.new.pop_back() {
                    self.mid.push_front(tail);
                }
            }
            if self.mid.is_over_capacity() {
                if let Some(tail) = self.mid.pop_back() {
                    // The hit freed a slot in old, so no eviction here.
                    self.old.push_front(tail);
                }
            }
            self.stats.hits += 1;
            return Some(payload);
        }

        self.stats.misses += 1;
        None
    }

    /// Insert a freshly fetched block at the head of `new`.
    ///
    /// Overflow demotes tail blocks down the segment chain; when `old` is
    /// full its highest-usage block is discarded first, so capacities hold
    /// again before `insert` returns. Returns the evicted block's identity,
    /// if any.
    ///
    /// If a block with the same identity is already cached (a concurrent
    /// reader fetched it while this one held no lock), the incoming
    /// duplicate is dropped to preserve the one-live-block-per-identity
    /// invariant.
    pub fn insert(&mut self, block: Block) -> Option<(String, u64)> {
        if self.new.contains(&block.file, block.index)
            || self.mid.contains(&block.file, block.index)
            || self.old.contains(&block.file, block.index)
        {
            debug!(
                file = %block.file,
                index = block.index,
                "Dropping duplicate insert for already-cached block"
            );
            return None;
        }

        self.new.push_front(block);
        self.stats.insertions += 1;

        let mut evicted = None;
        if self.new.is_over_capacity() {
            if let Some(tail) = self.new.pop_back() {
                self.mid.push_front(tail);
            }
            if self.mid.is_over_capacity() {
                if self.old.len() >= self.old.max_len() {
                    if let Some(victim) = self.old.evict_highest_usage() {
                        self.stats.evictions += 1;
                        debug!(
                            file = %victim.file,
                            index = victim.index,
                            usage = victim.usage_count,
                            "Evicted block from old"
                        );
                        evicted = Some((victim.file, victim.index));
                    }
                }
                if let Some(tail) = self.mid.pop_back() {
                    self.old.push_front(tail);
                }
            }
        }
        evicted
    }

    /// Rewrite the file identity of every cached block keyed by `old_file`.
    ///
    /// No reordering, no eviction, no payload change; calling it again with
    /// the same arguments is a no-op. Returns the number of blocks
    /// rewritten.
    pub fn rename_identity(&mut self, old_file: &str, new_file: &str) -> usize {
        let renamed = self.new.rename_identity(old_file, new_file)
            + self.mid.rename_identity(old_file, new_file)
            + self.old.rename_identity(old_file, new_file);
        if renamed > 0 {
            debug!(old_file, new_file, renamed, "Renamed cached blocks");
        }
        renamed
    }

    /// Running counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Full cache table, head to tail per segment, in `new`, `mid`, `old`
    /// order. This is the diagnostic dump surfaced by the binary and the
    /// non-mutating view the tests assert ordering with.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.new
            .snapshot()
            .chain(self.mid.snapshot())
            .chain(self.old.snapshot())
            .collect()
    }
}

/// Thread-safe handle to the cache: one exclusive lock around the whole
/// structure, per the session concurrency model.
pub type SharedCache = Arc<Mutex<TieredCache>>;

/// Create a new thread-safe cache.
pub fn new_shared_cache(config: &CacheConfig) -> Result<SharedCache, ConfigError> {
    Ok(Arc::new(Mutex::new(TieredCache::new(config)?)))
}
