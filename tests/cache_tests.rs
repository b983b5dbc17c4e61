//! Integration tests for the tiered block cache.

use bytes::Bytes;

use tiered_read_cache::cache::block::{Block, SegmentKind};
use tiered_read_cache::cache::tiered::TieredCache;
use tiered_read_cache::config::CacheConfig;

fn small_cache() -> TieredCache {
    // total=10, old_fraction=5, new_fraction=2 → new_max=5, mid_max=3, old_max=2
    let config = CacheConfig {
        total_blocks: 10,
        old_fraction: 5.0,
        new_fraction: 2.0,
        block_size: 4096,
    };
    TieredCache::new(&config).unwrap()
}

fn insert(cache: &mut TieredCache, index: u64) {
    cache.insert(Block::new("f", index, Bytes::from(vec![index as u8; 32])));
}

fn segment_of(cache: &TieredCache, index: u64) -> Option<SegmentKind> {
    cache
        .snapshot()
        .iter()
        .find(|e| e.index == index)
        .map(|e| e.segment)
}

#[test]
fn test_eleven_inserts_trigger_exactly_one_eviction() {
    let mut cache = small_cache();

    for i in 1..=10 {
        insert(&mut cache, i);
    }
    assert_eq!(cache.stats().evictions, 0);
    assert_eq!(cache.len(), 10);

    insert(&mut cache, 11);
    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(cache.len(), 10);

    // All usage counts tie at 1, so the victim is the block that entered
    // old earliest: block 1, demoted there on the ninth insert.
    assert!(segment_of(&cache, 1).is_none());

    // Resulting layout, head to tail per segment.
    assert_eq!(cache.segment_len(SegmentKind::New), 5);
    assert_eq!(cache.segment_len(SegmentKind::Mid), 3);
    assert_eq!(cache.segment_len(SegmentKind::Old), 2);
    for i in 7..=11 {
        assert_eq!(segment_of(&cache, i), Some(SegmentKind::New));
    }
    for i in 4..=6 {
        assert_eq!(segment_of(&cache, i), Some(SegmentKind::Mid));
    }
    for i in 2..=3 {
        assert_eq!(segment_of(&cache, i), Some(SegmentKind::Old));
    }
}

#[test]
fn test_eviction_targets_highest_usage_block() {
    let mut cache = small_cache();

    for i in 1..=6 {
        insert(&mut cache, i);
    }
    // Block 1 sits in mid; a hit there promotes it and bumps its usage to 2.
    assert_eq!(segment_of(&cache, 1), Some(SegmentKind::Mid));
    assert!(cache.lookup("f", 1).is_some());

    // Push block 1 back down the chain until it reaches old.
    for i in 7..=14 {
        insert(&mut cache, i);
    }
    assert_eq!(segment_of(&cache, 1), Some(SegmentKind::Old));
    assert_eq!(segment_of(&cache, 6), Some(SegmentKind::Old));

    // The next overflow purges block 1 (usage 2) ahead of block 6
    // (usage 1), the inverse of a least-frequently-used policy.
    insert(&mut cache, 15);
    assert!(segment_of(&cache, 1).is_none());
    assert_eq!(segment_of(&cache, 6), Some(SegmentKind::Old));
}

#[test]
fn test_capacities_hold_after_every_insert() {
    let mut cache = small_cache();
    let caps = cache.capacities();

    for i in 0..200 {
        insert(&mut cache, i);
        assert!(cache.segment_len(SegmentKind::New) <= caps.new_max);
        assert!(cache.segment_len(SegmentKind::Mid) <= caps.mid_max);
        assert!(cache.segment_len(SegmentKind::Old) <= caps.old_max);
        assert!(cache.len() <= 10);
    }
    assert_eq!(cache.stats().evictions, 200 - 10);
}

#[test]
fn test_promoted_block_returns_same_payload() {
    let mut cache = small_cache();
    let payload = Bytes::from_static(b"payload-of-block-one");
    cache.insert(Block::new("f", 1, payload.clone()));
    for i in 2..=6 {
        insert(&mut cache, i);
    }
    assert_eq!(segment_of(&cache, 1), Some(SegmentKind::Mid));

    let hit = cache.lookup("f", 1).unwrap();
    assert_eq!(hit, payload);
    assert_eq!(segment_of(&cache, 1), Some(SegmentKind::New));
}

#[test]
fn test_rename_propagates_across_segments() {
    let mut cache = small_cache();
    // Spread blocks of file "a" across all three segments, interleaved
    // with another file.
    for i in 1..=5 {
        cache.insert(Block::new("a", i, Bytes::from(vec![0u8; 8])));
        cache.insert(Block::new("b", i, Bytes::from(vec![0u8; 8])));
    }
    let a_blocks: Vec<u64> = cache
        .snapshot()
        .iter()
        .filter(|e| e.file == "a")
        .map(|e| e.index)
        .collect();
    assert!(!a_blocks.is_empty());

    let renamed = cache.rename_identity("a", "c");
    assert_eq!(renamed, a_blocks.len());

    for index in &a_blocks {
        assert!(cache.lookup("c", *index).is_some());
    }
    assert!(cache.lookup("a", a_blocks[0]).is_none());

    // Second call is a no-op.
    assert_eq!(cache.rename_identity("a", "c"), 0);
}
