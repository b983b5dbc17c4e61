//! Tiered block cache.
//!
//! This module contains the core cache data structures and algorithms:
//! - [`block`]: Block, SegmentKind, snapshot row definitions
//! - [`segment`]: one bounded ordered segment with head/tail movement
//! - [`tiered`]: the three-segment cache with promotion, demotion, eviction,
//!   and identity rename

pub mod block;
pub mod segment;
pub mod tiered;
