//! tiered-read-cache: block-granularity read cache for a backing filesystem.
//!
//! Sits between a filesystem dispatch layer and the real file data,
//! intercepting block-aligned reads and memoizing fetched blocks under a
//! bounded three-segment recency/frequency policy:
//!   new (entry) → mid (survivors) → old (eviction ground)
//!
//! Reads are the only cached path; writes, persistence, and cross-instance
//! coherence are out of scope.

pub mod cache;
pub mod config;
pub mod fs;
