//! Filesystem-facing layer.
//!
//! - [`backing`]: positional-read access to real file data
//! - [`read_through`]: block-range decomposition of byte reads over the cache
//! - [`session`]: path mapping, file-handle table, and rename propagation

pub mod backing;
pub mod read_through;
pub mod session;
