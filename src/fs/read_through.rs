//! Read-through orchestration.
//!
//! Decomposes a byte-range read into block-aligned cache lookups, fetching
//! missed blocks from the backing store and memoizing them. Fetches happen
//! with the cache lock released; only lookup and insertion hold it, which
//! keeps cache-structure mutation off the I/O path.

use std::io;

use bytes::Bytes;
use tracing::debug;

use crate::cache::block::Block;
use crate::cache::tiered::SharedCache;
use crate::fs::backing::BackingFile;

/// Drives block-granular reads through a shared cache.
pub struct ReadThrough {
    cache: SharedCache,
    block_size: usize,
}

impl ReadThrough {
    /// Bind an orchestrator to a cache, capturing its session block size.
    pub fn new(cache: SharedCache) -> Self {
        let block_size = cache.lock().block_size();
        Self { cache, block_size }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Read up to `buf.len()` bytes of `file_id` starting at `offset`.
    ///
    /// Mirrors positional-read boundary behavior: a negative offset or an
    /// empty buffer reads zero bytes, and a short return happens exactly at
    /// end-of-file, never because of a cache condition. Backing-store
    /// errors propagate untouched and leave the cache unmodified; a failed
    /// fetch never inserts a block.
    pub fn read_into<B: BackingFile>(
        &self,
        file_id: &str,
        backing: &B,
        offset: i64,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        if offset < 0 || buf.is_empty() {
            return Ok(0);
        }

        let block_size = self.block_size as u64;
        let offset = offset as u64;
        let mut index = offset / block_size;
        // The intra-block start applies to the first block only; every
        // later block is consumed from its beginning.
        let mut intra = (offset % block_size) as usize;
        let mut copied = 0;

        loop {
            let payload = match self.lookup(file_id, index) {
                Some(payload) => payload,
                None => self.fetch_and_insert(file_id, backing, index)?,
            };

            // The payload can be shorter than the intra-block start when
            // the offset lies past end-of-file; clamp so the copy below
            // degenerates to zero bytes instead of slicing out of range.
            let start = intra.min(payload.len());
            let avail = payload.len() - start;
            let want = avail.min(buf.len() - copied);
            buf[copied..copied + want].copy_from_slice(&payload[start..start + want]);
            copied += want;

            // Stop when the request is satisfied or the block is short,
            // which signals end-of-file.
            if copied == buf.len() || payload.len() < self.block_size {
                return Ok(copied);
            }
            intra = 0;
            index += 1;
        }
    }

    /// Convenience wrapper returning an owned buffer of the bytes read.
    pub fn read_range<B: BackingFile>(
        &self,
        file_id: &str,
        backing: &B,
        offset: i64,
        length: usize,
    ) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        let n = self.read_into(file_id, backing, offset, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn lookup(&self, file_id: &str, index: u64) -> Option<Bytes> {
        self.cache.lock().lookup(file_id, index)
    }

    /// Fetch one block from the backing store and memoize it.
    ///
    /// Runs the blocking fetch with the lock released; `insert` itself
    /// drops the duplicate if a concurrent reader cached the same block in
    /// the meantime, so the uniqueness invariant holds either way.
    fn fetch_and_insert<B: BackingFile>(
        &self,
        file_id: &str,
        backing: &B,
        index: u64,
    ) -> io::Result<Bytes> {
        let base = index.checked_mul(self.block_size as u64).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "block offset overflows u64")
        })?;
        let fetched = backing.read_at(base, self.block_size)?;
        debug!(
            file = file_id,
            index,
            len = fetched.len(),
            "Fetched block from backing store"
        );
        let payload = Bytes::from(fetched);
        self.cache
            .lock()
            .insert(Block::new(file_id, index, payload.clone()));
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::cache::tiered::new_shared_cache;
    use crate::config::CacheConfig;

    /// In-memory backing file that counts fetches.
    struct MemBacking {
        data: Vec<u8>,
        reads: AtomicUsize,
    }

    impl MemBacking {
        fn new(len: usize) -> Self {
            Self {
                data: (0..len).map(|i| (i % 251) as u8).collect(),
                reads: AtomicUsize::new(0),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl BackingFile for MemBacking {
        fn read_at(&self, offset: u64, max_len: usize) -> io::Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let offset = offset as usize;
            if offset >= self.data.len() {
                return Ok(Vec::new());
            }
            let end = (offset + max_len).min(self.data.len());
            Ok(self.data[offset..end].to_vec())
        }
    }

    /// Backing file that always fails.
    struct FailingBacking;

    impl BackingFile for FailingBacking {
        fn read_at(&self, _offset: u64, _max_len: usize) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    fn reader(block_size: usize) -> ReadThrough {
        let config = CacheConfig {
            total_blocks: 10,
            old_fraction: 5.0,
            new_fraction: 2.0,
            block_size,
        };
        ReadThrough::new(new_shared_cache(&config).unwrap())
    }

    #[test]
    fn test_read_decomposition_with_short_final_block() {
        let rt = reader(4096);
        let backing = MemBacking::new(10000);

        let out = rt.read_range("f", &backing, 0, 10000).unwrap();
        assert_eq!(out.len(), 10000);
        assert_eq!(out, backing.data);
        // Three block fetches, the last returning 1712 bytes; the short
        // block terminates the loop without a fourth request.
        assert_eq!(backing.reads(), 3);
    }

    #[test]
    fn test_second_read_is_served_from_cache() {
        let rt = reader(4096);
        let backing = MemBacking::new(10000);

        let first = rt.read_range("f", &backing, 0, 10000).unwrap();
        assert_eq!(backing.reads(), 3);
        let second = rt.read_range("f", &backing, 0, 10000).unwrap();
        assert_eq!(backing.reads(), 3);
        assert_eq!(first, second);
        assert_eq!(rt.cache().lock().stats().hits, 3);
    }

    #[test]
    fn test_unaligned_offset_within_one_block() {
        let rt = reader(4096);
        let backing = MemBacking::new(10000);

        let out = rt.read_range("f", &backing, 100, 50).unwrap();
        assert_eq!(out, backing.data[100..150]);
        assert_eq!(backing.reads(), 1);
    }

    #[test]
    fn test_unaligned_read_crossing_a_block_boundary() {
        let rt = reader(4096);
        let backing = MemBacking::new(10000);

        let out = rt.read_range("f", &backing, 4000, 200).unwrap();
        assert_eq!(out, backing.data[4000..4200]);
        assert_eq!(backing.reads(), 2);
    }

    #[test]
    fn test_negative_offset_reads_nothing() {
        let rt = reader(4096);
        let backing = MemBacking::new(100);
        let out = rt.read_range("f", &backing, -1, 10).unwrap();
        assert!(out.is_empty());
        assert_eq!(backing.reads(), 0);
    }

    #[test]
    fn test_zero_length_reads_nothing() {
        let rt = reader(4096);
        let backing = MemBacking::new(100);
        let out = rt.read_range("f", &backing, 0, 0).unwrap();
        assert!(out.is_empty());
        assert_eq!(backing.reads(), 0);
    }

    #[test]
    fn test_offset_past_eof_reads_nothing() {
        let rt = reader(4096);
        let backing = MemBacking::new(100);
        let out = rt.read_range("f", &backing, 5000, 10).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_offset_past_eof_within_final_block() {
        let rt = reader(4096);
        let backing = MemBacking::new(100);
        // Block 0 holds 100 bytes; offset 150 is inside the block range but
        // past the data.
        let out = rt.read_range("f", &backing, 150, 10).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_offset_past_eof_beyond_short_final_block() {
        let rt = reader(4096);
        let backing = MemBacking::new(10000);
        // Offset 11000 falls in block 2's index range, past its 1712 bytes
        // of data.
        let out = rt.read_range("f", &backing, 11000, 100).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_read_exactly_at_block_boundary() {
        let rt = reader(4096);
        let backing = MemBacking::new(10000);
        let out = rt.read_range("f", &backing, 4096, 4096).unwrap();
        assert_eq!(out, backing.data[4096..8192]);
        assert_eq!(backing.reads(), 1);
    }

    #[test]
    fn test_failed_fetch_inserts_nothing() {
        let rt = reader(4096);
        let backing = FailingBacking;

        let err = rt.read_range("f", &backing, 0, 100).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(rt.cache().lock().is_empty());
    }

    #[test]
    fn test_files_do_not_share_blocks() {
        let rt = reader(4096);
        let a = MemBacking::new(50);
        let b = MemBacking::new(50);

        let out_a = rt.read_range("a", &a, 0, 50).unwrap();
        let out_b = rt.read_range("b", &b, 0, 50).unwrap();
        assert_eq!(out_a, a.data);
        assert_eq!(out_b, b.data);
        assert_eq!(a.reads(), 1);
        assert_eq!(b.reads(), 1);
        assert_eq!(rt.cache().lock().len(), 2);
    }
}
