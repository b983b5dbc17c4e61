//! Mount-session glue.
//!
//! [`FsSession`] is the boundary a dispatch layer talks to: it maps virtual
//! paths onto the backing root, keeps the open-file-handle table, routes
//! reads through the [`ReadThrough`] orchestrator, and keeps the cache's
//! identity keys in sync with backing-store renames. One session owns one
//! cache; dropping the session releases every cached buffer.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::cache::block::SnapshotEntry;
use crate::cache::tiered::{new_shared_cache, CacheStats};
use crate::config::{CacheConfig, ConfigError};
use crate::fs::backing::FileBacking;
use crate::fs::read_through::ReadThrough;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown file handle: {0}")]
    UnknownHandle(u64),

    #[error("path escapes the backing root: {0}")]
    PathEscape(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Maps mount-relative virtual paths onto the backing-store root.
#[derive(Debug, Clone)]
pub struct PathMapper {
    root: PathBuf,
}

impl PathMapper {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a virtual path to its canonical backing path.
    ///
    /// The resolved string doubles as the cache's file identity, so the
    /// same virtual path always yields the same key. Parent-directory and
    /// absolute components are rejected rather than resolved.
    pub fn resolve(&self, virtual_path: &str) -> Result<PathBuf, SessionError> {
        let rel = Path::new(virtual_path.trim_start_matches('/'));
        for component in rel.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(SessionError::PathEscape(virtual_path.to_owned())),
            }
        }
        Ok(self.root.join(rel))
    }
}

#[derive(Debug)]
struct OpenFile {
    /// Canonical backing path, used as the cache identity key.
    key: String,
    backing: FileBacking,
}

/// One mounted session: path mapper, cache, orchestrator, and the
/// open-file table keyed by handle.
pub struct FsSession {
    mapper: PathMapper,
    reader: ReadThrough,
    files: HashMap<u64, OpenFile>,
    next_handle: u64,
}

impl FsSession {
    /// Create a session over `root` with a fresh cache.
    pub fn new(root: impl Into<PathBuf>, cache_config: &CacheConfig) -> Result<Self, SessionError> {
        let cache = new_shared_cache(cache_config)?;
        Ok(Self {
            mapper: PathMapper::new(root),
            reader: ReadThrough::new(cache),
            files: HashMap::new(),
            next_handle: 1,
        })
    }

    /// Open a file by virtual path, returning a handle for later reads.
    pub fn open(&mut self, virtual_path: &str) -> Result<u64, SessionError> {
        let real = self.mapper.resolve(virtual_path)?;
        let backing = FileBacking::open(&real)?;
        let handle = self.next_handle;
        self.next_handle += 1;
        debug!(path = virtual_path, handle, "open");
        self.files.insert(
            handle,
            OpenFile {
                key: real.to_string_lossy().into_owned(),
                backing,
            },
        );
        Ok(handle)
    }

    /// Read through the cache from an open handle.
    ///
    /// Short reads mean end-of-file; backing failures surface as errors
    /// without corrupting the cache.
    pub fn read(&self, handle: u64, offset: i64, buf: &mut [u8]) -> Result<usize, SessionError> {
        let file = self
            .files
            .get(&handle)
            .ok_or(SessionError::UnknownHandle(handle))?;
        debug!(handle, offset, len = buf.len(), "read");
        Ok(self.reader.read_into(&file.key, &file.backing, offset, buf)?)
    }

    /// Rename on the backing store, then rewrite the cache's identity keys
    /// with the same path strings. Cached payloads survive the rename.
    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<(), SessionError> {
        let old_real = self.mapper.resolve(old_path)?;
        let new_real = self.mapper.resolve(new_path)?;
        std::fs::rename(&old_real, &new_real)?;
        let renamed = self.reader.cache().lock().rename_identity(
            &old_real.to_string_lossy(),
            &new_real.to_string_lossy(),
        );
        debug!(old = old_path, new = new_path, renamed, "rename");
        Ok(())
    }

    /// Close a handle. Cached blocks for the file stay resident.
    pub fn release(&mut self, handle: u64) -> Result<(), SessionError> {
        debug!(handle, "release");
        self.files
            .remove(&handle)
            .map(|_| ())
            .ok_or(SessionError::UnknownHandle(handle))
    }

    /// Cache counters for diagnostics.
    pub fn cache_stats(&self) -> CacheStats {
        self.reader.cache().lock().stats()
    }

    /// Full cache table dump, the diagnostic the original system exposed
    /// through its ioctl hook.
    pub fn cache_snapshot(&self) -> Vec<SnapshotEntry> {
        self.reader.cache().lock().snapshot()
    }
}
