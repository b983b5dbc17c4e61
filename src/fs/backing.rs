//! Backing-store access.
//!
//! The cache fronts real file data through [`BackingFile`], a positional
//! read interface with pread semantics: an offset at or past end-of-file
//! yields an empty buffer rather than an error, and a short buffer means
//! end-of-file was reached.

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// Positional read access to one backing file.
pub trait BackingFile {
    /// Read up to `max_len` bytes starting at `offset`.
    ///
    /// Returns the bytes actually available; fewer than `max_len` only at
    /// end-of-file, and an empty buffer when `offset` is at or past it.
    fn read_at(&self, offset: u64, max_len: usize) -> io::Result<Vec<u8>>;
}

/// File-backed implementation using `pread`-style I/O.
///
/// `std::os::unix::fs::FileExt` is thread-safe and does not touch a shared
/// seek position, so one handle can serve concurrent readers.
#[derive(Debug)]
pub struct FileBacking {
    file: File,
}

impl FileBacking {
    /// Open a backing file read-only.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    pub fn from_file(file: File) -> Self {
        Self { file }
    }
}

impl BackingFile for FileBacking {
    fn read_at(&self, offset: u64, max_len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max_len];
        let mut filled = 0;
        while filled < max_len {
            let pos = offset.checked_add(filled as u64).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "read offset overflows u64")
            })?;
            match self.file.read_at(&mut buf[filled..], pos) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }
}
