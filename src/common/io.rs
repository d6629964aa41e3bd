use std::fs::OpenOptions;
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};

/// How flush_range persists dirty pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// msync(MS_ASYNC): schedule write-back and return immediately.
    #[default]
    Async,
    /// msync(MS_SYNC): block until the pages have reached the device.
    Sync,
}

/// Holds mutable file data — either a shared read-write mapping or an
/// owned Vec. Dereferences to `[u8]` for transparent use.
///
/// The Owned variant backs unit tests and benchmarks; its flushes are
/// no-ops since there is nothing behind the buffer to persist.
pub enum FileBuf {
    Mmap(MmapMut),
    Owned(Vec<u8>),
}

impl Deref for FileBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBuf::Mmap(m) => m,
            FileBuf::Owned(v) => v,
        }
    }
}

impl DerefMut for FileBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            FileBuf::Mmap(m) => m,
            FileBuf::Owned(v) => v,
        }
    }
}

impl FileBuf {
    /// Request persistence of `len` bytes starting at `offset`.
    pub fn flush_range(&self, offset: usize, len: usize, mode: FlushMode) -> io::Result<()> {
        match self {
            FileBuf::Mmap(m) => match mode {
                FlushMode::Sync => m.flush_range(offset, len),
                FlushMode::Async => m.flush_async_range(offset, len),
            },
            FileBuf::Owned(_) => Ok(()),
        }
    }
}

/// Map a file read-write, shared: mutations are visible to other readers
/// of the file and persisted via flush_range. Opens once and uses fstat
/// from the open fd for the length, saving a stat syscall.
///
/// A zero-length file is returned as an empty Owned buffer without
/// mapping it — mapping zero bytes fails on most platforms, and the
/// engine treats an empty buffer as already done.
pub fn map_file_rw(path: &Path) -> io::Result<FileBuf> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(FileBuf::Owned(Vec::new()));
    }

    // SAFETY: shared writable mapping of a regular file we hold open.
    // The engine owns the buffer exclusively for the run; the file's
    // length never changes while mapped.
    let map = unsafe { MmapOptions::new().map_mut(&file)? };

    #[cfg(target_os = "linux")]
    {
        // The scan is forward with bounded local backtracking, so
        // MADV_SEQUENTIAL would evict pages the backward walk still
        // needs. WILLNEED alone triggers async readahead.
        let _ = map.advise(memmap2::Advice::WillNeed);
    }

    Ok(FileBuf::Mmap(map))
}
