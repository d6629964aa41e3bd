use std::io;

use thiserror::Error;

/// Per-file failure modes.
///
/// `DistanceExceeded` and `OutOfMemory` are fatal for the current file:
/// it is left partially reordered up to the last completed relocation,
/// with the pending dirty range flushed before the mapping is dropped.
/// `Cancelled` reports a cooperative abort; it too flushes before
/// returning so no half-written splice is visible on disk.
#[derive(Debug, Error)]
pub enum LsortError {
    #[error("{line}: Distance exceeds allowed maximum of {max}")]
    DistanceExceeded { line: u64, max: usize },

    #[error("{line}: Out of memory reserving {bytes} bytes")]
    OutOfMemory { line: u64, bytes: usize },

    #[error("aborted")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] io::Error),
}
