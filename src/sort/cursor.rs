//! Line boundary scans over the mapped buffer.
//! Offsets index into the buffer; line boundaries are derived, never stored.

use memchr::{memchr, memrchr};

/// Offset of the first byte after the next `'\n'` at or after `pos`,
/// or `data.len()` if none exists (`pos` starts an unterminated final
/// line).
#[inline]
pub fn find(data: &[u8], pos: usize) -> usize {
    match memchr(b'\n', &data[pos..]) {
        Some(i) => pos + i + 1,
        None => data.len(),
    }
}

/// Start of the line immediately preceding the line that starts at
/// `pos`, searching backward from `pos - 1` to skip that line's own
/// terminator. Returns 0 when no earlier `'\n'` exists, i.e. the
/// preceding line is the first line. Requires `pos > 0`.
#[inline]
pub fn rfind(data: &[u8], pos: usize) -> usize {
    debug_assert!(pos > 0);
    match memrchr(b'\n', &data[..pos - 1]) {
        Some(i) => i + 1,
        None => 0,
    }
}
