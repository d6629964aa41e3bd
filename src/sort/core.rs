//! In-place local-insertion engine for almost-sorted files.
//!
//! One pass over the mapped buffer: the cursor yields lines, the
//! comparator flags out-of-order ones, the placement search walks
//! backward (or looks ahead) to the splice window, and the relocator
//! shifts the smaller fragment through a scratch buffer. Every splice
//! extends a pending dirty range that is flushed once the scan confirms
//! order again, so persistence is coalesced instead of per-splice.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::common::io::{FileBuf, FlushMode, map_file_rw};

use super::compare::line_le;
use super::cursor::{find, rfind};
use super::error::LsortError;

/// Configuration for one in-place sort run, threaded explicitly into
/// the engine (no ambient state).
#[derive(Debug, Clone, Default)]
pub struct LsortConfig {
    /// Compare at most this many leading bytes per line (0 = unlimited).
    pub max_compare: usize,
    /// Maximum byte span a relocation may cover (0 = unlimited). A line
    /// farther out of order than this fails the file instead of moving.
    pub max_distance: usize,
    /// Whether flushes block until the pages are persisted.
    pub flush: FlushMode,
}

/// Which way bytes physically moved during a splice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The out-of-order line moved back toward the start of the file.
    Back,
    /// The line it displaced moved forward over the following block.
    Forward,
}

/// One completed relocation, for verbose reporting.
#[derive(Debug, Clone)]
pub struct Relocation {
    /// Line number of the line that moved (1-based).
    pub line: u64,
    /// Line number it now occupies.
    pub to_line: u64,
    /// Byte offset the line started at before the splice.
    pub from: usize,
    /// Byte offset it starts at now.
    pub to: usize,
    pub direction: Direction,
}

/// Progress/event sink for the excluded printing collaborator.
/// All methods default to no-ops.
pub trait Reporter {
    /// Percentage of the buffer the scan has passed, reported on change.
    fn progress(&mut self, _percent: u64) {}
    fn relocated(&mut self, _r: &Relocation) {}
}

/// Reporter that discards everything.
pub struct SilentReporter;

impl Reporter for SilentReporter {}

/// Union of byte ranges dirtied since the last flush.
#[derive(Default)]
struct DirtySpan {
    range: Option<(usize, usize)>,
}

impl DirtySpan {
    /// Flush and clear the pending range, if any.
    fn flush(&mut self, buf: &FileBuf, mode: FlushMode) -> io::Result<()> {
        if let Some((begin, end)) = self.range.take() {
            buf.flush_range(begin, end - begin, mode)?;
        }
        Ok(())
    }
}

/// Sort `path` in place through a shared read-write mapping.
/// A zero-length file is done without mapping. The mapping is dropped
/// (unmapped) on every path out, after a final flush of pending ranges.
pub fn sort_file(
    path: &Path,
    config: &LsortConfig,
    reporter: &mut dyn Reporter,
    cancel: &AtomicBool,
) -> Result<(), LsortError> {
    let mut buf = map_file_rw(path)?;
    sort_buffer(&mut buf, config, reporter, cancel)
}

/// The engine proper, over any mutable buffer. Exposed separately so
/// tests and benchmarks can run it against owned memory.
pub fn sort_buffer(
    buf: &mut FileBuf,
    config: &LsortConfig,
    reporter: &mut dyn Reporter,
    cancel: &AtomicBool,
) -> Result<(), LsortError> {
    let mut engine = Engine {
        buf,
        config,
        reporter,
        cancel,
        scratch: Vec::new(),
        dirty: DirtySpan::default(),
        line: 2,
    };
    let result = engine.run();
    // Every exit path persists the pending range before the caller
    // drops the mapping, so no splice is left unflushed.
    let flushed = engine.flush_pending();
    result.and(flushed)
}

struct Engine<'a> {
    buf: &'a mut FileBuf,
    config: &'a LsortConfig,
    reporter: &'a mut dyn Reporter,
    cancel: &'a AtomicBool,
    /// Scratch for the smaller splice fragment. Grown on demand, never
    /// shrunk; lives for the whole run of one file.
    scratch: Vec<u8>,
    dirty: DirtySpan,
    /// 1-based number of the line under test. Advanced only on the
    /// in-order path; relocations leave it as an approximation.
    line: u64,
}

impl Engine<'_> {
    fn run(&mut self) -> Result<(), LsortError> {
        let end = self.buf.len();
        let mut prev = 0usize;
        let mut current = find(self.buf, 0);
        let mut last_progress = u64::MAX;

        while current != end {
            if self.cancelled() {
                return Err(LsortError::Cancelled);
            }

            let progress = 100 * current as u64 / end as u64;
            if progress != last_progress {
                self.reporter.progress(progress);
                last_progress = progress;
            }

            let next = find(self.buf, current);
            if line_le(self.buf, prev..current, current..next, self.config.max_compare) {
                // Order confirmed: persist whatever earlier splices
                // dirtied, then advance the cursor triple.
                self.flush_pending()?;
                prev = current;
                current = next;
                self.line += 1;
            } else {
                (prev, current) = self.place(prev, current, next)?;
            }
        }
        Ok(())
    }

    /// Find the splice window for the out-of-order line at `current`
    /// and relocate it. Returns the (prev, current) pair to resume
    /// scanning from; offsets from before the splice are invalid.
    fn place(
        &mut self,
        mut prev: usize,
        current: usize,
        mut next: usize,
    ) -> Result<(usize, usize), LsortError> {
        let max_compare = self.config.max_compare;
        let max_distance = self.config.max_distance;
        let line = self.line;
        let end = self.buf.len();

        // Backward walk: move prev back while the line before it is
        // still greater than the candidate. The distance cap is checked
        // before each peek so the walk fails fast on inputs that are
        // not almost-sorted as configured.
        let mut prev_line = line - 1;
        while prev != 0 && !self.cancelled() {
            if max_distance != 0 && next - prev > max_distance {
                return Err(LsortError::DistanceExceeded { line, max: max_distance });
            }
            let peek = rfind(self.buf, prev);
            if line_le(self.buf, peek..prev, current..next, max_compare) {
                break;
            }
            prev = peek;
            // The counter is diagnostic only; saturate rather than wrap.
            prev_line = prev_line.saturating_sub(1);
        }

        // Look-ahead only when the backward walk did not move: the line
        // at prev jumps forward over every following line it is greater
        // than. Mutually exclusive with look-back so a window is never
        // grown in both directions for one candidate.
        let mut next_line = line;
        if prev_line + 1 == line {
            while next != end && !self.cancelled() {
                if max_distance != 0 && next - prev > max_distance {
                    return Err(LsortError::DistanceExceeded { line, max: max_distance });
                }
                let peek = find(self.buf, next);
                if line_le(self.buf, prev..current, next..peek, max_compare) {
                    break;
                }
                next = peek;
                next_line += 1;
            }
        }

        // Extend the pending dirty range over this window — unless the
        // union would itself exceed the distance cap, in which case the
        // existing range is flushed first and the new one starts fresh.
        let (mut dirty_begin, mut dirty_end) = match self.dirty.range {
            Some((b, e)) => (b.min(prev), e.max(next)),
            None => (prev, next),
        };
        if max_distance != 0 && dirty_end - dirty_begin > max_distance {
            self.flush_pending()?;
            dirty_begin = prev;
            dirty_end = next;
        }

        let head_size = current - prev;
        let mut tail_size = next - current;

        // Scratch holds the smaller fragment, plus one byte in case the
        // moved line needs a terminator appended.
        let required = head_size.min(tail_size) + 1;
        self.scratch.clear();
        self.scratch
            .try_reserve(required)
            .map_err(|_| LsortError::OutOfMemory { line, bytes: required })?;

        let resume;
        if tail_size <= head_size {
            // Shift the head block right; scratch carries the candidate.
            self.scratch.extend_from_slice(&self.buf[current..next]);
            if self.scratch[tail_size - 1] != b'\n' {
                // The candidate was the unterminated final line; it is
                // final no longer, so it gains a terminator. The head's
                // last line takes over as the unterminated final line.
                self.scratch.push(b'\n');
                tail_size += 1;
            }
            // Only head_size - 1 bytes move: the window's final byte is
            // either the old terminator, already in place, or absorbed
            // by the appended one above. One commit unit — scratch copy,
            // shift, copy back — with no partially spliced state in
            // between.
            self.buf.copy_within(prev..prev + head_size - 1, prev + tail_size);
            self.buf[prev..prev + tail_size].copy_from_slice(&self.scratch);

            self.reporter.relocated(&Relocation {
                line,
                to_line: prev_line,
                from: current,
                to: prev,
                direction: Direction::Back,
            });

            // Resume at the last line of the shifted head block — unless
            // the look-ahead extended the tail, in which case the jumped
            // block may be internally unordered and must be rescanned
            // from its first line, exactly as the forward branch does.
            resume = if next_line > line {
                (prev, find(self.buf, prev))
            } else {
                let current = rfind(self.buf, next);
                (rfind(self.buf, current), current)
            };
        } else {
            // Shift the tail block left; scratch carries the head.
            self.scratch.extend_from_slice(&self.buf[prev..current]);
            self.buf.copy_within(current..next, prev);
            if self.buf[prev + tail_size - 1] != b'\n' {
                self.buf[prev + tail_size] = b'\n';
                tail_size += 1;
            }
            self.buf[prev + tail_size..prev + tail_size + head_size - 1]
                .copy_from_slice(&self.scratch[..head_size - 1]);

            self.reporter.relocated(&Relocation {
                line: prev_line,
                to_line: next_line,
                from: prev,
                to: prev + tail_size,
                direction: Direction::Forward,
            });

            // Resume after the first relocated tail line; prev stays.
            resume = (prev, find(self.buf, prev));
        }

        self.dirty.range = Some((dirty_begin, dirty_end));
        Ok(resume)
    }

    fn flush_pending(&mut self) -> Result<(), LsortError> {
        self.dirty
            .flush(self.buf, self.config.flush)
            .map_err(LsortError::from)
    }

    #[inline]
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Parse a size argument like "512", "64K", "1M". Accepts the suffixes
/// B=1, K=1024, and so on for M, G, T, P, E (powers of 1024).
pub fn parse_size(s: &str) -> Result<usize, String> {
    let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, suffix) = s.split_at(digits);
    if num.is_empty() {
        return Err(format!("invalid size: '{}'", s));
    }
    let base: u64 = num.parse().map_err(|_| format!("invalid size: '{}'", s))?;

    let shift = match suffix {
        "" | "B" => 0,
        "K" => 10,
        "M" => 20,
        "G" => 30,
        "T" => 40,
        "P" => 50,
        "E" => 60,
        _ => return Err(format!("invalid suffix '{}' in size '{}'", suffix, s)),
    };

    base.checked_shl(shift)
        .filter(|n| n >> shift == base)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| format!("size too large: '{}'", s))
}
