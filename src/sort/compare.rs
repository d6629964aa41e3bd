use std::cmp::Ordering;
use std::ops::Range;

/// Byte-wise "lhs <= rhs" over two line ranges of `data`.
///
/// A single trailing `'\n'` on either side is stripped first; the last
/// line of a file may lack one and the terminator never participates in
/// ordering. When `max_compare` is non-zero, at most that many leading
/// bytes are examined.
///
/// Two lines equal up to the cap are declared in order no matter what
/// follows the capped prefix. Chasing the full contents would make the
/// placement walk unbounded for long shared prefixes; the cost is that
/// a capped run may leave the file unsorted under full-line ordering
/// (documented in the CLI help). Do not "fix" this.
pub fn line_le(data: &[u8], lhs: Range<usize>, rhs: Range<usize>, max_compare: usize) -> bool {
    let mut lhs_end = lhs.end;
    if lhs_end > lhs.start && data[lhs_end - 1] == b'\n' {
        lhs_end -= 1;
    }
    let mut rhs_end = rhs.end;
    if rhs_end > rhs.start && data[rhs_end - 1] == b'\n' {
        rhs_end -= 1;
    }

    let lhs_size = lhs_end - lhs.start;
    let rhs_size = rhs_end - rhs.start;
    let mut n = lhs_size.min(rhs_size);
    if max_compare != 0 && n > max_compare {
        n = max_compare;
    }

    match data[lhs.start..lhs.start + n].cmp(&data[rhs.start..rhs.start + n]) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => {
            if max_compare != 0 && n == max_compare {
                return true;
            }
            lhs_size <= rhs_size
        }
    }
}
