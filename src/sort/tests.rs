use std::sync::atomic::AtomicBool;

use proptest::prelude::*;

use super::compare::line_le;
use super::core::*;
use super::cursor::{find, rfind};
use super::error::LsortError;
use crate::common::io::FileBuf;

fn run(input: &[u8], config: &LsortConfig) -> Result<Vec<u8>, LsortError> {
    let mut buf = FileBuf::Owned(input.to_vec());
    let cancel = AtomicBool::new(false);
    sort_buffer(&mut buf, config, &mut SilentReporter, &cancel)?;
    Ok(buf.to_vec())
}

/// Lines of `data` with per-line terminators stripped, sorted, for
/// multiset comparison (the engine may normalize the final terminator).
fn line_multiset(data: &[u8]) -> Vec<&[u8]> {
    let mut lines: Vec<&[u8]> = data
        .split(|&b| b == b'\n')
        .filter(|l| !l.is_empty())
        .collect();
    lines.sort();
    lines
}

fn is_sorted(data: &[u8], max_compare: usize) -> bool {
    let mut prev = 0;
    let mut current = find(data, 0);
    while current != data.len() {
        let next = find(data, current);
        if !line_le(data, prev..current, current..next, max_compare) {
            return false;
        }
        prev = current;
        current = next;
    }
    true
}

#[test]
fn test_find_and_rfind() {
    let data = b"aa\nb\nccc";
    assert_eq!(find(data, 0), 3);
    assert_eq!(find(data, 3), 5);
    assert_eq!(find(data, 5), 8); // unterminated final line
    assert_eq!(rfind(data, 5), 3);
    assert_eq!(rfind(data, 3), 0);
}

#[test]
fn test_line_le_strips_terminator() {
    let data = b"abc\nabc";
    assert!(line_le(data, 0..4, 4..7, 0));
    assert!(line_le(data, 4..7, 0..4, 0));
}

#[test]
fn test_line_le_shorter_is_less() {
    let data = b"ab\nabc\n";
    assert!(line_le(data, 0..3, 3..7, 0));
    assert!(!line_le(data, 3..7, 0..3, 0));
}

#[test]
fn test_line_le_capped_tie_is_ordered() {
    // Equal up to the cap: both directions report in-order, even though
    // full-line ordering would disagree.
    let data = b"ay\nax\n";
    assert!(line_le(data, 0..3, 3..6, 1));
    assert!(line_le(data, 3..6, 0..3, 1));
    assert!(!line_le(data, 0..3, 3..6, 0));
}

#[test]
fn test_sorts_single_displaced_line() {
    let out = run(b"b\na\nc\n", &LsortConfig::default()).unwrap();
    assert_eq!(out, b"a\nb\nc\n");
}

#[test]
fn test_forward_relocation_path() {
    // First line greater than everything after it: the look-ahead walk
    // extends next and the head shifts over the larger tail.
    let out = run(b"c\nb\na\n", &LsortConfig::default()).unwrap();
    assert_eq!(out, b"a\nb\nc\n");
}

#[test]
fn test_backward_walk_spans_multiple_lines() {
    let out = run(b"b\nc\nd\na\n", &LsortConfig::default()).unwrap();
    assert_eq!(out, b"a\nb\nc\nd\n");
}

#[test]
fn test_lookahead_jumps_unordered_block() {
    // The first line is greater than the whole block after it, but the
    // block itself is unordered and smaller than the line, so the back
    // branch splices it in one piece. The rescan must then sort the
    // block's own lines.
    let out = run(b"zzzzzzzz\nb\nc\na\n", &LsortConfig::default()).unwrap();
    assert_eq!(out, b"a\nb\nc\nzzzzzzzz\n");

    let again = run(&out, &LsortConfig::default()).unwrap();
    assert_eq!(again, out);
}

#[test]
fn test_repeated_jumps_then_long_backward_walk() {
    // Two look-ahead splices followed by a final line that walks all the
    // way back to the start of the file.
    let input = b"cccccccc\nd\ne\nzzzzzzzz\nx\ny\nw\nzzzzzzzzz\nab\n";
    let out = run(input, &LsortConfig::default()).unwrap();
    assert_eq!(out, b"ab\ncccccccc\nd\ne\nw\nx\ny\nzzzzzzzz\nzzzzzzzzz\n");
    assert_eq!(line_multiset(&out), line_multiset(input));
}

#[test]
fn test_sorted_input_is_fixed_point() {
    let input = b"a\nb\nc\n";
    let out = run(input, &LsortConfig::default()).unwrap();
    assert_eq!(out, input);
}

#[test]
fn test_idempotent() {
    let once = run(b"d\na\nc\nb\n", &LsortConfig::default()).unwrap();
    let twice = run(&once, &LsortConfig::default()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_empty_input() {
    let out = run(b"", &LsortConfig::default()).unwrap();
    assert!(out.is_empty());
}

#[test]
fn test_single_line_untouched() {
    let out = run(b"only", &LsortConfig::default()).unwrap();
    assert_eq!(out, b"only");
}

#[test]
fn test_unterminated_final_line_moves_back() {
    // The relocated final line gains a terminator; the line that
    // becomes final gives its own up (the file cannot grow).
    let out = run(b"b\na", &LsortConfig::default()).unwrap();
    assert_eq!(out, b"a\nb");
}

#[test]
fn test_unterminated_final_line_stays_put() {
    let input = b"a\nb";
    let out = run(input, &LsortConfig::default()).unwrap();
    assert_eq!(out, input);
}

#[test]
fn test_capped_tie_leaves_input_order() {
    // Out of full-string order but equal on the first byte: with
    // max_compare=1 the engine must not relocate them.
    let input = b"ay\nax\n";
    let config = LsortConfig { max_compare: 1, ..Default::default() };
    let out = run(input, &config).unwrap();
    assert_eq!(out, input);

    let full = run(input, &LsortConfig::default()).unwrap();
    assert_eq!(full, b"ax\nay\n");
}

#[test]
fn test_distance_exceeded_is_fatal() {
    let input = b"b\nc\nd\na\n";
    let config = LsortConfig { max_distance: 4, ..Default::default() };
    let mut buf = FileBuf::Owned(input.to_vec());
    let cancel = AtomicBool::new(false);
    let err = sort_buffer(&mut buf, &config, &mut SilentReporter, &cancel).unwrap_err();
    match err {
        LsortError::DistanceExceeded { line, max } => {
            assert_eq!(line, 4);
            assert_eq!(max, 4);
        }
        other => panic!("expected DistanceExceeded, got {:?}", other),
    }
    // Nothing was relocated before the failure; completed work (none)
    // still satisfies sortedness of the untouched prefix.
    assert_eq!(&buf[..], input);
}

#[test]
fn test_distance_exceeded_keeps_completed_relocations() {
    // The first swap fits the cap and completes; the later line would
    // have to walk farther than allowed. The failure must leave the
    // already-relocated prefix in sorted order.
    let config = LsortConfig { max_distance: 6, ..Default::default() };
    let mut buf = FileBuf::Owned(b"b\na\ne\nf\ng\nc\n".to_vec());
    let cancel = AtomicBool::new(false);
    let err = sort_buffer(&mut buf, &config, &mut SilentReporter, &cancel).unwrap_err();
    assert!(matches!(err, LsortError::DistanceExceeded { line: 6, max: 6 }));
    assert_eq!(&buf[..], b"a\nb\ne\nf\ng\nc\n");
    assert!(is_sorted(&buf[..10], 0));
}

#[test]
fn test_distance_cap_allows_near_moves() {
    let config = LsortConfig { max_distance: 4, ..Default::default() };
    let out = run(b"b\na\nd\nc\n", &config).unwrap();
    assert_eq!(out, b"a\nb\nc\nd\n");
}

#[test]
fn test_content_preserved() {
    let input = b"delta\nalpha\ncharlie\nbravo\nalpha\n";
    let out = run(input, &LsortConfig::default()).unwrap();
    assert_eq!(line_multiset(&out), line_multiset(input));
    assert!(is_sorted(&out, 0));
}

#[test]
fn test_varying_line_lengths() {
    let input = b"bbbb\naaaaaaaa\ncc\na\n";
    let out = run(input, &LsortConfig::default()).unwrap();
    assert_eq!(out, b"a\naaaaaaaa\nbbbb\ncc\n");
}

#[test]
fn test_cancel_flag_short_circuits() {
    let mut buf = FileBuf::Owned(b"b\na\n".to_vec());
    let cancel = AtomicBool::new(true);
    let err =
        sort_buffer(&mut buf, &LsortConfig::default(), &mut SilentReporter, &cancel).unwrap_err();
    assert!(matches!(err, LsortError::Cancelled));
    assert_eq!(&buf[..], b"b\na\n");
}

struct RecordingReporter {
    relocations: Vec<Relocation>,
}

impl Reporter for RecordingReporter {
    fn relocated(&mut self, r: &Relocation) {
        self.relocations.push(r.clone());
    }
}

#[test]
fn test_relocation_events() {
    let mut buf = FileBuf::Owned(b"b\na\nc\n".to_vec());
    let cancel = AtomicBool::new(false);
    let mut reporter = RecordingReporter { relocations: Vec::new() };
    sort_buffer(&mut buf, &LsortConfig::default(), &mut reporter, &cancel).unwrap();

    assert_eq!(reporter.relocations.len(), 1);
    let r = &reporter.relocations[0];
    assert_eq!(r.line, 2);
    assert_eq!(r.to_line, 1);
    assert_eq!(r.from, 2);
    assert_eq!(r.to, 0);
    assert_eq!(r.direction, Direction::Back);
}

#[test]
fn test_parse_size() {
    assert_eq!(parse_size("1024").unwrap(), 1024);
    assert_eq!(parse_size("512B").unwrap(), 512);
    assert_eq!(parse_size("1K").unwrap(), 1024);
    assert_eq!(parse_size("2M").unwrap(), 2 * 1024 * 1024);
    assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
    assert!(parse_size("").is_err());
    assert!(parse_size("K").is_err());
    assert!(parse_size(" 1K").is_err());
    assert!(parse_size("1K ").is_err());
    assert!(parse_size("12Q").is_err());
    assert!(parse_size("99999999999999999999").is_err());
    assert!(parse_size("1000000000E").is_err());
}

proptest! {
    // With no caps the engine degenerates to insertion sort: any input
    // must come out fully sorted with the line multiset preserved.
    #[test]
    fn prop_sorts_arbitrary_lines(lines in proptest::collection::vec("[a-z]{1,12}", 1..40)) {
        let mut input = Vec::new();
        for l in &lines {
            input.extend_from_slice(l.as_bytes());
            input.push(b'\n');
        }
        let out = run(&input, &LsortConfig::default()).unwrap();
        prop_assert!(is_sorted(&out, 0));
        prop_assert_eq!(line_multiset(&out), line_multiset(&input));

        let again = run(&out, &LsortConfig::default()).unwrap();
        prop_assert_eq!(again, out);
    }

    #[test]
    fn prop_unterminated_final_line_preserved(lines in proptest::collection::vec("[a-z]{1,8}", 1..20)) {
        let mut input = Vec::new();
        for (i, l) in lines.iter().enumerate() {
            input.extend_from_slice(l.as_bytes());
            if i + 1 != lines.len() {
                input.push(b'\n');
            }
        }
        let out = run(&input, &LsortConfig::default()).unwrap();
        prop_assert!(is_sorted(&out, 0));
        prop_assert_eq!(line_multiset(&out), line_multiset(&input));
    }
}
