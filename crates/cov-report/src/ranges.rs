//! Grouping scattered 1-indexed line numbers into contiguous display
//! windows, ported from `coven.py::line_ranges`: each reported line gets
//! `before` lines of leading and `after` lines of trailing context, and
//! windows closer than one line apart are merged so a lone intervening
//! line isn't elided behind an `...`.

use std::ops::Range;

/// `None` entries mark a gap that should be rendered as `...` between two
/// windows. `terminal` is one past the last valid line (the file length
/// plus one); windows are clamped to `[1, terminal)`.
pub fn line_ranges(
    lines: impl IntoIterator<Item = u32>,
    before: u32,
    after: u32,
    terminal: u32,
) -> Vec<Option<Range<u32>>> {
    assert!(terminal > 0);
    let mut it = lines.into_iter();
    let Some(first) = it.next() else {
        return Vec::new();
    };
    assert!(first > 0);

    let mut out = Vec::new();
    let mut start = first.saturating_sub(before);
    let mut end = first + after + 1;

    for i in it {
        assert!(i > 0);
        // Bridge chunks that would otherwise elide a single line.
        if end + 1 < i.saturating_sub(before) {
            out.push(Some(clamp(start, end, terminal)));
            out.push(None);
            start = i.saturating_sub(before);
        }
        end = i + after + 1;
    }
    out.push(Some(clamp(start, end, terminal)));
    out
}

fn clamp(start: u32, end: u32, terminal: u32) -> Range<u32> {
    start.max(1)..end.min(terminal)
}
