//! Line-based measurement of rendered entries.
//!
//! The renderer draws exactly the lines produced here, so the extents the
//! anchor engine works with match what ends up on screen.

use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use super::shell::DisplayFlags;
use crate::store::Entry;

const TAB_WIDTH: usize = 4;

/// Strips control characters the terminal would interpret, keeping newlines
/// and expanding tabs.
pub fn sanitize(text: &str) -> String {
    let mut clean = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' => clean.push('\n'),
            '\t' => clean.push_str(&" ".repeat(TAB_WIDTH)),
            ch if ch.is_control() => {}
            ch => clean.push(ch),
        }
    }
    clean
}

/// Byte ranges of the rows a single line hard-wraps into at `width` columns,
/// never splitting a grapheme.
pub fn wrap_ranges(line: &str, width: usize) -> Vec<Range<usize>> {
    if width == 0 || line.width() <= width {
        return vec![0..line.len()];
    }
    let mut rows = Vec::new();
    let mut start = 0;
    let mut current_width = 0;
    for (idx, grapheme) in line.grapheme_indices(true) {
        let grapheme_width = grapheme.width();
        if current_width + grapheme_width > width && idx > start {
            rows.push(start..idx);
            start = idx;
            current_width = 0;
        }
        current_width += grapheme_width;
    }
    rows.push(start..line.len());
    rows
}

pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    wrap_ranges(line, width)
        .into_iter()
        .map(|row| line[row].to_string())
        .collect()
}

/// Content rows for an entry at the given column width.
pub fn entry_lines(entry: &Entry, width: usize) -> Vec<String> {
    sanitize(entry.display_content())
        .split('\n')
        .flat_map(|line| wrap_line(line, width))
        .collect()
}

/// Content rows, an optional timestamp row, and one separator row.
pub fn entry_height(entry: &Entry, width: usize, flags: DisplayFlags) -> usize {
    let meta = usize::from(flags.contains(DisplayFlags::TIMESTAMPS));
    entry_lines(entry, width).len() + meta + 1
}

pub fn content_extent(entries: &[Entry], width: usize, flags: DisplayFlags) -> usize {
    entries
        .iter()
        .map(|entry| entry_height(entry, width, flags))
        .sum()
}

/// First row of `entries[index]` within the full content.
pub fn entry_top(entries: &[Entry], index: usize, width: usize, flags: DisplayFlags) -> usize {
    content_extent(&entries[..index.min(entries.len())], width, flags)
}
