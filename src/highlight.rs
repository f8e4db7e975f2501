use std::ops::Range;

use regex::{Regex, RegexBuilder};

/// Case-insensitive literal matcher for a committed search term. The entry
/// filter and the on-screen highlighter both use it, so they agree on what
/// counts as a match.
pub fn build_term_regex(term: &str) -> Option<Regex> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Byte ranges of every match in an unwrapped line.
pub fn match_ranges(line: &str, matcher: Option<&Regex>) -> Vec<Range<usize>> {
    matcher
        .map(|matcher| matcher.find_iter(line).map(|found| found.range()).collect())
        .unwrap_or_default()
}

/// Splits the `row` slice of `line` into alternating runs, flagging the parts
/// covered by `hits`. A match cut by a wrap boundary is flagged on both rows.
pub fn split_runs<'a>(
    line: &'a str,
    row: Range<usize>,
    hits: &[Range<usize>],
) -> Vec<(&'a str, bool)> {
    let mut runs = Vec::new();
    let mut cursor = row.start;
    for hit in hits {
        let start = hit.start.max(row.start);
        let end = hit.end.min(row.end);
        if start >= end {
            continue;
        }
        if start > cursor {
            runs.push((&line[cursor..start], false));
        }
        runs.push((&line[start..end], true));
        cursor = end;
    }
    if cursor < row.end || runs.is_empty() {
        runs.push((&line[cursor..row.end], false));
    }
    runs
}
