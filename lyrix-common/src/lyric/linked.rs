//! Lyric lines with neighbour links
//!
//! Display code walks from the current line to its neighbours. Instead of
//! object-graph pointers, lines live in one `Vec` and refer to each other by
//! index.

use super::RichLyricLine;
use crate::timing::TimedEntry;

/// A lyric line plus the arena indices of its neighbours
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedLine {
    pub line: RichLyricLine,
    /// Index of the preceding line, None for the first line
    pub previous: Option<usize>,
    /// Index of the following line, None for the last line
    pub next: Option<usize>,
}

/// Build the linked arena for an already-sorted list of lines
pub fn link_lines(lines: Vec<RichLyricLine>) -> Vec<LinkedLine> {
    let len = lines.len();
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| LinkedLine {
            line,
            previous: i.checked_sub(1),
            next: (i + 1 < len).then_some(i + 1),
        })
        .collect()
}

impl TimedEntry for LinkedLine {
    fn begin(&self) -> i64 {
        self.line.begin
    }

    fn end(&self) -> i64 {
        self.line.end
    }

    fn duration(&self) -> i64 {
        self.line.duration
    }
}
