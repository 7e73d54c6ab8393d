//! Line classification: blank, comment-only or code.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Comment,
    Code,
}

/// Line counts for a file or a symbol span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineCounts {
    pub total: u32,
    pub code: u32,
    pub comment: u32,
    pub blank: u32,
}

/// Per-line classification of one source file.
#[derive(Debug, Clone)]
pub struct LineTable {
    kinds: Vec<LineKind>,
}

impl LineTable {
    /// Classify every line. `comment_spans` holds (start_row, start_col, end_row)
    /// of comment and docstring nodes, 0-based rows, byte columns.
    pub fn build(source: &[u8], comment_spans: &[(usize, usize, usize)]) -> Self {
        let lines: Vec<&[u8]> = split_lines(source);
        let mut kinds: Vec<LineKind> = lines
            .iter()
            .map(|line| {
                if line.iter().all(|b| b.is_ascii_whitespace()) {
                    LineKind::Blank
                } else {
                    LineKind::Code
                }
            })
            .collect();

        for &(start_row, start_col, end_row) in comment_spans {
            for row in start_row..=end_row.min(kinds.len().saturating_sub(1)) {
                if kinds[row] == LineKind::Blank {
                    continue;
                }
                let comment_only = if row == start_row {
                    lines[row]
                        .get(..start_col.min(lines[row].len()))
                        .map(|prefix| prefix.iter().all(|b| b.is_ascii_whitespace()))
                        .unwrap_or(true)
                } else {
                    true
                };
                if comment_only {
                    kinds[row] = LineKind::Comment;
                }
            }
        }

        Self { kinds }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Counts over 1-based inclusive line range.
    pub fn counts(&self, start_line: u32, end_line: u32) -> LineCounts {
        let mut counts = LineCounts::default();
        let start = start_line.saturating_sub(1) as usize;
        let end = (end_line as usize).min(self.kinds.len());
        for kind in self.kinds.iter().take(end).skip(start) {
            counts.total += 1;
            match kind {
                LineKind::Blank => counts.blank += 1,
                LineKind::Comment => counts.comment += 1,
                LineKind::Code => counts.code += 1,
            }
        }
        counts
    }

    pub fn whole(&self) -> LineCounts {
        self.counts(1, self.kinds.len() as u32)
    }
}

/// Split into lines. A trailing newline does not start another line.
fn split_lines(source: &[u8]) -> Vec<&[u8]> {
    if source.is_empty() {
        return Vec::new();
    }
    let mut lines = Vec::with_capacity(bytecount::count(source, b'\n') + 1);
    let mut start = 0;
    for (i, b) in source.iter().enumerate() {
        if *b == b'\n' {
            lines.push(&source[start..i]);
            start = i + 1;
        }
    }
    if start < source.len() {
        lines.push(&source[start..]);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let src = b"# header\n\nx = 1  # trailing\n    # indented\ny = 2\n";
        let spans = [(0, 0, 0), (2, 7, 2), (3, 4, 3)];
        let table = LineTable::build(src, &spans);
        assert_eq!(
            table.whole(),
            LineCounts {
                total: 5,
                code: 2,
                comment: 2,
                blank: 1
            }
        );
        assert_eq!(table.counts(3, 5).code, 2);
    }

    #[test]
    fn test_block_comment_interior_lines() {
        let src = b"/*\n * doc\n */\nfn main() {}";
        let table = LineTable::build(src, &[(0, 0, 2)]);
        let counts = table.whole();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.comment, 3);
        assert_eq!(counts.code, 1);
    }

    #[test]
    fn test_empty_source() {
        let table = LineTable::build(b"", &[]);
        assert!(table.is_empty());
        assert_eq!(table.whole(), LineCounts::default());
    }
}
