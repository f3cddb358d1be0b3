use serde::Serialize;

/// Byte-offset span into source text. Start is inclusive, end is exclusive.
///
/// Positions are tracked as byte offsets into the source; line and column
/// numbers for display are recovered on demand through a [`LineIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Create a span from byte offsets.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    /// A zero-length span at the given offset.
    pub fn point(at: u32) -> Self {
        Self { start: at, end: at }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span covers zero bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Pre-computed line starts for offset -> (line, column) conversion.
///
/// Built once per source text; lookups binary-search the line start table.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Scan the source for newlines and record line start offsets.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 1-based (line, column) pair.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line_idx = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line = (line_idx as u32) + 1;
        let col = offset - self.line_starts[line_idx] + 1;
        (line, col)
    }

    /// The full text of the 1-based line `line` within `source`, without the
    /// trailing newline. Used by diagnostic printers to echo the offending
    /// source line.
    pub fn line_text<'s>(&self, source: &'s str, line: u32) -> &'s str {
        let idx = (line as usize).saturating_sub(1);
        let start = self.line_starts.get(idx).copied().unwrap_or(0) as usize;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&s| s as usize - 1)
            .unwrap_or(source.len());
        &source[start.min(source.len())..end.min(source.len()).max(start.min(source.len()))]
    }

    /// Number of lines in the indexed source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_len_and_empty() {
        let span = Span::new(5, 10);
        assert_eq!(span.len(), 5);
        assert!(!span.is_empty());
        assert!(Span::point(3).is_empty());
    }

    #[test]
    fn span_merge_covers_both() {
        let merged = Span::new(5, 10).merge(Span::new(8, 15));
        assert_eq!(merged, Span::new(5, 15));
    }

    #[test]
    fn line_index_multiple_lines() {
        let idx = LineIndex::new("def f():\n    pass\n");
        assert_eq!(idx.line_col(0), (1, 1));
        assert_eq!(idx.line_col(9), (2, 1));
        assert_eq!(idx.line_col(13), (2, 5));
    }

    #[test]
    fn line_index_line_text() {
        let src = "a = 1\nb = 2\nc = 3";
        let idx = LineIndex::new(src);
        assert_eq!(idx.line_text(src, 1), "a = 1");
        assert_eq!(idx.line_text(src, 2), "b = 2");
        assert_eq!(idx.line_text(src, 3), "c = 3");
    }
}
