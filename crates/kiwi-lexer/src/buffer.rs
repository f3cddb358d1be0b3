//! Character sources for the lexer.
//!
//! A [`Buffer`] hands out one character at a time while tracking the byte
//! offset, line, column, and current indentation. Three backings exist:
//! an in-memory string, a file (read eagerly, then treated as a string),
//! and an interactive reader that pulls lines on demand.

use std::io::{self, BufRead};
use std::path::Path;

/// Abstract character source.
///
/// Columns count characters, not bytes, so UTF-8 continuation bytes never
/// advance the column. A newline resets the column and indentation and marks
/// the new line empty until a non-space character is seen.
pub trait Buffer {
    /// Name used in diagnostics (`"<string>"`, `"<stdin>"`, or a file path).
    fn file_name(&self) -> &str;

    /// The current character, without consuming it. `None` at end of input.
    fn peek(&mut self) -> Option<char>;

    /// The character after the current one.
    fn peek_next(&mut self) -> Option<char>;

    /// Consume and return the current character.
    fn advance(&mut self) -> Option<char>;

    /// Byte offset of the current position.
    fn pos(&self) -> u32;

    /// 1-based line of the current position.
    fn line(&self) -> u32;

    /// 1-based column (in characters) of the current position.
    fn col(&self) -> u32;

    /// Number of leading spaces seen on the current line so far.
    fn indent(&self) -> u32;

    /// Whether only spaces have been seen on the current line.
    fn empty_line(&self) -> bool;

    /// All text made available so far. For file and string buffers this is
    /// the whole source; the interactive buffer grows it line by line.
    fn text(&self) -> &str;
}

/// Position bookkeeping shared by every backing.
#[derive(Debug, Default)]
struct Tracking {
    pos: usize,
    line: u32,
    col: u32,
    indent: u32,
    empty: bool,
}

impl Tracking {
    fn new() -> Self {
        Self {
            pos: 0,
            line: 1,
            col: 1,
            indent: 0,
            empty: true,
        }
    }

    fn consumed(&mut self, c: char) {
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
            self.indent = 0;
            self.empty = true;
        } else {
            self.col += 1;
            if self.empty {
                if c == ' ' {
                    self.indent += 1;
                } else {
                    self.empty = false;
                }
            }
        }
    }
}

/// In-memory source text.
pub struct StringBuffer {
    name: String,
    text: String,
    track: Tracking,
}

impl StringBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self::named(text, "<string>")
    }

    pub fn named(text: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            track: Tracking::new(),
        }
    }
}

impl Buffer for StringBuffer {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn peek(&mut self) -> Option<char> {
        self.text[self.track.pos..].chars().next()
    }

    fn peek_next(&mut self) -> Option<char> {
        self.text[self.track.pos..].chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.track.consumed(c);
        Some(c)
    }

    fn pos(&self) -> u32 {
        self.track.pos as u32
    }

    fn line(&self) -> u32 {
        self.track.line
    }

    fn col(&self) -> u32 {
        self.track.col
    }

    fn indent(&self) -> u32 {
        self.track.indent
    }

    fn empty_line(&self) -> bool {
        self.track.empty
    }

    fn text(&self) -> &str {
        &self.text
    }
}

/// A file source. The file is read once up front; afterwards it behaves
/// exactly like a [`StringBuffer`] named after the path.
pub struct FileBuffer {
    inner: StringBuffer,
}

impl FileBuffer {
    pub fn open(path: &Path) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self {
            inner: StringBuffer::named(text, path.display().to_string()),
        })
    }
}

impl Buffer for FileBuffer {
    fn file_name(&self) -> &str {
        self.inner.file_name()
    }

    fn peek(&mut self) -> Option<char> {
        self.inner.peek()
    }

    fn peek_next(&mut self) -> Option<char> {
        self.inner.peek_next()
    }

    fn advance(&mut self) -> Option<char> {
        self.inner.advance()
    }

    fn pos(&self) -> u32 {
        self.inner.pos()
    }

    fn line(&self) -> u32 {
        self.inner.line()
    }

    fn col(&self) -> u32 {
        self.inner.col()
    }

    fn indent(&self) -> u32 {
        self.inner.indent()
    }

    fn empty_line(&self) -> bool {
        self.inner.empty_line()
    }

    fn text(&self) -> &str {
        self.inner.text()
    }
}

/// A line-at-a-time source for interactive sessions.
///
/// Pulls the next line from the reader whenever the accumulated text is
/// exhausted; a read of zero bytes is end of input.
pub struct InteractiveBuffer<R: BufRead> {
    reader: R,
    name: String,
    text: String,
    track: Tracking,
    done: bool,
}

impl<R: BufRead> InteractiveBuffer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            name: "<stdin>".to_string(),
            text: String::new(),
            track: Tracking::new(),
            done: false,
        }
    }

    fn refill(&mut self) {
        while !self.done && self.track.pos >= self.text.len() {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) | Err(_) => self.done = true,
                Ok(_) => self.text.push_str(&line),
            }
        }
    }
}

impl<R: BufRead> Buffer for InteractiveBuffer<R> {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn peek(&mut self) -> Option<char> {
        self.refill();
        self.text[self.track.pos..].chars().next()
    }

    fn peek_next(&mut self) -> Option<char> {
        self.refill();
        // The lookahead character may sit on the next line.
        if self.text[self.track.pos..].chars().count() < 2 && !self.done {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) | Err(_) => self.done = true,
                Ok(_) => self.text.push_str(&line),
            }
        }
        self.text[self.track.pos..].chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.track.consumed(c);
        Some(c)
    }

    fn pos(&self) -> u32 {
        self.track.pos as u32
    }

    fn line(&self) -> u32 {
        self.track.line
    }

    fn col(&self) -> u32 {
        self.track.col
    }

    fn indent(&self) -> u32 {
        self.track.indent
    }

    fn empty_line(&self) -> bool {
        self.track.empty
    }

    fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_buffer_tracks_line_and_col() {
        let mut buf = StringBuffer::new("ab\ncd");
        assert_eq!((buf.line(), buf.col()), (1, 1));
        buf.advance(); // a
        buf.advance(); // b
        assert_eq!((buf.line(), buf.col()), (1, 3));
        buf.advance(); // \n
        assert_eq!((buf.line(), buf.col()), (2, 1));
        assert!(buf.empty_line());
        buf.advance(); // c
        assert!(!buf.empty_line());
    }

    #[test]
    fn multibyte_chars_advance_col_once() {
        let mut buf = StringBuffer::new("é=1");
        buf.advance(); // é (two bytes)
        assert_eq!(buf.col(), 2);
        assert_eq!(buf.pos(), 2);
        buf.advance(); // =
        assert_eq!(buf.col(), 3);
        assert_eq!(buf.pos(), 3);
    }

    #[test]
    fn indent_counts_leading_spaces_only() {
        let mut buf = StringBuffer::new("    x y");
        for _ in 0..4 {
            buf.advance();
        }
        assert_eq!(buf.indent(), 4);
        buf.advance(); // x
        buf.advance(); // ' ' after x: no longer leading
        assert_eq!(buf.indent(), 4);
    }

    #[test]
    fn interactive_buffer_reads_lines_on_demand() {
        let input = b"a = 1\nb = 2\n" as &[u8];
        let mut buf = InteractiveBuffer::new(input);
        let mut collected = String::new();
        while let Some(c) = buf.advance() {
            collected.push(c);
        }
        assert_eq!(collected, "a = 1\nb = 2\n");
        assert_eq!(buf.line(), 3);
    }
}
