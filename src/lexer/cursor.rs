//! Cursor over a single source line.
// Loosely modelled on `rustc_lexer`'s cursor, working on byte offsets so spans stay exact.

use crate::symbol::{Span, SrcOffset};

/// Peekable iterator over the chars of one line.
pub struct Cursor<'a> {
    line: &'a str,
    /// Byte index into `line`
    pos: usize,
    /// Offset of `line` from the start of the file
    base: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(line: &'a str, base: usize) -> Cursor<'a> {
        Cursor { line, pos: 0, base }
    }

    /// Peek at the next char without consuming it.
    pub fn first(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Consume and return the next char.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.first()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume chars while `predicate` holds, returning the consumed slice.
    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.first().is_some_and(&mut predicate) {
            self.bump();
        }
        &self.line[start..self.pos]
    }

    pub fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    /// Unconsumed remainder of the line.
    pub fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }

    pub fn is_eol(&self) -> bool {
        self.pos >= self.line.len()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Span covering `start..start + len` in line-relative bytes.
    pub fn span(&self, start: usize, len: usize) -> Span {
        Span::new(SrcOffset(self.base + start), len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn takes_and_tracks_offsets() {
        let mut cursor = Cursor::new("  LDA #$10", 20);
        cursor.skip_whitespace();
        let start = cursor.pos();
        let word = cursor.take_while(|c| !c.is_whitespace());
        assert_eq!(word, "LDA");
        let span = cursor.span(start, word.len());
        assert_eq!((span.offs(), span.len()), (22, 3));
        cursor.skip_whitespace();
        assert_eq!(cursor.rest(), "#$10");
        assert_eq!(cursor.bump(), Some('#'));
        assert!(!cursor.is_eol());
    }
}
