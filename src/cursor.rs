//! Scan position over a type-spec string.
//!
//! Positions are byte offsets; `seek` back to a saved position is how the
//! grammar backtracks.

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self { Self { text, pos: 0 } }

    pub fn text(&self) -> &'a str { self.text }
    pub fn pos(&self) -> usize { self.pos }
    pub fn remaining(&self) -> usize { self.text.len() - self.pos }
    pub fn is_eof(&self) -> bool { self.pos >= self.text.len() }

    /// Everything not yet consumed.
    pub fn rest(&self) -> &'a str { &self.text[self.pos..] }

    pub fn peek(&self) -> Option<char> { self.rest().chars().next() }

    pub fn read(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Jump to an absolute byte offset, clamped to the input.
    pub fn seek(&mut self, pos: usize) {
        let mut pos = pos.min(self.text.len());
        while !self.text.is_char_boundary(pos) { pos -= 1; }
        self.pos = pos;
    }

    /// Consume `n` bytes of the rest.
    pub fn advance(&mut self, n: usize) { self.seek(self.pos + n); }

    pub fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.read();
        }
    }

    /// Consume `c` if it is next (after whitespace).
    pub fn eat(&mut self, c: char) -> bool {
        let save = self.pos;
        self.skip_ws();
        if self.peek() == Some(c) {
            self.read();
            true
        } else {
            self.pos = save;
            false
        }
    }
}
