//! A peekable, restorable cursor over an in-memory byte slice.
//!
//! Every text decoder works on a `ReadBuffer`. Null sentinels are detected by peeking,
//! and a decoder that fails part-way can be rewound with `set_position`, so a value that
//! merely shares a prefix with a sentinel still reaches the nested decoder intact.

use crate::error::{NullableError, Result};

#[derive(Debug, Clone)]
pub struct ReadBuffer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ReadBuffer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Rewinds (or advances) to a position previously obtained from `position`.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Peeks `offset` bytes past the current position.
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.remaining().starts_with(prefix)
    }

    pub fn starts_with_ignore_ascii_case(&self, prefix: &[u8]) -> bool {
        let rest = self.remaining();
        rest.len() >= prefix.len() && rest[..prefix.len()].eq_ignore_ascii_case(prefix)
    }

    pub fn advance(&mut self, n: usize) {
        self.set_position(self.pos + n);
    }

    pub fn next_byte(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Consumes exactly `n` bytes.
    pub fn read_exact(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(NullableError::UnexpectedEof(what.to_string()));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Consumes bytes while `pred` holds and returns them.
    pub fn take_while(&mut self, mut pred: impl FnMut(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if !pred(byte) {
                break;
            }
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    /// Consumes `expected` or fails without consuming anything.
    pub fn expect_byte(&mut self, expected: u8, row: usize) -> Result<()> {
        match self.peek() {
            Some(byte) if byte == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(byte) => Err(NullableError::malformed(
                row,
                format!(
                    "expected '{}', found '{}'",
                    expected.escape_ascii(),
                    byte.escape_ascii()
                ),
            )),
            None => Err(NullableError::malformed(
                row,
                format!("expected '{}', found end of input", expected.escape_ascii()),
            )),
        }
    }

    pub fn skip_ascii_whitespace(&mut self) {
        self.take_while(|b| b == b' ' || b == b'\t' || b == b'\n' || b == b'\r');
    }
}
