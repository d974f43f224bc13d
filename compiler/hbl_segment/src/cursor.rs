//! Borrowed cursor over batch source.

/// The unread remainder of a source buffer.
///
/// Trailing control characters (newlines, tabs, carriage returns) of the
/// whole input are dropped when the cursor is created, so a file ending in
/// `"x = 1;\n\n"` behaves exactly like `"x = 1;"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceCursor<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> SourceCursor<'a> {
    pub fn new(source: &'a str) -> Self {
        let source = source.trim_end_matches(char::is_control);
        SourceCursor { source, pos: 0 }
    }

    /// Text not yet consumed.
    #[inline]
    pub fn remaining(&self) -> &'a str {
        &self.source[self.pos..]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Byte offset of the cursor inside the original (trimmed) source.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move forward by `len` bytes of the remaining text.
    ///
    /// `len` must land on a char boundary; it is clamped to the end.
    pub(crate) fn advance(&mut self, len: usize) {
        self.pos = (self.pos + len).min(self.source.len());
    }

    /// Drop everything that is left.
    pub(crate) fn clear(&mut self) {
        self.pos = self.source.len();
    }
}
