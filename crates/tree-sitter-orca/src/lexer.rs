//! Context-sensitive scanning over ORCA input text.
//!
//! Like tree-sitter's generated lexers, the cursor never tokenizes ahead:
//! the parser asks for the token class that is valid at the current
//! position. All delimiters are ASCII, so every offset the cursor stops at
//! is a character boundary.

/// A numeric literal. `is_integer` is false once a fraction or exponent is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Number {
    pub start: usize,
    pub end: usize,
    pub is_integer: bool,
}

/// An identifier-like run. `is_word` is false when it contains a hyphen,
/// which makes it a `string` (e.g. `def2-TZVP`) rather than a `word`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ident {
    pub start: usize,
    pub end: usize,
    pub is_word: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn is_blank(b: u8, newlines: bool) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | 0x0b | 0x0c) || (newlines && b == b'\n')
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub(crate) fn source_len(&self) -> usize {
        self.src.len()
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.byte(self.pos)
    }

    fn byte(&self, at: usize) -> Option<u8> {
        self.src.as_bytes().get(at).copied()
    }

    /// `true` at a newline or the end of input.
    pub(crate) fn at_line_end(&self) -> bool {
        matches!(self.peek(), None | Some(b'\n'))
    }

    pub(crate) fn advance(&mut self, len: usize) {
        self.pos = (self.pos + len).min(self.src.len());
    }

    /// Steps over one whole character.
    pub(crate) fn bump_char(&mut self) {
        let len = self.src[self.pos..].chars().next().map_or(0, char::len_utf8);
        self.advance(len);
    }

    pub(crate) fn skip_blanks(&mut self, newlines: bool) {
        while self.peek().is_some_and(|b| is_blank(b, newlines)) {
            self.pos += 1;
        }
    }

    fn run_while(&self, from: usize, pred: impl Fn(u8) -> bool) -> usize {
        let mut end = from;
        while self.byte(end).is_some_and(&pred) {
            end += 1;
        }
        end
    }

    /// `#` up to, but not including, the end of the line.
    pub(crate) fn scan_comment(&mut self) -> Option<(usize, usize)> {
        if self.peek() != Some(b'#') {
            return None;
        }
        let start = self.pos;
        self.pos = self.run_while(start, |b| b != b'\n');
        Some((start, self.pos))
    }

    /// `-?[0-9]+(\.[0-9]*)?([eE][-+]?[0-9]+)?`, which must not run straight
    /// into identifier characters.
    pub(crate) fn scan_number(&mut self) -> Option<Number> {
        let start = self.pos;
        let mut end = start;
        if self.byte(end) == Some(b'-') {
            end += 1;
        }

        let digits = end;
        end = self.run_while(end, |b| b.is_ascii_digit());
        if end == digits {
            return None;
        }

        let mut is_integer = true;
        if self.byte(end) == Some(b'.') {
            is_integer = false;
            end = self.run_while(end + 1, |b| b.is_ascii_digit());
        }

        if matches!(self.byte(end), Some(b'e' | b'E')) {
            let mut exponent = end + 1;
            if matches!(self.byte(exponent), Some(b'-' | b'+')) {
                exponent += 1;
            }
            let exponent_end = self.run_while(exponent, |b| b.is_ascii_digit());
            if exponent_end > exponent {
                is_integer = false;
                end = exponent_end;
            }
        }

        if self
            .byte(end)
            .is_some_and(|b| is_ident_byte(b) || b == b'.')
        {
            return None;
        }

        self.pos = end;
        Some(Number {
            start,
            end,
            is_integer,
        })
    }

    /// `[A-Za-z][A-Za-z0-9_-]*`
    pub(crate) fn scan_ident(&mut self) -> Option<Ident> {
        let end = self.ident_end()?;
        let start = self.pos;
        self.pos = end;
        Some(Ident {
            start,
            end,
            is_word: !self.src[start..end].contains('-'),
        })
    }

    fn ident_end(&self) -> Option<usize> {
        if !self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            return None;
        }
        Some(self.run_while(self.pos, is_ident_byte))
    }

    /// Whether the identifier at the cursor is `keyword`, ignoring ASCII case.
    pub(crate) fn at_keyword(&self, keyword: &str) -> bool {
        self.ident_end()
            .is_some_and(|end| self.src[self.pos..end].eq_ignore_ascii_case(keyword))
    }

    /// Whether the byte before the cursor continues an identifier.
    pub(crate) fn after_ident_byte(&self) -> bool {
        self.pos
            .checked_sub(1)
            .and_then(|before| self.byte(before))
            .is_some_and(is_ident_byte)
    }

    /// An element symbol: one or two letters standing alone.
    pub(crate) fn scan_element(&mut self) -> Option<(usize, usize)> {
        let start = self.pos;
        let end = self.run_while(start, |b| b.is_ascii_alphabetic());
        if end == start || end - start > 2 || self.byte(end).is_some_and(is_ident_byte) {
            return None;
        }
        self.pos = end;
        Some((start, end))
    }

    /// A double-quoted string on a single line, quotes included.
    pub(crate) fn scan_quoted(&mut self) -> Option<(usize, usize)> {
        if self.peek() != Some(b'"') {
            return None;
        }
        let start = self.pos;
        let close = self.run_while(start + 1, |b| b != b'"' && b != b'\n');
        if self.byte(close) != Some(b'"') {
            return None;
        }
        self.pos = close + 1;
        Some((start, self.pos))
    }

    /// Any run of non-blank characters up to a comment.
    pub(crate) fn scan_bare(&mut self) -> Option<(usize, usize)> {
        let start = self.pos;
        let end = self.run_while(start, |b| !b.is_ascii_whitespace() && b != b'#');
        if end == start {
            return None;
        }
        self.pos = end;
        Some((start, end))
    }

    pub(crate) fn text(&self, start: usize, end: usize) -> &'a str {
        &self.src[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        let mut cursor = Cursor::new("-1.5e-3 42 7x 3.");
        let n = cursor.scan_number().unwrap();
        assert_eq!((n.start, n.end, n.is_integer), (0, 7, false));

        cursor.skip_blanks(false);
        let n = cursor.scan_number().unwrap();
        assert_eq!(cursor.text(n.start, n.end), "42");
        assert!(n.is_integer);

        cursor.skip_blanks(false);
        let before = cursor.pos();
        assert_eq!(cursor.scan_number(), None);
        assert_eq!(cursor.pos(), before);

        cursor.advance(3);
        let n = cursor.scan_number().unwrap();
        assert_eq!(cursor.text(n.start, n.end), "3.");
        assert!(!n.is_integer);
        assert!(cursor.at_eof());
    }

    #[test]
    fn lone_minus_is_not_a_number() {
        let mut cursor = Cursor::new("- 1");
        assert_eq!(cursor.scan_number(), None);
    }

    #[test]
    fn identifiers_and_keywords() {
        let mut cursor = Cursor::new("def2-TZVP MaxIter END");
        let ident = cursor.scan_ident().unwrap();
        assert!(!ident.is_word);
        assert_eq!(cursor.text(ident.start, ident.end), "def2-TZVP");

        cursor.skip_blanks(false);
        assert!(!cursor.at_keyword("end"));
        assert!(cursor.scan_ident().unwrap().is_word);

        cursor.skip_blanks(false);
        assert!(cursor.at_keyword("end"));
        assert!(!cursor.at_keyword("en"));
    }

    #[test]
    fn elements_are_short() {
        assert_eq!(Cursor::new("Fe 0").scan_element(), Some((0, 2)));
        assert_eq!(Cursor::new("H\n").scan_element(), Some((0, 1)));
        assert_eq!(Cursor::new("end").scan_element(), None);
        assert_eq!(Cursor::new("C1 0").scan_element(), None);
    }

    #[test]
    fn comments_stop_at_newline() {
        let mut cursor = Cursor::new("# note\nnext");
        assert_eq!(cursor.scan_comment(), Some((0, 6)));
        assert!(cursor.at_line_end());
    }

    #[test]
    fn quoted_strings_stay_on_one_line() {
        assert_eq!(Cursor::new("\"a.gbw\" x").scan_quoted(), Some((0, 7)));
        assert_eq!(Cursor::new("\"open\n\"").scan_quoted(), None);
    }

    #[test]
    fn bare_runs_stop_at_comments() {
        let mut cursor = Cursor::new("def2/J#x");
        assert_eq!(cursor.scan_bare(), Some((0, 6)));
        assert_eq!(cursor.scan_bare(), None);
    }
}
