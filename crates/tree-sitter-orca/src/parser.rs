//! Parsing ORCA input into syntax trees.
//!
//! The parser is a hand-written recursive descent over the rules in
//! [`grammar::orca`](crate::grammar::orca). Wherever the grammar declares a
//! conflict it resolves the way the grammar's precedences do: a `word` alone
//! on its line opens a `subblock`, and a `variable_def` is preferred over a
//! `kv_pair` whenever both would match.
//!
//! Parsing never fails outright. Text that fits no rule becomes an `ERROR`
//! node running to the end of the line (or to a closing `end`), and absent
//! required tokens become zero-width MISSING nodes. Each recovery is also
//! reported as a [`SyntaxError`]. Subblocks nest at most 128 deep; a word
//! that would open one deeper is reported and wrapped in an `ERROR` node.

use crate::grammar::orca;
use crate::language::{Language, LanguageError};
use crate::lexer::{Cursor, Number};
use crate::tree::{Node, Range, SyntaxError, Tree};

/// Produces [`Tree`]s from ORCA input text.
#[derive(Debug, Default)]
pub struct Parser {
    language: Option<Language>,
}

impl Parser {
    /// Creates a parser with no language set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the language used for parsing.
    ///
    /// # Errors
    ///
    /// Returns [`LanguageError::Incompatible`] for any language other than
    /// the ORCA grammar.
    pub fn set_language(&mut self, language: &Language) -> Result<(), LanguageError> {
        if language.name() != orca::NAME {
            return Err(LanguageError::Incompatible {
                expected: orca::NAME.to_owned(),
                found: language.name().to_owned(),
            });
        }
        self.language = Some(language.clone());
        Ok(())
    }

    /// The language currently set, if any.
    #[must_use]
    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    /// Parses `source`. Returns `None` only when no language has been set.
    pub fn parse(&mut self, source: &str) -> Option<Tree> {
        let language = self.language.as_ref()?;

        let mut state = ParseState::new(source);
        let root = state.source_file();
        log::debug!(
            "parsed {} bytes with {} syntax errors",
            source.len(),
            state.errors.len()
        );

        Some(Tree::new(root, language.clone(), source, state.errors))
    }
}

type ParseResult<T> = Result<T, SyntaxError>;

/// The family of coordinate lines a geometry section holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeomMode {
    Xyz,
    Int,
    Zmat,
}

impl GeomMode {
    fn line_kind(self) -> &'static str {
        match self {
            GeomMode::Xyz => "xyz_line",
            GeomMode::Int => "int_line",
            GeomMode::Zmat => "zmat_line1",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            GeomMode::Xyz => "an xyz coordinate line (element x y z)",
            GeomMode::Int => "an internal coordinate line (element i j k r a d)",
            GeomMode::Zmat => "a z-matrix line",
        }
    }
}

/// What closes a run of coordinate lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closing {
    /// A `*` line, as in `* xyz 0 1` blocks.
    Star,
    /// The `end` keyword, as in subblocks.
    End,
}

/// Where a coordinate line expects an integer reference or a coordinate.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Index(&'static str),
    Coord,
}

const INT_SLOTS: [Slot; 6] = [
    Slot::Index("connect1"),
    Slot::Index("connect2"),
    Slot::Index("connect3"),
    Slot::Coord,
    Slot::Coord,
    Slot::Coord,
];

const ZMAT_SLOTS: [Slot; 6] = [
    Slot::Index("zmat_atom1"),
    Slot::Coord,
    Slot::Index("zmat_atom2"),
    Slot::Coord,
    Slot::Index("zmat_atom3"),
    Slot::Coord,
];

const XYZ_SLOTS: [Slot; 3] = [Slot::Coord, Slot::Coord, Slot::Coord];

enum CoordToken {
    Number(Number),
    Ref(Node),
}

/// Deepest allowed `subblock` nesting. Deeper words are reported as errors.
const MAX_NESTING: usize = 128;

struct ParseState<'a> {
    cur: Cursor<'a>,
    errors: Vec<SyntaxError>,
    depth: usize,
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            cur: Cursor::new(source),
            errors: Vec::new(),
            depth: 0,
        }
    }

    fn fail_at(at: usize, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            range: Range {
                start_byte: at,
                end_byte: at,
                ..Range::default()
            },
            message: message.into(),
        }
    }

    fn fail(&self, message: impl Into<String>) -> SyntaxError {
        Self::fail_at(self.cur.pos(), message)
    }

    /// Consumes the literal `kind` (matched case-insensitively for keywords)
    /// as an anonymous node.
    fn token(&mut self, kind: &'static str) -> Node {
        let start = self.cur.pos();
        self.cur.advance(kind.len());
        Node::leaf(kind, false, start, self.cur.pos())
    }

    fn expect(&mut self, byte: u8, kind: &'static str) -> ParseResult<Node> {
        if self.cur.peek() == Some(byte) {
            Ok(self.token(kind))
        } else {
            Err(self.fail(format!("expected '{kind}'")))
        }
    }

    /// Skips blanks (and newlines, if asked), collecting comments into `out`.
    fn trivia(&mut self, out: &mut Vec<Node>, newlines: bool) {
        loop {
            self.cur.skip_blanks(newlines);
            match self.cur.scan_comment() {
                Some((start, end)) => out.push(Node::leaf("comment", true, start, end)),
                None => break,
            }
        }
    }

    /// Whether only blanks and a comment stand between the cursor and the
    /// end of the line. Does not move the cursor.
    fn rest_of_line_is_empty(&mut self) -> bool {
        let checkpoint = self.cur.pos();
        self.trivia(&mut Vec::new(), false);
        let empty = self.cur.at_line_end();
        self.cur.reset(checkpoint);
        empty
    }

    /// The end of a line. The end of input also counts.
    fn line_end(&mut self, out: &mut Vec<Node>) -> ParseResult<()> {
        self.trivia(out, false);
        match self.cur.peek() {
            None => Ok(()),
            Some(b'\n') => {
                out.push(self.token("\n"));
                Ok(())
            }
            Some(_) => Err(self.fail("expected end of line")),
        }
    }

    fn optional_semicolon(&mut self, out: &mut Vec<Node>) {
        let checkpoint = self.cur.pos();
        self.cur.skip_blanks(false);
        if self.cur.peek() == Some(b';') {
            out.push(self.token(";"));
        } else {
            self.cur.reset(checkpoint);
        }
    }

    fn at_end_keyword(&self) -> bool {
        self.cur.at_keyword("end")
    }

    fn expect_end(&mut self, out: &mut Vec<Node>) {
        if self.at_end_keyword() {
            out.push(self.token("end"));
        } else {
            let error = self.fail("expected 'end'");
            out.push(Node::missing("end", false, self.cur.pos()));
            self.errors.push(error);
        }
    }

    /// Records `error` and wraps everything from `start` to the end of the
    /// line in an `ERROR` node. With `stop_at_end`, a closing `end` keyword
    /// on that line is left for the enclosing block.
    fn recover(&mut self, start: usize, error: SyntaxError, stop_at_end: bool) -> Node {
        log::debug!(
            "syntax error at byte {}: {}",
            error.range.start_byte,
            error.message
        );
        self.errors.push(error);
        self.cur.reset(start);

        while let Some(b) = self.cur.peek() {
            if b == b'\n' {
                break;
            }
            if stop_at_end
                && self.cur.pos() > start
                && !self.cur.after_ident_byte()
                && self.at_end_keyword()
            {
                break;
            }
            self.cur.bump_char();
        }
        if self.cur.pos() == start && !self.cur.at_eof() {
            self.cur.bump_char();
        }
        Node::error(start, self.cur.pos())
    }

    fn source_file(&mut self) -> Node {
        let mut children = Vec::new();
        loop {
            self.trivia(&mut children, true);
            if self.cur.at_eof() {
                break;
            }
            let start = self.cur.pos();
            let mark = self.errors.len();
            match self.item() {
                Ok(node) => children.push(node),
                Err(error) => {
                    self.errors.truncate(mark);
                    children.push(self.recover(start, error, false));
                }
            }
        }
        Node::branch_over("source_file", 0, self.cur.source_len(), children)
    }

    fn item(&mut self) -> ParseResult<Node> {
        match self.cur.peek() {
            Some(b'!') => self.simple_line(),
            Some(b'%') => self.input(),
            Some(b'*') => self.geometry(),
            _ => Err(self.fail("expected '!', '%' or '*' to start a line")),
        }
    }

    fn simple_line(&mut self) -> ParseResult<Node> {
        let mut children = vec![self.token("!")];
        loop {
            self.trivia(&mut children, false);
            match self.cur.scan_bare() {
                Some((start, end)) => children.push(Node::leaf("arg", true, start, end)),
                None => break,
            }
        }
        self.line_end(&mut children)?;
        Ok(Node::branch("simple_line", children))
    }

    fn input_title(&mut self) -> ParseResult<Node> {
        let mut children = vec![self.expect(b'%', "%")?];
        self.trivia(&mut children, false);
        match self.cur.scan_ident() {
            Some(ident) if ident.is_word => {
                children.push(Node::leaf("word", true, ident.start, ident.end));
                Ok(Node::branch("input_title", children))
            }
            _ => Err(self.fail("expected a block name after '%'")),
        }
    }

    /// `%name value` on one line, or a `%name ... end` block.
    fn input(&mut self) -> ParseResult<Node> {
        let title = self.input_title()?;

        if let Some(rest) = self.input_line_rest() {
            let mut children = vec![title];
            children.extend(rest);
            return Ok(Node::branch("input_line", children));
        }

        let mut children = vec![title];
        let body = self.input_body();
        push_body(&mut children, body);
        self.expect_end(&mut children);
        Ok(Node::branch("input_block", children))
    }

    /// A lone quoted string or number closing the title's line.
    fn input_line_rest(&mut self) -> Option<Vec<Node>> {
        let checkpoint = self.cur.pos();
        let mut children = Vec::new();
        self.trivia(&mut children, false);

        let value = if let Some((start, end)) = self.cur.scan_quoted() {
            Node::leaf("quoted_string", true, start, end)
        } else if let Some(number) = self.cur.scan_number() {
            Node::leaf("float", true, number.start, number.end)
        } else {
            self.cur.reset(checkpoint);
            return None;
        };
        children.push(value);

        if self.line_end(&mut children).is_ok() {
            Some(children)
        } else {
            self.cur.reset(checkpoint);
            None
        }
    }

    /// Entries and comments up to `end` or the end of input.
    fn input_body(&mut self) -> Vec<Node> {
        let mut items = Vec::new();
        loop {
            self.trivia(&mut items, true);
            if self.cur.at_eof() || self.at_end_keyword() {
                break;
            }
            let start = self.cur.pos();
            let mark = self.errors.len();
            match self.body_entry() {
                Ok(node) => items.push(node),
                Err(error) => {
                    self.errors.truncate(mark);
                    items.push(self.recover(start, error, true));
                }
            }
        }
        items
    }

    fn body_entry(&mut self) -> ParseResult<Node> {
        if self.cur.peek() == Some(b'{') {
            let block = self.brace_block()?;
            return Ok(Node::branch("raw_content", vec![block]));
        }

        let ident = self
            .cur
            .scan_ident()
            .ok_or_else(|| self.fail("expected a keyword, subblock or variable definition"))?;
        if !ident.is_word {
            return Err(Self::fail_at(
                ident.start,
                format!(
                    "'{}' is not a valid keyword",
                    self.cur.text(ident.start, ident.end)
                ),
            ));
        }
        let word = Node::leaf("word", true, ident.start, ident.end);

        if self.rest_of_line_is_empty() {
            if self.depth >= MAX_NESTING {
                return Err(Self::fail_at(ident.start, "subblocks nested too deeply"));
            }
            self.depth += 1;
            let subblock = self.subblock(word);
            self.depth -= 1;
            return subblock;
        }

        let checkpoint = self.cur.pos();
        if let Ok(def) = self.variable_def(word.clone()) {
            Ok(def)
        } else {
            self.cur.reset(checkpoint);
            self.kv_pair(word)
        }
    }

    /// `name = number`, `name = a, b, c` or `name [a b ...]`.
    fn variable_def(&mut self, word: Node) -> ParseResult<Node> {
        let mut children = vec![Node::branch("variable_name", vec![word])];
        self.trivia(&mut children, false);

        match self.cur.peek() {
            Some(b'[') => {
                let (array, single_integer) = self.variable_array()?;
                children.push(array);
                // `key[1] value` indexes a keyword instead.
                if single_integer && !self.rest_of_line_is_empty() {
                    let checkpoint = self.cur.pos();
                    self.cur.skip_blanks(false);
                    let continues = self.cur.peek() != Some(b';') && !self.at_end_keyword();
                    self.cur.reset(checkpoint);
                    if continues {
                        return Err(self.fail("indexed keyword"));
                    }
                }
            }
            Some(b'=') => {
                children.push(self.token("="));
                self.trivia(&mut children, false);
                let first = self
                    .cur
                    .scan_number()
                    .ok_or_else(|| self.fail("expected a number"))?;

                let checkpoint = self.cur.pos();
                let mut between = Vec::new();
                self.trivia(&mut between, false);
                if self.cur.peek() == Some(b',') {
                    children.push(self.variable_range(first, between)?);
                } else {
                    self.cur.reset(checkpoint);
                    children.push(number_leaf(first));
                }
            }
            _ => return Err(self.fail("expected '=' or '['")),
        }

        self.optional_semicolon(&mut children);

        let checkpoint = self.cur.pos();
        self.cur.skip_blanks(false);
        let continues = self.cur.peek() == Some(b',');
        self.cur.reset(checkpoint);
        if continues {
            return Err(self.fail("value list continues"));
        }

        Ok(Node::branch("variable_def", children))
    }

    fn variable_range(&mut self, first: Number, between: Vec<Node>) -> ParseResult<Node> {
        let mut children = vec![float_leaf(first)];
        children.extend(between);
        for _ in 0..2 {
            self.trivia(&mut children, false);
            children.push(self.expect(b',', ",")?);
            self.trivia(&mut children, false);
            let number = self
                .cur
                .scan_number()
                .ok_or_else(|| self.fail("expected a number in range"))?;
            children.push(float_leaf(number));
        }
        Ok(Node::branch("variable_range", children))
    }

    /// `[ f f ... ]`, reporting whether it held exactly one integer.
    fn variable_array(&mut self) -> ParseResult<(Node, bool)> {
        let mut children = vec![self.expect(b'[', "[")?];
        let mut numbers = Vec::new();
        loop {
            self.trivia(&mut children, false);
            match self.cur.scan_number() {
                Some(number) => {
                    numbers.push(number);
                    children.push(float_leaf(number));
                }
                None => break,
            }
        }
        if numbers.is_empty() {
            return Err(self.fail("expected a number"));
        }
        children.push(self.expect(b']', "]")?);

        let single_integer = matches!(numbers.as_slice(), [only] if only.is_integer);
        Ok((Node::branch("variable_array", children), single_integer))
    }

    fn kv_pair(&mut self, word: Node) -> ParseResult<Node> {
        let mut children = vec![self.input_key(word)?];
        self.trivia(&mut children, false);
        if self.cur.peek() == Some(b'=') {
            children.push(self.token("="));
            self.trivia(&mut children, false);
        }
        children.push(self.value()?);
        self.optional_semicolon(&mut children);
        Ok(Node::branch("kv_pair", children))
    }

    fn input_key(&mut self, word: Node) -> ParseResult<Node> {
        let checkpoint = self.cur.pos();
        self.cur.skip_blanks(false);
        let key = if self.cur.peek() == Some(b'[') {
            self.cur.reset(checkpoint);
            self.array(word)?
        } else {
            self.cur.reset(checkpoint);
            word
        };
        Ok(Node::branch("input_key", vec![key]))
    }

    /// The `[index]` following an already scanned word.
    fn array(&mut self, word: Node) -> ParseResult<Node> {
        let mut children = vec![word];
        self.trivia(&mut children, false);
        children.push(self.expect(b'[', "[")?);
        self.trivia(&mut children, false);

        if let Some(number) = self.cur.scan_number() {
            if !number.is_integer {
                return Err(Self::fail_at(number.start, "array index must be an integer"));
            }
            children.push(Node::leaf("integer", true, number.start, number.end));
        } else if let Some(ident) = self.cur.scan_ident() {
            children.push(Node::leaf("string", true, ident.start, ident.end));
        } else {
            return Err(self.fail("expected an array index"));
        }

        self.trivia(&mut children, false);
        children.push(self.expect(b']', "]")?);
        Ok(Node::branch("array", children))
    }

    fn value(&mut self) -> ParseResult<Node> {
        let mut children = vec![self.value_atom()?];
        loop {
            let checkpoint = self.cur.pos();
            let mut tail = Vec::new();
            self.trivia(&mut tail, false);
            if self.cur.peek() != Some(b',') {
                self.cur.reset(checkpoint);
                break;
            }
            tail.push(self.token(","));
            self.trivia(&mut tail, false);
            tail.push(self.value_atom()?);
            children.extend(tail);
        }
        Ok(Node::branch("value", children))
    }

    fn value_atom(&mut self) -> ParseResult<Node> {
        let inner = match self.cur.peek() {
            Some(b'"') => {
                let (start, end) = self
                    .cur
                    .scan_quoted()
                    .ok_or_else(|| self.fail("unterminated string"))?;
                Node::leaf("quoted_string", true, start, end)
            }
            Some(b'{') => self.brace_block()?,
            Some(b) if b.is_ascii_digit() || b == b'-' => {
                let number = self
                    .cur
                    .scan_number()
                    .ok_or_else(|| self.fail("expected a number"))?;
                number_leaf(number)
            }
            Some(b) if b.is_ascii_alphabetic() => {
                if self.at_end_keyword() {
                    return Err(self.fail("expected a value before 'end'"));
                }
                let ident = self
                    .cur
                    .scan_ident()
                    .ok_or_else(|| self.fail("expected a value"))?;
                if ident.is_word {
                    let word = Node::leaf("word", true, ident.start, ident.end);
                    let checkpoint = self.cur.pos();
                    self.cur.skip_blanks(false);
                    let indexed = self.cur.peek() == Some(b'[');
                    self.cur.reset(checkpoint);
                    if indexed {
                        self.array(word)?
                    } else {
                        word
                    }
                } else {
                    Node::leaf("string", true, ident.start, ident.end)
                }
            }
            _ => return Err(self.fail("expected a value")),
        };
        Ok(Node::branch("value_atom", vec![inner]))
    }

    /// `{ ... }` holding numbers or words, optionally comma separated. May
    /// span lines.
    fn brace_block(&mut self) -> ParseResult<Node> {
        let mut children = vec![self.expect(b'{', "{")?];
        self.trivia(&mut children, true);

        if !matches!(self.cur.peek(), Some(b'}') | None) {
            let mut content = vec![self.brace_value()?];
            loop {
                self.trivia(&mut content, true);
                match self.cur.peek() {
                    Some(b'}') | None => break,
                    Some(b',') => {
                        content.push(self.token(","));
                        self.trivia(&mut content, true);
                        content.push(self.brace_value()?);
                    }
                    Some(_) => content.push(self.brace_value()?),
                }
            }
            children.push(Node::branch("brace_content", content));
        }

        children.push(self.expect(b'}', "}")?);
        Ok(Node::branch("brace_block", children))
    }

    fn brace_value(&mut self) -> ParseResult<Node> {
        let inner = if let Some(number) = self.cur.scan_number() {
            number_leaf(number)
        } else {
            match self.cur.scan_ident() {
                Some(ident) if ident.is_word => Node::leaf("word", true, ident.start, ident.end),
                _ => return Err(self.fail("expected a number or word inside braces")),
            }
        };
        Ok(Node::branch("brace_value", vec![inner]))
    }

    /// A word alone on its line, then coordinates or a body, then `end`.
    fn subblock(&mut self, name: Node) -> ParseResult<Node> {
        let mut children = vec![name.with_field("name")];
        self.line_end(&mut children)?;
        self.trivia(&mut children, true);

        if let Some(mode) = self.detect_coordinates() {
            self.coordinate_lines(mode, Closing::End, &mut children);
        } else {
            let body = self.input_body();
            push_body(&mut children, body);
        }

        self.expect_end(&mut children);
        Ok(Node::branch("subblock", children))
    }

    /// The coordinate family of the line at the cursor, if it is a
    /// coordinate line carrying at least one value. A bare element line is
    /// indistinguishable from a nested subblock name and is not counted.
    fn detect_coordinates(&mut self) -> Option<GeomMode> {
        if self.at_end_keyword() {
            return None;
        }
        let checkpoint = self.cur.pos();
        let detected = self
            .coord_line(None)
            .ok()
            .filter(|(line, _)| line.kind() != "zmat_line1")
            .map(|(_, mode)| mode);
        self.cur.reset(checkpoint);
        detected
    }

    fn coordinate_lines(&mut self, mode: GeomMode, closing: Closing, out: &mut Vec<Node>) {
        let mut lines = 0;
        loop {
            self.trivia(out, true);
            if self.cur.at_eof() {
                break;
            }
            let closed = match closing {
                Closing::Star => matches!(self.cur.peek(), Some(b'*' | b'%' | b'!')),
                Closing::End => self.at_end_keyword(),
            };
            if closed {
                break;
            }

            let start = self.cur.pos();
            match self.coord_line(Some(mode)) {
                Ok((line, _)) => {
                    out.push(line);
                    lines += 1;
                }
                Err(error) => out.push(self.recover(start, error, closing == Closing::End)),
            }
        }

        if lines == 0 {
            let error = self.fail(format!("expected {}", mode.describe()));
            out.push(Node::missing(mode.line_kind(), true, self.cur.pos()));
            self.errors.push(error);
        }
    }

    /// One coordinate line. With no `mode`, the shape of the line decides.
    fn coord_line(&mut self, mode: Option<GeomMode>) -> ParseResult<(Node, GeomMode)> {
        let (start, end) = self
            .cur
            .scan_element()
            .ok_or_else(|| self.fail("expected an element symbol"))?;
        let mut children = vec![Node::leaf("element", true, start, end)];

        let mut tokens = Vec::new();
        loop {
            self.cur.skip_blanks(false);
            if self.cur.peek() == Some(b'{') {
                tokens.push(CoordToken::Ref(self.variable_ref()?));
            } else if let Some(number) = self.cur.scan_number() {
                tokens.push(CoordToken::Number(number));
            } else {
                break;
            }
        }

        let leading_integers = tokens
            .iter()
            .take(3)
            .filter(|token| matches!(token, CoordToken::Number(n) if n.is_integer))
            .count();
        let (kind, line_mode, slots): (&'static str, GeomMode, &[Slot]) =
            match (tokens.len(), mode) {
                (3, None | Some(GeomMode::Xyz)) => ("xyz_line", GeomMode::Xyz, &XYZ_SLOTS[..]),
                (6, Some(GeomMode::Int)) => ("int_line", GeomMode::Int, &INT_SLOTS[..]),
                (6, None) if leading_integers == 3 => ("int_line", GeomMode::Int, &INT_SLOTS[..]),
                (0, None | Some(GeomMode::Zmat)) => ("zmat_line1", GeomMode::Zmat, &ZMAT_SLOTS[..0]),
                (2, None | Some(GeomMode::Zmat)) => {
                    ("zmat_line2", GeomMode::Zmat, &ZMAT_SLOTS[..2])
                }
                (4, None | Some(GeomMode::Zmat)) => {
                    ("zmat_line3", GeomMode::Zmat, &ZMAT_SLOTS[..4])
                }
                (6, None | Some(GeomMode::Zmat)) => ("zmat_line4", GeomMode::Zmat, &ZMAT_SLOTS[..]),
                (_, Some(mode)) => {
                    return Err(Self::fail_at(start, format!("expected {}", mode.describe())))
                }
                (_, None) => return Err(Self::fail_at(start, "not a coordinate line")),
            };

        for (token, slot) in tokens.into_iter().zip(slots) {
            let node = match (token, *slot) {
                (CoordToken::Number(number), Slot::Index(field)) if number.is_integer => {
                    Node::leaf("integer", true, number.start, number.end).with_field(field)
                }
                (CoordToken::Number(number), Slot::Index(_)) => {
                    return Err(Self::fail_at(
                        number.start,
                        "expected an integer atom reference",
                    ))
                }
                (CoordToken::Ref(node), Slot::Index(_)) => {
                    return Err(Self::fail_at(
                        node.start_byte(),
                        "expected an integer atom reference",
                    ))
                }
                (CoordToken::Number(number), Slot::Coord) => {
                    Node::branch("coord_value", vec![float_leaf(number)])
                }
                (CoordToken::Ref(node), Slot::Coord) => Node::branch("coord_value", vec![node]),
            };
            children.push(node);
        }

        self.line_end(&mut children)?;
        Ok((Node::branch(kind, children), line_mode))
    }

    fn variable_ref(&mut self) -> ParseResult<Node> {
        let mut children = vec![self.expect(b'{', "{")?];
        self.cur.skip_blanks(false);
        let ident = self
            .cur
            .scan_ident()
            .filter(|ident| ident.is_word)
            .ok_or_else(|| self.fail("expected a variable name"))?;
        children.push(Node::branch(
            "variable_name",
            vec![Node::leaf("word", true, ident.start, ident.end)],
        ));
        self.cur.skip_blanks(false);
        children.push(self.expect(b'}', "}")?);
        Ok(Node::branch("variable_ref", children))
    }

    /// `* xyz 0 1` blocks and `* xyzfile 0 1 file.xyz` lines.
    fn geometry(&mut self) -> ParseResult<Node> {
        let mut children = vec![self.expect(b'*', "*")?];
        self.trivia(&mut children, false);

        let ident = self
            .cur
            .scan_ident()
            .ok_or_else(|| self.fail("expected a geometry type after '*'"))?;
        let text = self.cur.text(ident.start, ident.end).to_ascii_lowercase();
        let keyword: &'static str = match text.as_str() {
            "xyzfile" => "xyzfile",
            "gzmtfile" => "gzmtfile",
            "xyz" => "xyz",
            "int" => "int",
            "gzmt" => "gzmt",
            _ => {
                return Err(Self::fail_at(
                    ident.start,
                    format!("unknown geometry type '{text}'"),
                ))
            }
        };
        let keyword_node = Node::leaf(keyword, false, ident.start, ident.end);

        match keyword {
            "xyzfile" | "gzmtfile" => {
                children.push(Node::branch("geom_line_types", vec![keyword_node]));
                self.header_integers(&mut children)?;
                self.trivia(&mut children, false);
                match self.cur.scan_bare() {
                    Some((start, end)) => children.push(Node::leaf("file", true, start, end)),
                    None => self.missing("file", "expected a file name", &mut children),
                }
                self.line_end(&mut children)?;
                Ok(Node::branch("geom_line", children))
            }
            _ => {
                let mode = match keyword {
                    "xyz" => GeomMode::Xyz,
                    "int" => GeomMode::Int,
                    _ => GeomMode::Zmat,
                };
                children.push(keyword_node);
                self.header_integers(&mut children)?;
                self.line_end(&mut children)?;

                self.coordinate_lines(mode, Closing::Star, &mut children);

                if self.cur.peek() == Some(b'*') {
                    children.push(self.token("*"));
                    if let Err(error) = self.line_end(&mut children) {
                        let start = self.cur.pos();
                        children.push(self.recover(start, error, false));
                    }
                } else {
                    self.missing("*", "expected '*' to close the geometry", &mut children);
                }
                Ok(Node::branch("geom_block", children))
            }
        }
    }

    /// Charge and multiplicity. Values absent at the end of the line are
    /// marked missing rather than failing the whole header.
    fn header_integers(&mut self, out: &mut Vec<Node>) -> ParseResult<()> {
        for _ in 0..2 {
            self.trivia(out, false);
            match self.cur.scan_number() {
                Some(number) if number.is_integer => {
                    out.push(Node::leaf("integer", true, number.start, number.end));
                }
                Some(number) => {
                    return Err(Self::fail_at(number.start, "expected an integer"));
                }
                None if self.cur.at_line_end() => {
                    self.missing("integer", "expected an integer", out);
                }
                None => return Err(self.fail("expected an integer")),
            }
        }
        Ok(())
    }

    fn missing(&mut self, kind: &'static str, message: &str, out: &mut Vec<Node>) {
        let named = kind.starts_with(|c: char| c.is_ascii_alphabetic());
        out.push(Node::missing(kind, named, self.cur.pos()));
        let error = self.fail(message);
        self.errors.push(error);
    }
}

/// Wraps body items in an `input_body` node unless they are only comments.
fn push_body(out: &mut Vec<Node>, items: Vec<Node>) {
    if items.iter().any(|item| !item.is_extra()) {
        out.push(Node::branch("input_body", items));
    } else {
        out.extend(items);
    }
}

fn number_leaf(number: Number) -> Node {
    let kind = if number.is_integer { "integer" } else { "float" };
    Node::leaf(kind, true, number.start, number.end)
}

fn float_leaf(number: Number) -> Node {
    Node::leaf("float", true, number.start, number.end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Tree {
        let mut parser = Parser::new();
        parser.set_language(crate::language().unwrap()).unwrap();
        parser.parse(source).unwrap()
    }

    fn sexp(source: &str) -> String {
        let tree = parse(source);
        assert!(
            !tree.has_error(),
            "unexpected errors {:?} in {}",
            tree.errors(),
            tree.to_sexp()
        );
        tree.to_sexp()
    }

    #[test]
    fn parse_without_language_returns_none() {
        assert!(Parser::new().parse("! HF").is_none());
    }

    #[test]
    fn rejects_other_languages() {
        let mut grammar = orca::grammar();
        grammar.name = "xyz".to_owned();
        let other = Language::from_grammar(grammar).unwrap();
        let err = Parser::new().set_language(&other).unwrap_err();
        assert!(matches!(err, LanguageError::Incompatible { .. }));
    }

    #[test]
    fn empty_input() {
        assert_eq!(sexp(""), "(source_file)");
        assert_eq!(sexp("\n\n  \n"), "(source_file)");
    }

    #[test]
    fn simple_line() {
        assert_eq!(
            sexp("! B3LYP def2-SVP Opt\n"),
            "(source_file (simple_line (arg) (arg) (arg)))"
        );
    }

    #[test]
    fn simple_line_with_comment_and_no_newline() {
        assert_eq!(
            sexp("!HF # cheap"),
            "(source_file (simple_line (arg) (comment)))"
        );
    }

    #[test]
    fn input_lines() {
        assert_eq!(
            sexp("%maxcore 3000\n%moinp \"guess.gbw\"\n"),
            "(source_file \
             (input_line (input_title (word)) (float)) \
             (input_line (input_title (word)) (quoted_string)))"
        );
    }

    #[test]
    fn single_line_block() {
        assert_eq!(
            sexp("%pal nprocs 4 end\n"),
            "(source_file (input_block (input_title (word)) \
             (input_body (kv_pair (input_key (word)) (value (value_atom (integer)))))))"
        );
    }

    #[test]
    fn block_keywords_are_case_insensitive() {
        let tree = parse("%scf MaxIter 125 END");
        assert!(!tree.has_error());
        let block = tree.root_node().named_child(0).unwrap();
        let end = block.child(block.child_count() - 1).unwrap();
        assert_eq!(end.kind(), "end");
        assert_eq!(end.utf8_text(tree.source()), "END");
    }

    #[test]
    fn key_value_forms() {
        let source = "%scf\n  convergence tight\n  guess = hueckel;\n  basis def2-TZVP\n  damp 0.5, 0.25\nend\n";
        assert_eq!(
            sexp(source),
            "(source_file (input_block (input_title (word)) (input_body \
             (kv_pair (input_key (word)) (value (value_atom (word)))) \
             (kv_pair (input_key (word)) (value (value_atom (word)))) \
             (kv_pair (input_key (word)) (value (value_atom (string)))) \
             (kv_pair (input_key (word)) (value (value_atom (float)) (value_atom (float)))))))"
        );
    }

    #[test]
    fn indexed_keyword() {
        assert_eq!(
            sexp("%output\n  Print[P_Hirshfeld] 1\nend\n"),
            "(source_file (input_block (input_title (word)) (input_body \
             (kv_pair (input_key (array (word) (string))) (value (value_atom (integer)))))))"
        );
    }

    #[test]
    fn variable_definitions_win_over_pairs() {
        let source = "%paras\n  R = 1.0, 2.0, 10;\n  A = 109.5\n  r [1.0 2.0]\n  list = 1, 2\nend\n";
        assert_eq!(
            sexp(source),
            "(source_file (input_block (input_title (word)) (input_body \
             (variable_def (variable_name (word)) (variable_range (float) (float) (float))) \
             (variable_def (variable_name (word)) (float)) \
             (variable_def (variable_name (word)) (variable_array (float) (float))) \
             (kv_pair (input_key (word)) (value (value_atom (integer)) (value_atom (integer)))))))"
        );
    }

    #[test]
    fn raw_content_and_brace_values() {
        let source = "%geom\n  Constraints\n    {B 0 1 C}\n    { 0, 1.5 }\n  end\nend\n";
        assert_eq!(
            sexp(source),
            "(source_file (input_block (input_title (word)) (input_body \
             (subblock name: (word) (input_body \
             (raw_content (brace_block (brace_content (brace_value (word)) (brace_value (integer)) (brace_value (integer)) (brace_value (word))))) \
             (raw_content (brace_block (brace_content (brace_value (integer)) (brace_value (float))))))))))"
        );
    }

    #[test]
    fn subblock_field_is_reachable() {
        let tree = parse("%geom\n  scan\n  end\nend\n");
        let block = tree.root_node().named_child(0).unwrap();
        let body = block.named_child(1).unwrap();
        let subblock = body.named_child(0).unwrap();
        assert_eq!(subblock.kind(), "subblock");
        let name = subblock.child_by_field_name("name").unwrap();
        assert_eq!(name.utf8_text(tree.source()), "scan");
    }

    #[test]
    fn xyz_geometry() {
        let source = "* xyz 0 1\nO 0.0 0.0 0.0\nH 0.0 0.757 0.587 # hydrogen\nH 0 -0.757 0.587\n*\n";
        assert_eq!(
            sexp(source),
            "(source_file (geom_block (integer) (integer) \
             (xyz_line (element) (coord_value (float)) (coord_value (float)) (coord_value (float))) \
             (xyz_line (element) (coord_value (float)) (coord_value (float)) (coord_value (float)) (comment)) \
             (xyz_line (element) (coord_value (float)) (coord_value (float)) (coord_value (float)))))"
        );
    }

    #[test]
    fn internal_coordinates() {
        let source = "* int -1 2\nC 0 0 0 0.0 0.0 0.0\nO 1 0 0 1.2 0.0 0.0\n*";
        let tree = parse(source);
        assert!(!tree.has_error(), "{:?}", tree.errors());
        let block = tree.root_node().named_child(0).unwrap();
        let line = block.named_child(3).unwrap();
        assert_eq!(line.kind(), "int_line");
        let connect = line.child_by_field_name("connect1").unwrap();
        assert_eq!(connect.utf8_text(source), "1");
        assert_eq!(block.named_child(0).unwrap().utf8_text(source), "-1");
    }

    #[test]
    fn zmatrix_lines() {
        let source = "* gzmt 0 1\nO\nH 1 0.96\nH 1 0.96 2 104.5\nC 1 1.5 2 110.0 3 {dih}\n*\n";
        let tree = parse(source);
        assert!(!tree.has_error(), "{:?}", tree.errors());
        let block = tree.root_node().named_child(0).unwrap();
        let kinds: Vec<_> = block.named_children().skip(2).map(Node::kind).collect();
        assert_eq!(kinds, ["zmat_line1", "zmat_line2", "zmat_line3", "zmat_line4"]);

        let last = block.named_child(5).unwrap();
        assert_eq!(
            last.to_sexp(),
            "(zmat_line4 (element) zmat_atom1: (integer) (coord_value (float)) \
             zmat_atom2: (integer) (coord_value (float)) \
             zmat_atom3: (integer) (coord_value (variable_ref (variable_name (word)))))"
        );
    }

    #[test]
    fn geometry_file_line() {
        assert_eq!(
            sexp("* xyzfile 0 1 water.xyz\n"),
            "(source_file (geom_line (geom_line_types) (integer) (integer) (file)))"
        );
    }

    #[test]
    fn coordinates_inside_subblock() {
        let source = "%coords\n  coords\n    H 0 0 0\n    H 0 0 0.74\n  end\nend\n";
        assert_eq!(
            sexp(source),
            "(source_file (input_block (input_title (word)) (input_body \
             (subblock name: (word) \
             (xyz_line (element) (coord_value (float)) (coord_value (float)) (coord_value (float))) \
             (xyz_line (element) (coord_value (float)) (coord_value (float)) (coord_value (float)))))))"
        );
    }

    #[test]
    fn missing_end_is_reported() {
        let tree = parse("%scf\n  maxiter 100\n");
        assert!(tree.has_error());
        assert!(tree.to_sexp().ends_with("(MISSING \"end\")))"));
        assert_eq!(tree.errors().len(), 1);
        assert_eq!(tree.errors()[0].message, "expected 'end'");
        assert_eq!(tree.errors()[0].range.start_point.row, 2);
    }

    #[test]
    fn stray_text_becomes_error_node() {
        let source = "! HF\nnonsense here\n%maxcore 100\n";
        let tree = parse(source);
        assert_eq!(
            tree.to_sexp(),
            "(source_file (simple_line (arg)) (ERROR) (input_line (input_title (word)) (float)))"
        );
        let error = tree.root_node().named_child(1).unwrap();
        assert!(error.is_error());
        assert_eq!(error.utf8_text(source), "nonsense here");
        assert_eq!(error.start_position().row, 1);
        assert_eq!(tree.errors().len(), 1);
    }

    #[test]
    fn bad_entry_keeps_closing_end() {
        let tree = parse("%scf maxiter ? end\n! HF\n");
        assert_eq!(
            tree.to_sexp(),
            "(source_file (input_block (input_title (word)) (input_body (ERROR))) (simple_line (arg)))"
        );
    }

    #[test]
    fn bad_atom_line_is_isolated() {
        let source = "* xyz 0 1\nH 0 0\nH 0 0 0\n*\n";
        let tree = parse(source);
        assert_eq!(
            tree.to_sexp(),
            "(source_file (geom_block (integer) (integer) (ERROR) \
             (xyz_line (element) (coord_value (float)) (coord_value (float)) (coord_value (float)))))"
        );
        assert_eq!(tree.errors().len(), 1);
    }

    #[test]
    fn unterminated_geometry() {
        let tree = parse("* xyz 0\n%maxcore 10\n");
        assert_eq!(
            tree.to_sexp(),
            "(source_file (geom_block (integer) (MISSING integer) (MISSING xyz_line) (MISSING \"*\")) \
             (input_line (input_title (word)) (float)))"
        );
        assert_eq!(tree.errors().len(), 3);
    }

    #[test]
    fn nesting_depth_is_capped() {
        let source = format!("%a\n{}", "x\n".repeat(20_000));
        let tree = parse(&source);
        assert!(tree.has_error());
        let too_deep: Vec<_> = tree
            .errors()
            .iter()
            .filter(|e| e.message == "subblocks nested too deeply")
            .collect();
        assert_eq!(too_deep.len(), 20_000 - MAX_NESTING);
        assert_eq!(too_deep[0].range.start_point.row, MAX_NESTING + 1);
        assert!(tree.root_node().descendants().any(Node::is_error));
    }

    #[test]
    fn nesting_within_limit_is_clean() {
        let depth = 40;
        let source = format!(
            "%a\n{}{}end\n",
            "x\n".repeat(depth),
            "end\n".repeat(depth)
        );
        let tree = parse(&source);
        assert!(!tree.has_error(), "{:?}", tree.errors());
        let subblocks = tree
            .root_node()
            .descendants()
            .filter(|n| n.kind() == "subblock")
            .count();
        assert_eq!(subblocks, depth);
    }

    #[test]
    fn ranges_cover_source() {
        let source = "! HF\n%pal nprocs 2 end\n";
        let tree = parse(source);
        let root = tree.root_node();
        assert_eq!(root.byte_range(), 0..source.len());
        let block = root.named_child(1).unwrap();
        assert_eq!(block.utf8_text(source), "%pal nprocs 2 end");
        assert_eq!(block.start_position().row, 1);
        assert_eq!(block.end_position().column, 17);
    }

    #[test]
    fn every_kind_belongs_to_the_language() {
        let source = "! Opt\n%maxcore 10\n%paras R = 1, 2, 3 end\n\
                      %geom Constraints\n {B 0 1 C}\n end\nend\n\
                      * gzmt 0 1\nO\nH 1 {r}\n*\n* xyzfile 0 1 a.xyz\n???\n";
        let tree = parse(source);
        let language = tree.language();
        for node in tree.root_node().descendants() {
            let id = language
                .id_for_node_kind(node.kind(), node.is_named())
                .unwrap_or_else(|| panic!("unknown kind {:?}", node.kind()));
            assert_eq!(node.kind_id(), id);
            assert!(language.node_kind_is_visible(id));
        }
    }
}
