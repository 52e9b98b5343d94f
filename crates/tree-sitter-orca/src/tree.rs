//! Concrete syntax trees.
//!
//! Trees follow tree-sitter's model: every node has a kind taken from the
//! grammar, literal tokens stay in the tree as anonymous nodes, comments
//! appear wherever they occur, and unparseable or absent text is marked
//! with `ERROR` and MISSING nodes instead of aborting the parse.

use std::fmt::{self, Write as _};

use crate::language::{Language, ERROR_KIND};

/// A zero-based position in the source. Columns count bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    /// Line number, starting at 0.
    pub row: usize,
    /// Byte offset within the line, starting at 0.
    pub column: usize,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// A span of source text, in bytes and in points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Range {
    /// Offset of the first byte.
    pub start_byte: usize,
    /// Offset one past the last byte.
    pub end_byte: usize,
    /// Position of the first byte.
    pub start_point: Point,
    /// Position one past the last byte.
    pub end_point: Point,
}

/// A problem found while parsing, with the span it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Where the problem is.
    pub range: Range,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for SyntaxError {
    /// Formats as `line:column: message`, both one-based.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.range.start_point.row + 1,
            self.range.start_point.column + 1,
            self.message
        )
    }
}

impl std::error::Error for SyntaxError {}

/// A node in a syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    kind: &'static str,
    kind_id: u16,
    named: bool,
    missing: bool,
    field: Option<&'static str>,
    range: Range,
    children: Vec<Node>,
}

impl Node {
    pub(crate) fn leaf(kind: &'static str, named: bool, start: usize, end: usize) -> Self {
        Self {
            kind,
            kind_id: 0,
            named,
            missing: false,
            field: None,
            range: Range {
                start_byte: start,
                end_byte: end,
                ..Range::default()
            },
            children: Vec::new(),
        }
    }

    /// A node spanning its children. Must not be called with no children.
    pub(crate) fn branch(kind: &'static str, children: Vec<Node>) -> Self {
        let start = children.first().map_or(0, Node::start_byte);
        let end = children.last().map_or(start, Node::end_byte);
        Self::branch_over(kind, start, end, children)
    }

    pub(crate) fn branch_over(
        kind: &'static str,
        start: usize,
        end: usize,
        children: Vec<Node>,
    ) -> Self {
        Self {
            children,
            ..Self::leaf(kind, true, start, end)
        }
    }

    pub(crate) fn missing(kind: &'static str, named: bool, at: usize) -> Self {
        Self {
            missing: true,
            ..Self::leaf(kind, named, at, at)
        }
    }

    pub(crate) fn error(start: usize, end: usize) -> Self {
        Self::leaf(ERROR_KIND, true, start, end)
    }

    pub(crate) fn with_field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    /// Fills in points and kind ids once the whole tree is built.
    pub(crate) fn resolve(&mut self, lines: &LineIndex, language: &Language) {
        self.range.start_point = lines.point(self.range.start_byte);
        self.range.end_point = lines.point(self.range.end_byte);
        self.kind_id = language
            .id_for_node_kind(self.kind, self.named)
            .or_else(|| language.id_for_node_kind(ERROR_KIND, true))
            .unwrap_or_default();
        for child in &mut self.children {
            child.resolve(lines, language);
        }
    }

    /// The node's kind: a rule name for named nodes, the literal text for
    /// anonymous ones.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// The symbol id of [`Node::kind`] in the tree's language.
    #[must_use]
    pub fn kind_id(&self) -> u16 {
        self.kind_id
    }

    /// Whether the node comes from a named rule.
    #[must_use]
    pub fn is_named(&self) -> bool {
        self.named
    }

    /// Whether the node wraps text that could not be parsed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.named && self.kind == ERROR_KIND
    }

    /// Whether the node was inserted in place of required, absent text.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// Whether the node is a comment.
    #[must_use]
    pub fn is_extra(&self) -> bool {
        self.named && self.kind == "comment"
    }

    /// Whether this node or any descendant is an error or missing node.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.is_error() || self.missing || self.children.iter().any(Node::has_error)
    }

    /// The field this node fills in its parent, if any.
    #[must_use]
    pub fn field_name(&self) -> Option<&'static str> {
        self.field
    }

    /// The node's span.
    #[must_use]
    pub fn range(&self) -> Range {
        self.range
    }

    /// Offset of the node's first byte.
    #[must_use]
    pub fn start_byte(&self) -> usize {
        self.range.start_byte
    }

    /// Offset one past the node's last byte.
    #[must_use]
    pub fn end_byte(&self) -> usize {
        self.range.end_byte
    }

    /// The node's span in bytes.
    #[must_use]
    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.range.start_byte..self.range.end_byte
    }

    /// Position of the node's first byte.
    #[must_use]
    pub fn start_position(&self) -> Point {
        self.range.start_point
    }

    /// Position one past the node's last byte.
    #[must_use]
    pub fn end_position(&self) -> Point {
        self.range.end_point
    }

    /// Number of children, named or not.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// The child at `index`.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    /// All children, named or not.
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter()
    }

    /// Named children only.
    pub fn named_children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(|child| child.named)
    }

    /// Number of named children.
    #[must_use]
    pub fn named_child_count(&self) -> usize {
        self.named_children().count()
    }

    /// The named child at `index` among named children.
    #[must_use]
    pub fn named_child(&self, index: usize) -> Option<&Node> {
        self.named_children().nth(index)
    }

    /// The first child filling field `name`.
    #[must_use]
    pub fn child_by_field_name(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.field == Some(name))
    }

    /// Every child filling field `name`.
    pub fn children_by_field_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children
            .iter()
            .filter(move |child| child.field == Some(name))
    }

    /// This node and all of its descendants, in document order.
    #[must_use]
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// The source text covered by this node.
    #[must_use]
    pub fn utf8_text<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.byte_range()).unwrap_or_default()
    }

    /// Renders the node as an S-expression of its named descendants, in the
    /// format of tree-sitter's `Node::to_sexp`.
    #[must_use]
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        self.write_sexp(&mut out);
        out
    }

    fn write_sexp(&self, out: &mut String) {
        if let Some(field) = self.field {
            out.push_str(field);
            out.push_str(": ");
        }
        if self.missing {
            let _ = if self.named {
                write!(out, "(MISSING {})", self.kind)
            } else {
                write!(out, "(MISSING {:?})", self.kind)
            };
            return;
        }

        out.push('(');
        out.push_str(self.kind);
        for child in &self.children {
            if child.named || child.missing {
                out.push(' ');
                child.write_sexp(out);
            }
        }
        out.push(')');
    }
}

/// Pre-order iterator over a node and its descendants.
#[derive(Debug)]
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// The result of parsing one source text.
#[derive(Debug, Clone)]
pub struct Tree {
    root: Node,
    language: Language,
    source: String,
    errors: Vec<SyntaxError>,
}

impl Tree {
    pub(crate) fn new(
        mut root: Node,
        language: Language,
        source: &str,
        errors: Vec<SyntaxError>,
    ) -> Self {
        let lines = LineIndex::new(source);
        root.resolve(&lines, &language);
        let errors = errors
            .into_iter()
            .map(|mut error| {
                error.range.start_point = lines.point(error.range.start_byte);
                error.range.end_point = lines.point(error.range.end_byte);
                error
            })
            .collect();

        Self {
            root,
            language,
            source: source.to_owned(),
            errors,
        }
    }

    /// The `source_file` node.
    #[must_use]
    pub fn root_node(&self) -> &Node {
        &self.root
    }

    /// The language the tree was parsed with.
    #[must_use]
    pub fn language(&self) -> &Language {
        &self.language
    }

    /// The text that was parsed.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the tree contains error or missing nodes.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.root.has_error()
    }

    /// The problems found while parsing, in source order.
    #[must_use]
    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    /// Shorthand for `root_node().to_sexp()`.
    #[must_use]
    pub fn to_sexp(&self) -> String {
        self.root.to_sexp()
    }
}

/// Maps byte offsets to points.
pub(crate) struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(at, _)| at + 1))
            .collect();
        Self { line_starts }
    }

    pub(crate) fn point(&self, byte: usize) -> Point {
        let row = self
            .line_starts
            .partition_point(|&start| start <= byte)
            .saturating_sub(1);
        Point::new(row, byte - self.line_starts[row])
    }
}
