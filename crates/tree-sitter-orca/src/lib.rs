//! ORCA quantum chemistry input grammar for tree-sitter style parsing.
//!
//! ```
//! let language = tree_sitter_orca::language().expect("Error loading Orca grammar");
//! let mut parser = tree_sitter_orca::Parser::new();
//! parser.set_language(language).expect("Error loading Orca grammar");
//!
//! let tree = parser.parse("! B3LYP def2-SVP\n").unwrap();
//! assert_eq!(tree.to_sexp(), "(source_file (simple_line (arg) (arg)))");
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::multiple_crate_versions)]

use std::sync::OnceLock;

/// Core structures for describing tree-sitter grammars.
///
/// This module defines how the crate understands the declarative shape of a
/// language: rules, extras and conflicts, readable from `grammar.json` or
/// built with the DSL helpers. The ORCA grammar itself lives in
/// [`grammar::orca`].
pub mod grammar;

/// Grammar validation and consistency checking utilities.
///
/// Validation protects language loading from malformed grammars: every
/// referenced symbol must resolve and the start rule must exist.
pub mod validate;

/// The language handle and its symbol tables.
pub mod language;

/// Syntax trees, nodes and positions.
pub mod tree;

/// The ORCA input parser.
pub mod parser;

mod lexer;

pub use grammar::{parse_grammar, Grammar, GrammarError, Rule};
pub use language::{Language, LanguageError, NodeType};
pub use parser::Parser;
pub use tree::{Node, Point, Range, SyntaxError, Tree};
pub use validate::{validate, ValidationError};

/// Syntax highlighting query for ORCA input files.
pub const HIGHLIGHTS_QUERY: &str = include_str!("../queries/highlights.scm");

/// The ORCA language, loaded once per process.
///
/// # Errors
///
/// Returns the [`LanguageError`] raised while building the language from
/// [`grammar::orca::grammar`]. The failure is cached like the success.
pub fn language() -> Result<&'static Language, LanguageError> {
    static LANGUAGE: OnceLock<Result<Language, LanguageError>> = OnceLock::new();

    LANGUAGE
        .get_or_init(|| Language::from_grammar(grammar::orca::grammar()))
        .as_ref()
        .map_err(Clone::clone)
}
