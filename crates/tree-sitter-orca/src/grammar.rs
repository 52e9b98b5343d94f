//! Grammar definitions in the Tree-sitter JSON model.
//!
//! This module defines the internal representation of a grammar as found in
//! Tree-sitter's `grammar.json`. It uses [`facet_json`] for deserialization,
//! provides combinators for writing grammars directly in Rust and ships the
//! ORCA input grammar itself.

use facet::Facet;
use std::collections::HashMap;

mod dsl;
pub mod orca;
mod rules;

pub use dsl::{
    blank, choice, field, optional, pattern, prec, prec_dynamic, repeat, repeat1, seq, string, sym,
};
pub use rules::{is_hidden_name, Rule, RuleType, RuleValue};

/// Represents a full Tree-sitter grammar definition.
///
/// This structure mirrors the serialized JSON format produced by
/// `tree-sitter generate --json`. It captures the complete rule set along with
/// auxiliary metadata such as precedences, conflicts, and supertypes.
///
/// See <https://tree-sitter.github.io/tree-sitter/assets/schemas/grammar.schema.json>
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct Grammar {
    /// Optional `$schema` field from the JSON, typically used for schema
    /// validation or editor integration.
    #[facet(rename = "$schema", default)]
    pub schema: Option<String>,

    /// The short name of the grammar (e.g. `"orca"`).
    pub name: String,

    /// Optional name of a base grammar that this one inherits from.
    #[facet(default)]
    pub inherits: Option<String>,

    /// Map of all rule identifiers to their corresponding definitions.
    pub rules: HashMap<String, Rule>,

    /// “Extras” that may appear between other tokens, such as whitespace or comments.
    #[facet(default)]
    pub extras: Option<Vec<Rule>>,

    /// Rules implemented externally via a scanner.
    #[facet(default)]
    pub externals: Option<Vec<Rule>>,

    /// Names of rules that should be inlined into other rules.
    #[facet(default)]
    pub inline: Option<Vec<String>>,

    /// Precedence declarations that control operator binding order.
    #[facet(default)]
    pub precedences: Option<Vec<Vec<Precedence>>>,

    /// Explicit conflict groups expected during parsing.
    #[facet(default)]
    pub conflicts: Option<Vec<Vec<String>>>,

    /// Context-specific reserved word definitions.
    #[facet(default)]
    pub reserved: Option<HashMap<String, Vec<Rule>>>,

    /// The special rule name used to identify word tokens (keywords, identifiers, etc.).
    #[facet(default)]
    pub word: Option<String>,

    /// A list of node supertypes, grouping related syntactic forms.
    #[facet(default)]
    pub supertypes: Option<Vec<String>>,
}

/// A single precedence entry, either a named symbol or a literal string value.
#[derive(Debug, Clone, PartialEq, Facet)]
#[repr(u8)]
pub enum Precedence {
    /// A literal precedence string.
    String(String),

    /// A symbolic precedence name.
    Symbol {
        /// The identifier of the referenced symbol.
        name: String,
    },
}

impl Grammar {
    /// Returns the rule parsing starts from.
    ///
    /// `grammar.json` encodes the start rule as the first entry of `rules`,
    /// an order that does not survive deserialization into a map, so the
    /// conventional `source_file` name is used instead.
    #[must_use]
    pub fn start_rule(&self) -> Option<(&str, &Rule)> {
        self.rules
            .get_key_value(orca::START_RULE)
            .map(|(name, rule)| (name.as_str(), rule))
    }

    /// Returns the extras, or an empty slice when the grammar declares none.
    #[must_use]
    pub fn extras(&self) -> &[Rule] {
        self.extras.as_deref().unwrap_or_default()
    }

    /// Returns the conflict groups, or an empty slice when none are declared.
    #[must_use]
    pub fn conflicts(&self) -> &[Vec<String>] {
        self.conflicts.as_deref().unwrap_or_default()
    }
}

/// Parse a JSON grammar definition into a strongly typed [`Grammar`] structure.
///
/// # Errors
///
/// Returns [`GrammarError::JsonParse`] if the provided string is not valid JSON
/// or fails schema deserialization.
pub fn parse_grammar(json: &str) -> Result<Grammar, GrammarError> {
    facet_json::from_str(json).map_err(|e| GrammarError::JsonParse(e.to_string()))
}

/// Possible errors raised while reading a grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// The input JSON was syntactically invalid or structurally mismatched.
    JsonParse(String),
}

impl std::fmt::Display for GrammarError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            GrammarError::JsonParse(e) => write!(f, "JSON parse error: {e}"),
        }
    }
}

impl std::error::Error for GrammarError {}
