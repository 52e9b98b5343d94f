//! Core types for representing grammar rules.
//!
//! This module contains the types used to model grammar rules and their
//! structure according to the Tree-sitter JSON schema.

use facet::Facet;

/// Represents a grammar rule in the Tree-sitter format.
///
/// Each rule corresponds to a node in the grammar's rule graph, identified by a
/// [`RuleType`] and containing type-specific fields such as `members` or
/// `content`.
///
/// A `Rule` can be atomic (like a literal or regex) or composite
/// (like a sequence, choice, or precedence group).
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct Rule {
    /// The discriminant identifying what kind of rule this is.
    #[facet(rename = "type")]
    pub rule_type: RuleType,

    /// Optional literal or numeric value, depending on rule kind.
    #[facet(default)]
    pub value: Option<RuleValue>,

    /// Optional name used by `SYMBOL`, `FIELD`, or `ALIAS` rules.
    #[facet(default)]
    pub name: Option<String>,

    /// Optional nested rule for unary constructs such as `REPEAT` or `PREC`.
    #[facet(default)]
    pub content: Option<Box<Rule>>,

    /// List of child rules for compound constructs (`SEQ`, `CHOICE`, etc.).
    #[facet(default)]
    pub members: Vec<Rule>,

    /// Whether the node produced by this rule is named.
    #[facet(default)]
    pub named: Option<bool>,

    /// Internal or generator-specific modifier flags.
    #[facet(default)]
    pub flags: Option<String>,

    /// Optional context label used for reserved-word handling.
    #[facet(default)]
    pub context_name: Option<String>,
}

/// A literal or numeric value attached to a rule node.
#[derive(Debug, Clone, PartialEq, Facet)]
#[repr(u8)]
pub enum RuleValue {
    /// A string literal value (e.g. `"end"`, `"%"`).
    String(String),

    /// An integer numeric value (used by precedence modifiers).
    Integer(i32),
}

/// The enumeration of all recognized Tree-sitter rule types.
///
/// Each variant corresponds to one of the `type` strings found in the JSON
/// grammar format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Facet)]
#[repr(u8)]
pub enum RuleType {
    /// An empty (ε) production.
    #[facet(rename = "BLANK")]
    Blank,
    /// A literal string token.
    #[facet(rename = "STRING")]
    String,
    /// A regular-expression pattern token.
    #[facet(rename = "PATTERN")]
    Pattern,
    /// A reference to another named rule.
    #[facet(rename = "SYMBOL")]
    Symbol,
    /// A rule that matches one of several alternatives.
    #[facet(rename = "CHOICE")]
    Choice,
    /// A sequential composition of member rules.
    #[facet(rename = "SEQ")]
    Seq,
    /// A zero-or-more repetition of a rule.
    #[facet(rename = "REPEAT")]
    Repeat,
    /// A one-or-more repetition of a rule.
    #[facet(rename = "REPEAT1")]
    Repeat1,
    /// A generic precedence wrapper.
    #[facet(rename = "PREC")]
    Prec,
    /// A left-associative precedence wrapper.
    #[facet(rename = "PREC_LEFT")]
    PrecLeft,
    /// A right-associative precedence wrapper.
    #[facet(rename = "PREC_RIGHT")]
    PrecRight,
    /// A dynamic (runtime) precedence wrapper.
    #[facet(rename = "PREC_DYNAMIC")]
    PrecDynamic,
    /// A named field applied to a subrule.
    #[facet(rename = "FIELD")]
    Field,
    /// An alias providing an alternate node name.
    #[facet(rename = "ALIAS")]
    Alias,
    /// A tokenization wrapper.
    #[facet(rename = "TOKEN")]
    Token,
    /// A token that must appear immediately without leading trivia.
    #[facet(rename = "IMMEDIATE_TOKEN")]
    ImmediateToken,
    /// A reserved internal placeholder.
    #[facet(rename = "RESERVED")]
    Reserved,
}

impl Rule {
    /// Creates a bare rule of the given type with every optional part empty.
    #[must_use]
    pub fn of_type(rule_type: RuleType) -> Self {
        Self {
            rule_type,
            value: None,
            name: None,
            content: None,
            members: Vec::new(),
            named: None,
            flags: None,
            context_name: None,
        }
    }

    /// Returns `true` if this rule is a symbol reference.
    #[must_use]
    pub fn is_symbol(&self) -> bool {
        matches!(self.rule_type, RuleType::Symbol)
    }

    /// Returns the referenced symbol name, if applicable.
    #[must_use]
    pub fn symbol_name(&self) -> Option<&str> {
        if self.is_symbol() {
            self.name.as_deref()
        } else {
            None
        }
    }

    /// Returns the field label if this is a `FIELD` wrapper.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        if matches!(self.rule_type, RuleType::Field) {
            self.name.as_deref()
        } else {
            None
        }
    }

    /// Returns the numeric precedence value if this rule is a precedence wrapper.
    #[must_use]
    pub fn precedence(&self) -> Option<i32> {
        match self.rule_type {
            RuleType::Prec | RuleType::PrecLeft | RuleType::PrecRight | RuleType::PrecDynamic => {
                self.value.as_ref().and_then(|v| match v {
                    RuleValue::Integer(i) => Some(*i),
                    RuleValue::String(_) => None,
                })
            }
            _ => None,
        }
    }

    /// Returns the literal string value if this is a `STRING` rule.
    #[must_use]
    pub fn string_value(&self) -> Option<&str> {
        if matches!(self.rule_type, RuleType::String) {
            self.text_value()
        } else {
            None
        }
    }

    /// Returns the pattern source if this is a `PATTERN` rule.
    #[must_use]
    pub fn pattern_value(&self) -> Option<&str> {
        if matches!(self.rule_type, RuleType::Pattern) {
            self.text_value()
        } else {
            None
        }
    }

    /// Every rule directly nested inside this one, whether held as
    /// `content` or as `members`.
    pub fn children(&self) -> impl Iterator<Item = &Rule> {
        self.content.as_deref().into_iter().chain(self.members.iter())
    }

    fn text_value(&self) -> Option<&str> {
        self.value.as_ref().and_then(|v| match v {
            RuleValue::String(s) => Some(s.as_str()),
            RuleValue::Integer(_) => None,
        })
    }
}

/// Returns `true` for rule names that tree-sitter hides from the syntax
/// tree (names starting with an underscore).
#[must_use]
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbol_rule() {
        let json = r#"{
            "type": "SYMBOL",
            "name": "input_block"
        }"#;

        let rule: Rule = facet_json::from_str(json).unwrap();
        assert!(rule.is_symbol());
        assert_eq!(rule.symbol_name(), Some("input_block"));
        assert!(rule.members.is_empty());
    }

    #[test]
    fn test_parse_nested_rule() {
        let json = r#"{
            "type": "REPEAT",
            "content": {
                "type": "CHOICE",
                "members": [
                    {"type": "SYMBOL", "name": "simple_line"},
                    {"type": "SYMBOL", "name": "_geom"},
                    {"type": "BLANK"}
                ]
            }
        }"#;

        let rule: Rule = facet_json::from_str(json).unwrap();
        assert_eq!(rule.rule_type, RuleType::Repeat);
        let inner = rule.children().next().unwrap();
        assert_eq!(inner.rule_type, RuleType::Choice);
        assert_eq!(inner.children().count(), 3);
    }

    #[test]
    fn test_hidden_names() {
        assert!(is_hidden_name("_geom"));
        assert!(!is_hidden_name("geom_block"));
    }
}
