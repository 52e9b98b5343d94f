//! The language handle built from a validated grammar.
//!
//! A [`Language`] is the runtime representation of a grammar: the grammar
//! itself plus the symbol and field tables that give every node kind and
//! field label a stable numeric id. Handles are immutable and cheap to clone.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use facet::Facet;

use crate::grammar::{is_hidden_name, parse_grammar, Grammar, GrammarError, Rule};
use crate::validate::{validate, ValidationError};

/// The ABI version reported by languages built by this crate.
pub const LANGUAGE_VERSION: usize = 14;

/// Kind of the node wrapping text that could not be parsed.
pub const ERROR_KIND: &str = "ERROR";

const END_KIND: &str = "end";

/// A loaded grammar, ready to hand to a [`Parser`](crate::Parser).
#[derive(Clone)]
pub struct Language(Arc<LanguageData>);

struct LanguageData {
    grammar: Grammar,
    symbols: Vec<Symbol>,
    symbol_ids: HashMap<(String, bool), u16>,
    /// Index 0 is unused: field ids start at 1.
    fields: Vec<String>,
}

#[derive(Debug)]
struct Symbol {
    name: String,
    named: bool,
    visible: bool,
}

/// Describes one visible node kind, as listed in tree-sitter's
/// `node-types.json`.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct NodeType {
    /// The node kind.
    #[facet(rename = "type")]
    pub kind: String,

    /// Whether the kind comes from a named rule rather than a literal token.
    pub named: bool,

    /// Field labels used directly inside this rule, sorted.
    pub fields: Vec<String>,
}

/// Errors raised while building a [`Language`] or attaching it to a parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageError {
    /// The grammar JSON could not be read.
    Grammar(GrammarError),

    /// The grammar failed validation.
    Validation(ValidationError),

    /// The grammar declares more node kinds than a `u16` id can address.
    TooManySymbols(usize),

    /// The language is not one the parser understands.
    Incompatible {
        /// The grammar the parser implements.
        expected: String,
        /// The grammar that was offered.
        found: String,
    },
}

impl fmt::Display for LanguageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LanguageError::Grammar(e) => write!(f, "grammar error: {e}"),
            LanguageError::Validation(e) => write!(f, "invalid grammar: {e}"),
            LanguageError::TooManySymbols(count) => {
                write!(f, "grammar declares {count} node kinds, more than fit in a u16 id")
            }
            LanguageError::Incompatible { expected, found } => {
                write!(f, "incompatible language: expected '{expected}', found '{found}'")
            }
        }
    }
}

impl std::error::Error for LanguageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LanguageError::Grammar(e) => Some(e),
            LanguageError::Validation(e) => Some(e),
            LanguageError::TooManySymbols(_) | LanguageError::Incompatible { .. } => None,
        }
    }
}

impl From<GrammarError> for LanguageError {
    fn from(e: GrammarError) -> Self {
        LanguageError::Grammar(e)
    }
}

impl From<ValidationError> for LanguageError {
    fn from(e: ValidationError) -> Self {
        LanguageError::Validation(e)
    }
}

impl Language {
    /// Validates `grammar` and derives its symbol and field tables.
    ///
    /// Symbol id 0 is the hidden end-of-input symbol. Literal tokens follow
    /// in sorted order, then rules in sorted order, and [`ERROR_KIND`] takes
    /// the last id. Field ids start at 1, in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`LanguageError::Validation`] if the grammar is malformed and
    /// [`LanguageError::TooManySymbols`] if its kinds cannot be numbered.
    pub fn from_grammar(grammar: Grammar) -> Result<Self, LanguageError> {
        validate(&grammar)?;

        let mut literals = BTreeSet::new();
        let mut fields = BTreeSet::new();
        for rule in grammar.rules.values() {
            collect_literals_and_fields(rule, &mut literals, &mut fields);
        }
        let mut rule_names: Vec<&String> = grammar.rules.keys().collect();
        rule_names.sort();

        let mut symbols = vec![Symbol {
            name: END_KIND.to_owned(),
            named: false,
            visible: false,
        }];
        symbols.extend(literals.into_iter().map(|literal| Symbol {
            name: literal.to_owned(),
            named: false,
            visible: true,
        }));
        symbols.extend(rule_names.into_iter().map(|name| Symbol {
            name: name.clone(),
            named: true,
            visible: !is_hidden_name(name),
        }));
        symbols.push(Symbol {
            name: ERROR_KIND.to_owned(),
            named: true,
            visible: true,
        });

        // A literal `end` token shadows the hidden end symbol in lookups.
        let mut symbol_ids = HashMap::with_capacity(symbols.len());
        for (id, symbol) in symbols.iter().enumerate() {
            let id = u16::try_from(id).map_err(|_| LanguageError::TooManySymbols(symbols.len()))?;
            symbol_ids.insert((symbol.name.clone(), symbol.named), id);
        }

        let fields: Vec<String> = std::iter::once(String::new())
            .chain(fields.into_iter().map(str::to_owned))
            .collect();

        log::debug!(
            "loaded language '{}': {} node kinds, {} fields",
            grammar.name,
            symbols.len(),
            fields.len() - 1
        );

        Ok(Language(Arc::new(LanguageData {
            grammar,
            symbols,
            symbol_ids,
            fields,
        })))
    }

    /// Reads a `grammar.json` document and loads it.
    ///
    /// # Errors
    ///
    /// Returns [`LanguageError::Grammar`] when the JSON cannot be read, or
    /// any error of [`Language::from_grammar`].
    pub fn from_json(json: &str) -> Result<Self, LanguageError> {
        Self::from_grammar(parse_grammar(json)?)
    }

    /// The grammar's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.grammar.name
    }

    /// The ABI version of this language.
    #[must_use]
    pub fn version(&self) -> usize {
        LANGUAGE_VERSION
    }

    /// The grammar this language was built from.
    #[must_use]
    pub fn grammar(&self) -> &Grammar {
        &self.0.grammar
    }

    /// Number of distinct node kinds, including the hidden end symbol and
    /// [`ERROR_KIND`].
    #[must_use]
    pub fn node_kind_count(&self) -> usize {
        self.0.symbols.len()
    }

    /// The kind name for a symbol id.
    #[must_use]
    pub fn node_kind_for_id(&self, id: u16) -> Option<&str> {
        self.symbol(id).map(|symbol| symbol.name.as_str())
    }

    /// The symbol id for a kind name. Literal tokens and rules live in
    /// separate namespaces, selected by `named`.
    #[must_use]
    pub fn id_for_node_kind(&self, kind: &str, named: bool) -> Option<u16> {
        self.0.symbol_ids.get(&(kind.to_owned(), named)).copied()
    }

    /// Whether the symbol comes from a named rule.
    #[must_use]
    pub fn node_kind_is_named(&self, id: u16) -> bool {
        self.symbol(id).is_some_and(|symbol| symbol.named)
    }

    /// Whether nodes of this kind appear in syntax trees.
    #[must_use]
    pub fn node_kind_is_visible(&self, id: u16) -> bool {
        self.symbol(id).is_some_and(|symbol| symbol.visible)
    }

    /// Number of distinct field labels.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.0.fields.len() - 1
    }

    /// The field label for a field id.
    #[must_use]
    pub fn field_name_for_id(&self, id: u16) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.0.fields.get(usize::from(id)).map(String::as_str)
    }

    /// The field id for a field label.
    #[must_use]
    pub fn field_id_for_name(&self, name: &str) -> Option<u16> {
        self.0
            .fields
            .iter()
            .skip(1)
            .position(|field| field == name)
            .and_then(|index| u16::try_from(index + 1).ok())
    }

    /// Every visible node kind with its field labels, in id order.
    #[must_use]
    pub fn node_types(&self) -> Vec<NodeType> {
        self.0
            .symbols
            .iter()
            .filter(|symbol| symbol.visible && symbol.name != ERROR_KIND)
            .map(|symbol| {
                let mut fields = BTreeSet::new();
                if symbol.named {
                    if let Some(rule) = self.0.grammar.rules.get(&symbol.name) {
                        collect_literals_and_fields(rule, &mut BTreeSet::new(), &mut fields);
                    }
                }
                NodeType {
                    kind: symbol.name.clone(),
                    named: symbol.named,
                    fields: fields.into_iter().map(str::to_owned).collect(),
                }
            })
            .collect()
    }

    /// [`Language::node_types`] serialized as JSON.
    #[must_use]
    pub fn node_types_json(&self) -> String {
        facet_json::to_string(&self.node_types())
    }

    fn symbol(&self, id: u16) -> Option<&Symbol> {
        self.0.symbols.get(usize::from(id))
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.name())
            .field("node_kind_count", &self.node_kind_count())
            .field("field_count", &self.field_count())
            .finish()
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.grammar == other.0.grammar
    }
}

impl Eq for Language {}

fn collect_literals_and_fields<'a>(
    rule: &'a Rule,
    literals: &mut BTreeSet<&'a str>,
    fields: &mut BTreeSet<&'a str>,
) {
    if let Some(literal) = rule.string_value() {
        literals.insert(literal);
    }
    if let Some(field) = rule.field_name() {
        fields.insert(field);
    }
    for child in rule.children() {
        collect_literals_and_fields(child, literals, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::orca;

    fn orca_language() -> Language {
        Language::from_grammar(orca::grammar()).unwrap()
    }

    #[test]
    fn end_and_error_bracket_the_symbol_table() {
        let language = orca_language();
        assert_eq!(language.node_kind_for_id(0), Some("end"));
        assert!(!language.node_kind_is_visible(0));

        let last = u16::try_from(language.node_kind_count() - 1).unwrap();
        assert_eq!(language.node_kind_for_id(last), Some(ERROR_KIND));
        assert!(language.node_kind_is_named(last));
    }

    #[test]
    fn literal_and_rule_namespaces_are_separate() {
        let language = orca_language();
        let keyword = language.id_for_node_kind("end", false).unwrap();
        assert_ne!(keyword, 0);
        assert!(language.node_kind_is_visible(keyword));

        let float = language.id_for_node_kind("float", true).unwrap();
        assert_eq!(language.node_kind_for_id(float), Some("float"));
        assert!(language.node_kind_is_named(float));
        assert_eq!(language.id_for_node_kind("float", false), None);

        let star = language.id_for_node_kind("*", false).unwrap();
        assert!(!language.node_kind_is_named(star));
        assert!(language.node_kind_is_visible(star));
    }

    #[test]
    fn hidden_rules_are_invisible() {
        let language = orca_language();
        let geom = language.id_for_node_kind("_geom", true).unwrap();
        assert!(!language.node_kind_is_visible(geom));
    }

    #[test]
    fn field_ids_start_at_one() {
        let language = orca_language();
        assert_eq!(language.field_name_for_id(0), None);
        assert_eq!(language.field_name_for_id(1), Some("connect1"));

        let name = language.field_id_for_name("name").unwrap();
        assert_eq!(language.field_name_for_id(name), Some("name"));
        assert_eq!(language.field_id_for_name("missing"), None);
        // connect1..3, name, zmat_atom1..3
        assert_eq!(language.field_count(), 7);
    }

    #[test]
    fn node_types_list_fields() {
        let language = orca_language();
        let types = language.node_types();

        let subblock = types.iter().find(|t| t.kind == "subblock").unwrap();
        assert!(subblock.named);
        assert_eq!(subblock.fields, vec!["name".to_owned()]);

        let zmat = types.iter().find(|t| t.kind == "zmat_line4").unwrap();
        assert_eq!(zmat.fields.len(), 3);

        assert!(types.iter().all(|t| !t.kind.starts_with('_')));
        assert!(types.iter().any(|t| t.kind == "%" && !t.named));
        assert!(language.node_types_json().contains("\"kv_pair\""));
    }

    #[test]
    fn invalid_grammar_is_rejected() {
        let mut grammar = orca::grammar();
        grammar.rules.remove("word");
        let err = Language::from_grammar(grammar).unwrap_err();
        assert!(matches!(err, LanguageError::Validation(_)));
        assert!(err.to_string().starts_with("invalid grammar"));
    }

    #[test]
    fn loads_from_json() {
        let json = r#"{
            "name": "tiny",
            "rules": {
                "source_file": {
                    "type": "REPEAT",
                    "content": {"type": "SYMBOL", "name": "_item"}
                },
                "_item": {"type": "SYMBOL", "name": "source_file"}
            }
        }"#;
        let language = Language::from_json(json).unwrap();
        assert_eq!(language.name(), "tiny");
        // end, _item, source_file, ERROR
        assert_eq!(language.node_kind_count(), 4);
        assert_eq!(language.field_count(), 0);

        assert!(matches!(
            Language::from_json("not json"),
            Err(LanguageError::Grammar(_))
        ));
    }

    #[test]
    fn clones_compare_equal() {
        let language = orca_language();
        let clone = language.clone();
        assert_eq!(language, clone);
        assert_eq!(language, orca_language());
    }
}
