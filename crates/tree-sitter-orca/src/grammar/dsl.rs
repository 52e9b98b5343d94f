//! Rule combinators for writing grammars in Rust.
//!
//! These mirror the functions of tree-sitter's `grammar.js` DSL and produce
//! the same [`Rule`] shapes that `tree-sitter generate` writes to
//! `grammar.json`, so a grammar built here is interchangeable with one loaded
//! through [`parse_grammar`](crate::grammar::parse_grammar).

use super::rules::{Rule, RuleType, RuleValue};

/// The empty production.
#[must_use]
pub fn blank() -> Rule {
    Rule::of_type(RuleType::Blank)
}

/// A literal token such as `"end"`.
#[must_use]
pub fn string(value: &str) -> Rule {
    Rule {
        value: Some(RuleValue::String(value.to_owned())),
        ..Rule::of_type(RuleType::String)
    }
}

/// A regular-expression token.
#[must_use]
pub fn pattern(source: &str) -> Rule {
    Rule {
        value: Some(RuleValue::String(source.to_owned())),
        ..Rule::of_type(RuleType::Pattern)
    }
}

/// A reference to the rule called `name`.
#[must_use]
pub fn sym(name: &str) -> Rule {
    Rule {
        name: Some(name.to_owned()),
        ..Rule::of_type(RuleType::Symbol)
    }
}

/// All of `members`, in order.
#[must_use]
pub fn seq(members: impl IntoIterator<Item = Rule>) -> Rule {
    Rule {
        members: members.into_iter().collect(),
        ..Rule::of_type(RuleType::Seq)
    }
}

/// Exactly one of `members`.
#[must_use]
pub fn choice(members: impl IntoIterator<Item = Rule>) -> Rule {
    Rule {
        members: members.into_iter().collect(),
        ..Rule::of_type(RuleType::Choice)
    }
}

/// Zero or more repetitions of `rule`.
#[must_use]
pub fn repeat(rule: Rule) -> Rule {
    wrap(RuleType::Repeat, rule)
}

/// One or more repetitions of `rule`.
#[must_use]
pub fn repeat1(rule: Rule) -> Rule {
    wrap(RuleType::Repeat1, rule)
}

/// `rule` or nothing. Encoded as a choice with a blank, as tree-sitter does.
#[must_use]
pub fn optional(rule: Rule) -> Rule {
    choice([rule, blank()])
}

/// Static precedence.
#[must_use]
pub fn prec(value: i32, rule: Rule) -> Rule {
    Rule {
        value: Some(RuleValue::Integer(value)),
        ..wrap(RuleType::Prec, rule)
    }
}

/// Dynamic precedence, applied when resolving conflicts at parse time.
#[must_use]
pub fn prec_dynamic(value: i32, rule: Rule) -> Rule {
    Rule {
        value: Some(RuleValue::Integer(value)),
        ..wrap(RuleType::PrecDynamic, rule)
    }
}

/// Labels `rule` with the field `name`.
#[must_use]
pub fn field(name: &str, rule: Rule) -> Rule {
    Rule {
        name: Some(name.to_owned()),
        ..wrap(RuleType::Field, rule)
    }
}

fn wrap(rule_type: RuleType, rule: Rule) -> Rule {
    Rule {
        content: Some(Box::new(rule)),
        ..Rule::of_type(rule_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_is_choice_with_blank() {
        let rule = optional(string(";"));
        assert_eq!(rule.rule_type, RuleType::Choice);
        assert_eq!(rule.members.len(), 2);
        assert_eq!(rule.members[0].string_value(), Some(";"));
        assert_eq!(rule.members[1].rule_type, RuleType::Blank);
    }

    #[test]
    fn wrappers_keep_their_payload() {
        let rule = prec_dynamic(2, field("name", sym("word")));
        assert_eq!(rule.precedence(), Some(2));

        let inner = rule.content.as_deref().unwrap();
        assert_eq!(inner.field_name(), Some("name"));
        assert_eq!(inner.content.as_deref().unwrap().symbol_name(), Some("word"));
    }
}
