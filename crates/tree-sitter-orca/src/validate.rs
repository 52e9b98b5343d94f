//! Validation routines for grammars.
//!
//! This module performs structural checks over [`Grammar`](crate::grammar::Grammar)
//! definitions before a [`Language`](crate::Language) is built from them:
//! symbol references must resolve, the start rule must exist and literal
//! tokens must be non-empty. Softer findings (unreachable rules, left
//! recursion, mixed precedence levels) are only logged.

use crate::grammar::{orca::START_RULE, Grammar, Rule, RuleType};
use std::collections::{HashMap, HashSet};

/// Represents a validation failure encountered when checking a grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The descriptive human-readable error message.
    pub message: String,
}

impl ValidationError {
    /// Creates a new [`ValidationError`] from a message string.
    fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Performs semantic validation of a [`Grammar`](crate::grammar::Grammar).
///
/// This function runs several consistency passes over the grammar:
///
/// - Checks that the start rule exists.
/// - Checks that all referenced symbols are defined, in rules, extras and
///   conflict groups.
/// - Checks that literal tokens are non-empty.
/// - Warns about unreachable rules.
/// - Reports immediate left recursion and mixed precedence levels.
///
/// # Errors
///
/// Returns a [`ValidationError`] if any structural rule violation is detected.
pub fn validate(grammar: &Grammar) -> Result<(), ValidationError> {
    if grammar.rules.is_empty() {
        return Err(ValidationError::new("grammar has no rules"));
    }
    if grammar.start_rule().is_none() {
        return Err(ValidationError::new(format!(
            "grammar '{}' has no start rule '{START_RULE}'",
            grammar.name
        )));
    }

    check_undefined_symbols(grammar)?;
    check_extras_and_conflicts(grammar)?;
    check_empty_strings(grammar)?;

    check_unreachable_rules(grammar);
    check_left_recursion(grammar);
    check_precedence(grammar);

    Ok(())
}

fn check_undefined_symbols(grammar: &Grammar) -> Result<(), ValidationError> {
    let defined: HashSet<&str> = grammar.rules.keys().map(String::as_str).collect();

    for (rule_name, rule) in &grammar.rules {
        check_rule_symbols(rule, &defined, rule_name)?;
    }

    Ok(())
}

fn check_rule_symbols(
    rule: &Rule,
    defined: &HashSet<&str>,
    context: &str,
) -> Result<(), ValidationError> {
    if let Some(name) = rule.symbol_name() {
        if !defined.contains(name) {
            return Err(ValidationError::new(format!(
                "undefined symbol '{name}' referenced in rule '{context}'"
            )));
        }
    }

    for child in rule.children() {
        check_rule_symbols(child, defined, context)?;
    }
    Ok(())
}

fn check_extras_and_conflicts(grammar: &Grammar) -> Result<(), ValidationError> {
    let defined: HashSet<&str> = grammar.rules.keys().map(String::as_str).collect();

    for extra in grammar.extras() {
        check_rule_symbols(extra, &defined, "extras")?;
    }

    for group in grammar.conflicts() {
        if let Some(name) = group.iter().find(|name| !defined.contains(name.as_str())) {
            return Err(ValidationError::new(format!(
                "conflict group {group:?} names undefined rule '{name}'"
            )));
        }
    }
    Ok(())
}

fn check_empty_strings(grammar: &Grammar) -> Result<(), ValidationError> {
    fn visit(rule: &Rule, context: &str) -> Result<(), ValidationError> {
        if rule.string_value() == Some("") {
            return Err(ValidationError::new(format!(
                "rule '{context}' contains an empty string token"
            )));
        }
        rule.children().try_for_each(|child| visit(child, context))
    }

    grammar
        .rules
        .iter()
        .try_for_each(|(name, rule)| visit(rule, name))
}

/// Names of every rule reachable from the start rule or the extras.
fn reachable_rules(grammar: &Grammar) -> HashSet<String> {
    let mut reachable = HashSet::new();
    let mut to_visit = vec![START_RULE.to_owned()];
    for extra in grammar.extras() {
        collect_referenced_symbols(extra, &mut to_visit);
    }

    while let Some(rule_name) = to_visit.pop() {
        if !reachable.insert(rule_name.clone()) {
            continue;
        }

        if let Some(rule) = grammar.rules.get(&rule_name) {
            collect_referenced_symbols(rule, &mut to_visit);
        }
    }
    reachable
}

fn check_unreachable_rules(grammar: &Grammar) {
    let reachable = reachable_rules(grammar);

    let mut unreachable: Vec<&String> = grammar
        .rules
        .keys()
        .filter(|name| {
            let inlined = grammar.inline.as_ref().is_some_and(|v| v.contains(*name));
            !reachable.contains(*name) && !inlined
        })
        .collect();
    unreachable.sort();

    for rule_name in unreachable {
        log::warn!("unreachable rule '{rule_name}' in grammar '{}'", grammar.name);
    }
}

fn collect_referenced_symbols(rule: &Rule, symbols: &mut Vec<String>) {
    if let Some(name) = rule.symbol_name() {
        symbols.push(name.to_owned());
    }
    for child in rule.children() {
        collect_referenced_symbols(child, symbols);
    }
}

fn check_left_recursion(grammar: &Grammar) {
    for (rule_name, rule) in &grammar.rules {
        if has_immediate_left_recursion(rule, rule_name) {
            log::debug!("rule '{rule_name}' is left recursive");
        }
    }
}

fn has_immediate_left_recursion(rule: &Rule, target: &str) -> bool {
    match rule.rule_type {
        RuleType::Symbol => rule.name.as_deref() == Some(target),

        RuleType::Seq => rule
            .members
            .first()
            .is_some_and(|first| has_immediate_left_recursion(first, target)),

        RuleType::Choice => rule
            .members
            .iter()
            .any(|member| has_immediate_left_recursion(member, target)),

        RuleType::Prec
        | RuleType::PrecLeft
        | RuleType::PrecRight
        | RuleType::PrecDynamic
        | RuleType::Field
        | RuleType::Alias => rule
            .content
            .as_deref()
            .is_some_and(|content| has_immediate_left_recursion(content, target)),

        _ => false,
    }
}

fn check_precedence(grammar: &Grammar) {
    let mut prec_levels: HashMap<&str, Vec<i32>> = HashMap::new();

    for (rule_name, rule) in &grammar.rules {
        collect_precedence_levels(rule, &mut prec_levels, rule_name);
    }

    for (rule, levels) in &prec_levels {
        if levels.len() > 1 {
            log::warn!("rule '{rule}' has multiple precedence levels: {levels:?}");
        }
    }
}

fn collect_precedence_levels<'a>(
    rule: &Rule,
    levels: &mut HashMap<&'a str, Vec<i32>>,
    context: &'a str,
) {
    if let Some(p) = rule.precedence() {
        levels.entry(context).or_default().push(p);
    }
    for child in rule.children() {
        collect_precedence_levels(child, levels, context);
    }
}
