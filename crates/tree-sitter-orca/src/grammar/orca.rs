//! The grammar for ORCA quantum chemistry input files.
//!
//! An input file is a sequence of simple-input lines (`! B3LYP def2-SVP`),
//! `%` blocks of keyword/value settings and `*` geometry specifications.
//! The rule names declared here are the node kinds produced by
//! [`Parser`](crate::Parser).

use std::collections::HashMap;

use super::dsl::{
    choice, field, optional, pattern, prec, prec_dynamic, repeat, repeat1, seq, string, sym,
};
use super::{Grammar, Rule};

/// Name of the grammar, and of every [`Language`](crate::Language) built from it.
pub const NAME: &str = "orca";

/// The rule every parse starts from.
pub const START_RULE: &str = "source_file";

/// Builds the ORCA input grammar.
#[must_use]
pub fn grammar() -> Grammar {
    let rules: HashMap<String, Rule> = rules()
        .into_iter()
        .map(|(name, rule)| (name.to_owned(), rule))
        .collect();

    Grammar {
        schema: None,
        name: NAME.to_owned(),
        inherits: None,
        rules,
        extras: Some(vec![pattern(r"\s"), sym("comment")]),
        externals: None,
        inline: None,
        precedences: None,
        conflicts: Some(vec![
            vec!["variable_name".to_owned(), "input_key".to_owned()],
            vec!["variable_name".to_owned(), "array".to_owned()],
        ]),
        reserved: None,
        word: None,
        supertypes: None,
    }
}

fn newline() -> Rule {
    string("\n")
}

#[allow(clippy::too_many_lines)]
fn rules() -> Vec<(&'static str, Rule)> {
    vec![
        (
            "source_file",
            repeat(choice([sym("simple_line"), sym("_input"), sym("_geom")])),
        ),
        ("simple_line", seq([string("!"), repeat(sym("arg")), newline()])),
        ("_input", choice([sym("input_block"), sym("input_line")])),
        (
            "input_line",
            seq([
                sym("input_title"),
                choice([sym("quoted_string"), sym("float")]),
                newline(),
            ]),
        ),
        (
            "input_block",
            seq([sym("input_title"), optional(sym("input_body")), string("end")]),
        ),
        (
            "input_body",
            repeat1(choice([
                sym("kv_pair"),
                sym("subblock"),
                sym("variable_def"),
                sym("raw_content"),
            ])),
        ),
        (
            "subblock",
            prec_dynamic(
                2,
                seq([
                    field("name", sym("word")),
                    newline(),
                    optional(choice([
                        repeat1(sym("xyz_line")),
                        repeat1(sym("int_line")),
                        repeat1(choice([
                            sym("zmat_line1"),
                            sym("zmat_line2"),
                            sym("zmat_line3"),
                            sym("zmat_line4"),
                        ])),
                        sym("input_body"),
                    ])),
                    string("end"),
                ]),
            ),
        ),
        (
            "kv_pair",
            prec(
                -1,
                seq([
                    sym("input_key"),
                    optional(string("=")),
                    sym("value"),
                    optional(string(";")),
                ]),
            ),
        ),
        (
            "variable_def",
            choice([
                seq([
                    sym("variable_name"),
                    sym("variable_array"),
                    optional(string(";")),
                ]),
                seq([
                    sym("variable_name"),
                    string("="),
                    choice([sym("float"), sym("integer"), sym("variable_range")]),
                    optional(string(";")),
                ]),
            ]),
        ),
        ("variable_name", sym("word")),
        (
            "variable_range",
            seq([
                sym("float"),
                string(","),
                sym("float"),
                string(","),
                sym("float"),
            ]),
        ),
        (
            "variable_array",
            seq([string("["), sym("float"), repeat(sym("float")), string("]")]),
        ),
        (
            "value",
            seq([
                sym("value_atom"),
                repeat(seq([string(","), sym("value_atom")])),
            ]),
        ),
        (
            "value_atom",
            choice([
                sym("float"),
                sym("integer"),
                sym("quoted_string"),
                sym("array"),
                sym("brace_block"),
                sym("string"),
                sym("word"),
            ]),
        ),
        (
            "input_args",
            repeat1(seq([
                sym("input_key"),
                choice([sym("float"), sym("string")]),
            ])),
        ),
        ("input_key", choice([sym("word"), sym("array")])),
        ("input_title", seq([string("%"), sym("word")])),
        ("_geom", choice([sym("geom_block"), sym("geom_line")])),
        (
            "geom_line",
            seq([
                string("*"),
                sym("geom_line_types"),
                sym("integer"),
                sym("integer"),
                sym("file"),
                newline(),
            ]),
        ),
        (
            "geom_block",
            choice([
                geom_block_form("xyz", repeat1(sym("xyz_line"))),
                geom_block_form("int", repeat1(sym("int_line"))),
                geom_block_form("gzmt", repeat1(zmat_lines())),
            ]),
        ),
        (
            "geom_line_types",
            choice([string("xyzfile"), string("gzmtfile")]),
        ),
        (
            "geom_block_types",
            choice([string("xyz"), string("gzmt"), string("int")]),
        ),
        (
            "int_line",
            seq([
                sym("element"),
                field("connect1", sym("integer")),
                field("connect2", sym("integer")),
                field("connect3", sym("integer")),
                sym("coord_value"),
                sym("coord_value"),
                sym("coord_value"),
                newline(),
            ]),
        ),
        ("zmat_line1", zmat_line(0)),
        ("zmat_line2", zmat_line(1)),
        ("zmat_line3", zmat_line(2)),
        ("zmat_line4", zmat_line(3)),
        (
            "xyz_line",
            seq([
                sym("element"),
                sym("coord_value"),
                sym("coord_value"),
                sym("coord_value"),
                newline(),
            ]),
        ),
        ("coord_value", choice([sym("float"), sym("variable_ref")])),
        (
            "variable_ref",
            seq([string("{"), sym("variable_name"), string("}")]),
        ),
        (
            "array",
            seq([
                sym("word"),
                string("["),
                choice([sym("string"), sym("integer")]),
                string("]"),
            ]),
        ),
        (
            "brace_block",
            seq([string("{"), optional(sym("brace_content")), string("}")]),
        ),
        (
            "brace_content",
            seq([
                sym("brace_value"),
                repeat(seq([optional(string(",")), sym("brace_value")])),
            ]),
        ),
        (
            "brace_value",
            choice([sym("float"), sym("integer"), sym("word")]),
        ),
        ("raw_content", sym("brace_block")),
        ("comment", pattern("#.*")),
        ("element", pattern("[A-Za-z]{1,2}")),
        ("word", pattern("[A-Za-z][A-Za-z0-9_]*")),
        ("string", pattern(r"[A-Za-z][A-Za-z0-9_\-]*")),
        ("quoted_string", pattern(r#""[^"\n]*""#)),
        (
            "float",
            pattern(r"-?[0-9]+(\.[0-9]*)?([eE][-+]?[0-9]+)?"),
        ),
        ("integer", pattern("-?[0-9]+")),
        ("file", pattern(r"[^\s#]+")),
        ("arg", pattern(r"[^\s#]+")),
    ]
}

/// `* <kind> <charge> <multiplicity>` followed by coordinate lines and a
/// closing `*`.
fn geom_block_form(kind: &str, lines: Rule) -> Rule {
    seq([
        string("*"),
        string(kind),
        sym("integer"),
        sym("integer"),
        newline(),
        lines,
        string("*"),
        newline(),
    ])
}

fn zmat_lines() -> Rule {
    choice([
        sym("zmat_line1"),
        sym("zmat_line2"),
        sym("zmat_line3"),
        sym("zmat_line4"),
    ])
}

/// An element followed by `refs` (reference atom, coordinate) pairs.
fn zmat_line(refs: usize) -> Rule {
    let mut members = vec![sym("element")];
    for n in 1..=refs {
        members.push(field(&format!("zmat_atom{n}"), sym("integer")));
        members.push(sym("coord_value"));
    }
    members.push(newline());
    seq(members)
}

