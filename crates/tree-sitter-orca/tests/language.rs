//! Loading the ORCA language through the public API.

use tree_sitter_orca::{language, Parser};

#[test]
fn test_can_load_grammar() {
    let mut parser = Parser::new();
    parser
        .set_language(language().expect("Error loading Orca grammar"))
        .expect("Error loading Orca grammar");
}

#[test]
fn language_reports_its_tables() {
    let language = language().unwrap();
    assert_eq!(language.name(), "orca");
    assert_eq!(language.version(), tree_sitter_orca::language::LANGUAGE_VERSION);
    assert!(language.node_kind_count() > 40);

    let kinds: Vec<_> = language
        .node_types()
        .into_iter()
        .filter(|t| t.named)
        .map(|t| t.kind)
        .collect();
    for kind in ["source_file", "simple_line", "input_block", "geom_block", "xyz_line"] {
        assert!(kinds.iter().any(|k| k == kind), "missing {kind}");
    }
}

#[test]
fn kind_ids_round_trip() {
    let language = language().unwrap();
    for id in 0..u16::try_from(language.node_kind_count()).unwrap() {
        let kind = language.node_kind_for_id(id).unwrap();
        let named = language.node_kind_is_named(id);
        let found = language.id_for_node_kind(kind, named).unwrap();
        // The hidden end symbol shares its name with the `end` keyword.
        if id != 0 {
            assert_eq!(found, id, "{kind:?}");
        }
    }
    assert_eq!(language.node_kind_for_id(u16::MAX), None);
}

#[test]
fn parser_can_be_reused() {
    let mut parser = Parser::new();
    parser.set_language(language().unwrap()).unwrap();

    let first = parser.parse("! HF\n").unwrap();
    let second = parser.parse("%maxcore 100\n").unwrap();
    assert!(!first.has_error());
    assert!(!second.has_error());
    assert_eq!(first.language(), second.language());
}
