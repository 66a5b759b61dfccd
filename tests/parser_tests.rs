// tests/parser_tests.rs

use folio::ast::dump::dump;
use folio::config::FolioConfig;
use folio::errors::{ErrorCategory, ErrorKind};
use folio::macros::{MacroDefinition, MacroTable};
use folio::syntax::{parse, ParseOptions, PARAGRAPH_BEGIN, PARAGRAPH_END};

fn dump_fragment(text: &str) -> String {
    let config = FolioConfig::default();
    let mut macros = MacroTable::new();
    let tree = parse(text, "test", &config, &mut macros, ParseOptions::fragment("")).unwrap();
    dump(&tree)
}

#[test]
fn dump_shows_commands_and_their_arguments() {
    let expected = "\
Section
  Text \"a \" @1
  Command b @1
    #1:
      Section
        Text \"c\" @1
";
    assert_eq!(dump_fragment("a •b{c}"), expected);
}

#[test]
fn dump_marks_system_and_block_commands() {
    let out = dump_fragment("•(setdata){x: 1}\n◊box");
    assert!(out.contains("Command sys.setdata [system] @1"), "{out}");
    assert!(out.contains("Command box [block] @2"), "{out}");
}

#[test]
fn document_parse_wraps_text_in_paragraphs() {
    let config = FolioConfig::default();
    let mut macros = MacroTable::with_builtins();
    macros.insert(MacroDefinition::new("em", "[[.text]]").with_required(&["text"]));
    let tree = parse(
        "one\n\ntwo •em{three}\n",
        "doc",
        &config,
        &mut macros,
        ParseOptions::document("", false, false),
    )
    .unwrap();
    let names: Vec<String> = tree
        .document_order()
        .filter_map(|id| tree.command(id).map(|c| c.name.clone()))
        .collect();
    assert_eq!(
        names,
        vec![PARAGRAPH_BEGIN, PARAGRAPH_END, PARAGRAPH_BEGIN, "em", PARAGRAPH_END]
    );
}

#[test]
fn plain_documents_have_no_paragraphs() {
    let config = FolioConfig::default();
    let mut macros = MacroTable::with_builtins();
    let tree = parse(
        "one\n\ntwo\n",
        "doc",
        &config,
        &mut macros,
        ParseOptions::document("", true, false),
    )
    .unwrap();
    assert!(tree.document_order().all(|id| tree.command(id).is_none()));
    assert_eq!(tree.plain_text(), "one\n\ntwo\n");
}

#[test]
fn unclosed_body_is_a_parse_error() {
    let config = FolioConfig::default();
    let mut macros = MacroTable::new();
    let err = parse("•b{never closed", "t", &config, &mut macros, ParseOptions::fragment(""))
        .unwrap_err();
    assert!(matches!(
        err.category(),
        ErrorCategory::Parse | ErrorCategory::Lex
    ));
    assert_eq!(err.kind.line(), Some(1));
}

#[test]
fn define_with_duplicate_parameters_is_rejected() {
    let config = FolioConfig::default();
    let mut macros = MacroTable::new();
    let err = parse(
        "•(define){name: m, template: x, parameters: [a, a]}",
        "t",
        &config,
        &mut macros,
        ParseOptions::fragment(""),
    )
    .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MalformedDefinition { .. }));
    assert!(!macros.contains("m", ""));
}
