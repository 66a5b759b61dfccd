// tests/binding_tests.rs

use folio::ast::{Command, Tree};
use folio::config::FolioConfig;
use folio::macros::{bind_arguments, Bound, MacroDefinition, MacroTable};
use folio::syntax::{parse, ParseOptions};
use folio::Folio;

fn test_macro() -> MacroDefinition {
    MacroDefinition::new("testMacro", "")
        .with_required(&["aOne", "bTwo"])
        .with_optional("cThree", "")
}

/// Parses `text` without paragraphs and returns its first command.
fn first_command(text: &str) -> (Tree, Command) {
    let config = FolioConfig::default();
    let mut macros = MacroTable::new();
    let tree = parse(text, "test", &config, &mut macros, ParseOptions::fragment("")).unwrap();
    let id = tree.children(tree.root())[0];
    let command = tree.command(id).unwrap().clone();
    (tree, command)
}

#[test]
fn zero_arguments_reports_every_required_parameter() {
    let (_tree, command) = first_command("•testCmd[]");
    let err = bind_arguments(&test_macro(), &command, 1).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"Line 1: command "testMacro" is missing 2 arguments: [aOne bTwo]"#
    );
}

#[test]
fn surplus_anonymous_arguments_are_numbered() {
    let (_tree, command) = first_command("•testMacro{1}{2}{3}{4}{5}");
    let err = bind_arguments(&test_macro(), &command, 1).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"Line 1: command "testMacro" contains 2 unknown arguments: [#4 #5]"#
    );
}

#[test]
fn anonymous_arguments_fill_required_then_optional() {
    let (tree, command) = first_command("•testMacro{1}{2}{3}");
    let def = test_macro();
    let binding = bind_arguments(&def, &command, 1).unwrap();
    let text = |name: &str| match binding[name] {
        Bound::Supplied(id) => tree.text(tree.children(id)[0]).unwrap_or_default().to_string(),
        Bound::Default(_) => panic!("{name} was not supplied"),
    };
    assert_eq!(text("aOne"), "1");
    assert_eq!(text("bTwo"), "2");
    assert_eq!(text("cThree"), "3");
}

#[test]
fn unsupplied_optional_takes_its_default() {
    let (_tree, command) = first_command("•testMacro{1}{2}");
    let def = test_macro();
    let binding = bind_arguments(&def, &command, 1).unwrap();
    assert_eq!(binding["cThree"], Bound::Default(""));
}

#[test]
fn named_arguments_report_missing_and_unknown() {
    let (_tree, command) = first_command("•testMacro[aOne={x} bTwo={y} zed={z} extra={w}]");
    let err = bind_arguments(&test_macro(), &command, 1).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"Line 1: command "testMacro" contains 2 unknown arguments: [extra zed]"#
    );

    let (_tree, command) = first_command("•testMacro[cThree={x}]");
    let err = bind_arguments(&test_macro(), &command, 1).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"Line 1: command "testMacro" is missing 2 arguments: [aOne bTwo]"#
    );
}

#[test]
fn binding_errors_abort_rendering() {
    let mut folio = Folio::default();
    folio.define_macro(test_macro());
    let err = folio.render_str("doc", "•testMacro{1}{2}{3}{4}{5}").unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"Line 1: command "testMacro" contains 2 unknown arguments: [#4 #5]"#
    );
}
