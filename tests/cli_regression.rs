// Regression tests for the folio binary: rendered output, walk, dump and
// miette diagnostics on failure.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::tempdir;

const LIBRARY: &str = "\
•(define){name: sys.paragraph.begin, template: \"<p>\", optionals: [text]}
•(define){name: sys.paragraph.end, template: \"</p>\\n\", optionals: [text]}
•(define){name: em, template: \"<em>[[.text]]</em>\", parameters: [text]}
";

#[test]
fn make_renders_to_stdout() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("lib.fol");
    let doc = dir.path().join("doc.md");
    fs::write(&lib, LIBRARY).unwrap();
    fs::write(&doc, "hello •em{there}\n\nbye\n").unwrap();

    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.arg("--macros").arg(&lib).arg("make").arg(&doc);
    cmd.assert()
        .success()
        .stdout("<p>hello <em>there</em></p>\n<p>bye</p>\n");
}

#[test]
fn make_writes_output_file() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("doc.md");
    let out = dir.path().join("out/doc.txt");
    fs::write(&doc, "---\ntitle: T\n---\n•(setdata){n: 3}•data{n} items\n").unwrap();

    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.arg("make").arg(&doc).arg("-o").arg(&out);
    cmd.assert().success();
    assert_eq!(fs::read_to_string(&out).unwrap(), "3 items\n");
}

#[test]
fn make_reports_miette_diagnostics_on_error() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("bad.md");
    fs::write(&doc, "text\n•nosuch{x}\n").unwrap();

    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.arg("make").arg(&doc);
    cmd.assert().failure().code(1).stderr(
        contains("folio::parse")
            .or(contains("not defined"))
            .and(contains("nosuch")),
    );
}

#[test]
fn walk_renders_matching_files_and_copies_the_rest() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    fs::create_dir_all(src.path().join("sub")).unwrap();
    fs::write(src.path().join("index.md"), "•upper{hi}").unwrap();
    fs::write(src.path().join("sub/page.md"), "•lower{LO}").unwrap();
    fs::write(src.path().join("sub/logo.svg"), "<svg/>").unwrap();

    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.arg("walk").arg(src.path()).arg(dst.path());
    cmd.assert().success();

    assert_eq!(fs::read_to_string(dst.path().join("index.html")).unwrap(), "HI");
    assert_eq!(fs::read_to_string(dst.path().join("sub/page.html")).unwrap(), "lo");
    assert_eq!(fs::read_to_string(dst.path().join("sub/logo.svg")).unwrap(), "<svg/>");
}

#[test]
fn walk_fails_when_any_document_fails() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    fs::write(src.path().join("good.md"), "fine").unwrap();
    fs::write(src.path().join("bad.md"), "•(bogus)").unwrap();

    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.arg("walk").arg(src.path()).arg(dst.path());
    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("unknown system command"));
    assert_eq!(fs::read_to_string(dst.path().join("good.html")).unwrap(), "fine");
}

#[test]
fn dump_prints_the_tree() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("doc.md");
    fs::write(&doc, "•upper{x}").unwrap();

    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.arg("dump").arg(&doc);
    cmd.assert()
        .success()
        .stdout(contains("Command upper @1").and(contains("Section")));
}
