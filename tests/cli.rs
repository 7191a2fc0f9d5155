//! One-shot subcommands: `init` and `render`.

mod common;

use common::{docx_document_xml, formdoc_cmd, stdout};
use std::fs;

#[test]
fn init_writes_a_loadable_config_and_respects_force() {
    let temp = tempfile::tempdir().expect("temp dir");

    let first = formdoc_cmd(temp.path()).arg("init").output().expect("run init");
    assert!(first.status.success());
    assert!(stdout(&first).contains("formdoc.json"));
    let config = formdoc::config::load_config(&temp.path().join("formdoc.json"))
        .expect("load written config");
    assert_eq!(config, formdoc::config::default_config());

    let second = formdoc_cmd(temp.path()).arg("init").output().expect("rerun init");
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("--force"));

    let forced = formdoc_cmd(temp.path())
        .args(["init", "--force", "--config", "nested/custom.json"])
        .output()
        .expect("run init with path");
    assert!(forced.status.success());
    assert!(temp.path().join("nested/custom.json").is_file());
}

#[test]
fn render_fills_the_builtin_docx_template() {
    let temp = tempfile::tempdir().expect("temp dir");
    let output = formdoc_cmd(temp.path())
        .args([
            "render",
            "--bind",
            "row_1=First & only",
            "--bind",
            "Company_Name=Acme",
            "--bind",
            "Executive_Summary=Line one\\nLine two",
            "--out",
            "report.docx",
        ])
        .output()
        .expect("run render");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("application/vnd.openxmlformats"));

    let xml = docx_document_xml(&temp.path().join("report.docx"));
    assert!(xml.contains("First &amp; only"));
    assert!(xml.contains("Acme"));
    assert!(xml.contains("Line one"));
    assert!(xml.contains("Line two"));
    assert!(!xml.contains("{{"));
}

#[test]
fn render_pdf_from_text_template_and_table() {
    let temp = tempfile::tempdir().expect("temp dir");
    fs::write(
        temp.path().join("template.txt"),
        "# Scores for {{Company_Name}}\n{{a0}} {{b0}}\n{{a1}} {{b1}}\n{{a2}} {{b2}}\n",
    )
    .expect("write template");
    fs::write(temp.path().join("scores.tsv"), "Name\tScore\nAnn\t4\n").expect("write table");

    let output = formdoc_cmd(temp.path())
        .args([
            "render",
            "--template",
            "template.txt",
            "--table",
            "scores.tsv",
            "--bind",
            "Company_Name=Acme",
            "--format",
            "pdf",
            "--out",
            "out/scores.pdf",
        ])
        .output()
        .expect("run render");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let bytes = fs::read(temp.path().join("out/scores.pdf")).expect("read pdf");
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn render_rejects_malformed_bindings() {
    let temp = tempfile::tempdir().expect("temp dir");
    let output = formdoc_cmd(temp.path())
        .args(["render", "--bind", "no-equals", "--out", "x.docx"])
        .output()
        .expect("run render");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("NAME=VALUE"));
    assert!(!temp.path().join("x.docx").exists());
}
