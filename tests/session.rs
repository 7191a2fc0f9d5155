//! End-to-end console sessions driven through stdin.

mod common;

use common::{docx_document_xml, formdoc_cmd, run_session, stdout, MOCK_LM};
use std::fs;
use std::path::Path;

fn write_rows(dir: &Path) {
    fs::write(dir.join("rows.txt"), "Alpha\nBeta\n").expect("write rows");
}

#[cfg(unix)]
#[test]
fn simple_session_exports_edited_rows_and_summary() {
    let temp = tempfile::tempdir().expect("temp dir");
    write_rows(temp.path());

    let mut command = formdoc_cmd(temp.path());
    command.args(["session", "--input", "rows.txt", "--out-dir", "out", "--lm", MOCK_LM]);
    let output = run_session(
        command,
        "show\nsave 2 Beta revised\\nsecond line\ngenerate\nsummary save Final summary\nconfirm\nexport\nquit\n",
    );
    let transcript = stdout(&output);
    assert!(output.status.success(), "session failed: {transcript}");
    assert!(!transcript.contains("error:"), "unexpected error: {transcript}");
    assert!(transcript.contains("Drafted summary"));
    assert!(transcript.contains("session confirmed"));

    let document = temp.path().join("out").join("generated_report.docx");
    let xml = docx_document_xml(&document);
    assert!(xml.contains("Alpha"));
    assert!(xml.contains("Beta revised"));
    assert!(xml.contains("second line"));
    assert!(xml.contains("<w:br/>"));
    assert!(xml.contains("Final summary"));
    assert!(!xml.contains("{{row_"));
}

#[cfg(unix)]
#[test]
fn rating_session_embeds_chart_for_company() {
    let temp = tempfile::tempdir().expect("temp dir");
    let workbook_path = temp.path().join("answers.xlsx");
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sheet1").expect("sheet name");
    for (row, column, text) in [
        (0, 5, "Company"),
        (0, 7, "Strategy - Is there a plan?"),
        (0, 8, "Team - Are roles clear?"),
        (1, 5, "Acme"),
        (1, 7, "Yes, for three years"),
        (1, 8, "Mostly"),
        (2, 5, "Globex"),
    ] {
        sheet.write_string(row, column, text).expect("write cell");
    }
    workbook.save(&workbook_path).expect("save workbook");
    fs::write(temp.path().join("formdoc.json"), "{\"rating_mode\": true}\n").expect("write config");

    let mut command = formdoc_cmd(temp.path());
    command.args(["session", "--lm", MOCK_LM]);
    let output = run_session(
        command,
        "companies answers.xlsx\nload answers.xlsx Acme\nrate\nrating 2 9\nconfirm-edits\ngenerate\nsummary save Final\nconfirm\nexport report.docx\n",
    );
    let transcript = stdout(&output);
    assert!(output.status.success(), "session failed: {transcript}");
    assert!(!transcript.contains("error:"), "unexpected error: {transcript}");
    assert!(transcript.contains("  Globex"));
    assert!(transcript.contains("rated 2 rows"));
    assert!(transcript.contains("row 2 rating set to 5"));

    let document = temp.path().join("report.docx");
    let xml = docx_document_xml(&document);
    assert!(xml.contains("Acme"));
    assert!(xml.contains("Yes, for three years"));
    assert!(xml.contains("<w:drawing>"));
    let archive = zip::ZipArchive::new(fs::File::open(&document).expect("open docx"))
        .expect("docx archive");
    assert!(archive
        .file_names()
        .any(|name| name == "word/media/formdoc_image1.png"));
}

#[test]
fn unconfigured_generation_falls_back_and_keeps_going() {
    let temp = tempfile::tempdir().expect("temp dir");
    write_rows(temp.path());

    let mut command = formdoc_cmd(temp.path());
    command.args(["session", "--input", "rows.txt"]);
    let output = run_session(command, "generate\nsummary\nconfirm\n");
    let transcript = stdout(&output);
    assert!(output.status.success());
    assert!(transcript.contains("error: summary generation failed"));
    assert!(transcript.contains("summary set to the fallback text"));
    assert!(transcript.contains("The executive summary could not be generated."));
    assert!(transcript.contains("error: not permitted: save the summary before confirming"));
}

#[test]
fn password_gate_blocks_actions_until_login() {
    let temp = tempfile::tempdir().expect("temp dir");
    write_rows(temp.path());
    fs::write(temp.path().join("formdoc.json"), "{\"password_required\": true}\n")
        .expect("write config");

    let mut command = formdoc_cmd(temp.path());
    command.env("FORMDOC_PASSWORD", "secret").arg("session");
    let output = run_session(
        command,
        "load rows.txt\nlogin wrong\nlogin secret\nload rows.txt\nshow\n",
    );
    let transcript = stdout(&output);
    assert!(output.status.success());
    assert!(transcript.contains("error: not permitted: log in first"));
    assert!(transcript.contains("error: not permitted: incorrect password"));
    assert!(transcript.contains("logged in"));
    assert!(transcript.contains("loaded 2 rows"));
}

#[test]
fn invalid_config_is_rejected_before_the_session_starts() {
    let temp = tempfile::tempdir().expect("temp dir");
    fs::write(temp.path().join("formdoc.json"), "{\"max_rows\": 0}\n").expect("write config");

    let mut command = formdoc_cmd(temp.path());
    command.arg("session");
    let output = run_session(command, "quit\n");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_rows"));
}
