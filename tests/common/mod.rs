//! Shared test infrastructure for integration tests.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Generation command that answers rating prompts with `4` and everything
/// else with a fixed summary.
#[allow(dead_code)]
pub const MOCK_LM: &str =
    "sh -c 'p=$(cat); case \"$p\" in \"Rate the following\"*) echo 4;; *) echo Drafted summary;; esac'";

/// `formdoc` command isolated from the caller's environment: no API key, no
/// configured command, no password, and config lookups confined to `home`.
pub fn formdoc_cmd(home: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_formdoc"));
    command
        .current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("OPENAI_API_KEY")
        .env_remove("FORMDOC_LM_COMMAND")
        .env_remove("FORMDOC_PASSWORD")
        .env_remove("RUST_LOG");
    command
}

/// Run a session with `script` piped to stdin.
#[allow(dead_code)]
pub fn run_session(mut command: Command, script: &str) -> Output {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn formdoc session");
    child
        .stdin
        .take()
        .expect("session stdin")
        .write_all(script.as_bytes())
        .expect("write session script");
    child.wait_with_output().expect("wait for formdoc session")
}

#[allow(dead_code)]
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Concatenated text of `word/document.xml` inside a `.docx`.
#[allow(dead_code)]
pub fn docx_document_xml(path: &Path) -> String {
    let file = std::fs::File::open(path).expect("open docx");
    let mut archive = zip::ZipArchive::new(file).expect("docx is a zip archive");
    let mut part = archive.by_name("word/document.xml").expect("document part");
    let mut xml = String::new();
    std::io::Read::read_to_string(&mut part, &mut xml).expect("read document part");
    xml
}
