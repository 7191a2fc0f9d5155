//! Line-oriented session console.
//!
//! Each input line is one action. The action runs to completion, its outcome
//! is printed, and the next line is read. Errors are printed and the session
//! carries on; only `quit` or end of input ends it.
use crate::controller::EditLockController;
use crate::error::FormError;
use crate::session::Row;
use crate::util::{display_path, one_line};
use anyhow::{anyhow, bail, Context, Result};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

const PREVIEW_BYTES: usize = 72;

pub const HELP: &str = "\
Actions (row numbers start at 1; text accepts \\n for line breaks):
  login <secret>            unlock the session when a password is required
  load <file> [company]     read rows from a spreadsheet or .txt file
  companies <file>          list companies of an assessment workbook
  show                      print rows, ratings, summary and status
  save <n> <text>           store text in row n and lock it
  unlock <n>                make row n editable again
  rate                      generate a rating for every question row
  rating <n> <value>        override the rating of row n (clamped to 1-5)
  confirm-edits             lock all rows and accept the ratings
  generate [instruction]    draft the summary with the generation service
  summary                   print the summary
  summary save <text>       store the summary and lock it
  summary unlock            make the summary editable again
  confirm                   freeze the session for export
  export [file]             write the document for the confirmed session
  help                      show this list
  quit                      end the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Help,
    Login(String),
    Load {
        path: PathBuf,
        company: Option<String>,
    },
    Companies(PathBuf),
    Show,
    Save {
        index: usize,
        text: String,
    },
    Unlock(usize),
    Rate,
    Rating {
        index: usize,
        value: i64,
    },
    ConfirmEdits,
    Generate(Option<String>),
    Summary,
    SummarySave(String),
    SummaryUnlock,
    Confirm,
    Export(Option<PathBuf>),
    Quit,
}

/// Parse one console line. Blank lines and `#` comments yield `None`.
pub fn parse_action(line: &str) -> Result<Option<Action>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let action = match verb {
        "help" | "?" => Action::Help,
        "login" => Action::Login(required(rest, "login <secret>")?.to_string()),
        "load" => {
            let mut words = split_words(rest)?.into_iter();
            let path = words.next().ok_or_else(|| anyhow!("usage: load <file> [company]"))?;
            let company = words.collect::<Vec<_>>().join(" ");
            Action::Load {
                path: PathBuf::from(path),
                company: Some(company).filter(|company| !company.is_empty()),
            }
        }
        "companies" => {
            let words = split_words(rest)?;
            let [path] = words.as_slice() else {
                bail!("usage: companies <file>");
            };
            Action::Companies(PathBuf::from(path))
        }
        "show" => Action::Show,
        "save" => {
            let (number, text) = row_and_rest(rest, "save <n> <text>")?;
            Action::Save {
                index: number,
                text: unescape(text),
            }
        }
        "unlock" => Action::Unlock(row_number(required(rest, "unlock <n>")?)?),
        "rate" => Action::Rate,
        "rating" => {
            let (index, value) = row_and_rest(rest, "rating <n> <value>")?;
            let value = value
                .trim()
                .parse::<i64>()
                .with_context(|| format!("rating must be a whole number (got {value:?})"))?;
            Action::Rating { index, value }
        }
        "confirm-edits" => Action::ConfirmEdits,
        "generate" => Action::Generate(Some(unescape(rest)).filter(|text| !text.is_empty())),
        "summary" => match rest.split_once(char::is_whitespace) {
            Some(("save", text)) => Action::SummarySave(unescape(text.trim())),
            None if rest == "save" => bail!("usage: summary save <text>"),
            None if rest == "unlock" => Action::SummaryUnlock,
            None if rest.is_empty() => Action::Summary,
            _ => bail!("usage: summary | summary save <text> | summary unlock"),
        },
        "confirm" => Action::Confirm,
        "export" => {
            let words = split_words(rest)?;
            match words.as_slice() {
                [] => Action::Export(None),
                [path] => Action::Export(Some(PathBuf::from(path))),
                _ => bail!("usage: export [file]"),
            }
        }
        "quit" | "exit" => Action::Quit,
        other => bail!("unknown action {other:?} (try `help`)"),
    };
    Ok(Some(action))
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str> {
    if rest.is_empty() {
        bail!("usage: {usage}");
    }
    Ok(rest)
}

fn split_words(rest: &str) -> Result<Vec<String>> {
    shell_words::split(rest).map_err(|err| anyhow!("unbalanced quotes: {err}"))
}

/// Map a 1-based console row number to a row index.
fn row_number(word: &str) -> Result<usize> {
    let number: usize = word
        .parse()
        .with_context(|| format!("row must be a positive number (got {word:?})"))?;
    if number == 0 {
        bail!("row numbers start at 1");
    }
    Ok(number - 1)
}

fn row_and_rest<'a>(rest: &'a str, usage: &str) -> Result<(usize, &'a str)> {
    let Some((number, text)) = rest.split_once(char::is_whitespace) else {
        bail!("usage: {usage}");
    };
    Ok((row_number(number)?, text.trim_start()))
}

/// Expand `\n`, `\t` and `\\`; other escapes are kept verbatim.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

enum Flow {
    Continue,
    Quit,
}

pub struct Console {
    controller: EditLockController,
    out_dir: PathBuf,
}

impl Console {
    pub fn new(controller: EditLockController, out_dir: PathBuf) -> Self {
        Self {
            controller,
            out_dir,
        }
    }

    /// Run actions from `input` until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, output: &mut W) -> Result<()> {
        writeln!(
            output,
            "formdoc session (generation: {}); type `help` for actions",
            self.controller.gateway_name()
        )?;
        for line in input.lines() {
            let line = line.context("read console input")?;
            let action = match parse_action(&line) {
                Ok(Some(action)) => action,
                Ok(None) => continue,
                Err(err) => {
                    writeln!(output, "error: {err}")?;
                    continue;
                }
            };
            match self.execute(action, output) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(err) => writeln!(output, "error: {err:#}")?,
            }
        }
        output.flush()?;
        Ok(())
    }

    fn execute<W: Write>(&mut self, action: Action, out: &mut W) -> Result<Flow> {
        match action {
            Action::Help => writeln!(out, "{HELP}")?,
            Action::Login(secret) => {
                self.controller.login(&secret)?;
                writeln!(out, "logged in")?;
            }
            Action::Load { path, company } => {
                let rows = self.controller.load_file(&path, company.as_deref())?;
                writeln!(out, "loaded {} rows from {}", rows.len(), path.display())?;
                for row in rows {
                    writeln!(out, "{}", describe_row(row))?;
                }
            }
            Action::Companies(path) => {
                let companies = self.controller.list_companies(&path)?;
                if companies.is_empty() {
                    writeln!(out, "no companies found")?;
                }
                for company in companies {
                    writeln!(out, "  {company}")?;
                }
            }
            Action::Show => self.show(out)?,
            Action::Save { index, text } => {
                let row = self.controller.save_row(index, text)?;
                writeln!(out, "row {} saved and locked", row.index + 1)?;
            }
            Action::Unlock(index) => {
                let row = self.controller.unlock_row(index)?;
                writeln!(out, "row {} unlocked", row.index + 1)?;
            }
            Action::Rate => {
                let report = self.controller.generate_ratings()?;
                writeln!(out, "rated {} rows", report.ratings.len())?;
                for (index, reason) in &report.failures {
                    writeln!(out, "  row {}: rating failed ({reason}); set to 1", index + 1)?;
                }
            }
            Action::Rating { index, value } => {
                let row = self.controller.set_rating(index, value)?;
                let rating = row
                    .assessment
                    .as_ref()
                    .and_then(|assessment| assessment.rating)
                    .unwrap_or_default();
                writeln!(out, "row {} rating set to {rating}", row.index + 1)?;
            }
            Action::ConfirmEdits => {
                self.controller.confirm_edits()?;
                writeln!(out, "edits confirmed; all rows locked")?;
            }
            Action::Generate(instruction) => {
                match self.controller.generate_summary(instruction.as_deref()) {
                    Ok(summary) => {
                        writeln!(out, "summary drafted (editable until saved):")?;
                        writeln!(out, "{}", summary.content)?;
                    }
                    Err(err @ FormError::GenerationFailed {
                        fallback_applied, ..
                    }) => {
                        writeln!(out, "error: {err}")?;
                        if fallback_applied {
                            writeln!(out, "summary set to the fallback text")?;
                        } else {
                            writeln!(out, "locked summary kept")?;
                        }
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Action::Summary => {
                let summary = &self.controller.session().summary;
                let state = if summary.locked { "locked" } else { "editing" };
                writeln!(out, "summary ({state}):")?;
                writeln!(out, "{}", summary.content)?;
            }
            Action::SummarySave(text) => {
                self.controller.save_summary(text)?;
                writeln!(out, "summary saved and locked")?;
            }
            Action::SummaryUnlock => {
                self.controller.unlock_summary()?;
                writeln!(out, "summary unlocked")?;
            }
            Action::Confirm => {
                self.controller.confirm()?;
                writeln!(out, "session confirmed; ready to export")?;
            }
            Action::Export(path) => {
                let artifact = self.controller.export()?;
                let dest = path.unwrap_or_else(|| self.out_dir.join(&artifact.file_name));
                artifact.write_to(&dest)?;
                writeln!(
                    out,
                    "wrote {} ({}, {} bytes)",
                    display_path(&dest, Some(Path::new("."))),
                    artifact.mime_type,
                    artifact.bytes.len()
                )?;
            }
            Action::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn show<W: Write>(&self, out: &mut W) -> Result<()> {
        let session = self.controller.session();
        if self.controller.policy().password_required && !session.is_authenticated() {
            writeln!(out, "login: required")?;
        }
        if session.rows.is_empty() {
            writeln!(out, "no rows loaded")?;
        }
        if let Some(company) = session.company.as_deref() {
            writeln!(out, "company: {company}")?;
        }
        for row in session.rows.rows() {
            writeln!(out, "{}", describe_row(row))?;
        }
        if !self.controller.policy().locking_enabled {
            writeln!(out, "locking: off")?;
        }
        let summary = &session.summary;
        writeln!(
            out,
            "summary [{}]: {}",
            if summary.locked { "locked" } else { "editing" },
            one_line(&summary.content, PREVIEW_BYTES)
        )?;
        writeln!(
            out,
            "ratings: {}; confirmed: {}",
            if session.ratings_confirmed() {
                "confirmed"
            } else if session.ratings_generated() {
                "generated"
            } else {
                "none"
            },
            if session.export_confirmed() { "yes" } else { "no" }
        )?;
        Ok(())
    }
}

fn describe_row(row: &Row) -> String {
    let state = if row.locked { "locked " } else { "editing" };
    let preview = one_line(&row.content, PREVIEW_BYTES);
    let mut line = format!("{:>3} [{state}] {preview}", row.index + 1);
    if let Some(assessment) = &row.assessment {
        let rating = assessment
            .rating
            .map(|rating| rating.to_string())
            .unwrap_or_else(|| "-".to_string());
        line.push_str(&format!(
            "  <{} | {} | rating {rating}>",
            assessment.category, assessment.question
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::gateway::{CompletionRequest, TextGenerator};

    struct Fixed(&'static str);

    impl TextGenerator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn complete(&self, _request: &CompletionRequest) -> crate::error::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn error_lines(transcript: &str) -> Vec<&str> {
        transcript
            .lines()
            .filter(|line| line.starts_with("error: "))
            .collect()
    }

    fn run_script(script: &str, out_dir: &Path) -> String {
        let controller = EditLockController::new(&default_config(), Box::new(Fixed("Drafted.")));
        let mut console = Console::new(controller, out_dir.to_path_buf());
        let mut output = Vec::new();
        console
            .run(script.as_bytes(), &mut output)
            .expect("run console");
        String::from_utf8(output).expect("utf8 transcript")
    }

    #[test]
    fn parses_actions_with_one_based_rows() {
        assert_eq!(
            parse_action("save 2 hello\\nworld").expect("parse"),
            Some(Action::Save {
                index: 1,
                text: "hello\nworld".to_string()
            })
        );
        assert_eq!(
            parse_action("load \"my file.xlsx\" Acme Corp").expect("parse"),
            Some(Action::Load {
                path: PathBuf::from("my file.xlsx"),
                company: Some("Acme Corp".to_string())
            })
        );
        assert_eq!(
            parse_action("rating 3 9").expect("parse"),
            Some(Action::Rating { index: 2, value: 9 })
        );
        assert_eq!(
            parse_action("summary save Final\\ttext").expect("parse"),
            Some(Action::SummarySave("Final\ttext".to_string()))
        );
        assert_eq!(parse_action("summary unlock").expect("parse"), Some(Action::SummaryUnlock));
        assert_eq!(parse_action("generate").expect("parse"), Some(Action::Generate(None)));
        assert_eq!(parse_action("  # note").expect("parse"), None);
    }

    #[test]
    fn rejects_malformed_actions() {
        for line in [
            "save 0 text",
            "save two text",
            "save 1",
            "unlock",
            "rating 1 high",
            "summary save",
            "summary later",
            "export a b",
            "frobnicate",
            "load",
        ] {
            assert!(parse_action(line).is_err(), "accepted {line:?}");
        }
    }

    #[test]
    fn unescape_handles_known_escapes_only() {
        assert_eq!(unescape(r"a\nb\tc\\d\qe\"), "a\nb\tc\\d\\qe\\");
    }

    #[test]
    fn scripted_session_exports_a_document() {
        let dir = tempfile::tempdir().expect("temp dir");
        let input = dir.path().join("rows.txt");
        std::fs::write(&input, "first\nsecond\n").expect("write input");
        let script = format!(
            "load {}\nsave 1 edited first\ngenerate\nsummary save Final summary\nconfirm\nexport\nquit\nshow\n",
            input.display()
        );
        let transcript = run_script(&script, dir.path());

        assert_eq!(error_lines(&transcript), Vec::<&str>::new());
        assert!(transcript.contains("loaded 2 rows"));
        assert!(transcript.contains("Drafted."));
        assert!(transcript.contains("session confirmed"));
        assert!(transcript.contains("generated_report.docx"));
        assert!(!transcript.contains("no rows loaded"));
        assert!(dir.path().join("generated_report.docx").is_file());
    }

    #[test]
    fn errors_are_reported_and_the_session_continues() {
        let dir = tempfile::tempdir().expect("temp dir");
        let transcript = run_script("export\nsave 1 x\nbogus\nshow\n", dir.path());
        assert!(transcript.contains("error: not permitted: confirm the session before exporting"));
        assert!(transcript.contains("error: row 1 does not exist"));
        assert!(transcript.contains("error: unknown action \"bogus\""));
        assert!(transcript.contains("no rows loaded"));
        assert_eq!(error_lines(&transcript).len(), 3);
    }

    #[test]
    fn show_reports_a_pending_login() {
        let mut config = default_config();
        config.password_required = true;
        let controller = EditLockController::new(&config, Box::new(Fixed("Drafted.")))
            .with_password(Some("s3cret".to_string()));
        let mut console = Console::new(controller, PathBuf::from("."));
        let mut output = Vec::new();
        console
            .run("show\nlogin s3cret\nshow\n".as_bytes(), &mut output)
            .expect("run console");
        let transcript = String::from_utf8(output).expect("utf8 transcript");

        assert_eq!(transcript.matches("login: required").count(), 1);
        assert!(transcript.contains("logged in"));
        assert!(error_lines(&transcript).is_empty());
    }
}
