//! CLI argument parsing for the form workflow.
//!
//! The CLI only wires inputs into a session or a one-off render; every rule
//! about locking and confirmation lives in the controller.
use clap::{Parser, Subcommand};
use formdoc::export::ExportFormat;
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "formdoc",
    version,
    about = "Spreadsheet-driven report forms with LM drafting and template export",
    after_help = "Commands:\n  session [--input <file>]                 Edit rows, draft a summary, confirm and export\n  render --template <file> --out <file>    Fill a template once without a session\n  init                                     Write a default formdoc.json\n\nExamples:\n  formdoc init\n  formdoc session --input answers.xlsx --out-dir out\n  formdoc session --lm 'ollama run llama3' < script.txt\n  formdoc render --template report.docx --bind Company_Name=Acme --out report-acme.docx",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Session(SessionArgs),
    Render(RenderArgs),
    Init(InitArgs),
}

/// Session inputs. Actions are read from stdin one per line.
#[derive(Parser, Debug)]
#[command(about = "Run an interactive edit/generate/export session")]
pub struct SessionArgs {
    /// Spreadsheet or .txt file to load before the first action
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Company to load from an assessment workbook (rating mode)
    #[arg(long, value_name = "NAME", requires = "input")]
    pub company: Option<String>,

    /// Config file (defaults to ./formdoc.json, then the user config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Local command used as the generation service (prompt on stdin)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Directory receiving exported documents
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Log workflow events to stderr
    #[arg(long)]
    pub verbose: bool,
}

/// Render inputs for a single template fill.
#[derive(Parser, Debug)]
#[command(about = "Fill a template with bindings and write the document")]
pub struct RenderArgs {
    /// Template (.docx, or UTF-8 text for pdf); built-in when omitted
    #[arg(long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Placeholder binding; `\n` in the value becomes a line break
    #[arg(long = "bind", value_name = "NAME=VALUE")]
    pub bindings: Vec<String>,

    /// Grid dataset (spreadsheet or tab-separated text, header row first)
    #[arg(long, value_name = "FILE")]
    pub table: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = ExportFormat::Docx)]
    pub format: ExportFormat,

    /// Output document path
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Log workflow events to stderr
    #[arg(long)]
    pub verbose: bool,
}

/// Init inputs for writing a config stub.
#[derive(Parser, Debug)]
#[command(about = "Write a default formdoc.json")]
pub struct InitArgs {
    /// Destination (defaults to ./formdoc.json)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}
