use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Command, InitArgs, RenderArgs, RootArgs, SessionArgs};
use formdoc::config::{
    default_config, load_resolved, resolve_lm_command, write_config, PipelineConfig, API_KEY_ENV,
    CONFIG_FILE_NAME, LM_COMMAND_ENV, PASSWORD_ENV,
};
use formdoc::console::{unescape, Console};
use formdoc::controller::EditLockController;
use formdoc::export::{
    default_template, render_template, row_binding, Bindings, TemplateOutline, COMPANY_NAME,
};
use formdoc::gateway::{
    CommandGateway, OpenAiGateway, TextGenerator, UnconfiguredGateway, DEFAULT_API_BASE,
};
use formdoc::sheet::read_table;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    match args.command {
        Command::Session(args) => cmd_session(args),
        Command::Render(args) => cmd_render(args),
        Command::Init(args) => cmd_init(args),
    }
}

/// Events go to stderr so stdout stays the session transcript.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn cmd_session(args: SessionArgs) -> Result<()> {
    init_tracing(args.verbose);
    let cwd = env::current_dir().context("resolve current directory")?;
    let (config, config_path) = load_resolved(args.config.as_deref(), &cwd)?;
    if let Some(path) = &config_path {
        tracing::info!(path = %path.display(), "using config");
    }

    let gateway = build_gateway(args.lm.as_deref(), &config)?;
    let password = env::var(PASSWORD_ENV).ok().filter(|value| !value.is_empty());
    let mut controller = EditLockController::new(&config, gateway).with_password(password);

    if let Some(input) = &args.input {
        if config.password_required {
            bail!("--input cannot be used when a password is required; use `login` then `load`");
        }
        controller
            .load_file(input, args.company.as_deref())
            .with_context(|| format!("load {}", input.display()))?;
    }

    let mut console = Console::new(controller, args.out_dir);
    let stdin = io::stdin();
    let stdout = io::stdout();
    console.run(stdin.lock(), &mut stdout.lock())
}

/// Local command first, then the hosted API when a key is present.
fn build_gateway(lm: Option<&str>, config: &PipelineConfig) -> Result<Box<dyn TextGenerator>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    if let Some(command) = resolve_lm_command(lm, config, env::var(LM_COMMAND_ENV).ok()) {
        let gateway = CommandGateway::new(command, timeout)?;
        tracing::info!(command = gateway.command(), "using command gateway");
        return Ok(Box::new(gateway));
    }
    match env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => {
            let api_base = config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
            tracing::info!(%api_base, model = %config.model, "using hosted gateway");
            Ok(Box::new(OpenAiGateway::new(api_base, key, timeout)))
        }
        _ => {
            tracing::warn!(
                "no generation service configured (set {API_KEY_ENV} or {LM_COMMAND_ENV}, or pass --lm)"
            );
            Ok(Box::new(UnconfiguredGateway))
        }
    }
}

fn cmd_render(args: RenderArgs) -> Result<()> {
    init_tracing(args.verbose);
    let mut bindings = Bindings::default();
    for binding in &args.bindings {
        let (name, value) = parse_binding(binding)?;
        bindings = bindings.with_scalar(name, unescape(value));
    }
    if let Some(path) = &args.table {
        let table = read_table(path).with_context(|| format!("read table {}", path.display()))?;
        bindings = bindings.with_table(table);
    }

    let template = match &args.template {
        Some(path) => {
            fs::read(path).with_context(|| format!("read template {}", path.display()))?
        }
        None => {
            let rows = (1..)
                .take_while(|number| bindings.scalars.contains_key(&row_binding(*number)))
                .count();
            default_template(
                args.format,
                &TemplateOutline {
                    rows,
                    company: bindings.scalars.contains_key(COMPANY_NAME),
                    chart: false,
                },
            )?
        }
    };

    let artifact = render_template(args.format, &template, &bindings)?;
    artifact.write_to(&args.out)?;
    println!(
        "wrote {} ({}, {} bytes)",
        args.out.display(),
        artifact.mime_type,
        artifact.bytes.len()
    );
    Ok(())
}

/// Split `NAME=VALUE`; names use the placeholder alphabet.
fn parse_binding(raw: &str) -> Result<(&str, &str)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("binding {raw:?} must look like NAME=VALUE"))?;
    if name.is_empty() || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        bail!("binding name {name:?} may only contain letters, digits or underscores");
    }
    Ok((name, value))
}

fn cmd_init(args: InitArgs) -> Result<()> {
    let path = args
        .config
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    if path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(&path, &default_config())?;
    println!("wrote {}", path.display());
    Ok(())
}
