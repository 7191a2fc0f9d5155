//! Pipeline configuration.
//!
//! One JSON object enumerates every option the workflow recognizes. Secrets
//! (the shared password and the API key) are read from the environment and
//! never stored here.
use crate::error::{FormError, Result};
use crate::export::ExportFormat;
use crate::session::DEFAULT_MAX_ROWS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const CONFIG_FILE_NAME: &str = "formdoc.json";

pub const PASSWORD_ENV: &str = "FORMDOC_PASSWORD";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const LM_COMMAND_ENV: &str = "FORMDOC_LM_COMMAND";

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SUMMARY_FALLBACK: &str = "The executive summary could not be generated.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub schema_version: u32,
    /// Rows and summary must be saved (locked) before `confirm`.
    pub locking_enabled: bool,
    /// Every action except `login` requires the shared password first.
    pub password_required: bool,
    pub export_format: ExportFormat,
    /// Load category/question/answer rows and generate per-row ratings.
    pub rating_mode: bool,
    pub max_rows: usize,
    pub model: String,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Local command used instead of the HTTP gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lm_command: Option<String>,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_instruction: Option<String>,
    pub summary_fallback: String,
    /// Append-only JSONL record of every generation call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lm_log: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        default_config()
    }
}

/// Build the default config written by `formdoc init`.
pub fn default_config() -> PipelineConfig {
    PipelineConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        locking_enabled: true,
        password_required: false,
        export_format: ExportFormat::Docx,
        rating_mode: false,
        max_rows: DEFAULT_MAX_ROWS,
        model: DEFAULT_MODEL.to_string(),
        temperature: DEFAULT_TEMPERATURE,
        api_base: None,
        lm_command: None,
        timeout_secs: DEFAULT_TIMEOUT_SECS,
        template: None,
        summary_instruction: None,
        summary_fallback: DEFAULT_SUMMARY_FALLBACK.to_string(),
        lm_log: None,
    }
}

pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let bytes = fs::read(path)
        .map_err(|err| FormError::Config(format!("read config {}: {err}", path.display())))?;
    let config: PipelineConfig = serde_json::from_slice(&bytes)
        .map_err(|err| FormError::Config(format!("parse config {}: {err}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

/// Persist a config in a stable JSON format.
pub fn write_config(path: &Path, config: &PipelineConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| FormError::Config(format!("create {}: {err}", parent.display())))?;
    }
    let text = serde_json::to_string_pretty(config)
        .map_err(|err| FormError::Config(format!("serialize config: {err}")))?;
    fs::write(path, format!("{text}\n"))
        .map_err(|err| FormError::Config(format!("write {}: {err}", path.display())))?;
    Ok(())
}

pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(FormError::Config(format!(
            "unsupported config schema_version {}",
            config.schema_version
        )));
    }
    if config.max_rows == 0 {
        return Err(FormError::Config("max_rows must be at least 1".to_string()));
    }
    if !(0.0..=1.0).contains(&config.temperature) {
        return Err(FormError::Config(format!(
            "temperature must be within [0, 1] (got {})",
            config.temperature
        )));
    }
    if config.model.trim().is_empty() {
        return Err(FormError::Config("model must be non-empty".to_string()));
    }
    if config.timeout_secs == 0 {
        return Err(FormError::Config("timeout_secs must be at least 1".to_string()));
    }
    if let Some(command) = config.lm_command.as_deref() {
        if command.trim().is_empty() {
            return Err(FormError::Config("lm_command must be non-empty when set".to_string()));
        }
    }
    Ok(())
}

/// Per-user config location, `<config_dir>/formdoc/config.json`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("formdoc").join("config.json"))
}

/// Pick the config file to read: the explicit flag, then `./formdoc.json`,
/// then the per-user file. `None` means built-in defaults.
pub fn resolve_config_path(explicit: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = cwd.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    user_config_path().filter(|path| path.is_file())
}

/// Load the resolved config, or defaults when no file exists.
pub fn load_resolved(
    explicit: Option<&Path>,
    cwd: &Path,
) -> Result<(PipelineConfig, Option<PathBuf>)> {
    match resolve_config_path(explicit, cwd) {
        Some(path) => {
            let config = load_config(&path)?;
            tracing::info!(path = %path.display(), "loaded config");
            Ok((config, Some(path)))
        }
        None => {
            tracing::info!("no config file found; using defaults");
            Ok((default_config(), None))
        }
    }
}

/// Resolve the local gateway command: `--lm`, then config, then environment.
pub fn resolve_lm_command(
    cli_command: Option<&str>,
    config: &PipelineConfig,
    env_command: Option<String>,
) -> Option<String> {
    cli_command
        .map(str::to_string)
        .or_else(|| config.lm_command.clone())
        .or(env_command)
        .map(|command| command.trim().to_string())
        .filter(|command| !command.is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
