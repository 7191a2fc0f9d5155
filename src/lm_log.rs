//! Generation call logging.
//!
//! When a log path is configured, every gateway call made by a session is
//! appended to it as one JSON line:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"kind":"summary","duration_ms":4200,"items_count":3,"outcome":"success",...}
//! {"schema_version":1,"ts":1707900060000,"kind":"rating","duration_ms":900,"items_count":1,"outcome":"failed","error":"...",...}
//! ```
use crate::error::{FormError, Result};
use crate::util::truncate_string;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Current schema version for log entries.
pub const LM_LOG_SCHEMA_VERSION: u32 = 1;

const PROMPT_PREVIEW_BYTES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    /// Executive summary over all rows.
    Summary,
    /// Rating for a single assessed row.
    Rating,
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Summary => write!(f, "summary"),
            Self::Rating => write!(f, "rating"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationLogEntry {
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the call finished.
    pub ts: u64,

    pub kind: GenerationKind,

    pub duration_ms: u64,

    /// Number of rows that went into the prompt.
    pub items_count: usize,

    pub outcome: GenerationOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// First few hundred bytes of the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,
}

/// Times one gateway call and turns it into a log entry.
pub struct GenerationLogBuilder {
    start: Instant,
    kind: GenerationKind,
    items_count: usize,
    prompt_preview: Option<String>,
}

impl GenerationLogBuilder {
    pub fn new(kind: GenerationKind, items_count: usize) -> Self {
        Self {
            start: Instant::now(),
            kind,
            items_count,
            prompt_preview: None,
        }
    }

    pub fn with_prompt_preview(mut self, prompt: &str) -> Self {
        let mut preview = truncate_string(prompt, PROMPT_PREVIEW_BYTES);
        if preview.len() < prompt.len() {
            preview.push_str("...");
        }
        self.prompt_preview = Some(preview);
        self
    }

    pub fn success(self) -> GenerationLogEntry {
        self.build(GenerationOutcome::Success, None)
    }

    pub fn failed(self, error: impl Into<String>) -> GenerationLogEntry {
        self.build(GenerationOutcome::Failed, Some(error.into()))
    }

    fn build(self, outcome: GenerationOutcome, error: Option<String>) -> GenerationLogEntry {
        GenerationLogEntry {
            schema_version: LM_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            kind: self.kind,
            duration_ms: self.start.elapsed().as_millis() as u64,
            items_count: self.items_count,
            outcome,
            error,
            prompt_preview: self.prompt_preview,
        }
    }
}

/// Append-only JSONL file of generation calls.
#[derive(Debug, Clone)]
pub struct GenerationLog {
    path: PathBuf,
}

impl GenerationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &GenerationLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                FormError::Config(format!("create lm_log directory {}: {err}", parent.display()))
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| {
                FormError::Config(format!("open lm_log {}: {err}", self.path.display()))
            })?;
        let line = serde_json::to_string(entry)
            .map_err(|err| FormError::Config(format!("serialize lm_log entry: {err}")))?;
        writeln!(file, "{line}")
            .map_err(|err| FormError::Config(format!("write lm_log entry: {err}")))?;
        Ok(())
    }

    /// Read all entries; corrupt lines are skipped with a warning.
    #[cfg(test)]
    pub(crate) fn load(&self) -> Result<Vec<GenerationLogEntry>> {
        use std::io::{BufRead, BufReader};

        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path).map_err(|err| {
            FormError::Config(format!("open lm_log {}: {err}", self.path.display()))
        })?;
        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| {
                FormError::Config(format!("read line {} of lm_log: {err}", line_num + 1))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<GenerationLogEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(line = line_num + 1, %err, "skip corrupt lm_log entry");
                }
            }
        }
        Ok(entries)
    }
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
