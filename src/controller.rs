//! Edit-lock controller: every user action is one explicit transition on the
//! owned [`Session`].
//!
//! Rows and the summary each move between an editing and a locked state.
//! `confirm` freezes a snapshot of the session and is the only way to reach
//! `export`. A failed action leaves the session exactly as it was, with one
//! exception: a failed summary generation stores the configured fallback
//! text when the summary is not locked, and still reports the failure.
use crate::config::PipelineConfig;
use crate::error::{FormError, Result};
use crate::export::{Artifact, Exporter};
use crate::gateway::{
    prompt, request_completion, request_rating, TextGenerator, MAX_RATING, MIN_RATING,
};
use crate::lm_log::{GenerationKind, GenerationLog, GenerationLogBuilder, GenerationLogEntry};
use crate::session::{Row, Session, SheetEntry, Summary};
use crate::sheet;
use std::path::Path;

/// Which transitions are gated, derived from the pipeline config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub locking_enabled: bool,
    pub password_required: bool,
    pub rating_mode: bool,
}

impl From<&PipelineConfig> for Policy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            locking_enabled: config.locking_enabled,
            password_required: config.password_required,
            rating_mode: config.rating_mode,
        }
    }
}

#[derive(Debug, Clone)]
struct GenerationSettings {
    model: String,
    temperature: f32,
    summary_instruction: Option<String>,
    summary_fallback: String,
}

/// Outcome of a bulk rating run. Rows whose gateway call failed hold the
/// lowest rating and are listed in `failures`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingReport {
    pub ratings: Vec<(usize, u8)>,
    pub failures: Vec<(usize, String)>,
}

pub struct EditLockController {
    policy: Policy,
    settings: GenerationSettings,
    gateway: Box<dyn TextGenerator>,
    exporter: Exporter,
    log: Option<GenerationLog>,
    password: Option<String>,
    session: Session,
}

impl EditLockController {
    pub fn new(config: &PipelineConfig, gateway: Box<dyn TextGenerator>) -> Self {
        Self {
            policy: Policy::from(config),
            settings: GenerationSettings {
                model: config.model.clone(),
                temperature: config.temperature,
                summary_instruction: config.summary_instruction.clone(),
                summary_fallback: config.summary_fallback.clone(),
            },
            gateway,
            exporter: Exporter::new(config.export_format, config.template.clone()),
            log: config.lm_log.clone().map(GenerationLog::new),
            password: None,
            session: Session::new(config.max_rows),
        }
    }

    /// Shared secret compared by `login`.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    pub fn login(&mut self, secret: &str) -> Result<()> {
        if !self.policy.password_required {
            self.session.authenticated = true;
            return Ok(());
        }
        let Some(expected) = self.password.as_deref() else {
            return Err(FormError::Config(
                "a password is required but none is configured".to_string(),
            ));
        };
        if secret != expected {
            tracing::warn!("login rejected");
            return Err(FormError::NotPermitted("incorrect password".to_string()));
        }
        self.session.authenticated = true;
        tracing::info!("login accepted");
        Ok(())
    }

    fn ensure_access(&self) -> Result<()> {
        if self.policy.password_required && !self.session.is_authenticated() {
            return Err(FormError::NotPermitted("log in first".to_string()));
        }
        Ok(())
    }

    fn ensure_rows(&self) -> Result<()> {
        if self.session.rows.is_empty() {
            return Err(FormError::NotPermitted("load a file first".to_string()));
        }
        Ok(())
    }

    /// Start a fresh session from `entries`. On failure the previous session
    /// is kept as is.
    pub fn load<I, E>(&mut self, entries: I, company: Option<String>) -> Result<&[Row]>
    where
        I: IntoIterator<Item = E>,
        E: Into<SheetEntry>,
    {
        self.ensure_access()?;
        let count = self.session.rows.load(entries)?.len();
        self.session.reset_content();
        self.session.company = company;
        tracing::info!(
            rows = count,
            company = self.session.company.as_deref().unwrap_or(""),
            "session loaded"
        );
        Ok(self.session.rows.rows())
    }

    /// Read `path` with the layout the policy calls for, then [`Self::load`].
    pub fn load_file(&mut self, path: &Path, company: Option<&str>) -> Result<&[Row]> {
        self.ensure_access()?;
        if self.policy.rating_mode {
            let Some(company) = company else {
                return Err(FormError::NotPermitted(
                    "rating mode needs a company; list them with `companies`".to_string(),
                ));
            };
            let entries = sheet::read_assessment(path, company)?;
            self.load(entries, Some(company.to_string()))
        } else {
            let entries = sheet::read_column(path)?;
            self.load(entries, company.map(str::to_string))
        }
    }

    /// Company names offered by an assessment workbook.
    pub fn list_companies(&self, path: &Path) -> Result<Vec<String>> {
        self.ensure_access()?;
        sheet::list_companies(path)
    }

    /// Store `text` in row `index` and lock it.
    pub fn save_row(&mut self, index: usize, text: impl Into<String>) -> Result<&Row> {
        self.ensure_access()?;
        let row = self.session.rows.get(index)?;
        if self.policy.locking_enabled && row.locked {
            return Err(FormError::Locked(format!("row {}", index + 1)));
        }
        self.session.rows.save(index, text)
    }

    /// Make row `index` editable again. Unlocking a row after the bulk
    /// confirmation withdraws that confirmation.
    pub fn unlock_row(&mut self, index: usize) -> Result<&Row> {
        self.ensure_access()?;
        self.session.rows.get(index)?;
        if self.session.ratings_confirmed {
            tracing::info!(row = index + 1, "ratings confirmation withdrawn");
            self.session.ratings_confirmed = false;
        }
        self.session.rows.unlock(index)
    }

    /// One gateway call per assessed row. Failed calls rate the row at the
    /// minimum and are reported instead of aborting the run.
    pub fn generate_ratings(&mut self) -> Result<RatingReport> {
        self.ensure_access()?;
        self.ensure_rows()?;
        if !self.session.rows.has_assessments() {
            return Err(FormError::NotPermitted(
                "the loaded rows carry no questions to rate".to_string(),
            ));
        }
        if self.session.ratings_confirmed {
            return Err(FormError::Locked("ratings".to_string()));
        }

        let mut report = RatingReport::default();
        for row in self.session.rows.rows() {
            let Some(assessment) = row.assessment.as_ref() else {
                continue;
            };
            let text = prompt::rating_prompt(assessment, &row.content);
            let entry =
                GenerationLogBuilder::new(GenerationKind::Rating, 1).with_prompt_preview(&text);
            let rating = match request_rating(
                self.gateway.as_ref(),
                &text,
                &self.settings.model,
                self.settings.temperature,
            ) {
                Ok(rating) => {
                    self.record(entry.success());
                    rating
                }
                Err(err) => {
                    tracing::warn!(row = row.index + 1, %err, "rating failed; using minimum");
                    self.record(entry.failed(err.to_string()));
                    report.failures.push((row.index, err.to_string()));
                    MIN_RATING
                }
            };
            report.ratings.push((row.index, rating));
        }

        for (index, rating) in &report.ratings {
            self.session.rows.set_rating(*index, *rating)?;
        }
        self.session.ratings_generated = true;
        tracing::info!(
            rated = report.ratings.len(),
            failed = report.failures.len(),
            "ratings generated"
        );
        Ok(report)
    }

    /// Manually override a rating; the value is clamped into the rating range.
    pub fn set_rating(&mut self, index: usize, value: i64) -> Result<&Row> {
        self.ensure_access()?;
        if self.session.ratings_confirmed {
            return Err(FormError::Locked("ratings".to_string()));
        }
        let rating = value.clamp(i64::from(MIN_RATING), i64::from(MAX_RATING)) as u8;
        self.session.rows.set_rating(index, rating)
    }

    /// Bulk transition: lock every row and accept the current ratings.
    pub fn confirm_edits(&mut self) -> Result<()> {
        self.ensure_access()?;
        self.ensure_rows()?;
        if self.session.rows.has_assessments() && !self.session.ratings_generated {
            return Err(FormError::NotPermitted("generate ratings first".to_string()));
        }
        self.session.rows.lock_all();
        self.session.ratings_confirmed = true;
        tracing::info!(rows = self.session.rows.len(), "edits confirmed");
        Ok(())
    }

    /// Draft the summary from the current rows.
    ///
    /// On success the text is stored unlocked for review. On failure a locked
    /// summary is kept; an unlocked one receives the fallback text. Either way
    /// the failure is returned as [`FormError::GenerationFailed`].
    pub fn generate_summary(&mut self, instruction: Option<&str>) -> Result<&Summary> {
        self.ensure_access()?;
        self.ensure_rows()?;
        let assessed = self.session.rows.has_assessments();
        if assessed && self.policy.locking_enabled && !self.session.ratings_confirmed {
            return Err(FormError::NotPermitted(
                "confirm the edits before drafting the summary".to_string(),
            ));
        }

        let instruction = instruction.or(self.settings.summary_instruction.as_deref());
        let rows = self.session.rows.rows();
        let text = if assessed {
            prompt::assessment_summary_prompt(instruction, rows)
        } else {
            prompt::summary_prompt(instruction, rows)
        };
        let entry = GenerationLogBuilder::new(GenerationKind::Summary, rows.len())
            .with_prompt_preview(&text);

        match request_completion(
            self.gateway.as_ref(),
            &text,
            &self.settings.model,
            self.settings.temperature,
        ) {
            Ok(summary) => {
                self.record(entry.success());
                self.session.summary.store_generated(summary);
                Ok(&self.session.summary)
            }
            Err(err) => {
                self.record(entry.failed(err.to_string()));
                let fallback_applied = !self.session.summary.locked;
                if fallback_applied {
                    self.session
                        .summary
                        .store_generated(self.settings.summary_fallback.clone());
                }
                tracing::warn!(%err, fallback_applied, "summary generation failed");
                Err(FormError::GenerationFailed {
                    reason: err.to_string(),
                    fallback_applied,
                })
            }
        }
    }

    /// Store `text` as the summary and lock it.
    pub fn save_summary(&mut self, text: impl Into<String>) -> Result<&Summary> {
        self.ensure_access()?;
        if self.policy.locking_enabled && self.session.summary.locked {
            return Err(FormError::Locked("the summary".to_string()));
        }
        Ok(self.session.summary.save(text))
    }

    pub fn unlock_summary(&mut self) -> Result<&Summary> {
        self.ensure_access()?;
        Ok(self.session.summary.unlock())
    }

    /// Freeze the session for export. With locking enabled the summary must
    /// be saved, and assessed rows must have their edits confirmed.
    pub fn confirm(&mut self) -> Result<()> {
        self.ensure_access()?;
        self.ensure_rows()?;
        if self.session.export_confirmed() {
            return Err(FormError::NotPermitted(
                "the session is already confirmed; load the file again to start over".to_string(),
            ));
        }
        if self.policy.locking_enabled {
            if !self.session.summary.locked {
                return Err(FormError::NotPermitted(
                    "save the summary before confirming".to_string(),
                ));
            }
            if self.session.rows.has_assessments() && !self.session.ratings_confirmed {
                return Err(FormError::NotPermitted(
                    "confirm the edits before confirming the session".to_string(),
                ));
            }
        }
        let snapshot = self.session.take_snapshot();
        tracing::info!(rows = snapshot.rows.len(), "session confirmed");
        Ok(())
    }

    /// Render the confirmed snapshot.
    pub fn export(&self) -> Result<Artifact> {
        self.ensure_access()?;
        let snapshot = self.session.snapshot().ok_or_else(|| {
            FormError::NotPermitted("confirm the session before exporting".to_string())
        })?;
        self.exporter.export(snapshot)
    }

    fn record(&self, entry: GenerationLogEntry) {
        if let Some(log) = &self.log {
            if let Err(err) = log.append(&entry) {
                tracing::warn!(%err, path = %log.path().display(), "failed to append lm_log entry");
            }
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
