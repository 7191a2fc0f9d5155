//! Document export: turns a confirmed snapshot into a `.docx` or `.pdf`.
//!
//! The exporter builds [`Bindings`] from the snapshot and hands them, with
//! the template bytes, to the renderer for the configured format.
pub mod chart;
mod docx;
mod font;
mod pdf;
pub mod placeholder;

pub use chart::{ChartRenderer, RadarChart};
pub use docx::{DocxRenderer, IMAGE_WIDTH_INCHES};
pub use pdf::PdfRenderer;
pub use placeholder::{Bindings, ImageBinding, TableBinding};

use crate::error::{FormError, Result};
use crate::session::{category_averages, Snapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const COMPANY_NAME: &str = "Company_Name";
pub const EXECUTIVE_SUMMARY: &str = "Executive_Summary";
pub const SPIDER_CHART: &str = "Spider_Chart";
pub const TABLE_COLUMNS: [&str; 4] = ["Category", "Question", "Answer", "Rating (1-5)"];

/// Scalar binding name for 1-based row `number`.
pub fn row_binding(number: usize) -> String {
    format!("row_{number}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Docx,
    Pdf,
}

impl ExportFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Docx => "generated_report.docx",
            ExportFormat::Pdf => "generated_report.pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ExportFormat::Pdf => "application/pdf",
        }
    }

    fn renderer(self) -> Box<dyn DocumentRenderer> {
        match self {
            ExportFormat::Docx => Box::new(DocxRenderer),
            ExportFormat::Pdf => Box::new(PdfRenderer),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
        })
    }
}

/// Template-to-document renderer for one output format.
pub trait DocumentRenderer {
    fn render(&self, template: &[u8], bindings: &Bindings) -> Result<Vec<u8>>;
}

/// Shape of the built-in template used when none is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateOutline {
    pub rows: usize,
    pub company: bool,
    pub chart: bool,
}

/// Built-in template bytes for `format`.
pub fn default_template(format: ExportFormat, outline: &TemplateOutline) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Docx => docx::default_template(outline),
        ExportFormat::Pdf => Ok(pdf::default_template(outline).into_bytes()),
    }
}

/// Fill `template` with `bindings` in one step, outside any session.
pub fn render_template(
    format: ExportFormat,
    template: &[u8],
    bindings: &Bindings,
) -> Result<Artifact> {
    let bytes = format.renderer().render(template, bindings)?;
    Ok(Artifact {
        file_name: format.file_name().to_string(),
        mime_type: format.mime_type().to_string(),
        bytes,
    })
}

/// A rendered document ready to be offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Write the document to `dest`, replacing any existing file only once
    /// the new content is complete.
    pub fn write_to(&self, dest: &Path) -> Result<()> {
        let parent = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .map_err(|err| FormError::Render(format!("create {}: {err}", parent.display())))?;
        let mut staged = tempfile::NamedTempFile::new_in(parent)
            .map_err(|err| FormError::Render(format!("stage {}: {err}", dest.display())))?;
        staged
            .write_all(&self.bytes)
            .map_err(|err| FormError::Render(format!("stage {}: {err}", dest.display())))?;
        staged.persist(dest).map_err(|err| {
            FormError::Render(format!("publish {}: {}", dest.display(), err.error))
        })?;
        Ok(())
    }
}

pub struct Exporter {
    format: ExportFormat,
    template: Option<PathBuf>,
    chart: Box<dyn ChartRenderer>,
}

impl Exporter {
    pub fn new(format: ExportFormat, template: Option<PathBuf>) -> Self {
        Self {
            format,
            template,
            chart: Box::new(RadarChart::default()),
        }
    }

    pub fn with_chart(mut self, chart: Box<dyn ChartRenderer>) -> Self {
        self.chart = chart;
        self
    }

    /// Everything the template can reference for this snapshot.
    pub fn bindings(&self, snapshot: &Snapshot) -> Result<Bindings> {
        let mut bindings = Bindings::default().with_scalar(EXECUTIVE_SUMMARY, &snapshot.summary);
        if let Some(company) = snapshot.company.as_deref() {
            bindings = bindings.with_scalar(COMPANY_NAME, company);
        }
        for (position, row) in snapshot.rows.iter().enumerate() {
            bindings = bindings.with_scalar(row_binding(position + 1), &row.content);
        }

        let assessed: Vec<_> = snapshot
            .rows
            .iter()
            .filter_map(|row| row.assessment.as_ref().map(|assessment| (row, assessment)))
            .collect();
        if !assessed.is_empty() {
            let table = TableBinding {
                columns: TABLE_COLUMNS.iter().map(|name| name.to_string()).collect(),
                rows: assessed
                    .iter()
                    .map(|(row, assessment)| {
                        vec![
                            assessment.category.clone(),
                            assessment.question.clone(),
                            row.content.clone(),
                            assessment.rating.unwrap_or(1).to_string(),
                        ]
                    })
                    .collect(),
            };
            bindings = bindings.with_table(table);
            let chart = self.chart.render(&category_averages(&snapshot.rows))?;
            bindings.images.insert(SPIDER_CHART.to_string(), chart);
        }
        Ok(bindings)
    }

    fn template_bytes(&self, snapshot: &Snapshot) -> Result<Vec<u8>> {
        match &self.template {
            Some(path) => fs::read(path).map_err(|err| {
                FormError::Render(format!("read template {}: {err}", path.display()))
            }),
            None => default_template(
                self.format,
                &TemplateOutline {
                    rows: snapshot.rows.len(),
                    company: snapshot.company.is_some(),
                    chart: snapshot.rows.iter().any(|row| row.assessment.is_some()),
                },
            ),
        }
    }

    /// Render the snapshot with the configured template.
    pub fn export(&self, snapshot: &Snapshot) -> Result<Artifact> {
        let template = self.template_bytes(snapshot)?;
        let bindings = self.bindings(snapshot)?;
        let artifact = render_template(self.format, &template, &bindings)?;
        tracing::info!(
            format = %self.format,
            rows = snapshot.rows.len(),
            bytes = artifact.bytes.len(),
            "exported document"
        );
        Ok(artifact)
    }
}
