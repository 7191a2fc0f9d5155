//! PDF rendering from a plain-text template.
//!
//! The template is UTF-8 text. After substitution each line is laid out on
//! A4 pages in the bundled DejaVu Sans, embedded so accented and symbol
//! characters survive; lines starting with `# ` are set as headings and
//! long lines wrap at word boundaries. PDF output cannot carry image
//! placeholders, so those tokens are dropped with a warning.
use super::font;
use super::placeholder::{fill, token, Bindings};
use super::{DocumentRenderer, TemplateOutline};
use crate::error::{FormError, Result};
use printpdf::{IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use std::io::Cursor;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const BODY_SIZE: f32 = 11.0;
const HEADING_SIZE: f32 = 16.0;
const BODY_LEADING_MM: f32 = 5.5;
const HEADING_LEADING_MM: f32 = 9.0;
const WRAP_COLUMNS: usize = 90;

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn render(&self, template: &[u8], bindings: &Bindings) -> Result<Vec<u8>> {
        let mut text = std::str::from_utf8(template)
            .map_err(|err| FormError::Render(format!("PDF template is not UTF-8 text: {err}")))?
            .to_string();
        for name in bindings.images.keys() {
            let marker = token(name);
            if text.contains(&marker) {
                tracing::warn!(
                    placeholder = %marker,
                    "images are not supported in PDF output; placeholder removed"
                );
                text = text.replace(&marker, "");
            }
        }
        let filled = fill(&text, bindings, str::to_string);
        tracing::debug!(
            replaced = filled.replaced,
            unmatched = filled.unmatched.len(),
            "filled PDF template"
        );
        let missing = font::missing_glyphs(&filled.text)?;
        if !missing.is_empty() {
            tracing::warn!(
                characters = %missing.iter().collect::<String>(),
                "the PDF font has no glyphs for these characters; they will not display"
            );
        }
        layout(&filled.text)
    }
}

/// Text template mirroring the default Word layout.
pub fn default_template(outline: &TemplateOutline) -> String {
    let mut lines = vec!["# Generated Content".to_string()];
    if outline.company {
        lines.push("{{Company_Name}}".to_string());
    }
    lines.push(String::new());
    for row in 1..=outline.rows {
        lines.push(format!("Row {row}: {{{{row_{row}}}}}"));
    }
    lines.push(String::new());
    lines.push("{{Executive_Summary}}".to_string());
    lines.join("\n") + "\n"
}

enum Line {
    Heading(String),
    Body(String),
    Blank,
}

fn classify(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    for raw in text.replace("\r\n", "\n").lines() {
        let raw = raw.trim_end();
        if let Some(heading) = raw.strip_prefix("# ") {
            lines.push(Line::Heading(heading.trim().to_string()));
        } else if raw.trim().is_empty() {
            lines.push(Line::Blank);
        } else {
            lines.extend(wrap(raw, WRAP_COLUMNS).into_iter().map(Line::Body));
        }
    }
    lines
}

/// Greedy word wrap; words longer than `columns` are split.
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > columns {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(columns).collect();
            word = word.chars().skip(columns).collect();
            lines.push(head);
        }
        let separator = usize::from(!current.is_empty());
        let needed = current.chars().count() + separator + word.chars().count();
        if needed > columns && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

struct PageCursor {
    layer: PdfLayerReference,
    y: f32,
}

fn layout(text: &str) -> Result<Vec<u8>> {
    let (document, page, layer) = PdfDocument::new(
        "Generated Report",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let body: IndirectFontRef = document
        .add_external_font(Cursor::new(font::SANS))
        .map_err(FormError::render)?;
    let bold: IndirectFontRef = document
        .add_external_font(Cursor::new(font::SANS_BOLD))
        .map_err(FormError::render)?;

    let mut cursor = PageCursor {
        layer: document.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT_MM - MARGIN_MM,
    };
    for line in classify(text) {
        let leading = match line {
            Line::Heading(_) => HEADING_LEADING_MM,
            Line::Body(_) | Line::Blank => BODY_LEADING_MM,
        };
        if cursor.y - leading < MARGIN_MM {
            let (page, layer) =
                document.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            cursor = PageCursor {
                layer: document.get_page(page).get_layer(layer),
                y: PAGE_HEIGHT_MM - MARGIN_MM,
            };
        }
        cursor.y -= leading;
        match line {
            Line::Heading(text) => {
                cursor
                    .layer
                    .use_text(text, HEADING_SIZE, Mm(MARGIN_MM), Mm(cursor.y), &bold)
            }
            Line::Body(text) => {
                cursor
                    .layer
                    .use_text(text, BODY_SIZE, Mm(MARGIN_MM), Mm(cursor.y), &body)
            }
            Line::Blank => {}
        }
    }
    document.save_to_bytes().map_err(FormError::render)
}
