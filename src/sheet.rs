//! Spreadsheet collaborator: turns an uploaded workbook into session entries.
//!
//! Two layouts are understood. The simple layout is one column of short
//! texts (column A of the first sheet, first row is a header); a `.txt` file
//! with one entry per line is accepted in its place. The assessment layout
//! has one row per company, the company name in column F and one
//! `Category - Question` header per column from H onward.
use crate::error::{FormError, Result};
use crate::export::TableBinding;
use crate::session::{Assessment, SheetEntry};
use calamine::{open_workbook_auto, Data, Range, Reader};
use std::fs;
use std::path::Path;

/// Column holding the company name in the assessment layout.
pub const COMPANY_COLUMN: u32 = 5;
/// First question column in the assessment layout.
pub const FIRST_QUESTION_COLUMN: u32 = 7;
/// Preferred sheet for the assessment layout.
pub const ASSESSMENT_SHEET: &str = "Sheet1";

/// Split a question header on its first hyphen into `(category, question)`.
/// Headers without a hyphen have an empty category.
pub fn split_header(header: &str) -> (String, String) {
    match header.split_once('-') {
        Some((category, question)) => (
            category.trim_end().to_string(),
            question.trim_start().to_string(),
        ),
        None => (String::new(), header.to_string()),
    }
}

/// Entries of the simple layout, in source order. Blank cells are kept so
/// the row store decides what is usable.
pub fn read_column(path: &Path) -> Result<Vec<String>> {
    if is_text_file(path) {
        let text = fs::read_to_string(path)
            .map_err(|err| FormError::Sheet(format!("read {}: {err}", path.display())))?;
        return Ok(text.lines().map(|line| line.trim_end().to_string()).collect());
    }
    let range = open_range(path, None)?;
    let Some((top, _)) = range.start() else {
        return Ok(Vec::new());
    };
    let Some((bottom, _)) = range.end() else {
        return Ok(Vec::new());
    };
    let entries: Vec<String> = (top + 1..=bottom)
        .map(|row| cell_text(&range, row, 0))
        .collect();
    tracing::debug!(path = %path.display(), entries = entries.len(), "read column");
    Ok(entries)
}

/// Distinct non-empty company names of the assessment layout, in sheet order.
pub fn list_companies(path: &Path) -> Result<Vec<String>> {
    let range = open_range(path, Some(ASSESSMENT_SHEET))?;
    let mut companies: Vec<String> = Vec::new();
    for row in data_rows(&range) {
        let name = cell_text(&range, row, COMPANY_COLUMN);
        if !name.trim().is_empty() && !companies.contains(&name) {
            companies.push(name);
        }
    }
    Ok(companies)
}

/// Grid dataset for template tables: the first row names the columns and
/// every following row is one record. Tab-separated `.txt`/`.tsv` files are
/// read the same way.
pub fn read_table(path: &Path) -> Result<TableBinding> {
    let mut grid: Vec<Vec<String>> = if is_text_file(path) || has_extension(path, "tsv") {
        fs::read_to_string(path)
            .map_err(|err| FormError::Sheet(format!("read {}: {err}", path.display())))?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split('\t').map(|cell| cell.trim().to_string()).collect())
            .collect()
    } else {
        let range = open_range(path, None)?;
        match (range.start(), range.end()) {
            (Some((top, left)), Some((bottom, right))) => (top..=bottom)
                .map(|row| (left..=right).map(|column| cell_text(&range, row, column)).collect())
                .collect(),
            _ => Vec::new(),
        }
    };
    if grid.is_empty() {
        return Err(FormError::Sheet(format!("{} has no header row", path.display())));
    }
    let columns = grid.remove(0);
    Ok(TableBinding {
        columns,
        rows: grid,
    })
}

/// One entry per question column for the first row naming `company`.
pub fn read_assessment(path: &Path, company: &str) -> Result<Vec<SheetEntry>> {
    let range = open_range(path, Some(ASSESSMENT_SHEET))?;
    let (Some((top, _)), Some((_, right))) = (range.start(), range.end()) else {
        return Err(FormError::Sheet(format!("{} is empty", path.display())));
    };
    let row = data_rows(&range)
        .find(|row| cell_text(&range, *row, COMPANY_COLUMN) == company)
        .ok_or_else(|| {
            FormError::Sheet(format!(
                "company {company:?} not found in {}",
                path.display()
            ))
        })?;

    let mut entries = Vec::new();
    for column in FIRST_QUESTION_COLUMN..=right {
        let header = cell_text(&range, top, column);
        if header.trim().is_empty() {
            continue;
        }
        let (category, question) = split_header(&header);
        entries.push(SheetEntry {
            content: cell_text(&range, row, column),
            assessment: Some(Assessment {
                category,
                question,
                rating: None,
            }),
        });
    }
    tracing::debug!(company, questions = entries.len(), "read assessment");
    Ok(entries)
}

fn is_text_file(path: &Path) -> bool {
    has_extension(path, "txt")
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

/// Open `preferred` when present, otherwise the first sheet.
fn open_range(path: &Path, preferred: Option<&str>) -> Result<Range<Data>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|err| FormError::Sheet(format!("open {}: {err}", path.display())))?;
    let names = workbook.sheet_names();
    let name = preferred
        .and_then(|wanted| names.iter().find(|name| name.as_str() == wanted))
        .or_else(|| names.first())
        .cloned()
        .ok_or_else(|| FormError::Sheet(format!("{} has no sheets", path.display())))?;
    workbook
        .worksheet_range(&name)
        .map_err(|err| FormError::Sheet(format!("read sheet {name:?}: {err}")))
}

/// Absolute row numbers below the header row.
fn data_rows(range: &Range<Data>) -> impl Iterator<Item = u32> {
    match (range.start(), range.end()) {
        (Some((top, _)), Some((bottom, _))) => top + 1..bottom + 1,
        _ => 0..0,
    }
}

fn cell_text(range: &Range<Data>, row: u32, column: u32) -> String {
    match range.get_value((row, column)) {
        None | Some(Data::Empty) => String::new(),
        Some(value) => value.to_string().trim().to_string(),
    }
}
