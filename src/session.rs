//! In-memory session state: the row store, the summary slot, and the
//! snapshot taken when the user confirms the session for export.
//!
//! Nothing here performs I/O. All state is rebuilt from the uploaded file
//! when the session is reloaded.
use crate::error::{FormError, Result};
use serde::Serialize;

/// Default bound on the number of rows kept from a source.
pub const DEFAULT_MAX_ROWS: usize = 10;

/// Rating-variant metadata carried by a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub category: String,
    pub question: String,
    pub rating: Option<u8>,
}

/// One entry produced by the spreadsheet collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub content: String,
    pub assessment: Option<Assessment>,
}

impl SheetEntry {
    fn is_usable(&self) -> bool {
        self.assessment.is_some() || !self.content.trim().is_empty()
    }
}

impl From<String> for SheetEntry {
    fn from(content: String) -> Self {
        Self {
            content,
            assessment: None,
        }
    }
}

impl From<&str> for SheetEntry {
    fn from(content: &str) -> Self {
        Self::from(content.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub index: usize,
    pub content: String,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<Assessment>,
}

/// Ordered, bounded list of editable rows.
#[derive(Debug, Clone)]
pub struct RowStore {
    rows: Vec<Row>,
    max_rows: usize,
}

impl Default for RowStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROWS)
    }
}

impl RowStore {
    pub fn new(max_rows: usize) -> Self {
        Self {
            rows: Vec::new(),
            max_rows: max_rows.max(1),
        }
    }

    /// Replace the row list with the usable entries of `entries`, in order,
    /// keeping at most `max_rows`. The store is untouched when nothing is usable.
    pub fn load<I, E>(&mut self, entries: I) -> Result<&[Row]>
    where
        I: IntoIterator<Item = E>,
        E: Into<SheetEntry>,
    {
        let rows: Vec<Row> = entries
            .into_iter()
            .map(Into::into)
            .filter(SheetEntry::is_usable)
            .take(self.max_rows)
            .enumerate()
            .map(|(index, entry)| Row {
                index,
                content: entry.content,
                locked: false,
                assessment: entry.assessment,
            })
            .collect();
        if rows.is_empty() {
            return Err(FormError::EmptyInput);
        }
        self.rows = rows;
        Ok(&self.rows)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Row> {
        let len = self.rows.len();
        self.rows
            .get(index)
            .ok_or(FormError::IndexOutOfRange { index, len })
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Row> {
        let len = self.rows.len();
        self.rows
            .get_mut(index)
            .ok_or(FormError::IndexOutOfRange { index, len })
    }

    /// Store `text` as the row content and lock the row.
    pub fn save(&mut self, index: usize, text: impl Into<String>) -> Result<&Row> {
        let row = self.get_mut(index)?;
        row.content = text.into();
        row.locked = true;
        Ok(row)
    }

    /// Make the row editable again; content is retained.
    pub fn unlock(&mut self, index: usize) -> Result<&Row> {
        let row = self.get_mut(index)?;
        row.locked = false;
        Ok(row)
    }

    pub fn set_rating(&mut self, index: usize, rating: u8) -> Result<&Row> {
        let row = self.get_mut(index)?;
        match row.assessment.as_mut() {
            Some(assessment) => assessment.rating = Some(rating),
            None => {
                return Err(FormError::NotPermitted(format!(
                    "row {} has no rating",
                    index + 1
                )))
            }
        }
        Ok(row)
    }

    pub fn lock_all(&mut self) {
        for row in &mut self.rows {
            row.locked = true;
        }
    }

    pub fn has_assessments(&self) -> bool {
        self.rows.iter().any(|row| row.assessment.is_some())
    }
}

/// The single narrative text slot of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub content: String,
    pub locked: bool,
}

impl Summary {
    /// Store freshly generated text, editable so it can be reviewed.
    pub fn store_generated(&mut self, text: impl Into<String>) {
        self.content = text.into();
        self.locked = false;
    }

    pub fn save(&mut self, text: impl Into<String>) -> &Summary {
        self.content = text.into();
        self.locked = true;
        self
    }

    pub fn unlock(&mut self) -> &Summary {
        self.locked = false;
        self
    }
}

/// Mean rating per category, in order of first appearance. Unrated rows
/// count as the lowest rating.
pub fn category_averages(rows: &[Row]) -> Vec<(String, f64)> {
    let mut totals: Vec<(String, u32, u32)> = Vec::new();
    for assessment in rows.iter().filter_map(|row| row.assessment.as_ref()) {
        let rating = u32::from(assessment.rating.unwrap_or(1));
        match totals
            .iter_mut()
            .find(|(category, _, _)| *category == assessment.category)
        {
            Some((_, sum, count)) => {
                *sum += rating;
                *count += 1;
            }
            None => totals.push((assessment.category.clone(), rating, 1)),
        }
    }
    totals
        .into_iter()
        .map(|(category, sum, count)| (category, f64::from(sum) / f64::from(count)))
        .collect()
}

/// Frozen copy of the session content taken by `confirm`; export reads only this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub company: Option<String>,
    pub rows: Vec<Row>,
    pub summary: String,
}

/// Full state of one user's interaction.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub rows: RowStore,
    pub summary: Summary,
    pub company: Option<String>,
    pub(crate) authenticated: bool,
    pub(crate) ratings_generated: bool,
    pub(crate) ratings_confirmed: bool,
    pub(crate) snapshot: Option<Snapshot>,
}

impl Session {
    pub fn new(max_rows: usize) -> Self {
        Self {
            rows: RowStore::new(max_rows),
            ..Self::default()
        }
    }

    pub fn export_confirmed(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn ratings_generated(&self) -> bool {
        self.ratings_generated
    }

    pub fn ratings_confirmed(&self) -> bool {
        self.ratings_confirmed
    }

    /// Drop everything derived from the previous upload.
    pub(crate) fn reset_content(&mut self) {
        self.summary = Summary::default();
        self.company = None;
        self.ratings_generated = false;
        self.ratings_confirmed = false;
        self.snapshot = None;
    }

    pub(crate) fn take_snapshot(&mut self) -> &Snapshot {
        self.snapshot.insert(Snapshot {
            company: self.company.clone(),
            rows: self.rows.rows().to_vec(),
            summary: self.summary.content.clone(),
        })
    }
}
