//! Placeholder substitution shared by every document format.
//!
//! Tokens have the form `{{Name}}`. Scalar tokens are replaced verbatim from
//! the bindings. Grid tokens (`{{a0}}`, `{{b3}}`, ...) address a bound table by
//! column letter and row number: row 0 holds the column names, row `n` holds
//! data row `n - 1`, and rows past the data hold [`NOT_APPLICABLE`]. Tokens
//! with no binding stay in the output untouched.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Filler for grid cells past the end of the bound table.
pub const NOT_APPLICABLE: &str = "N/A";

/// Column names plus positional data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableBinding {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableBinding {
    /// Text for the grid cell at `column`/`row`, or `None` when the column is
    /// not part of the table.
    pub fn cell(&self, column: usize, row: usize) -> Option<&str> {
        let header = self.columns.get(column)?;
        if row == 0 {
            return Some(header);
        }
        Some(
            self.rows
                .get(row - 1)
                .and_then(|data| data.get(column))
                .map(String::as_str)
                .unwrap_or(NOT_APPLICABLE),
        )
    }
}

/// A raster image bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBinding {
    pub png: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

/// Everything a template can be filled with.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub scalars: BTreeMap<String, String>,
    pub table: Option<TableBinding>,
    pub images: BTreeMap<String, ImageBinding>,
}

impl Bindings {
    pub fn with_scalar(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.scalars.insert(name.into(), value.into());
        self
    }

    pub fn with_table(mut self, table: TableBinding) -> Self {
        self.table = Some(table);
        self
    }

    /// Resolve one token name to its replacement text.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        if let (Some(table), Some((column, row))) = (&self.table, parse_grid_name(name)) {
            if let Some(text) = table.cell(column, row) {
                return Some(text);
            }
        }
        self.scalars.get(name).map(String::as_str)
    }
}

/// Result of one substitution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filled {
    pub text: String,
    pub replaced: usize,
    pub unmatched: BTreeSet<String>,
}

pub(crate) fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("token regex"))
}

fn grid_regex() -> &'static Regex {
    static GRID: OnceLock<Regex> = OnceLock::new();
    GRID.get_or_init(|| Regex::new(r"^([a-z])([0-9]{1,6})$").expect("grid regex"))
}

/// Split a grid token name such as `b12` into `(column, row)`.
pub fn parse_grid_name(name: &str) -> Option<(usize, usize)> {
    let caps = grid_regex().captures(name)?;
    let column = usize::from(caps[1].as_bytes()[0] - b'a');
    let row = caps[2].parse().ok()?;
    Some((column, row))
}

/// The token text for `name`.
pub fn token(name: &str) -> String {
    format!("{{{{{name}}}}}")
}

/// Replace every resolvable token in `text`; `escape` adapts values to the
/// surrounding format (XML escaping for Word parts, identity for plain text).
pub fn fill(text: &str, bindings: &Bindings, escape: impl Fn(&str) -> String) -> Filled {
    let mut replaced = 0;
    let mut unmatched = BTreeSet::new();
    let text = token_regex()
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            match bindings.resolve(name) {
                Some(value) => {
                    replaced += 1;
                    escape(value)
                }
                None => {
                    unmatched.insert(name.to_string());
                    caps[0].to_string()
                }
            }
        })
        .into_owned();
    Filled {
        text,
        replaced,
        unmatched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str, bindings: &Bindings) -> Filled {
        fill(text, bindings, str::to_string)
    }

    #[test]
    fn scalar_tokens_are_replaced_exactly() {
        let bindings = Bindings::default()
            .with_scalar("Company_Name", "Acme")
            .with_scalar("Executive_Summary", "Good.");
        let filled = plain(
            "Report for {{Company_Name}}:\n{{Executive_Summary}} ({{Unknown}})",
            &bindings,
        );
        assert_eq!(filled.text, "Report for Acme:\nGood. ({{Unknown}})");
        assert_eq!(filled.replaced, 2);
        assert_eq!(
            filled.unmatched.into_iter().collect::<Vec<_>>(),
            ["Unknown"]
        );
    }

    #[test]
    fn grid_tokens_follow_header_data_and_filler_rows() {
        let table = TableBinding {
            columns: vec!["Name".to_string(), "Score".to_string()],
            rows: vec![
                vec!["alpha".to_string(), "1".to_string()],
                vec!["beta".to_string(), "2".to_string()],
            ],
        };
        let bindings = Bindings::default().with_table(table);
        let filled = plain(
            "{{a0}} {{b0}} {{a1}} {{b1}} {{a2}} {{b2}} {{a3}} {{b3}}",
            &bindings,
        );
        assert_eq!(filled.text, "Name Score alpha 1 beta 2 N/A N/A");
        assert_eq!(filled.replaced, 8);
    }

    #[test]
    fn grid_columns_outside_the_table_stay_intact() {
        let table = TableBinding {
            columns: vec!["Only".to_string()],
            rows: vec![vec!["x".to_string()]],
        };
        let bindings = Bindings::default().with_table(table);
        let filled = plain("{{a1}} {{c1}}", &bindings);
        assert_eq!(filled.text, "x {{c1}}");
    }

    #[test]
    fn grid_names_fall_back_to_scalars_without_a_table() {
        let bindings = Bindings::default().with_scalar("a1", "scalar");
        assert_eq!(plain("{{a1}} {{a2}}", &bindings).text, "scalar {{a2}}");
    }

    #[test]
    fn escape_applies_to_values_only() {
        let bindings = Bindings::default().with_scalar("X", "<b>");
        let filled = fill("<p>{{X}}</p>", &bindings, |value| value.replace('<', "&lt;"));
        assert_eq!(filled.text, "<p>&lt;b></p>");
    }

    #[test]
    fn parse_grid_name_rejects_non_grid_names() {
        assert_eq!(parse_grid_name("a0"), Some((0, 0)));
        assert_eq!(parse_grid_name("d12"), Some((3, 12)));
        assert_eq!(parse_grid_name("A1"), None);
        assert_eq!(parse_grid_name("row_1"), None);
        assert_eq!(parse_grid_name("ab1"), None);
    }
}
