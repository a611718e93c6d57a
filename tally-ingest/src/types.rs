use serde::{Deserialize, Serialize};
use tally_core::{Error, Result};

/// Column names the pipeline reads and writes (matched case-insensitively)
pub mod columns {
    pub const DESCRIPTION: &str = "Description";
    pub const AMOUNT: &str = "Amount";
    pub const DATE: &str = "Date";
    pub const CATEGORY: &str = "Category";
    pub const CONFIDENCE: &str = "Confidence";
}

/// A header row plus string cells. Every row has exactly `headers.len()` cells;
/// unknown columns are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 1-based source line of each row (the header is line 1)
    #[serde(default)]
    pub lines: Vec<usize>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Append a row on the line after the previous one.
    pub fn push_row(&mut self, row: Vec<String>) {
        let line = self.lines.last().map_or(2, |l| l + 1);
        self.push_row_at(line, row);
    }

    /// Append a row read from `line`, padding or truncating it to the header width.
    pub fn push_row_at(&mut self, line: usize, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
        self.lines.push(line);
    }

    /// Source line of data row `row`, for messages
    pub fn line(&self, row: usize) -> usize {
        self.lines.get(row).copied().unwrap_or(row + 2)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name, ignoring case and surrounding whitespace.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    /// Indices of all `names`, or `MissingColumns` listing every absent one.
    pub fn require(&self, names: &[&str]) -> Result<Vec<usize>> {
        let mut found = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.column(name) {
                Some(i) => found.push(i),
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(Error::MissingColumns {
                missing,
                found: self.headers.clone(),
            });
        }
        Ok(found)
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Index of `name`, appending an empty column if it does not exist yet.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(i) = self.column(name) {
            return i;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        let mut t = Table::new(vec![" date".into(), "DESCRIPTION".into(), "Amount".into()]);
        t.push_row(vec!["2024-01-05".into(), "Coffee Shop".into()]);
        t
    }

    #[test]
    fn test_column_lookup_ignores_case_and_padding() {
        let t = table();
        assert_eq!(t.column("Date"), Some(0));
        assert_eq!(t.column("description"), Some(1));
        assert_eq!(t.column("Category"), None);
    }

    #[test]
    fn test_push_row_pads_short_rows() {
        let t = table();
        assert_eq!(t.rows[0].len(), 3);
        assert_eq!(t.cell(0, 2), "");
        assert_eq!(t.cell(9, 0), "");
    }

    #[test]
    fn test_require_reports_all_missing() {
        let t = table();
        match t.require(&["Amount", "Category", "Confidence"]) {
            Err(Error::MissingColumns { missing, .. }) => {
                assert_eq!(missing, vec!["Category".to_string(), "Confidence".to_string()]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
        assert_eq!(t.require(&["amount", "date"]).unwrap(), vec![2, 0]);
    }

    #[test]
    fn test_lines_follow_the_source() {
        let mut t = table();
        t.push_row_at(7, vec!["2024-01-09".into()]);
        t.push_row(vec!["2024-01-10".into()]);
        assert_eq!(t.line(0), 2);
        assert_eq!(t.line(1), 7);
        assert_eq!(t.line(2), 8);
    }

    #[test]
    fn test_ensure_column_is_idempotent() {
        let mut t = table();
        let i = t.ensure_column("Category");
        assert_eq!(i, 3);
        assert_eq!(t.ensure_column("category"), 3);
        assert_eq!(t.rows[0].len(), 4);
    }
}
