//! Domain models shared by both engines.
//!
//! - [`Table`] - ordered, column-major sheet content
//!
//! Blank cells are always the empty string. There is no null sentinel, so a
//! blank cell and the literal text `nan` stay distinguishable.

use serde::{Deserialize, Serialize};

// =============================================================================
// Table
// =============================================================================

/// An ordered set of named columns, all of the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    headers: Vec<String>,
    /// Column-major cells: `cells[col][row]`.
    cells: Vec<Vec<String>>,
    row_count: usize,
}

impl Table {
    /// Create an empty table (no columns, no rows).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a header row and row-major records.
    ///
    /// Short records are padded with blanks, extra cells are dropped.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let row_count = rows.len();
        let mut cells: Vec<Vec<String>> = headers
            .iter()
            .map(|_| Vec::with_capacity(row_count))
            .collect();

        for row in rows {
            for (idx, column) in cells.iter_mut().enumerate() {
                column.push(row.get(idx).cloned().unwrap_or_default());
            }
        }

        Self {
            headers,
            cells,
            row_count,
        }
    }

    /// Convenience constructor used heavily in tests.
    pub fn from_str_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self::from_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Column headers in order.
    pub fn columns(&self) -> &[String] {
        &self.headers
    }

    /// Cells of the first column whose header is exactly `name`.
    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|idx| self.cells[idx].as_slice())
    }

    /// Cells of the column at `idx`.
    pub fn column_at(&self, idx: usize) -> Option<&[String]> {
        self.cells.get(idx).map(Vec::as_slice)
    }

    /// Cell at (`row`, column `name`), blank when either is out of range.
    pub fn cell(&self, row: usize, name: &str) -> &str {
        self.column(name)
            .and_then(|col| col.get(row))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Replace the content of column `name` in place, or append it.
    ///
    /// The first column added to an empty table fixes the row count.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        if self.headers.is_empty() {
            self.row_count = values.len();
        }
        debug_assert_eq!(values.len(), self.row_count);

        match self.headers.iter().position(|h| h == name) {
            Some(idx) => self.cells[idx] = values,
            None => {
                self.headers.push(name.to_string());
                self.cells.push(values);
            }
        }
    }

    /// Insert a column at `idx` (clamped to the column count).
    pub fn insert_column(&mut self, idx: usize, name: &str, values: Vec<String>) {
        if self.headers.is_empty() {
            self.row_count = values.len();
        }
        debug_assert_eq!(values.len(), self.row_count);

        let idx = idx.min(self.headers.len());
        self.headers.insert(idx, name.to_string());
        self.cells.insert(idx, values);
    }

    /// Row-major view of row `row`.
    pub fn row(&self, row: usize) -> Vec<&str> {
        self.cells
            .iter()
            .map(|col| col.get(row).map(String::as_str).unwrap_or(""))
            .collect()
    }

    /// Iterate rows in order, row-major.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        (0..self.row_count).map(move |idx| self.row(idx))
    }
}

// =============================================================================
// Cell helpers
// =============================================================================

/// A cell is blank when it holds nothing but whitespace.
pub fn is_blank(cell: &str) -> bool {
    cell.trim().is_empty()
}

/// Literal `nan` text, as spreadsheet exports produce for missing numbers.
pub fn is_nan_text(cell: &str) -> bool {
    cell.trim().eq_ignore_ascii_case("nan")
}
