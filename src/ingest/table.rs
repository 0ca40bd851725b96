//! Paging, sorting and selection over in-memory rows
//!
//! [`RowTable`] owns the rows and the current page; [`Selection`] tracks rows
//! picked for a bulk action by line number, so it survives re-sorting.

use super::row::CsvRow;
use super::validate::ValidRow;
use crate::error::{Result, SecLoadError};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Default rows per page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Anything a table can display
pub trait TableRow {
    /// Stable row identity (source line number)
    fn line(&self) -> usize;
    /// Cell text for a column
    fn cell(&self, column: &str) -> Option<&str>;
}

impl TableRow for CsvRow {
    fn line(&self) -> usize {
        self.line
    }

    fn cell(&self, column: &str) -> Option<&str> {
        self.get(column)
    }
}

impl TableRow for ValidRow {
    fn line(&self) -> usize {
        self.row.line
    }

    fn cell(&self, column: &str) -> Option<&str> {
        self.row.get(column)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

/// Paginated view over an ordered set of rows
#[derive(Debug, Clone)]
pub struct RowTable<T> {
    rows: Vec<T>,
    page_size: usize,
    current: usize,
}

impl<T: TableRow> RowTable<T> {
    /// Create a table; `page_size` must be positive
    pub fn new(rows: Vec<T>, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(SecLoadError::config("page size must be at least 1"));
        }
        Ok(Self {
            rows,
            page_size,
            current: 0,
        })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows per page
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages; an empty table has none
    pub fn page_count(&self) -> usize {
        self.rows.len().div_ceil(self.page_size)
    }

    /// Index of the current page
    pub fn current_page(&self) -> usize {
        self.current
    }

    /// Rows on a page; out of range pages are empty
    pub fn page(&self, index: usize) -> &[T] {
        let start = index.saturating_mul(self.page_size);
        if start >= self.rows.len() {
            return &[];
        }
        let end = (start + self.page_size).min(self.rows.len());
        &self.rows[start..end]
    }

    /// Rows on the current page
    pub fn current_rows(&self) -> &[T] {
        self.page(self.current)
    }

    /// Jump to a page, clamped to range
    pub fn set_page(&mut self, index: usize) {
        self.current = index.min(self.page_count().saturating_sub(1));
    }

    /// Advance one page; returns false on the last page
    pub fn next_page(&mut self) -> bool {
        if self.current + 1 < self.page_count() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Go back one page; returns false on the first page
    pub fn prev_page(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    /// Stable sort on a column and return to the first page.
    ///
    /// Missing cells sort first, then numbers (numerically), then text
    /// (case-insensitive).
    pub fn sort_by(&mut self, column: &str, direction: SortDirection) {
        self.rows.sort_by(|a, b| {
            let ordering = compare_cells(a.cell(column), b.cell(column));
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        self.current = 0;
    }

    /// All rows in table order
    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    /// Take the rows back
    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }
}

/// Sort key for a cell: missing first, then numbers, then text
#[derive(Debug)]
enum CellKey {
    Missing,
    Number(f64),
    Text(String),
}

impl CellKey {
    fn of(cell: Option<&str>) -> Self {
        match cell {
            None => Self::Missing,
            Some(text) => match text.trim().parse::<f64>() {
                Ok(n) => Self::Number(n),
                Err(_) => Self::Text(text.to_lowercase()),
            },
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
        }
    }
}

fn compare_cells(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (CellKey::of(a), CellKey::of(b)) {
        (CellKey::Number(x), CellKey::Number(y)) => x.total_cmp(&y),
        (CellKey::Text(x), CellKey::Text(y)) => x.cmp(&y),
        (x, y) => x.rank().cmp(&y.rank()),
    }
}

/// Rows chosen for a bulk action, by line number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    lines: BTreeSet<usize>,
}

impl Selection {
    /// Empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one row; returns whether it is now selected
    pub fn toggle(&mut self, line: usize) -> bool {
        if self.lines.remove(&line) {
            false
        } else {
            self.lines.insert(line);
            true
        }
    }

    /// Check membership
    pub fn contains(&self, line: usize) -> bool {
        self.lines.contains(&line)
    }

    /// Select every row on a table page
    pub fn select_page<T: TableRow>(&mut self, table: &RowTable<T>, index: usize) {
        self.lines.extend(table.page(index).iter().map(TableRow::line));
    }

    /// Select every row in the table
    pub fn select_all<T: TableRow>(&mut self, table: &RowTable<T>) {
        self.lines.extend(table.rows().iter().map(TableRow::line));
    }

    /// Drop the selection
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Number of selected rows
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when nothing is selected
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Selected rows in table order
    pub fn selected_rows<'a, T: TableRow>(&self, table: &'a RowTable<T>) -> Vec<&'a T> {
        table
            .rows()
            .iter()
            .filter(|row| self.lines.contains(&row.line()))
            .collect()
    }
}
