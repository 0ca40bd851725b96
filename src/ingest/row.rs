//! Parsed CSV rows

use serde::Serialize;

/// A single data row, keeping header order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvRow {
    /// 1-based data row number (the header row is not counted)
    pub line: usize,
    /// (header, value) pairs in header order
    pub fields: Vec<(String, String)>,
}

impl CsvRow {
    /// Create a row from header/value pairs
    pub fn new(line: usize, fields: Vec<(String, String)>) -> Self {
        Self { line, fields }
    }

    /// Value of a column; `None` when the header is absent
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == header)
            .map(|(_, value)| value.as_str())
    }

    /// Value of a column with empty cells treated as absent
    pub fn non_empty(&self, header: &str) -> Option<&str> {
        self.get(header).filter(|value| !value.trim().is_empty())
    }

    /// True when every cell is blank
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, value)| value.trim().is_empty())
    }
}

/// Headers plus ordered rows of one delimited-text file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedCsv {
    /// Header row, trimmed
    pub headers: Vec<String>,
    /// Data rows in file order
    pub rows: Vec<CsvRow>,
}

impl ParsedCsv {
    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when the header row is present
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup() {
        let row = CsvRow::new(
            1,
            vec![
                ("hostname".to_string(), "web-01".to_string()),
                ("owner".to_string(), "  ".to_string()),
            ],
        );
        assert_eq!(row.get("hostname"), Some("web-01"));
        assert_eq!(row.get("owner"), Some("  "));
        assert_eq!(row.non_empty("owner"), None);
        assert_eq!(row.get("missing"), None);
        assert!(!row.is_blank());
    }
}
