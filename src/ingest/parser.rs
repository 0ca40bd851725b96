//! Delimited-text parser
//!
//! Reads a CSV export into [`ParsedCsv`]. The first record is the header
//! row. Rows shorter than the header read missing cells as empty, blank
//! lines are skipped.

use super::row::{CsvRow, ParsedCsv};
use crate::error::{IoResultExt, Result, SecLoadError};
use csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;

const UTF8_BOM: char = '\u{feff}';

/// CSV parser with configurable delimiter
#[derive(Debug, Clone)]
pub struct CsvParser {
    delimiter: u8,
    trim: bool,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim: true,
        }
    }
}

impl CsvParser {
    /// Comma-delimited parser that trims cells
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to trim whitespace
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Parse a file on disk
    pub fn parse_path(&self, path: &Path) -> Result<ParsedCsv> {
        if !path.exists() {
            return Err(SecLoadError::NotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path).with_path(path)?;
        self.parse_reader(file)
            .map_err(|e| e.with_context(format!("parsing {}", path.display())))
    }

    /// Parse CSV text
    pub fn parse_str(&self, text: &str) -> Result<ParsedCsv> {
        self.parse_reader(text.as_bytes())
    }

    /// Parse from any reader
    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<ParsedCsv> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(if self.trim { Trim::All } else { Trim::None })
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let h = if i == 0 { h.trim_start_matches(UTF8_BOM) } else { h };
                h.trim().to_string()
            })
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Ok(ParsedCsv::default());
        }

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                SecLoadError::Csv(format!("row {}: {}", index + 1, e))
            })?;

            let fields = headers
                .iter()
                .enumerate()
                .map(|(col, header)| (header.clone(), record.get(col).unwrap_or("").to_string()))
                .collect();

            let row = CsvRow::new(index + 1, fields);
            if row.is_blank() {
                continue;
            }
            rows.push(row);
        }

        tracing::debug!(headers = headers.len(), rows = rows.len(), "parsed csv");
        Ok(ParsedCsv { headers, rows })
    }
}
