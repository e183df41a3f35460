//! CSV table parser using the csv crate
//!
//! Rows may have differing lengths. A leading UTF-8 byte order mark is
//! dropped before reading.

use std::path::Path;

use crate::{caption_from_path, FileType, ParserError, Result, Table, TableParser};

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// CSV parser
pub struct CsvParser {
    /// Field delimiter
    pub delimiter: u8,
    /// Whether to treat first row as header
    pub first_row_header: bool,
}

impl CsvParser {
    /// Create a new CSV parser with default settings
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            first_row_header: true,
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether first row is treated as header
    pub fn with_first_row_header(mut self, enabled: bool) -> Self {
        self.first_row_header = enabled;
        self
    }

    /// Parse CSV text into a table
    pub fn parse_str(&self, text: &str) -> Result<Table> {
        self.parse_bytes(text.as_bytes())
    }

    /// Parse raw CSV bytes into a table
    pub fn parse_bytes(&self, data: &[u8]) -> Result<Table> {
        let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let mut table = Table::new();
        let mut records = reader.records();
        if self.first_row_header {
            if let Some(header) = records.next() {
                table.headers = fields(header.map_err(csv_error)?);
            }
        }
        for record in records {
            table.add_row(fields(record.map_err(csv_error)?));
        }
        Ok(table)
    }
}

fn fields(record: ::csv::StringRecord) -> Vec<String> {
    record.iter().map(str::to_string).collect()
}

fn csv_error(e: ::csv::Error) -> ParserError {
    let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
    ParserError::CsvError {
        line,
        message: e.to_string(),
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TableParser for CsvParser {
    fn parse(&self, path: &Path) -> Result<Table> {
        let data = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut table = self.parse_bytes(&data)?;
        table.caption = caption_from_path(path);
        Ok(table)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Csv]
    }
}
