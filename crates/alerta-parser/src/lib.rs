//! Alerta Parser - Tabular data for the "upload external database" flow
//!
//! Supports parsing of:
//! - CSV files (first row as header, via the csv crate)
//! - Microsoft Excel (XLSX, XLS)
//!
//! Each parser produces a [`Table`] whose rows are later flattened into
//! one text per row before embedding.

pub mod csv;
pub mod excel;

pub use self::csv::CsvParser;
pub use excel::ExcelParser;

use std::path::Path;
use thiserror::Error;

/// Separator placed between cell values when a row is flattened
pub const ROW_SEPARATOR: &str = " | ";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while reading an uploaded table
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Excel parsing error
    #[error("Excel parsing error: {0}")]
    ExcelError(String),

    /// CSV parsing error
    #[error("CSV parsing error at line {line}: {message}")]
    CsvError { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// File Types
// ============================================================================

/// Supported table file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Xlsx,
    Xls,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "csv" => Self::Csv,
            "xlsx" => Self::Xlsx,
            "xls" => Self::Xls,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Xlsx => write!(f, "xlsx"),
            Self::Xls => write!(f, "xls"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Table
// ============================================================================

/// A table read from an uploaded file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Table caption (file stem or sheet name)
    pub caption: Option<String>,

    /// Column headers
    pub headers: Vec<String>,

    /// Table rows, cells in column order
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a new table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add headers
    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }

    /// Set caption
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Add a row, dropping it if every cell is empty
    pub fn add_row(&mut self, row: Vec<String>) {
        if row.iter().any(|cell| !cell.trim().is_empty()) {
            self.rows.push(row);
        }
    }

    /// Get number of columns
    pub fn num_columns(&self) -> usize {
        self.headers
            .len()
            .max(self.rows.iter().map(Vec::len).max().unwrap_or(0))
    }

    /// Get number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Flatten every row into one text: cell values in column order
    /// joined by [`ROW_SEPARATOR`]
    pub fn row_texts(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.join(ROW_SEPARATOR)).collect()
    }

    /// Append the rows of another table with the same layout
    pub fn extend(&mut self, other: Table) {
        if self.headers.is_empty() {
            self.headers = other.headers;
        }
        self.rows.extend(other.rows);
    }
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for table parsers
pub trait TableParser: Send + Sync {
    /// Parse a table from a file path
    fn parse(&self, path: &Path) -> Result<Table>;

    /// Get supported file types
    fn supported_types(&self) -> &[FileType];

    /// Check if this parser can handle a file type
    fn can_parse(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

/// Parse an uploaded table, choosing the parser from the file extension
pub fn parse_table(path: &Path) -> Result<Table> {
    let file_type = FileType::from_path(path);
    let csv = CsvParser::new();
    let excel = ExcelParser::new();
    let parsers: [&dyn TableParser; 2] = [&csv, &excel];

    let parser = parsers
        .into_iter()
        .find(|p| p.can_parse(file_type))
        .ok_or_else(|| {
            ParserError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            )
        })?;

    let table = parser.parse(path)?;
    tracing::info!(
        path = %path.display(),
        file_type = %file_type,
        rows = table.num_rows(),
        "Table parsed"
    );
    Ok(table)
}

fn caption_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

// ============================================================================
// Tests
// ============================================================================
