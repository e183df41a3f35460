//! Excel table parser using calamine
//!
//! Reads uploaded XLSX/XLS workbooks into a single [`Table`].

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::{caption_from_path, FileType, ParserError, Result, Table, TableParser};

/// Excel table parser
pub struct ExcelParser {
    /// Sheets to parse (None = all sheets)
    pub sheet_filter: Option<Vec<String>>,
    /// Whether to treat first row as header
    pub first_row_header: bool,
}

impl ExcelParser {
    /// Create a new Excel parser with default settings
    pub fn new() -> Self {
        Self {
            sheet_filter: None,
            first_row_header: true,
        }
    }

    /// Filter specific sheets
    pub fn with_sheets(mut self, sheets: Vec<String>) -> Self {
        self.sheet_filter = Some(sheets);
        self
    }

    /// Set whether first row is treated as header
    pub fn with_first_row_header(mut self, enabled: bool) -> Self {
        self.first_row_header = enabled;
        self
    }

    /// Convert a Data cell to string
    fn cell_to_string(cell: &Data) -> String {
        match cell {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Float(f) => {
                // Format without unnecessary decimals
                if f.fract() == 0.0 {
                    format!("{}", *f as i64)
                } else {
                    format!("{f}")
                }
            }
            Data::Int(i) => format!("{i}"),
            Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Data::Error(e) => format!("#ERROR: {e:?}"),
            Data::DateTime(dt) => format!("{dt}"),
            Data::DateTimeIso(s) => s.clone(),
            Data::DurationIso(s) => s.clone(),
        }
    }

    /// Read one sheet into a table
    fn process_sheet(&self, sheet_name: &str, range: calamine::Range<Data>) -> Table {
        let mut table = Table::new().with_caption(sheet_name);
        let mut rows_iter = range.rows();

        if self.first_row_header {
            if let Some(first_row) = rows_iter.next() {
                table.headers = first_row.iter().map(Self::cell_to_string).collect();
            }
        }

        for row in rows_iter {
            table.add_row(row.iter().map(Self::cell_to_string).collect());
        }
        table
    }

    fn wants_sheet(&self, sheet_name: &str) -> bool {
        self.sheet_filter
            .as_ref()
            .map(|filter| filter.iter().any(|s| s == sheet_name))
            .unwrap_or(true)
    }
}

impl Default for ExcelParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TableParser for ExcelParser {
    fn parse(&self, path: &Path) -> Result<Table> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| ParserError::ExcelError(e.to_string()))?;

        let sheet_names = workbook.sheet_names().to_vec();
        let mut table = Table::new();

        for sheet_name in sheet_names.iter().filter(|name| self.wants_sheet(name)) {
            let range = match workbook.worksheet_range(sheet_name) {
                Ok(range) => range,
                Err(e) => {
                    tracing::warn!(sheet = %sheet_name, error = %e, "Skipping unreadable sheet");
                    continue;
                }
            };
            table.extend(self.process_sheet(sheet_name, range));
        }

        table.caption = caption_from_path(path);
        Ok(table)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Xlsx, FileType::Xls]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excel_parser_creation() {
        let parser = ExcelParser::new();
        assert!(parser.first_row_header);
        assert!(parser.sheet_filter.is_none());

        let parser = parser.with_first_row_header(false);
        assert!(!parser.first_row_header);
    }

    #[test]
    fn test_sheet_filter() {
        let parser = ExcelParser::new().with_sheets(vec!["Sismos".to_string()]);
        assert!(parser.wants_sheet("Sismos"));
        assert!(!parser.wants_sheet("Huracanes"));
        assert!(ExcelParser::new().wants_sheet("Huracanes"));
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(ExcelParser::cell_to_string(&Data::Empty), "");
        assert_eq!(
            ExcelParser::cell_to_string(&Data::String("Tabasco".to_string())),
            "Tabasco"
        );
        assert_eq!(ExcelParser::cell_to_string(&Data::Int(42)), "42");
        assert_eq!(ExcelParser::cell_to_string(&Data::Float(3.5)), "3.5");
        assert_eq!(ExcelParser::cell_to_string(&Data::Float(10.0)), "10");
        assert_eq!(ExcelParser::cell_to_string(&Data::Bool(true)), "TRUE");
    }

    #[test]
    fn test_process_sheet() {
        let mut range = calamine::Range::new((0, 0), (2, 1));
        range.set_value((0, 0), Data::String("estado".to_string()));
        range.set_value((0, 1), Data::String("magnitud".to_string()));
        range.set_value((1, 0), Data::String("Oaxaca".to_string()));
        range.set_value((1, 1), Data::Float(5.8));

        let table = ExcelParser::new().process_sheet("Sismos", range);
        assert_eq!(table.headers, vec!["estado", "magnitud"]);
        // third row is empty and dropped
        assert_eq!(table.row_texts(), vec!["Oaxaca | 5.8"]);
        assert_eq!(table.caption.as_deref(), Some("Sismos"));
    }

    #[test]
    fn test_supported_types() {
        let parser = ExcelParser::new();
        assert!(parser.can_parse(FileType::Xlsx));
        assert!(parser.can_parse(FileType::Xls));
        assert!(!parser.can_parse(FileType::Csv));
    }
}
