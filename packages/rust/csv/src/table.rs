//! Header-keyed access to tokenized rows.

use std::collections::HashMap;
use std::path::Path;

use prodcat_shared::{ProdcatError, Result};
use tracing::{debug, warn};

use crate::tokenizer::tokenize;

/// Which tokenized rows become the header and the records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    /// Rows to skip before the header row (banner lines above the header).
    pub header_row: usize,
    /// Data rows with fewer fields than this are dropped. `0` keeps all rows.
    pub min_fields: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            header_row: 0,
            min_fields: 2,
        }
    }
}

/// One data row: positional cells plus lookup by header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based row number within the tokenized input (header rows included).
    pub row_number: usize,
    cells: Vec<String>,
    by_name: HashMap<String, usize>,
}

impl Record {
    /// Value of the named column, `""` when the column does not exist.
    pub fn get(&self, column: &str) -> &str {
        self.by_name
            .get(column)
            .map(|&i| self.cell(i))
            .unwrap_or("")
    }

    /// Value at a position, `""` when out of range.
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    /// All cells in input order.
    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

/// A header row and the records below it.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
    /// Data rows dropped by the `min_fields` policy.
    pub dropped_rows: usize,
    /// The input ended inside a quoted field.
    pub unterminated_quote: bool,
}

impl CsvTable {
    /// Tokenize `input` and build the table.
    pub fn parse(input: &str, opts: &TableOptions) -> Self {
        let tokenized = tokenize(input);
        if tokenized.unterminated_quote {
            warn!("CSV input ended inside a quoted field; last cell kept as-is");
        }
        let mut table = Self::from_rows(tokenized.rows, opts);
        table.unterminated_quote = tokenized.unterminated_quote;
        table
    }

    /// Read and parse a CSV file.
    pub fn from_path(path: &Path, opts: &TableOptions) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ProdcatError::io(path, e))?;
        let table = Self::parse(&content, opts);
        debug!(
            ?path,
            columns = table.headers.len(),
            records = table.records.len(),
            dropped = table.dropped_rows,
            "loaded CSV table"
        );
        Ok(table)
    }

    /// Build a table from already tokenized rows.
    ///
    /// Kept records are padded with empty cells up to the header length.
    /// Empty header names are not addressable by name; when a header repeats,
    /// the rightmost column wins.
    pub fn from_rows(rows: Vec<Vec<String>>, opts: &TableOptions) -> Self {
        let mut rows = rows.into_iter().enumerate().skip(opts.header_row);
        let Some((_, headers)) = rows.next() else {
            return Self::default();
        };

        let by_name: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.clone(), i))
            .collect();

        let mut records = Vec::new();
        let mut dropped_rows = 0;
        for (index, mut cells) in rows {
            if cells.len() < opts.min_fields {
                dropped_rows += 1;
                continue;
            }
            if cells.len() < headers.len() {
                cells.resize(headers.len(), String::new());
            }
            records.push(Record {
                row_number: index + 1,
                cells,
                by_name: by_name.clone(),
            });
        }

        Self {
            headers,
            records,
            dropped_rows,
            unterminated_quote: false,
        }
    }

    /// Position of a named column.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().rposition(|h| h == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "\
#,Product ID,OK?,On New Site Now,Industry,Product Name,Chemistry,Size
1,C150,Y,Done,Construction,Construction Adhesive,Solvent based,\"10.1 oz
5 gal\"

2,TAC-R777,ADD now,,Composites,Core Bonding Adhesive,Methacrylate
3,T205,Phase 2,Y,Marine,Deck Seal,,1 qt
";

    #[test]
    fn records_map_headers_to_values() {
        let table = CsvTable::parse(SHEET, &TableOptions::default());
        assert_eq!(table.headers.len(), 8);
        assert_eq!(table.records.len(), 3);

        let c150 = &table.records[0];
        assert_eq!(c150.get("Product ID"), "C150");
        assert_eq!(c150.get("Size"), "10.1 oz\n5 gal");
        assert_eq!(c150.get("On New Site Now"), "Done");
    }

    #[test]
    fn missing_column_and_cell_read_as_empty() {
        let table = CsvTable::parse(SHEET, &TableOptions::default());
        let tac = &table.records[1];
        assert_eq!(tac.get("Size"), "");
        assert_eq!(tac.get("No Such Column"), "");
        assert_eq!(tac.cell(42), "");
        // Padded up to header length.
        assert_eq!(tac.cells().len(), 8);
    }

    #[test]
    fn blank_lines_are_dropped_by_default() {
        let table = CsvTable::parse(SHEET, &TableOptions::default());
        assert_eq!(table.dropped_rows, 1);
        // Row numbers still point at the physical rows.
        assert_eq!(table.records[1].row_number, 4);
    }

    #[test]
    fn min_fields_zero_keeps_blank_rows() {
        let opts = TableOptions {
            header_row: 0,
            min_fields: 0,
        };
        let table = CsvTable::parse(SHEET, &opts);
        assert_eq!(table.records.len(), 4);
        assert_eq!(table.records[1].get("Product ID"), "");
    }

    #[test]
    fn header_row_skips_banner_lines() {
        let input = "Chemistries Products,,\nUse this tab,,\n,,\nIndustry,Product ID,Chemistry\nMarine,M-S750,MS Polymer\n";
        let opts = TableOptions {
            header_row: 3,
            min_fields: 2,
        };
        let table = CsvTable::parse(input, &opts);
        assert_eq!(table.headers, vec!["Industry", "Product ID", "Chemistry"]);
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].get("Chemistry"), "MS Polymer");
    }

    #[test]
    fn empty_headers_are_not_addressable() {
        let table = CsvTable::parse(",Product ID\nx,C150\n", &TableOptions::default());
        assert_eq!(table.records[0].get(""), "");
        assert_eq!(table.records[0].cell(0), "x");
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let table = CsvTable::parse("", &TableOptions::default());
        assert!(table.headers.is_empty());
        assert!(table.records.is_empty());
    }

    #[test]
    fn unterminated_quote_is_flagged() {
        let table = CsvTable::parse("a,b\n1,\"open", &TableOptions::default());
        assert!(table.unterminated_quote);
        assert_eq!(table.records[0].get("b"), "open");
    }

    #[test]
    fn from_path_reports_missing_file() {
        let err = CsvTable::from_path(Path::new("/nonexistent/prodcat.csv"), &TableOptions::default())
            .unwrap_err();
        assert!(matches!(err, ProdcatError::Io { .. }));
    }
}
