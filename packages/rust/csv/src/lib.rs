//! CSV handling for spreadsheet exports of the product list.
//!
//! This crate provides:
//! - [`tokenize`]: the quote-aware scanner (multi-line cells, `""` escapes)
//! - [`CsvTable`] / [`Record`]: header-keyed records with a short-row policy
//! - [`write_rows`]: CSV output with a fixed quoting policy

pub mod table;
pub mod tokenizer;
pub mod writer;

pub use table::{CsvTable, Record, TableOptions};
pub use tokenizer::{Tokenized, tokenize};
pub use writer::write_rows;
