//! CSV output with a fixed quoting policy.
//!
//! Fields are quoted only when they hold a comma, a quote or a line break;
//! rows end with `\n`. Text written here tokenizes back to the same rows as
//! long as fields carry no leading or trailing whitespace (the scanner trims).

use prodcat_shared::{ProdcatError, Result};

/// Render rows as CSV text.
pub fn write_rows<R: AsRef<[String]>>(rows: &[R]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in rows {
        writer
            .write_record(row.as_ref())
            .map_err(|e| ProdcatError::parse(format!("failed to write CSV row: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ProdcatError::parse(format!("failed to flush CSV output: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ProdcatError::parse(format!("CSV output is not UTF-8: {e}")))
}
