//! Quote-aware CSV scanner.
//!
//! Spreadsheet exports put commas, quotes and line breaks inside cells, so
//! rows cannot be found by splitting on `\n`. The scanner makes one pass over
//! the text tracking whether it is inside a quoted section:
//! - `"` toggles quoting; `""` inside quotes is one literal quote
//! - `,` outside quotes ends a field
//! - `\n`, `\r` or `\r\n` outside quotes ends a row
//!
//! Fields are trimmed. Every row is kept, including blank lines (`[""]`);
//! which rows to use is decided by [`crate::table::TableOptions`].

/// Output of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    /// Rows in input order.
    pub rows: Vec<Vec<String>>,
    /// The input ended inside a quoted field; its content was flushed as-is.
    pub unterminated_quote: bool,
}

/// Split CSV text into rows of trimmed fields.
///
/// Never fails: malformed quoting degrades to best-effort output.
pub fn tokenize(input: &str) -> Tokenized {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    // Whether anything of the current row has been consumed yet.
    let mut pending = false;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        pending = true;
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => row.push(take_field(&mut field)),
            '\r' | '\n' if !in_quotes => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take_field(&mut field));
                rows.push(std::mem::take(&mut row));
                pending = false;
            }
            _ => field.push(c),
        }
    }

    if pending {
        row.push(take_field(&mut field));
        rows.push(row);
    }

    Tokenized {
        rows,
        unterminated_quote: in_quotes,
    }
}

fn take_field(field: &mut String) -> String {
    let value = field.trim().to_string();
    field.clear();
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(input: &str) -> Vec<Vec<String>> {
        tokenize(input).rows
    }

    #[test]
    fn quoted_comma_stays_in_field() {
        assert_eq!(rows(r#"a,"b,c",d"#), vec![vec!["a", "b,c", "d"]]);
    }

    #[test]
    fn doubled_quote_is_literal() {
        assert_eq!(rows(r#""say ""hi""""#), vec![vec![r#"say "hi""#]]);
    }

    #[test]
    fn multiline_quoted_field() {
        let input = "id,size\nC150,\"10.1 oz cartridge\n5 gal pail\"\nT205,1 qt\n";
        let parsed = rows(input);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1], vec!["C150", "10.1 oz cartridge\n5 gal pail"]);
        assert_eq!(parsed[2], vec!["T205", "1 qt"]);
    }

    #[test]
    fn crlf_is_one_terminator() {
        assert_eq!(
            rows("a,b\r\nc,d\r\n"),
            vec![vec!["a", "b"], vec!["c", "d"]]
        );
    }

    #[test]
    fn lone_cr_terminates_row() {
        assert_eq!(rows("a\rb"), vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn crlf_inside_quotes_is_content() {
        assert_eq!(rows("\"x\r\ny\",z"), vec![vec!["x\r\ny", "z"]]);
    }

    #[test]
    fn fields_are_trimmed() {
        assert_eq!(rows("  a , b  ,\" c \""), vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn empty_trailing_field_is_emitted() {
        assert_eq!(rows("a,b,\n"), vec![vec!["a", "b", ""]]);
        assert_eq!(rows("a,b,"), vec![vec!["a", "b", ""]]);
    }

    #[test]
    fn blank_lines_are_kept_as_single_empty_field() {
        assert_eq!(
            rows("a,b\n\nc,d\n"),
            vec![vec!["a", "b"], vec![""], vec!["c", "d"]]
        );
    }

    #[test]
    fn last_row_without_newline_is_flushed() {
        assert_eq!(rows("a,b\nc,d"), vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn empty_input_has_no_rows() {
        let out = tokenize("");
        assert!(out.rows.is_empty());
        assert!(!out.unterminated_quote);
    }

    #[test]
    fn unterminated_quote_flushes_content() {
        let out = tokenize("a,\"open cell\nstill open");
        assert!(out.unterminated_quote);
        assert_eq!(out.rows, vec![vec!["a", "open cell\nstill open"]]);
    }

    #[test]
    fn quoted_empty_field() {
        assert_eq!(rows("\"\",x"), vec![vec!["", "x"]]);
    }
}
