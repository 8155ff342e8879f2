//! Streaming delimited-text reader
//!
//! Records are pulled one at a time from a decoding char stream. Quotes only
//! open at the start of a field, so a stray `"` inside an unquoted value
//! (`5" crystal`) does not swallow the rest of the file.

use std::collections::HashMap;
use std::io::{self, Read};

use super::encoding::{CharSource, TextEncoding};
use super::writer::unescape_formula;
use crate::error::{MineralogError, MineralogResult};

/// Delimiters considered when sniffing the header, in tie-break order
pub const DELIMITER_CANDIDATES: [char; 3] = [',', ';', '\t'];

/// Longest logical record accepted by default
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Reader options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Stop after this many data rows
    pub max_rows: Option<usize>,
    pub max_record_bytes: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_rows: None,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

impl ReaderOptions {
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }
}

/// A recoverable problem tied to a physical line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

/// One data row keyed by header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    /// Physical line the record starts on
    pub line: usize,
    values: HashMap<String, String>,
}

impl CsvRow {
    /// Cell under `header`, if the header exists
    pub fn get(&self, header: &str) -> Option<&str> {
        self.values.get(header).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

enum RawRecord {
    Complete { text: String, line: usize },
    TooLong { line: usize },
    Unclosed { line: usize },
}

/// Lazy row iterator over a delimited text stream
///
/// Items are `Err(MineralogError::Parse { .. })` for malformed records, after
/// which iteration continues; any other error ends the stream.
pub struct CsvRows<R: Read> {
    source: CharSource<R>,
    headers: Vec<String>,
    delimiter: char,
    options: ReaderOptions,
    line: usize,
    at_line_start: bool,
    rows_read: usize,
    done: bool,
}

impl<R: Read> CsvRows<R> {
    /// Detect encoding and delimiter, then read the header record
    ///
    /// An empty stream yields a reader with no headers and no rows.
    pub fn open(reader: R, options: ReaderOptions) -> MineralogResult<Self> {
        let source = CharSource::open(reader)?;
        let mut rows = Self {
            source,
            headers: Vec::new(),
            delimiter: DELIMITER_CANDIDATES[0],
            options,
            line: 1,
            at_line_start: true,
            rows_read: 0,
            done: false,
        };
        rows.read_headers()?;
        Ok(rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn encoding(&self) -> TextEncoding {
        self.source.encoding()
    }

    /// Physical lines consumed so far
    pub fn line_count(&self) -> usize {
        if self.at_line_start {
            self.line - 1
        } else {
            self.line
        }
    }

    fn read_headers(&mut self) -> MineralogResult<()> {
        loop {
            match self.read_record(&DELIMITER_CANDIDATES)? {
                None => {
                    self.done = true;
                    return Ok(());
                }
                Some(RawRecord::Complete { text, .. }) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    self.delimiter = detect_delimiter(&text);
                    self.headers = split_record(&text, self.delimiter);
                    return Ok(());
                }
                Some(RawRecord::TooLong { line }) => {
                    return Err(MineralogError::parse(line, "header record is too long"));
                }
                Some(RawRecord::Unclosed { line }) => {
                    self.done = true;
                    return Err(MineralogError::parse(line, "unclosed quoted field in header"));
                }
            }
        }
    }

    /// Read one logical record as raw text
    ///
    /// `field_starts` are the chars after which a quote may open a field.
    fn read_record(&mut self, field_starts: &[char]) -> io::Result<Option<RawRecord>> {
        if self.source.peek()?.is_none() {
            return Ok(None);
        }

        let start_line = self.line;
        let mut text = String::new();
        let mut in_quotes = false;
        let mut at_field_start = true;

        loop {
            let Some(c) = self.source.next_char()? else {
                return Ok(Some(if in_quotes {
                    RawRecord::Unclosed { line: start_line }
                } else {
                    RawRecord::Complete {
                        text,
                        line: start_line,
                    }
                }));
            };

            match c {
                '\r' | '\n' => {
                    let crlf = c == '\r' && self.source.peek()? == Some('\n');
                    if crlf {
                        self.source.next_char()?;
                    }
                    self.line += 1;
                    self.at_line_start = true;

                    if !in_quotes {
                        return Ok(Some(RawRecord::Complete {
                            text,
                            line: start_line,
                        }));
                    }
                    text.push(c);
                    if crlf {
                        text.push('\n');
                    }
                }
                '"' if in_quotes => {
                    self.at_line_start = false;
                    text.push('"');
                    if self.source.peek()? == Some('"') {
                        self.source.next_char()?;
                        text.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                '"' if at_field_start => {
                    self.at_line_start = false;
                    in_quotes = true;
                    at_field_start = false;
                    text.push('"');
                }
                _ => {
                    self.at_line_start = false;
                    if !in_quotes {
                        at_field_start = field_starts.contains(&c) || (at_field_start && c == ' ');
                    }
                    text.push(c);
                }
            }

            if text.len() > self.options.max_record_bytes {
                self.skip_to_line_end()?;
                return Ok(Some(RawRecord::TooLong { line: start_line }));
            }
        }
    }

    fn skip_to_line_end(&mut self) -> io::Result<()> {
        while let Some(c) = self.source.next_char()? {
            if c == '\n' || c == '\r' {
                if c == '\r' && self.source.peek()? == Some('\n') {
                    self.source.next_char()?;
                }
                self.line += 1;
                self.at_line_start = true;
                break;
            }
        }
        Ok(())
    }

    fn build_row(&mut self, text: &str, line: usize) -> MineralogResult<CsvRow> {
        let fields = split_record(text, self.delimiter);
        let width = self.headers.len();

        if fields.len() > width && fields[width..].iter().any(|f| !f.is_empty()) {
            return Err(MineralogError::parse(
                line,
                format!("expected {} fields, found {}", width, fields.len()),
            ));
        }

        let mut values = HashMap::with_capacity(width);
        let mut fields = fields.into_iter();
        for header in &self.headers {
            let value = fields.next().unwrap_or_default();
            values
                .entry(header.clone())
                .or_insert_with(|| unescape_formula(&value).into_owned());
        }

        self.rows_read += 1;
        Ok(CsvRow { line, values })
    }
}

impl<R: Read> Iterator for CsvRows<R> {
    type Item = MineralogResult<CsvRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if matches!(self.options.max_rows, Some(max) if self.rows_read >= max) {
            self.done = true;
            return None;
        }

        let delimiter = [self.delimiter];
        loop {
            let record = match self.read_record(&delimiter) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };

            return match record {
                RawRecord::Complete { text, line } => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    Some(self.build_row(&text, line))
                }
                RawRecord::TooLong { line } => Some(Err(MineralogError::parse(
                    line,
                    format!("record exceeds {} bytes", self.options.max_record_bytes),
                ))),
                RawRecord::Unclosed { line } => {
                    self.done = true;
                    Some(Err(MineralogError::parse(line, "unclosed quoted field")))
                }
            };
        }
    }
}

/// Fully materialized parse, for previews and small files
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
    pub encoding: TextEncoding,
    pub delimiter: char,
    pub line_count: usize,
    pub errors: Vec<RowError>,
}

impl ParseResult {
    /// Drain a row stream, splitting rows from recoverable errors
    pub fn collect<R: Read>(mut rows: CsvRows<R>) -> MineralogResult<Self> {
        let mut collected = Vec::new();
        let mut errors = Vec::new();

        for row in rows.by_ref() {
            match row {
                Ok(row) => collected.push(row),
                Err(MineralogError::Parse { line, message }) => {
                    errors.push(RowError { line, message })
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Self {
            headers: rows.headers().to_vec(),
            rows: collected,
            encoding: rows.encoding(),
            delimiter: rows.delimiter(),
            line_count: rows.line_count(),
            errors,
        })
    }
}

/// Parse a whole stream with the given options
pub fn parse<R: Read>(reader: R, options: ReaderOptions) -> MineralogResult<ParseResult> {
    ParseResult::collect(CsvRows::open(reader, options)?)
}

/// Pick the candidate delimiter splitting `record` into the most fields
pub fn detect_delimiter(record: &str) -> char {
    let mut best = DELIMITER_CANDIDATES[0];
    let mut best_count = 0;
    for candidate in DELIMITER_CANDIDATES {
        let count = split_record(record, candidate).len() - 1;
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

/// Split one logical record into fields
///
/// Quoted fields keep their whitespace and unescape `""`; unquoted fields
/// are trimmed.
pub fn split_record(record: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut at_field_start = true;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }

        if c == delimiter {
            fields.push(finish_field(std::mem::take(&mut current), quoted));
            quoted = false;
            at_field_start = true;
        } else if c == '"' && at_field_start {
            in_quotes = true;
            quoted = true;
            at_field_start = false;
            current.clear();
        } else if quoted && c == ' ' {
            // padding after a closing quote
        } else {
            if c != ' ' {
                at_field_start = false;
            }
            current.push(c);
        }
    }

    fields.push(finish_field(current, quoted));
    fields
}

fn finish_field(value: String, quoted: bool) -> String {
    if quoted {
        value
    } else {
        value.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(input: &str) -> ParseResult {
        parse(input.as_bytes(), ReaderOptions::default()).unwrap()
    }

    #[test]
    fn test_basic_comma_file() {
        let result = parse_str("Name,Group\nQuartz,Silicates\nCalcite,Carbonates\n");
        assert_eq!(result.headers, vec!["Name", "Group"]);
        assert_eq!(result.delimiter, ',');
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].get("Name"), Some("Quartz"));
        assert_eq!(result.rows[1].get("Group"), Some("Carbonates"));
        assert_eq!(result.rows[1].line, 3);
        assert_eq!(result.line_count, 3);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_semicolon_with_bom_and_french_headers() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("Nom;Localité;Pays\nQuartz;Chamonix;France\n".as_bytes());

        let result = parse(&bytes[..], ReaderOptions::default()).unwrap();
        assert_eq!(result.encoding, TextEncoding::Utf8);
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.headers, vec!["Nom", "Localité", "Pays"]);
        assert_eq!(result.rows[0].get("Localité"), Some("Chamonix"));
    }

    #[test]
    fn test_tab_delimiter() {
        let result = parse_str("Name\tFormula\nQuartz\tSiO2\n");
        assert_eq!(result.delimiter, '\t');
        assert_eq!(result.rows[0].get("Formula"), Some("SiO2"));
    }

    #[test]
    fn test_delimiter_tie_prefers_comma() {
        assert_eq!(detect_delimiter("a,b;c"), ',');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_delimiter_ignores_quoted_commas() {
        assert_eq!(detect_delimiter("\"a,b,c\";d;e"), ';');
    }

    #[test]
    fn test_quoted_field_spanning_lines() {
        let result = parse_str("Name,Notes\r\nQuartz,\"line one\r\nline \"\"two\"\"\"\r\nPyrite,plain\r\n");
        assert_eq!(result.rows.len(), 2);
        assert_eq!(
            result.rows[0].get("Notes"),
            Some("line one\r\nline \"two\"")
        );
        assert_eq!(result.rows[1].get("Name"), Some("Pyrite"));
        assert_eq!(result.rows[1].line, 4);
    }

    #[test]
    fn test_quoted_whitespace_preserved_unquoted_trimmed() {
        let result = parse_str("A,B\n  padded  ,\"  kept  \"\n");
        assert_eq!(result.rows[0].get("A"), Some("padded"));
        assert_eq!(result.rows[0].get("B"), Some("  kept  "));
    }

    #[test]
    fn test_stray_quote_inside_unquoted_field() {
        let result = parse_str("Name,Size\nQuartz,5\" crystal\nPyrite,2\n");
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].get("Size"), Some("5\" crystal"));
    }

    #[test]
    fn test_bare_cr_line_endings() {
        let result = parse_str("Name,Group\rQuartz,Silicates\rCalcite,Carbonates");
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.line_count, 3);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let result = parse_str("Name\n\nQuartz\n   \nPyrite\n");
        assert_eq!(result.rows.len(), 2);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_duplicate_header_first_wins() {
        let result = parse_str("Name,Name\nfirst,second\n");
        assert_eq!(result.rows[0].get("Name"), Some("first"));
        assert_eq!(result.rows[0].len(), 1);
    }

    #[test]
    fn test_missing_trailing_fields_are_empty() {
        let result = parse_str("Name,Group,Formula\nQuartz\n");
        assert_eq!(result.rows[0].get("Group"), Some(""));
        assert_eq!(result.rows[0].get("Formula"), Some(""));
    }

    #[test]
    fn test_extra_fields_are_row_errors() {
        let result = parse_str("Name,Group\nQuartz,Silicates,oops\nPyrite,Sulfides,\n");
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].get("Name"), Some("Pyrite"));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].line, 2);
    }

    #[test]
    fn test_unclosed_quote_reports_start_line() {
        let result = parse_str("Name,Notes\nQuartz,ok\nPyrite,\"never closed\nmore\n");
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].line, 3);
        assert!(result.errors[0].message.contains("unclosed"));
    }

    #[test]
    fn test_oversized_record_resynchronizes() {
        let options = ReaderOptions {
            max_rows: None,
            max_record_bytes: 16,
        };
        let input = format!("Name\n{}\nQuartz\n", "x".repeat(64));
        let result = parse(input.as_bytes(), options).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].line, 2);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].get("Name"), Some("Quartz"));
    }

    #[test]
    fn test_max_rows_stops_early() {
        let result = parse(
            "Name\na\nb\nc\nd\n".as_bytes(),
            ReaderOptions::default().with_max_rows(2),
        )
        .unwrap();
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_formula_guard_removed() {
        let result = parse_str("Name,Notes\nQuartz,'=SUM(A1)\nPyrite,'plain\n");
        assert_eq!(result.rows[0].get("Notes"), Some("=SUM(A1)"));
        assert_eq!(result.rows[1].get("Notes"), Some("'plain"));
    }

    #[test]
    fn test_empty_input() {
        let result = parse_str("");
        assert!(result.headers.is_empty());
        assert!(result.rows.is_empty());
        assert_eq!(result.line_count, 0);
    }

    #[test]
    fn test_rows_are_lazy() {
        let mut rows = CsvRows::open("Name\nQuartz\nPyrite\n".as_bytes(), ReaderOptions::default())
            .unwrap();
        assert_eq!(rows.headers(), &["Name".to_string()]);
        let first = rows.next().unwrap().unwrap();
        assert_eq!(first.get("Name"), Some("Quartz"));
        assert_eq!(rows.line_count(), 2);
    }
}
