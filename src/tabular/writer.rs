//! Quoting CSV writer and formula-injection guard

use std::borrow::Cow;
use std::io::Write;

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::MineralogResult;

/// Leading characters a spreadsheet would evaluate
const FORMULA_TRIGGERS: [char; 6] = ['=', '+', '-', '@', '\t', '\r'];

/// `true` for values that are guarded on export: a formula trigger,
/// possibly behind apostrophes already present in the data
fn needs_guard(value: &str) -> bool {
    value.trim_start_matches('\'').starts_with(FORMULA_TRIGGERS)
}

/// Prefix text values that a spreadsheet would treat as a formula
///
/// Values that already look guarded get one more apostrophe, so that
/// [`unescape_formula`] gives back exactly what was written.
pub fn escape_formula(value: &str) -> Cow<'_, str> {
    if needs_guard(value) {
        Cow::Owned(format!("'{}", value))
    } else {
        Cow::Borrowed(value)
    }
}

/// Undo [`escape_formula`]
pub fn unescape_formula(value: &str) -> Cow<'_, str> {
    match value.strip_prefix('\'') {
        Some(rest) if needs_guard(rest) => Cow::Borrowed(rest),
        _ => Cow::Borrowed(value),
    }
}

/// A cell on its way out
#[derive(Debug, Clone, Copy)]
pub enum Cell<'a> {
    /// Free text, formula-guarded
    Text(&'a str),
    /// Numbers, dates and other machine-formatted values, written as is
    Raw(&'a str),
}

/// Writes comma-separated records, quoting only where required
pub struct CsvWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(writer: W) -> Self {
        let inner = WriterBuilder::new()
            .delimiter(b',')
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::CRLF)
            .from_writer(writer);
        Self { inner }
    }

    /// Write a header record
    pub fn write_header<I, S>(&mut self, headers: I) -> MineralogResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner
            .write_record(headers.into_iter().map(|h| h.as_ref().to_string()))?;
        Ok(())
    }

    /// Write one data record
    pub fn write_cells(&mut self, cells: &[Cell<'_>]) -> MineralogResult<()> {
        let fields = cells.iter().map(|cell| match cell {
            Cell::Text(value) => escape_formula(value),
            Cell::Raw(value) => Cow::Borrowed(*value),
        });
        self.inner.write_record(fields.map(|f| f.into_owned()))?;
        Ok(())
    }

    /// Flush and hand back the underlying writer
    pub fn finish(self) -> MineralogResult<W> {
        self.inner
            .into_inner()
            .map_err(|e| crate::error::MineralogError::Io(e.error().to_string()))
    }
}
