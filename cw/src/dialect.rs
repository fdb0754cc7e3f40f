//! CSV dialect: delimiters, quote chars and output quoting.

use clap::ValueEnum;
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};

use crate::error::{CwError, Result};

pub const DEFAULT_DELIMITER: u8 = b',';
pub const DEFAULT_QUOTECHAR: u8 = b'"';

/// Output quoting style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Quoting {
    /// Quote every field
    All,
    /// Quote only fields containing the delimiter, quote char or a line break
    #[default]
    Minimal,
    /// Quote every field that is not a number
    #[value(name = "nonnumeric")]
    NonNumeric,
    /// Never quote
    #[value(name = "none")]
    Never,
}

impl Quoting {
    pub fn style(self) -> QuoteStyle {
        match self {
            Quoting::All => QuoteStyle::Always,
            Quoting::Minimal => QuoteStyle::Necessary,
            Quoting::NonNumeric => QuoteStyle::NonNumeric,
            Quoting::Never => QuoteStyle::Never,
        }
    }
}

/// Input and output CSV settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub input_delimiter: u8,
    pub input_quotechar: u8,
    pub output_delimiter: u8,
    pub output_quotechar: u8,
    pub output_quoting: Quoting,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            input_delimiter: DEFAULT_DELIMITER,
            input_quotechar: DEFAULT_QUOTECHAR,
            output_delimiter: DEFAULT_DELIMITER,
            output_quotechar: DEFAULT_QUOTECHAR,
            output_quoting: Quoting::Minimal,
        }
    }
}

impl Dialect {
    pub fn reader_builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(self.input_delimiter)
            .quote(self.input_quotechar)
            .flexible(true);
        builder
    }

    pub fn writer_builder(&self) -> WriterBuilder {
        let mut builder = WriterBuilder::new();
        builder
            .delimiter(self.output_delimiter)
            .quote(self.output_quotechar)
            .quote_style(self.output_quoting.style())
            .flexible(true);
        builder
    }
}

/// Parse a one-byte dialect character; `\t` is accepted for tab.
pub fn parse_char(s: &str) -> Result<u8> {
    match s {
        "\\t" | "tab" => Ok(b'\t'),
        _ if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => Err(CwError::InvalidDialect(format!(
            "'{s}' is not a single ASCII character"
        ))),
    }
}

/// Split CSV texts into their values: `["a,b", "c"]` gives `[a, b, c]`.
pub fn gather_values<S: AsRef<str>>(texts: &[S], delimiter: u8, quotechar: u8) -> Result<Vec<String>> {
    let mut values = Vec::new();
    for text in texts {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .quote(quotechar)
            .from_reader(text.as_ref().as_bytes());
        for record in reader.records() {
            values.extend(record?.iter().map(str::to_string));
        }
    }
    Ok(values)
}
