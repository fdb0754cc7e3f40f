//! Stages and sinks over UTF-8 text lines.

use clap::ValueEnum;

use crate::bytes::number_line;
use crate::error::{PipelineError, Result};
use crate::input::{InputSource, read_lines, validate_inputs};
use crate::pipeline::Lazy;
use crate::stage::{Sink, Stage, StageKind};

pub use crate::sink::{ToFile, to_file, to_stdout};

/// What to do with bytes that are not valid UTF-8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TextErrors {
    /// Fail the pipeline.
    Strict,
    /// Substitute U+FFFD.
    #[default]
    Replace,
    /// Drop the offending bytes.
    Ignore,
}

/// Decode one line; `line` is its one-based position, for error messages.
pub fn decode_bytes(bytes: Vec<u8>, errors: TextErrors, line: usize) -> Result<String> {
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => match errors {
            TextErrors::Strict => Err(PipelineError::Decode { line }),
            TextErrors::Replace => Ok(String::from_utf8_lossy(err.as_bytes()).into_owned()),
            TextErrors::Ignore => Ok(err.as_bytes().utf8_chunks().map(|chunk| chunk.valid()).collect()),
        },
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextCatOptions {
    pub add_number: bool,
    pub errors: TextErrors,
}

/// Text CAT - decodes inputs, or upstream byte lines, into strings.
#[derive(Debug, Clone)]
pub struct Cat {
    inputs: Option<Vec<InputSource>>,
    options: TextCatOptions,
}

/// Decode `inputs` in order; an empty list reads stdin.
pub fn cat<I, S>(inputs: I) -> Result<Cat>
where
    I: IntoIterator<Item = S>,
    S: Into<InputSource>,
{
    Ok(Cat {
        inputs: Some(validate_inputs(inputs)?),
        options: TextCatOptions::default(),
    })
}

/// Decode upstream byte lines.
pub fn decode(errors: TextErrors) -> Cat {
    Cat {
        inputs: None,
        options: TextCatOptions {
            add_number: false,
            errors,
        },
    }
}

impl Cat {
    pub fn numbered(mut self, add_number: bool) -> Self {
        self.options.add_number = add_number;
        self
    }

    pub fn errors(mut self, errors: TextErrors) -> Self {
        self.options.errors = errors;
        self
    }

    pub fn with_options(mut self, options: TextCatOptions) -> Self {
        self.options = options;
        self
    }
}

impl Stage<Vec<u8>> for Cat {
    type Out = String;

    fn name(&self) -> &'static str {
        if self.inputs.is_some() { "text-cat" } else { "decode" }
    }

    fn kind(&self) -> StageKind {
        if self.inputs.is_some() {
            StageKind::Source
        } else {
            StageKind::Transform
        }
    }

    fn apply(self, upstream: Lazy<Vec<u8>>) -> Lazy<String> {
        let lines = match self.inputs {
            Some(inputs) => read_lines(inputs),
            None => upstream,
        };
        let TextCatOptions { add_number, errors } = self.options;
        Lazy::new(lines.enumerate().map(move |(idx, line)| {
            let line = if add_number {
                number_line(idx, &line?)
            } else {
                line?
            };
            decode_bytes(line, errors, idx + 1)
        }))
    }
}

/// ENCODE - turns text lines back into UTF-8 byte lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct Encode;

pub fn encode() -> Encode {
    Encode
}

impl Stage<String> for Encode {
    type Out = Vec<u8>;

    fn name(&self) -> &'static str {
        "encode"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn apply(self, upstream: Lazy<String>) -> Lazy<Vec<u8>> {
        Lazy::new(upstream.map(|line| line.map(String::into_bytes)))
    }
}

/// Sink concatenating every line into one string.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToText;

pub fn to_string() -> ToText {
    ToText
}

impl Sink<String> for ToText {
    type Output = String;

    fn consume(self, items: Lazy<String>) -> Result<String> {
        let mut out = String::new();
        for line in items {
            out.push_str(&line?);
        }
        Ok(out)
    }
}
