//! Error type shared by every pipeline stage and sink.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or draining a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input_file=='{}' does not exist", .0.display())]
    MissingInput(PathBuf),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("invalid UTF-8 at line {line}")]
    Decode { line: usize },

    #[error("{stage} cannot be the first stage (try a stage given its own inputs)")]
    NotASource { stage: &'static str },

    #[error("at least one resource is required")]
    NoResources,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl PipelineError {
    /// Attach the name of the file or stream an I/O error came from.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_message() {
        let err = PipelineError::MissingInput(PathBuf::from("tmp/abc"));
        assert_eq!(err.to_string(), "input_file=='tmp/abc' does not exist");
    }

    #[test]
    fn test_not_a_source_message() {
        let err = PipelineError::NotASource { stage: "grep" };
        assert!(err.to_string().starts_with("grep cannot be the first stage"));
    }

    #[test]
    fn test_io_keeps_source() {
        use std::error::Error as _;
        let err = PipelineError::io("-", io::Error::other("boom"));
        assert_eq!(err.to_string(), "I/O error on '-': boom");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_regex_error_converts() {
        let err: PipelineError = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, PipelineError::InvalidPattern(_)));
    }
}
