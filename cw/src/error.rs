//! Error type for CSV conversion and pivoting.

use dw::PipelineError;
use thiserror::Error;

use crate::formula::FormulaError;

#[derive(Debug, Error)]
pub enum CwError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown storage_type=='{kind}' for field '{field}'")]
    UnknownFieldType { field: String, kind: String },

    #[error("unknown format=='{format}' for integer field '{field}'")]
    UnknownIntFormat { field: String, format: String },

    #[error("format is required for datetime field '{field}'")]
    MissingDatetimeFormat { field: String },

    #[error("cannot read '{value}' as {kind} in field '{field}'")]
    Deserialize {
        field: String,
        value: String,
        kind: &'static str,
    },

    #[error("cannot write field '{field}' with format '{format}'")]
    Serialize { field: String, format: String },

    #[error("invalid assignment formula '{0}', expected NAME=EXPR")]
    InvalidAssignment(String),

    #[error("formula for '{field}': {source}")]
    Formula {
        field: String,
        #[source]
        source: FormulaError,
    },

    #[error("invalid dialect: {0}")]
    InvalidDialect(String),
}

impl CwError {
    pub fn formula(field: impl Into<String>, source: FormulaError) -> Self {
        CwError::Formula {
            field: field.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CwError>;
