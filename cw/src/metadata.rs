//! Field-type metadata for typed CSV.
//!
//! ```json
//! {"fields": {"id": {"type": "int", "format": "hex"},
//!             "at": {"type": "datetime", "format": "%Y-%m-%d"}}}
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dw::PipelineError;

use crate::error::{CwError, Result};
use crate::value::Value;

/// Raw metadata document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Metadata {
    #[serde(default)]
    pub fields: IndexMap<String, FieldInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FieldInfo {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntFormat {
    /// Decimal, or a `0x`/`0o`/`0b` prefixed literal.
    Auto,
    Hex,
    Oct,
    Bin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Str,
    Int(IntFormat),
    Float,
    DateTime(String),
}

pub type FieldTypes = HashMap<String, FieldType>;

/// Load metadata; a missing or nonexistent path gives empty metadata.
pub fn load(path: Option<&Path>) -> Result<Metadata> {
    let Some(path) = path else {
        return Ok(Metadata::default());
    };
    if !path.exists() {
        debug!("Metadata file '{}' not found, using no field types", path.display());
        return Ok(Metadata::default());
    }
    info!("Loading metadata_file=='{}'", path.display());
    let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path.display().to_string(), e))?;
    Ok(serde_json::from_str(&text)?)
}

impl Metadata {
    /// Resolve the declared type of every field.
    pub fn field_types(&self) -> Result<FieldTypes> {
        let mut types = FieldTypes::new();
        for (field, info) in &self.fields {
            types.insert(field.clone(), info.field_type(field)?);
        }
        Ok(types)
    }
}

impl FieldInfo {
    fn field_type(&self, field: &str) -> Result<FieldType> {
        match self.kind.as_deref() {
            None | Some("str") | Some("string") => Ok(FieldType::Str),
            Some("int") | Some("integer") => {
                let format = match self.format.as_deref() {
                    None => IntFormat::Auto,
                    Some("hex") => IntFormat::Hex,
                    Some("oct") => IntFormat::Oct,
                    Some("bin") => IntFormat::Bin,
                    Some(other) => {
                        return Err(CwError::UnknownIntFormat {
                            field: field.to_string(),
                            format: other.to_string(),
                        });
                    }
                };
                Ok(FieldType::Int(format))
            }
            Some("number") | Some("float") => Ok(FieldType::Float),
            Some("datetime") => match &self.format {
                Some(format) => Ok(FieldType::DateTime(format.clone())),
                None => Err(CwError::MissingDatetimeFormat {
                    field: field.to_string(),
                }),
            },
            Some(other) => Err(CwError::UnknownFieldType {
                field: field.to_string(),
                kind: other.to_string(),
            }),
        }
    }
}

fn split_sign(s: &str) -> (bool, &str) {
    match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn parse_int(raw: &str, format: IntFormat) -> Option<i64> {
    let (negative, body) = split_sign(raw.trim());
    let (digits, radix) = match format {
        IntFormat::Hex => (strip_prefix_ignore_case(body, "0x").unwrap_or(body), 16),
        IntFormat::Oct => (strip_prefix_ignore_case(body, "0o").unwrap_or(body), 8),
        IntFormat::Bin => (strip_prefix_ignore_case(body, "0b").unwrap_or(body), 2),
        IntFormat::Auto => {
            if let Some(digits) = strip_prefix_ignore_case(body, "0x") {
                (digits, 16)
            } else if let Some(digits) = strip_prefix_ignore_case(body, "0o") {
                (digits, 8)
            } else if let Some(digits) = strip_prefix_ignore_case(body, "0b") {
                (digits, 2)
            } else if body.len() > 1 && body.starts_with('0') && body.bytes().any(|b| b != b'0') {
                // "010" is ambiguous without a prefix
                return None;
            } else {
                (body, 10)
            }
        }
    };
    let digits = digits.replace('_', "");
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = i128::from_str_radix(&digits, radix).ok()?;
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

fn parse_datetime(raw: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, format).ok().or_else(|| {
        NaiveDate::parse_from_str(raw, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

impl FieldType {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldType::Str => "str",
            FieldType::Int(_) => "int",
            FieldType::Float => "float",
            FieldType::DateTime(_) => "datetime",
        }
    }

    /// Read one non-empty cell.
    pub fn deserialize(&self, field: &str, raw: &str) -> Result<Value> {
        let parsed = match self {
            FieldType::Str => Some(Value::Str(raw.to_string())),
            FieldType::Int(format) => parse_int(raw, *format).map(Value::Int),
            FieldType::Float => raw.trim().parse::<f64>().ok().map(Value::Float),
            FieldType::DateTime(format) => parse_datetime(raw, format).map(Value::DateTime),
        };
        parsed.ok_or_else(|| CwError::Deserialize {
            field: field.to_string(),
            value: raw.to_string(),
            kind: self.kind_name(),
        })
    }

    /// Write one cell; values of another type fall back to their display form.
    pub fn serialize(&self, field: &str, value: &Value) -> Result<String> {
        match (self, value) {
            (FieldType::Int(format), Value::Int(n)) => {
                let sign = if *n < 0 { "-" } else { "" };
                let abs = n.unsigned_abs();
                Ok(match format {
                    IntFormat::Auto => n.to_string(),
                    IntFormat::Hex => format!("{sign}0x{abs:x}"),
                    IntFormat::Oct => format!("{sign}0o{abs:o}"),
                    IntFormat::Bin => format!("{sign}0b{abs:b}"),
                })
            }
            (FieldType::DateTime(format), Value::DateTime(dt)) => {
                let mut out = String::new();
                write!(out, "{}", dt.format(format)).map_err(|_| CwError::Serialize {
                    field: field.to_string(),
                    format: format.clone(),
                })?;
                Ok(out)
            }
            _ => Ok(value.to_string()),
        }
    }
}
