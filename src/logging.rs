//! Log setup shared by the binaries.
//!
//! `--log-level` values are either `LEVEL`, which sets the default, or
//! `NAME=LEVEL`, which sets the level of one module (`dw.input` and
//! `dw::input` are equivalent). Level names are case-insensitive and include
//! the aliases `WARNING`, `CRITICAL` and `FATAL`.

use tracing_subscriber::EnvFilter;

use crate::error::{PipelineError, Result};

pub const DEFAULT_LEVEL: &str = "warn";

fn level(name: &str) -> Result<&'static str> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "NOTSET" => Ok("trace"),
        "DEBUG" => Ok("debug"),
        "INFO" => Ok("info"),
        "WARN" | "WARNING" => Ok("warn"),
        "ERROR" | "CRITICAL" | "FATAL" => Ok("error"),
        "OFF" => Ok("off"),
        _ => Err(PipelineError::InvalidArgument(format!("unknown log level '{name}'"))),
    }
}

/// Translate `--log-level` values into an `EnvFilter` directive string.
pub fn directives<S: AsRef<str>>(levels: &[S], default: &str) -> Result<String> {
    let mut default = level(default)?;
    let mut targets = Vec::new();
    for value in levels {
        match value.as_ref().split_once('=') {
            Some((name, lvl)) => {
                let name = name.trim().replace('.', "::");
                targets.push(format!("{name}={}", level(lvl)?));
            }
            None => default = level(value.as_ref())?,
        }
    }
    let mut parts = vec![default.to_string()];
    parts.extend(targets);
    Ok(parts.join(","))
}

/// Install a stderr subscriber filtered by `levels`.
pub fn init<S: AsRef<str>>(levels: &[S]) -> Result<()> {
    let filter = EnvFilter::try_new(directives(levels, DEFAULT_LEVEL)?)
        .map_err(|e| PipelineError::InvalidArgument(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| PipelineError::InvalidArgument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_only() {
        assert_eq!(directives::<&str>(&[], DEFAULT_LEVEL).unwrap(), "warn");
    }

    #[test]
    fn test_bare_level_replaces_default() {
        assert_eq!(directives(&["DEBUG"], DEFAULT_LEVEL).unwrap(), "debug");
        assert_eq!(directives(&["warning"], "info").unwrap(), "warn");
    }

    #[test]
    fn test_named_levels() {
        let out = directives(&["dw.input=INFO", "cw=CRITICAL", "ERROR"], DEFAULT_LEVEL).unwrap();
        assert_eq!(out, "error,dw::input=info,cw=error");
    }

    #[test]
    fn test_unknown_level_rejected() {
        let err = directives(&["LOUD"], DEFAULT_LEVEL).unwrap_err();
        assert_eq!(err.to_string(), "invalid argument: unknown log level 'LOUD'");
    }

    #[test]
    fn test_directives_parse_as_filter() {
        let out = directives(&["dw.pipeline=debug"], DEFAULT_LEVEL).unwrap();
        assert!(EnvFilter::try_new(out).is_ok());
    }
}
