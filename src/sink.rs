//! File and stdout sinks shared by byte and text pipelines.

use std::io::{self, Write};

use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::output::OutputTarget;
use crate::pipeline::Lazy;
use crate::stage::Sink;

/// Writes every line, unchanged, to an [`OutputTarget`].
#[derive(Debug, Clone)]
pub struct ToFile {
    target: OutputTarget,
}

/// Write a pipeline to `target` (`-` is stdout).
pub fn to_file(target: impl Into<OutputTarget>) -> ToFile {
    ToFile {
        target: target.into(),
    }
}

pub fn to_stdout() -> ToFile {
    to_file(OutputTarget::Stdout)
}

impl ToFile {
    pub fn target(&self) -> &OutputTarget {
        &self.target
    }
}

impl<T: AsRef<[u8]>> Sink<T> for ToFile {
    /// Number of lines written.
    type Output = usize;

    fn consume(self, items: Lazy<T>) -> Result<usize> {
        let name = self.target.to_string();
        let mut writer = self.target.open()?;
        let mut written = 0;
        for item in items {
            let line = item?;
            if let Err(err) = writer.write_all(line.as_ref()) {
                return finish_early(&self.target, err, written);
            }
            written += 1;
        }
        if let Err(err) = writer.flush() {
            return finish_early(&self.target, err, written);
        }
        if !self.target.is_stdout() {
            info!("Closing output_file=='{}'", name);
        }
        Ok(written)
    }
}

/// A closed stdout reader (`dw cat big | head`) ends output quietly.
fn finish_early(target: &OutputTarget, err: io::Error, written: usize) -> Result<usize> {
    if target.is_stdout() && err.kind() == io::ErrorKind::BrokenPipe {
        debug!(written, "stdout closed by reader");
        return Ok(written);
    }
    Err(PipelineError::io(target.to_string(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_to_file_writes_lines_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/lines.txt");
        let lines = Lazy::from_values(vec![b"abc\n".to_vec(), b"def".to_vec()]);
        let written = to_file(path.as_path()).consume(lines).unwrap();
        assert_eq!(written, 2);
        assert_eq!(fs::read(&path).unwrap(), b"abc\ndef");
    }

    #[test]
    fn test_to_file_accepts_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("text.txt");
        let lines = Lazy::from_values(vec!["é\n".to_string()]);
        to_file(path.clone()).consume(lines).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "é\n");
    }

    #[test]
    fn test_to_file_stops_at_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.txt");
        let lines: Lazy<Vec<u8>> = Lazy::new(
            vec![
                Ok(b"kept\n".to_vec()),
                Err(PipelineError::InvalidArgument("stop".to_string())),
                Ok(b"lost\n".to_vec()),
            ]
            .into_iter(),
        );
        assert!(to_file(path.clone()).consume(lines).is_err());
        assert_eq!(fs::read(&path).unwrap(), b"kept\n");
    }

    #[test]
    fn test_dash_targets_stdout() {
        assert!(to_file("-").target().is_stdout());
        assert!(to_stdout().target().is_stdout());
    }
}
