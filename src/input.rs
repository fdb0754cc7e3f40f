//! Input sources and lazily opened line readers.

use std::convert::Infallible;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::mem;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::auto_close::{AutoClose, Closeable};
use crate::error::{PipelineError, Result};
use crate::pipeline::Lazy;

/// Where a stage reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    Path(PathBuf),
}

impl InputSource {
    /// Fail early when the file does not exist.
    pub fn validate(&self) -> Result<()> {
        match self {
            InputSource::Stdin => Ok(()),
            InputSource::Path(path) if path.exists() => Ok(()),
            InputSource::Path(path) => Err(PipelineError::MissingInput(path.clone())),
        }
    }

    /// Open a buffered reader over the whole input.
    pub fn open(&self) -> Result<Box<dyn BufRead>> {
        match self {
            InputSource::Stdin => {
                info!("Using stdin as input_file with binary read mode");
                Ok(Box::new(io::stdin().lock()))
            }
            InputSource::Path(path) => {
                info!("Opening input_file=='{}' with binary read mode", path.display());
                let file = File::open(path).map_err(|e| PipelineError::io(self.to_string(), e))?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }

    pub fn is_stdin(&self) -> bool {
        matches!(self, InputSource::Stdin)
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Stdin => f.write_str("-"),
            InputSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for InputSource {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(InputSource::from(s))
    }
}

impl From<&str> for InputSource {
    fn from(s: &str) -> Self {
        if s == "-" {
            InputSource::Stdin
        } else {
            InputSource::Path(PathBuf::from(s))
        }
    }
}

impl From<String> for InputSource {
    fn from(s: String) -> Self {
        InputSource::from(s.as_str())
    }
}

impl From<&Path> for InputSource {
    fn from(path: &Path) -> Self {
        InputSource::Path(path.to_path_buf())
    }
}

impl From<&PathBuf> for InputSource {
    fn from(path: &PathBuf) -> Self {
        InputSource::Path(path.clone())
    }
}

impl From<PathBuf> for InputSource {
    fn from(path: PathBuf) -> Self {
        InputSource::Path(path)
    }
}

/// Convert and validate a list of inputs; an empty list means stdin.
pub fn validate_inputs<I, S>(inputs: I) -> Result<Vec<InputSource>>
where
    I: IntoIterator<Item = S>,
    S: Into<InputSource>,
{
    let mut sources: Vec<InputSource> = inputs.into_iter().map(Into::into).collect();
    if sources.is_empty() {
        sources.push(InputSource::Stdin);
    }
    for source in &sources {
        source.validate()?;
    }
    Ok(sources)
}

enum ReaderState {
    Pending,
    Open(Box<dyn BufRead>),
    Done,
}

/// Byte lines of one input, including their terminators.
///
/// The underlying file is opened on the first pull, so a chain of readers
/// behind an [`AutoClose`] never holds more than one handle at a time.
pub struct LineReader {
    source: InputSource,
    name: String,
    state: ReaderState,
}

impl LineReader {
    pub fn new(source: InputSource) -> Self {
        let name = source.to_string();
        Self {
            source,
            name,
            state: ReaderState::Pending,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ReaderState::Open(_))
    }
}

impl Iterator for LineReader {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let ReaderState::Pending = self.state {
            match self.source.open() {
                Ok(reader) => self.state = ReaderState::Open(reader),
                Err(err) => {
                    self.state = ReaderState::Done;
                    return Some(Err(err));
                }
            }
        }
        let ReaderState::Open(reader) = &mut self.state else {
            return None;
        };
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => None,
            Ok(_) => Some(Ok(line)),
            Err(err) => {
                self.state = ReaderState::Done;
                Some(Err(PipelineError::io(self.name.clone(), err)))
            }
        }
    }
}

impl Closeable for LineReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) {
        if let ReaderState::Open(reader) = mem::replace(&mut self.state, ReaderState::Done) {
            if !self.source.is_stdin() {
                info!("Closing input_file=='{}'", self.name);
            }
            drop(reader);
        }
    }
}

/// Concatenated byte lines of `inputs`, each closed as soon as it is read.
pub fn read_lines(inputs: Vec<InputSource>) -> Lazy<Vec<u8>> {
    match AutoClose::new(inputs.into_iter().map(LineReader::new)) {
        Ok(lines) => Lazy::new(lines),
        Err(err) => Lazy::failed(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_dash_is_stdin() {
        assert_eq!(InputSource::from("-"), InputSource::Stdin);
        assert_eq!(
            "tmp/abc".parse::<InputSource>().unwrap(),
            InputSource::Path(PathBuf::from("tmp/abc"))
        );
        assert_eq!(InputSource::Stdin.to_string(), "-");
    }

    #[test]
    fn test_validate_inputs_defaults_to_stdin() {
        let sources = validate_inputs(Vec::<&str>::new()).unwrap();
        assert_eq!(sources, vec![InputSource::Stdin]);
    }

    #[test]
    fn test_validate_inputs_rejects_missing_file() {
        let err = validate_inputs(["does/not/exist.txt"]).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[test]
    fn test_line_reader_keeps_terminators() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "abc.txt", b"abc\ndef");
        let lines: Vec<Vec<u8>> = LineReader::new(path.into()).map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec![b"abc\n".to_vec(), b"def".to_vec()]);
    }

    #[test]
    fn test_line_reader_opens_lazily_and_closes() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "abc.txt", b"abc\n");
        let mut reader = LineReader::new(path.into());
        assert!(!reader.is_open());
        assert!(reader.next().is_some());
        assert!(reader.is_open());
        reader.close();
        assert!(!reader.is_open());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_at_most_one_file_open() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.txt", b"1\n2\n");
        let b = write_file(&dir, "b.txt", b"3\n");
        let mut lines = AutoClose::new(vec![LineReader::new(a.into()), LineReader::new(b.into())]).unwrap();
        lines.next();
        assert_eq!(lines.current_name().map(|n| n.ends_with("a.txt")), Some(true));
        lines.next();
        lines.next();
        assert_eq!(lines.current_name().map(|n| n.ends_with("b.txt")), Some(true));
        assert_eq!(lines.remaining(), 1);
    }

    #[test]
    fn test_read_lines_concatenates() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.txt", b"1\n");
        let b = write_file(&dir, "b.txt", b"2\n");
        let out: Vec<Vec<u8>> = read_lines(vec![a.into(), b.into()]).map(|l| l.unwrap()).collect();
        assert_eq!(out, vec![b"1\n".to_vec(), b"2\n".to_vec()]);
    }

    #[test]
    fn test_open_error_surfaces_when_pulled() {
        let mut lines = read_lines(vec![InputSource::Path(PathBuf::from("gone/missing.txt"))]);
        assert!(matches!(lines.next(), Some(Err(PipelineError::Io { .. }))));
        assert!(lines.next().is_none());
    }
}
