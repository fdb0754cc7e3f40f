//! Output targets.

use std::convert::Infallible;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::{PipelineError, Result};

/// Where a sink writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    Path(PathBuf),
}

impl OutputTarget {
    /// Open a buffered writer, creating missing parent directories.
    pub fn open(&self) -> Result<Box<dyn Write>> {
        match self {
            OutputTarget::Stdout => {
                info!("Using stdout as output_file with binary write mode");
                Ok(Box::new(BufWriter::new(io::stdout().lock())))
            }
            OutputTarget::Path(path) => {
                if path.exists() {
                    warn!("Found output_file=='{}' exists. Overwrite it.", path.display());
                }
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    info!("Making parent directories: {}", parent.display());
                    fs::create_dir_all(parent).map_err(|e| PipelineError::io(self.to_string(), e))?;
                }
                info!("Opening output_file=='{}' with binary write mode", path.display());
                let file = File::create(path).map_err(|e| PipelineError::io(self.to_string(), e))?;
                Ok(Box::new(BufWriter::new(file)))
            }
        }
    }

    pub fn is_stdout(&self) -> bool {
        matches!(self, OutputTarget::Stdout)
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Stdout => f.write_str("-"),
            OutputTarget::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for OutputTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(OutputTarget::from(s))
    }
}

impl From<&str> for OutputTarget {
    fn from(s: &str) -> Self {
        if s == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::Path(PathBuf::from(s))
        }
    }
}

impl From<&Path> for OutputTarget {
    fn from(path: &Path) -> Self {
        OutputTarget::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for OutputTarget {
    fn from(path: PathBuf) -> Self {
        OutputTarget::Path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dash_is_stdout() {
        assert_eq!(OutputTarget::from("-"), OutputTarget::Stdout);
        assert!(OutputTarget::Stdout.is_stdout());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/out.txt");
        let target = OutputTarget::from(path.as_path());
        {
            let mut writer = target.open().unwrap();
            writer.write_all(b"hello\n").unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(fs::read(&path).unwrap(), b"hello\n");
    }

    #[test]
    fn test_open_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, b"old content\n").unwrap();
        {
            let mut writer = OutputTarget::from(path.clone()).open().unwrap();
            writer.write_all(b"new\n").unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(fs::read(&path).unwrap(), b"new\n");
    }
}
