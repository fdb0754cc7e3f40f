//! Stages and sinks over byte lines.
//!
//! A byte line keeps its `\n` terminator, so `cat` followed by a file sink
//! reproduces its inputs byte for byte.

use regex::bytes::{Regex, RegexBuilder};

use crate::error::Result;
use crate::input::{InputSource, read_lines, validate_inputs};
use crate::pipeline::Lazy;
use crate::stage::{Sink, Stage, StageKind};
use crate::transform::head;

pub use crate::sink::{ToFile, to_file, to_stdout};

/// Prefix `line` with its zero-based index, right-aligned in six columns.
pub fn number_line(idx: usize, line: &[u8]) -> Vec<u8> {
    let mut out = format!("{idx:>6}\t").into_bytes();
    out.extend_from_slice(line);
    out
}

/// Options shared by the `cat` stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatOptions {
    pub add_number: bool,
}

/// CAT - concatenates inputs, or passes upstream through.
#[derive(Debug, Clone)]
pub struct Cat {
    inputs: Option<Vec<InputSource>>,
    options: CatOptions,
}

/// Concatenate `inputs` in order; an empty list reads stdin.
pub fn cat<I, S>(inputs: I) -> Result<Cat>
where
    I: IntoIterator<Item = S>,
    S: Into<InputSource>,
{
    Ok(Cat {
        inputs: Some(validate_inputs(inputs)?),
        options: CatOptions::default(),
    })
}

/// `cat` over whatever is upstream.
pub fn cat_upstream() -> Cat {
    Cat {
        inputs: None,
        options: CatOptions::default(),
    }
}

impl Cat {
    pub fn numbered(mut self, add_number: bool) -> Self {
        self.options.add_number = add_number;
        self
    }

    pub fn with_options(mut self, options: CatOptions) -> Self {
        self.options = options;
        self
    }
}

impl Stage<Vec<u8>> for Cat {
    type Out = Vec<u8>;

    fn name(&self) -> &'static str {
        "cat"
    }

    fn kind(&self) -> StageKind {
        if self.inputs.is_some() {
            StageKind::Source
        } else {
            StageKind::Transform
        }
    }

    fn apply(self, upstream: Lazy<Vec<u8>>) -> Lazy<Vec<u8>> {
        let lines = match self.inputs {
            Some(inputs) => read_lines(inputs),
            None => upstream,
        };
        if !self.options.add_number {
            return lines;
        }
        Lazy::new(
            lines
                .enumerate()
                .map(|(idx, line)| line.map(|line| number_line(idx, &line))),
        )
    }
}

/// Options for [`grep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GrepOptions {
    pub ignore_case: bool,
    /// Stop after this many selected lines; `None` or `Some(0)` is unlimited.
    pub max_count: Option<usize>,
}

/// GREP - keeps lines matching any of its patterns.
#[derive(Debug, Clone)]
pub struct Grep {
    patterns: Vec<Regex>,
    max_count: Option<usize>,
    inputs: Option<Vec<InputSource>>,
}

/// Compile `patterns`; empty patterns are skipped.
pub fn grep<I, S>(patterns: I, options: GrepOptions) -> Result<Grep>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut compiled = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        if pattern.is_empty() {
            continue;
        }
        compiled.push(
            RegexBuilder::new(pattern)
                .case_insensitive(options.ignore_case)
                .unicode(false)
                .build()?,
        );
    }
    Ok(Grep {
        patterns: compiled,
        max_count: options.max_count.filter(|&n| n > 0),
        inputs: None,
    })
}

impl Grep {
    /// Read `inputs` instead of upstream, making this a source stage.
    pub fn reading<I, S>(mut self, inputs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<InputSource>,
    {
        self.inputs = Some(validate_inputs(inputs)?);
        Ok(self)
    }

    /// Whether `line` is selected, ignoring its terminator.
    pub fn is_match(&self, line: &[u8]) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        self.patterns.iter().any(|p| p.is_match(line))
    }
}

impl Stage<Vec<u8>> for Grep {
    type Out = Vec<u8>;

    fn name(&self) -> &'static str {
        "grep"
    }

    fn kind(&self) -> StageKind {
        if self.inputs.is_some() {
            StageKind::Source
        } else {
            StageKind::Transform
        }
    }

    fn apply(mut self, upstream: Lazy<Vec<u8>>) -> Lazy<Vec<u8>> {
        let lines = match self.inputs.take() {
            Some(inputs) => read_lines(inputs),
            None => upstream,
        };
        let max_count = self.max_count;
        let selected = Lazy::new(lines.filter(move |line| match line {
            Ok(line) => self.is_match(line),
            Err(_) => true,
        }));
        match max_count {
            Some(n) => head(n).apply(selected),
            None => selected,
        }
    }
}

/// Sink concatenating every line into one buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToBytes;

pub fn to_bytes() -> ToBytes {
    ToBytes
}

impl Sink<Vec<u8>> for ToBytes {
    type Output = Vec<u8>;

    fn consume(self, items: Lazy<Vec<u8>>) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for line in items {
            out.extend_from_slice(&line?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auto_close::{AutoClose, Closeable, close_with};
    use crate::error::PipelineError;
    use crate::pipeline::Pipeline;
    use crate::stage::to_list;
    use std::cell::RefCell;
    use std::fs;
    use std::path::PathBuf;
    use std::rc::Rc;
    use tempfile::TempDir;

    type Log = Rc<RefCell<Vec<String>>>;

    fn resource(name: &str, items: Vec<&'static str>, log: &Log) -> impl Closeable<Item = Result<Vec<u8>>> + use<> {
        let log = Rc::clone(log);
        let closed = name.to_string();
        close_with(
            name,
            items.into_iter().map(|line| Ok(line.as_bytes().to_vec())),
            move || log.borrow_mut().push(format!("close {closed}")),
        )
    }

    fn files(log: &Log) -> Lazy<Vec<u8>> {
        let resources = vec![
            resource("a", vec!["x1\n", "y\n"], log),
            resource("b", vec!["x2\n", "x3\n"], log),
            resource("c", vec!["x4\n"], log),
        ];
        Lazy::new(AutoClose::new(resources).unwrap())
    }

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("specs").join(name)
    }

    fn lines(values: &[&str]) -> Pipeline<Vec<u8>> {
        Pipeline::from_values(values.iter().map(|v| v.as_bytes().to_vec()).collect::<Vec<_>>())
    }

    #[test]
    fn test_cat_reproduces_file() {
        let path = fixture("abc.txt");
        let out = Pipeline::source(cat([&path]).unwrap())
            .unwrap()
            .run(to_bytes())
            .unwrap();
        assert_eq!(out, fs::read(&path).unwrap());
    }

    #[test]
    fn test_cat_same_file_twice() {
        let path = fixture("abc.txt");
        let out = Pipeline::source(cat([&path, &path]).unwrap())
            .unwrap()
            .run(to_bytes())
            .unwrap();
        assert_eq!(out, b"abc\ndef\nabc\ndef\n");
    }

    #[test]
    fn test_cat_numbered() {
        let out = Pipeline::source(cat([fixture("abc.txt")]).unwrap().numbered(true))
            .unwrap()
            .run(to_bytes())
            .unwrap();
        assert_eq!(out, b"     0\tabc\n     1\tdef\n");
    }

    #[test]
    fn test_cat_numbers_across_inputs() {
        let path = fixture("abc.txt");
        let out = Pipeline::source(
            cat([&path, &path])
                .unwrap()
                .with_options(CatOptions { add_number: true }),
        )
        .unwrap()
        .run(to_list())
        .unwrap();
        assert_eq!(out[2], b"     2\tabc\n");
        assert_eq!(out[3], b"     3\tdef\n");
    }

    #[test]
    fn test_cat_upstream_numbers_lines() {
        let out = (lines(&["x\n", "y\n"]) | cat_upstream().numbered(true))
            .run(to_bytes())
            .unwrap();
        assert_eq!(out, b"     0\tx\n     1\ty\n");
    }

    #[test]
    fn test_cat_missing_file_rejected_eagerly() {
        let err = cat(["no/such/file.txt"]).unwrap_err();
        assert_eq!(err.to_string(), "input_file=='no/such/file.txt' does not exist");
    }

    #[test]
    fn test_cat_replaces_upstream() {
        let out = (lines(&["ignored\n"]) | cat([fixture("abc.txt")]).unwrap())
            .run(to_bytes())
            .unwrap();
        assert_eq!(out, b"abc\ndef\n");
    }

    #[test]
    fn test_grep_keeps_matching_lines_in_order() {
        let pattern = grep(["b", "^f"], GrepOptions::default()).unwrap();
        let out = (lines(&["abc\n", "def\n", "fgh\n", "xyz\n", "bcd\n"]) | pattern)
            .run(to_bytes())
            .unwrap();
        assert_eq!(out, b"abc\nfgh\nbcd\n");
    }

    #[test]
    fn test_grep_anchors_ignore_terminator() {
        let pattern = grep(["c$"], GrepOptions::default()).unwrap();
        let out = (lines(&["abc\n", "cab\n"]) | pattern).run(to_bytes()).unwrap();
        assert_eq!(out, b"abc\n");
    }

    #[test]
    fn test_grep_ignore_case() {
        let options = GrepOptions {
            ignore_case: true,
            ..GrepOptions::default()
        };
        let out = (lines(&["ABC\n", "def\n"]) | grep(["abc"], options).unwrap())
            .run(to_bytes())
            .unwrap();
        assert_eq!(out, b"ABC\n");
    }

    #[test]
    fn test_grep_max_count() {
        let options = GrepOptions {
            max_count: Some(2),
            ..GrepOptions::default()
        };
        let out = (lines(&["a1\n", "b\n", "a2\n", "a3\n"]) | grep(["a"], options).unwrap())
            .run(to_bytes())
            .unwrap();
        assert_eq!(out, b"a1\na2\n");
    }

    #[test]
    fn test_grep_max_count_closes_every_input_once() {
        let log = Log::default();
        let options = GrepOptions {
            max_count: Some(2),
            ..GrepOptions::default()
        };
        let mut pipe = Pipeline::from_lazy(files(&log)) | grep(["x"], options).unwrap();
        assert_eq!(pipe.next().unwrap().unwrap(), b"x1\n");
        assert!(log.borrow().is_empty());
        assert_eq!(pipe.next().unwrap().unwrap(), b"x2\n");
        assert_eq!(*log.borrow(), vec!["close a", "close b", "close c"]);
        assert!(pipe.next().is_none());
        drop(pipe);
        assert_eq!(*log.borrow(), vec!["close a", "close b", "close c"]);
    }

    #[test]
    fn test_dropped_pipeline_closes_active_then_pending() {
        let log = Log::default();
        let mut pipe = Pipeline::from_lazy(files(&log)) | cat_upstream().numbered(true);
        assert_eq!(pipe.next().unwrap().unwrap(), b"     0\tx1\n");
        assert_eq!(pipe.next().unwrap().unwrap(), b"     1\ty\n");
        assert_eq!(pipe.next().unwrap().unwrap(), b"     2\tx2\n");
        assert_eq!(*log.borrow(), vec!["close a"]);
        drop(pipe);
        assert_eq!(*log.borrow(), vec!["close a", "close b", "close c"]);
    }

    #[test]
    fn test_grep_matches_invalid_utf8() {
        let out = (Pipeline::from_values(vec![b"a\xffb\n".to_vec(), b"ab\n".to_vec()])
            | grep(["^a.b$"], GrepOptions::default()).unwrap())
        .run(to_list())
        .unwrap();
        assert_eq!(out, vec![b"a\xffb\n".to_vec()]);
    }

    #[test]
    fn test_grep_zero_max_count_is_unlimited() {
        let options = GrepOptions {
            max_count: Some(0),
            ..GrepOptions::default()
        };
        let out = (lines(&["a\n", "a\n"]) | grep(["a"], options).unwrap())
            .run(to_list())
            .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_grep_without_patterns_passes_through() {
        let out = (lines(&["a\n", "b\n"]) | grep(Vec::<String>::new(), GrepOptions::default()).unwrap())
            .run(to_list())
            .unwrap();
        assert_eq!(out.len(), 2);
        let out = (lines(&["a\n"]) | grep([""], GrepOptions::default()).unwrap())
            .run(to_list())
            .unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_grep_invalid_pattern() {
        let err = grep(["("], GrepOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPattern(_)));
    }

    #[test]
    fn test_grep_reading_file_is_a_source() {
        let stage = grep(["e"], GrepOptions::default())
            .unwrap()
            .reading([fixture("abc.txt")])
            .unwrap();
        assert_eq!(stage.kind(), StageKind::Source);
        let out = Pipeline::source(stage).unwrap().run(to_bytes()).unwrap();
        assert_eq!(out, b"def\n");
    }

    #[test]
    fn test_head_after_cat_closes_input_early() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("many.txt");
        let content: String = (0..1000).map(|i| format!("{i}\n")).collect();
        fs::write(&path, content).unwrap();

        let out = (Pipeline::source(cat([&path]).unwrap()).unwrap() | head(2))
            .run(to_bytes())
            .unwrap();
        assert_eq!(out, b"0\n1\n");
    }

    #[test]
    fn test_to_file_round_trips_cat() {
        let dir = TempDir::new().unwrap();
        let out_path = dir.path().join("copy.txt");
        let written = Pipeline::source(cat([fixture("abc.txt")]).unwrap())
            .unwrap()
            .run(to_file(out_path.clone()))
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(fs::read(&out_path).unwrap(), b"abc\ndef\n");
    }
}
