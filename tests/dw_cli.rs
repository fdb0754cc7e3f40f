use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("specs").join(name)
}

fn dw(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dw"))
        .args(args)
        .output()
        .expect("failed to run dw")
}

fn dw_with_stdin(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_dw"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run dw");
    child.stdin.take().unwrap().write_all(stdin).unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn test_version() {
    let out = dw(&["--version"]);
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.starts_with("dw "));
}

#[test]
fn test_cat_file() {
    let path = fixture("abc.txt");
    let out = dw(&["cat", path.to_str().unwrap()]);
    assert!(out.status.success());
    assert_eq!(out.stdout, fs::read(&path).unwrap());
}

#[test]
fn test_cat_file_twice() {
    let path = fixture("abc.txt");
    let path = path.to_str().unwrap();
    let out = dw(&["bytes", "cat", path, "--input", path]);
    assert!(out.status.success());
    assert_eq!(out.stdout, b"abc\ndef\nabc\ndef\n");
}

#[test]
fn test_cat_numbered_to_file() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("out/numbered.txt");
    let out = dw(&[
        "cat",
        "-n",
        fixture("abc.txt").to_str().unwrap(),
        "-o",
        target.to_str().unwrap(),
    ]);
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
    assert_eq!(fs::read(&target).unwrap(), b"     0\tabc\n     1\tdef\n");
}

#[test]
fn test_cat_stdin() {
    let out = dw_with_stdin(&["cat", "-"], b"one\ntwo\n");
    assert!(out.status.success());
    assert_eq!(out.stdout, b"one\ntwo\n");
}

#[test]
fn test_grep_and_filter_alias() {
    for command in ["grep", "filter"] {
        let out = dw_with_stdin(&[command, "-e", "^b", "--pattern", "z"], b"abc\nbcd\nxyz\n");
        assert!(out.status.success());
        assert_eq!(out.stdout, b"bcd\nxyz\n");
    }
}

#[test]
fn test_grep_max_count() {
    let out = dw_with_stdin(&["bytes", "grep", "-e", "a", "-m", "1"], b"a1\na2\n");
    assert!(out.status.success());
    assert_eq!(out.stdout, b"a1\n");
}

#[test]
fn test_text_commands() {
    let input = b"b\na\nb\nc\n";
    let sorted = dw_with_stdin(&["text", "sort"], input);
    assert_eq!(sorted.stdout, b"a\nb\nb\nc\n");

    let reversed = dw_with_stdin(&["text", "sort", "-r"], input);
    assert_eq!(reversed.stdout, b"c\nb\nb\na\n");

    let unique = dw_with_stdin(&["text", "uniq", "--all"], input);
    assert_eq!(unique.stdout, b"b\na\nc\n");

    let first = dw_with_stdin(&["text", "head", "-n", "2"], input);
    assert_eq!(first.stdout, b"b\na\n");

    let last = dw_with_stdin(&["text", "tail", "-n", "1"], input);
    assert_eq!(last.stdout, b"c\n");
}

#[test]
fn test_text_cat_strict_errors() {
    let out = dw_with_stdin(&["text", "cat", "--input-errors", "strict"], b"ok\n\xff\n");
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("invalid UTF-8 at line 2"));
}

#[test]
fn test_missing_file_fails() {
    let out = dw(&["cat", "does/not/exist.txt"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("input_file=='does/not/exist.txt' does not exist"));
}

#[test]
fn test_invalid_pattern_fails() {
    let out = dw_with_stdin(&["grep", "-e", "("], b"");
    assert_eq!(out.status.code(), Some(1));
}
