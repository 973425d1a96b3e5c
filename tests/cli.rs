//! End-to-end tests of the `wordex` command line.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn wordex(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wordex"))
        .args(args)
        .arg("--no-color")
        .env("HOME", home)
        .env("XDG_DATA_HOME", home.join("data"))
        .env("RUST_LOG", "wordex=warn")
        .env_remove("WORDEX_IGNORE_DIACRITICS")
        .env_remove("WORDEX_IGNORE_PUNCTUATION")
        .env_remove("WORDEX_MAX_RESULTS")
        .env_remove("WORDEX_WORKERS")
        .output()
        .expect("Failed to run wordex")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Build an index of a small word list and return (home dir, index path)
fn fixture() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("words.tsv");
    let index = dir.path().join("words.idx");
    fs::write(&list, "cat\t100\ncar\t200\ncare\t300\nice cream\t400\n").unwrap();

    let output = wordex(
        dir.path(),
        &["build", list.to_str().unwrap(), "-o", index.to_str().unwrap()],
    );
    assert!(output.status.success(), "build failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("Indexed 4 headwords"));

    (dir, index.to_string_lossy().into_owned())
}

#[test]
fn test_find() {
    let (dir, index) = fixture();
    let output = wordex(dir.path(), &["find", &index, "CAT"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "cat\t100\n");

    let output = wordex(dir.path(), &["find", &index, "dog"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "");
}

#[test]
fn test_prefix() {
    let (dir, index) = fixture();
    let output = wordex(dir.path(), &["prefix", &index, "ca"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "car\t200\ncare\t300\ncat\t100\n");

    let output = wordex(dir.path(), &["prefix", &index, "c?r"]);
    assert_eq!(stdout(&output), "car\t200\n");

    let output = wordex(dir.path(), &["prefix", &index, "cream"]);
    assert_eq!(stdout(&output), "ice cream\t400\n");
}

#[test]
fn test_stem() {
    let (dir, index) = fixture();
    let output = wordex(
        dir.path(),
        &["stem", &index, "cars", "--min-length", "3", "--max-suffix", "1"],
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output), "car\t200\ncare\t300\n");
}

#[test]
fn test_headwords_and_stats() {
    let (dir, index) = fixture();
    let output = wordex(dir.path(), &["headwords", &index]);
    assert_eq!(stdout(&output), "car\ncare\ncat\nice cream\n");

    let output = wordex(dir.path(), &["stats", &index]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Leaves:           1"));
    assert!(text.contains("Keys:             5"));
}

#[test]
fn test_missing_index_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("none.idx");
    let output = wordex(dir.path(), &["find", missing.to_str().unwrap(), "cat"]);
    assert!(!output.status.success());
}
