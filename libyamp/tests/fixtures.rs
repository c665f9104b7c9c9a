//! Test harness for the YAML parser against fixture files.
//!
//! Every `test/yaml/*.yaml` file is parsed and each document's value is
//! compared, one line per document, against the `Debug` rendering stored in
//! `test/expect/<name>.txt`. Every `test/nay/*.yaml` file must fail, and its
//! first error message must match `test/nay/<name>.error`.

use std::fs;
use std::path::{Path, PathBuf};

use libyamp::{parse_all_documents, stringify_all, Document, ParseOptions, StringifyOptions, Value};

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("test")
}

/// All files matching a pattern under test/, sorted.
fn fixture_files(pattern: &str) -> Vec<PathBuf> {
    let pattern = test_root().join(pattern);
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .expect("valid glob pattern")
        .filter_map(Result::ok)
        .collect();
    files.sort();
    files
}

/// A sibling file of `path` in another test/ subdirectory.
fn companion(path: &Path, subdir: &str, ext: &str) -> PathBuf {
    let stem = path.file_stem().unwrap().to_string_lossy();
    test_root().join(subdir).join(format!("{}.{}", stem, ext))
}

fn parse_file(path: &Path) -> Result<Vec<Document>, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    Ok(parse_all_documents(&content, ParseOptions::default().with_filename(name)))
}

fn values(docs: &[Document]) -> Result<Vec<Value>, String> {
    docs.iter()
        .map(|doc| {
            if let Some(err) = doc.errors.first() {
                return Err(err.to_string());
            }
            doc.to_value().map_err(|e| e.to_string())
        })
        .collect()
}

fn run_yaml_test(path: &Path) -> Result<(), String> {
    let docs = parse_file(path)?;
    let actual: Vec<String> = values(&docs)
        .map_err(|e| format!("{}: {}", path.display(), e))?
        .iter()
        .map(|v| format!("{:?}", v))
        .collect();

    let expect_path = companion(path, "expect", "txt");
    let expected = fs::read_to_string(&expect_path)
        .map_err(|e| format!("Failed to read {}: {}", expect_path.display(), e))?;
    let expected: Vec<&str> = expected.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    if actual != expected {
        return Err(format!(
            "{}: value mismatch\n    expected: {:?}\n    actual:   {:?}",
            path.display(),
            expected,
            actual
        ));
    }
    Ok(())
}

fn run_nay_test(path: &Path) -> Result<(), String> {
    let docs = parse_file(path)?;
    let first = docs
        .iter()
        .find_map(|doc| doc.errors.first())
        .ok_or_else(|| format!("{}: expected an error, but parsing succeeded", path.display()))?;

    let error_path = companion(path, "nay", "error");
    let expected = fs::read_to_string(&error_path)
        .map_err(|e| format!("Failed to read {}: {}", error_path.display(), e))?;
    if first.message != expected.trim() {
        return Err(format!(
            "{}: error mismatch\n    expected: {}\n    actual:   {}",
            path.display(),
            expected.trim(),
            first.message
        ));
    }
    Ok(())
}

/// Stringify every document and parse the result again; the values must not
/// change.
fn run_round_trip(path: &Path) -> Result<(), String> {
    let docs = parse_file(path)?;
    let before = values(&docs)?;
    let text = stringify_all(&docs, &StringifyOptions::default());
    let again = parse_all_documents(&text, ParseOptions::default());
    let after = values(&again).map_err(|e| format!("{}: reparse failed: {}\n{}", path.display(), e, text))?;
    let same = before.len() == after.len() && before.iter().zip(&after).all(|(a, b)| a.same_as(b));
    if !same {
        return Err(format!(
            "{}: round trip changed the values\n    before: {:?}\n    after:  {:?}\n{}",
            path.display(),
            before,
            after,
            text
        ));
    }
    Ok(())
}

fn run_all(kind: &str, files: &[PathBuf], run: fn(&Path) -> Result<(), String>) {
    assert!(!files.is_empty(), "no {} fixtures found", kind);
    println!("\nRunning {} {} fixtures:", files.len(), kind);

    let errors: Vec<String> = files.iter().filter_map(|file| run(file).err()).collect();
    println!("\nResults: {} passed, {} failed", files.len() - errors.len(), errors.len());
    if !errors.is_empty() {
        println!("\nErrors:");
        for error in &errors {
            println!("  - {}", error);
        }
    }
    assert!(errors.is_empty(), "{} {} fixtures failed", errors.len(), kind);
}

#[test]
fn test_all_yaml_fixtures() {
    run_all("yaml", &fixture_files("yaml/*.yaml"), run_yaml_test);
}

#[test]
fn test_all_nay_fixtures() {
    run_all("nay", &fixture_files("nay/*.yaml"), run_nay_test);
}

#[test]
fn test_all_fixtures_round_trip() {
    run_all("round-trip", &fixture_files("yaml/*.yaml"), run_round_trip);
}
