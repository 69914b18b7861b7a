#![allow(dead_code)]

use log::debug;
use maker::config::Config;
use maker::project::Project;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

pub const TEMPLATE: &str = "tests/templates/go-service";

/// Copies every file below `src` into `dst`, creating directories on the way.
pub fn copy_tree(src: &Path, dst: &Path) {
    for entry in WalkDir::new(src).min_depth(1).into_iter().filter_map(Result::ok) {
        let rel = entry.path().strip_prefix(src).unwrap();
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// A scratch copy of an expected tree, so tests can change it freely.
pub fn copy_fixture(name: &str) -> TempDir {
    let tmp_dir = tempfile::tempdir().unwrap();
    copy_tree(&Path::new("tests/expected").join(name), tmp_dir.path());
    tmp_dir
}

/// Opens `dir` against the go-service template with the template's own config.
pub fn open_project(dir: &Path) -> Project {
    let config = Config::load_config(TEMPLATE).unwrap();
    Project::open(TEMPLATE, dir, &config).unwrap()
}

/// Prints a diff of files and their contents between two directories.
/// Shows files only present in one directory and content differences for files present in both.
///
/// # Arguments
/// * `dir1` - The first directory to compare (actual output).
/// * `dir2` - The second directory to compare (expected output).
pub fn print_dir_diff(dir1: &Path, dir2: &Path) {
    let mut files1 = std::collections::HashSet::new();
    let mut files2 = std::collections::HashSet::new();

    // Follow symlinks so files reachable via symlinked folders are included in the comparison.
    for entry in WalkDir::new(dir1)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
    {
        let rel = entry.path().strip_prefix(dir1).unwrap().to_path_buf();
        files1.insert(rel);
    }
    for entry in WalkDir::new(dir2)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
    {
        let rel = entry.path().strip_prefix(dir2).unwrap().to_path_buf();
        files2.insert(rel);
    }

    println!("\n=== Directory Comparison ===");
    println!("Actual output:   {:?}", dir1);
    println!("Expected output: {:?}", dir2);
    println!();

    let only_in_actual: Vec<_> = files1.difference(&files2).collect();
    let only_in_expected: Vec<_> = files2.difference(&files1).collect();

    if !only_in_actual.is_empty() {
        println!("Files only in ACTUAL output:");
        for file in &only_in_actual {
            println!("  + {:?}", file);
        }
        println!();
    }

    if !only_in_expected.is_empty() {
        println!("Files only in EXPECTED output:");
        for file in &only_in_expected {
            println!("  - {:?}", file);
        }
        println!();
    }

    let mut has_content_diff = false;
    for file in files1.intersection(&files2) {
        let path1 = dir1.join(file);
        let path2 = dir2.join(file);
        let content1 = fs::read(&path1).unwrap();
        let content2 = fs::read(&path2).unwrap();
        if content1 != content2 {
            if !has_content_diff {
                println!("Files with different content:");
                has_content_diff = true;
            }
            println!("\n  File: {:?}", file);
            println!("  --- Actual content:");
            match String::from_utf8(content1.clone()) {
                Ok(s) => println!("{}", s),
                Err(_) => println!("  (binary content, {} bytes)", content1.len()),
            }
            println!("  --- Expected content:");
            match String::from_utf8(content2.clone()) {
                Ok(s) => println!("{}", s),
                Err(_) => println!("  (binary content, {} bytes)", content2.len()),
            }
        }
    }

    if !has_content_diff && only_in_actual.is_empty() && only_in_expected.is_empty() {
        println!("No differences found (this shouldn't happen if test failed!)");
    }
    println!("=== End of Comparison ===\n");
}

/// Compares `actual` with `tests/expected/<expected>`, printing any
/// differences, and asserts that the directories are identical.
pub fn assert_matches_expected(actual: &Path, expected: &str) {
    let expected_dir = Path::new("tests/expected").join(expected);
    match dir_diff::is_different(actual, &expected_dir) {
        Ok(different) => {
            if different {
                print_dir_diff(actual, &expected_dir);
                panic!("Directories differ. See above for details.");
            }
        }
        Err(e) => {
            debug!("Error comparing directories: {e}");
        }
    }
    assert!(!dir_diff::is_different(actual, &expected_dir).unwrap());
}
