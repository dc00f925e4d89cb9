//! CLI integration tests — end-to-end against the `bks` binary, exercising
//! the parts of the pipeline that don't require a loaded embedding model
//! (help/version text, and the error paths that short-circuit before the
//! embedder is ever touched: spec.md §7's structural errors).

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn bks() -> Command {
    Command::cargo_bin("bks").expect("failed to find bks binary")
}

fn setup_project() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    let src_dir = dir.path().join("src");
    fs::create_dir(&src_dir).expect("failed to create src dir");
    fs::write(
        src_dir.join("lib.rs"),
        "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n",
    )
    .expect("failed to write test file");
    dir
}

#[test]
fn help_output_mentions_search() {
    bks()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("semantic code search"));
}

#[test]
fn version_output_prints_binary_name() {
    bks()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bks"));
}

#[test]
fn search_without_index_fails_with_hint() {
    let project = setup_project();
    bks()
        .arg("authenticate")
        .arg(project.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("run `build`"));
}

#[test]
fn status_without_index_fails() {
    let project = setup_project();
    bks()
        .arg("status")
        .arg(project.path())
        .assert()
        .failure()
        .code(2);
}

#[test]
fn clean_without_index_fails() {
    let project = setup_project();
    bks()
        .arg("clean")
        .arg(project.path())
        .assert()
        .failure()
        .code(2);
}

#[test]
fn list_without_index_reports_none_and_exits_one() {
    let project = setup_project();
    bks()
        .arg("list")
        .arg(project.path())
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("no indexes found"));
}

#[test]
fn build_under_existing_parent_index_is_refused() {
    let project = setup_project();
    fs::create_dir(project.path().join(".bks")).expect("failed to create fake index dir");
    let child = project.path().join("src");

    bks()
        .arg("build")
        .arg(&child)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("governing index already exists"));
}

#[test]
fn search_on_nonexistent_path_fails() {
    bks()
        .arg("anything")
        .arg("/nonexistent/path/that/should/never/exist")
        .assert()
        .failure()
        .code(2);
}
