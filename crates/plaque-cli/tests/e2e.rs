//! End-to-end tests for plaque CLI commands.
//!
//! These tests verify that the CLI produces expected output
//! when run against real notebook files.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Create a temporary directory with a test notebook.
struct TestNotebook {
    _temp_dir: TempDir,
    notebook_path: PathBuf,
}

impl TestNotebook {
    fn new(filename: &str, source: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let notebook_path = temp_dir.path().join(filename);
        fs::write(&notebook_path, source).expect("Failed to write notebook");

        Self {
            _temp_dir: temp_dir,
            notebook_path,
        }
    }

    fn path(&self) -> &str {
        self.notebook_path.to_str().expect("temp path is UTF-8")
    }
}

fn plaque() -> Command {
    Command::cargo_bin("plaque").expect("Failed to find plaque binary")
}

/// A three-cell chain.
fn simple_notebook() -> &'static str {
    "\
# %% Base
base = 21

# %%
doubled = base * 2

# %%
print(f\"answer: {doubled}\")
"
}

/// A notebook whose second cell raises.
fn failing_notebook() -> &'static str {
    "\
values = [1, 2, 3]

# %%
total = sum(values) / 0

# %%
print(total)

# %%
print(len(values))
"
}

// =============================================================================
// plaque run Tests
// =============================================================================

#[test]
fn test_run_nonexistent_notebook() {
    plaque()
        .args(["run", "/nonexistent/notebook.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_run_simple_notebook() {
    let notebook = TestNotebook::new("simple.py", simple_notebook());

    plaque()
        .args(["run", notebook.path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("answer: 42"))
        .stdout(predicate::str::contains("3 cells"))
        .stdout(predicate::str::contains("Completed"));
}

#[test]
fn test_run_specific_cell() {
    let notebook = TestNotebook::new("simple.py", simple_notebook());

    plaque()
        .args(["run", notebook.path(), "--cell", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("answer: 42"));
}

#[test]
fn test_run_nonexistent_cell() {
    let notebook = TestNotebook::new("simple.py", simple_notebook());

    plaque()
        .args(["run", notebook.path(), "--cell", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_run_reports_errors_and_blocked_cells() {
    let notebook = TestNotebook::new("failing.py", failing_notebook());

    plaque()
        .args(["run", notebook.path()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ZeroDivisionError"))
        .stdout(predicate::str::contains("Skipped"))
        .stdout(predicate::str::contains("1 blocked, 1 failed"));
}

#[test]
fn test_run_parse_error_shows_hint() {
    let notebook = TestNotebook::new("broken.py", "x = 1\n\n# %%\ny = (\n");

    plaque()
        .args(["run", notebook.path()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse error"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_run_empty_notebook() {
    let notebook = TestNotebook::new("empty.py", "\n\n");

    plaque()
        .args(["run", notebook.path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cells found"));
}

// =============================================================================
// plaque check Tests
// =============================================================================

#[test]
fn test_check_lists_dependencies() {
    let notebook = TestNotebook::new("simple.py", simple_notebook());

    plaque()
        .args(["check", notebook.path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 cells (3 code, 0 markdown), 2 dependencies"))
        .stdout(predicate::str::contains("every name resolves"));
}

#[test]
fn test_check_strict_fails_on_unresolved_names() {
    let notebook = TestNotebook::new("typo.py", "count = 1\n\n# %%\nprint(cuont)\n");

    plaque()
        .args(["check", notebook.path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("'cuont'"));

    plaque()
        .args(["check", notebook.path(), "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 unresolved name"));
}

#[test]
fn test_check_json_is_valid() {
    let notebook = TestNotebook::new("simple.py", simple_notebook());

    let output = plaque()
        .args(["check", notebook.path(), "--json"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("check --json should print JSON");
    assert_eq!(report["cells"].as_array().map(Vec::len), Some(3));
    assert_eq!(report["edges"][0]["name"], "base");
}

#[test]
fn test_check_reports_chains_and_unused_definitions() {
    let notebook = TestNotebook::new("simple.py", simple_notebook());

    plaque()
        .args(["check", notebook.path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("base: 0 → 1"))
        .stdout(predicate::str::contains("Unused definitions:").not());

    let output = plaque()
        .args(["check", notebook.path(), "--json"])
        .output()
        .expect("Failed to execute command");
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["chains"]["doubled"], serde_json::json!([[1, 2]]));
    assert_eq!(report["unused"], serde_json::json!([]));

    let notebook = TestNotebook::new("dead.py", "scratch = 1\n\n# %%\nprint('hi')\n");
    plaque()
        .args(["check", notebook.path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("cell 0 defines 'scratch', which no later cell reads"));
}

// =============================================================================
// plaque query Tests
// =============================================================================

#[test]
fn test_query_search() {
    let notebook = TestNotebook::new("simple.py", simple_notebook());

    let output = plaque()
        .args(["query", notebook.path(), "notebook://search/DOUBLED"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["total"], 2);
    assert_eq!(value["results"][0]["index"], 1);
    assert_eq!(value["results"][1]["preview"], "print(f\"answer: {doubled}\")");
}

#[test]
fn test_query_cell_output() {
    let notebook = TestNotebook::new("simple.py", simple_notebook());

    let output = plaque()
        .args(["query", notebook.path(), "notebook://cell/2/output"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["stdout"], "answer: 42\n");
    assert_eq!(value["status"], "success");
}

#[test]
fn test_query_errors_of_failing_notebook() {
    let notebook = TestNotebook::new("failing.py", failing_notebook());

    let output = plaque()
        .args(["query", notebook.path(), "errors"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["total_errors"], 2);
    assert_eq!(value["errors"][0]["kind"], "ZeroDivisionError");
    assert_eq!(value["errors"][1]["blocked_by"], 1);
}

#[test]
fn test_query_list_resources() {
    let notebook = TestNotebook::new("simple.py", simple_notebook());

    plaque()
        .args(["query", notebook.path(), "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("notebook://cell/2/output"))
        .stdout(predicate::str::contains("notebook://variables"));
}

#[test]
fn test_query_invalid_resource() {
    let notebook = TestNotebook::new("simple.py", simple_notebook());

    plaque()
        .args(["query", notebook.path(), "cell/0/logs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown resource"));
}
