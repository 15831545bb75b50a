//! Integration tests for the read-only JSON projections of a session.

use std::fs;

use plaque_core::{Error, FileSource, NotebookSession, Resource, SessionConfig};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

const NOTEBOOK: &str = "\
# %% Setup
import math
radius = 2

# %% [markdown]
# Compute the area.

# %%
area = math.pi * radius ** 2
print(round(area, 2))

# %%
ratio = area / missing
";

/// A notebook file in a temporary directory, loaded into a session.
struct TestSession {
    _temp_dir: TempDir,
    session: NotebookSession,
}

impl TestSession {
    fn new(source: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("notebook.py");
        fs::write(&path, source).expect("Failed to write notebook");

        let mut session = NotebookSession::new(SessionConfig::default())
            .with_source(Box::new(FileSource::new(&path)));
        session.reload().expect("notebook should load");
        Self {
            _temp_dir: temp_dir,
            session,
        }
    }
}

// =============================================================================
// Projections
// =============================================================================

#[test]
fn test_cells_projection() {
    let test = TestSession::new(NOTEBOOK);
    let cells = test.session.read(Resource::Cells).unwrap();

    assert_eq!(cells["total"], 4);
    assert_eq!(cells["revision"], 1);
    assert_eq!(cells["cells"][0]["title"], "Setup");
    assert_eq!(cells["cells"][1]["kind"], "markdown");
    assert_eq!(cells["cells"][2]["depends_on"], serde_json::json!([0]));
    assert_eq!(cells["cells"][2]["status"], "success");
    assert_eq!(cells["cells"][3]["status"], "error");
}

#[test]
fn test_cell_input_and_output() {
    let test = TestSession::new(NOTEBOOK);

    let input = test.session.read_path("notebook://cell/2/input").unwrap();
    assert_eq!(input, "area = math.pi * radius ** 2\nprint(round(area, 2))");

    let output = test.session.read_path("cell/2/output").unwrap();
    assert_eq!(output["stdout"], "12.57\n");
    assert_eq!(output["execution_counter"], 1);
    assert!(output["error"].is_null());
}

#[test]
fn test_errors_projection_maps_document_lines() {
    let test = TestSession::new(NOTEBOOK);
    let errors = test.session.read(Resource::Errors).unwrap();

    assert_eq!(errors["total_errors"], 1);
    let error = &errors["errors"][0];
    assert_eq!(error["cell_index"], 3);
    assert_eq!(error["kind"], "NameError");
    assert_eq!(error["line"], 1);
    assert_eq!(error["document_line"], 13);
}

#[test]
fn test_dependencies_projection() {
    let test = TestSession::new(NOTEBOOK);
    let deps = test.session.read(Resource::Dependencies).unwrap();

    assert_eq!(deps["variables"]["radius"]["defined_in_cell"], 0);
    assert_eq!(deps["variables"]["area"]["defined_in_cell"], 2);
    let edges = deps["edges"].as_array().unwrap();
    assert!(
        edges
            .iter()
            .all(|e| e["provider"].as_u64() < e["consumer"].as_u64())
    );
    assert!(edges.iter().any(|e| e["name"] == "math" && e["consumer"] == 2));

    assert_eq!(deps["chains"]["radius"], serde_json::json!([[0, 2]]));
    assert_eq!(deps["chains"]["area"], serde_json::json!([[2, 3]]));
    assert_eq!(deps["unused"], serde_json::json!([{ "cell": 3, "name": "ratio" }]));
}

#[test]
fn test_search_projection() {
    let test = TestSession::new(NOTEBOOK);

    let found = test.session.read_path("notebook://search/AREA").unwrap();
    let indices: Vec<u64> = found["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["index"].as_u64())
        .collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(found["results"][0]["kind"], "markdown");
    assert_eq!(found["query"], "AREA");

    let found = test.session.read(Resource::Search("math.pi".into())).unwrap();
    assert_eq!(found["total"], 1);
    assert_eq!(found["results"][0]["line_number"], 9);
    assert!(found["results"][0]["preview"].as_str().unwrap().starts_with("area = math.pi"));

    let none = test.session.read_path("search/nothing here").unwrap();
    assert_eq!(none["total"], 0);
}

#[test]
fn test_variables_and_state() {
    let test = TestSession::new(NOTEBOOK);

    let variables = test.session.read(Resource::Variables).unwrap();
    let names: Vec<&str> = variables["variables"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["name"].as_str())
        .collect();
    assert!(names.contains(&"radius"));
    assert!(names.contains(&"area"));
    assert!(!names.contains(&"ratio"));

    let state = test.session.read(Resource::State).unwrap();
    assert_eq!(state["code_cells"], 3);
    assert_eq!(state["markdown_cells"], 1);
    assert_eq!(state["execution_summary"]["successful"], 2);
    assert_eq!(state["execution_summary"]["failed"], 1);
    assert!(state["parse_error"].is_null());
}

#[test]
fn test_unknown_cell_and_path() {
    let test = TestSession::new(NOTEBOOK);
    assert!(matches!(
        test.session.read(Resource::Cell(9)),
        Err(Error::CellNotFound(9))
    ));
    assert!(matches!(
        test.session.read_path("cell/0/logs"),
        Err(Error::InvalidResource(_))
    ));
}
