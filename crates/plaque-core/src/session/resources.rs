//! Read-only JSON projections of a session, addressed by path.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Value, json};

use super::notebook::NotebookSession;
use crate::error::{Error, Result};
use crate::graph::Cell;
use crate::state::ExecutionStatus;

/// URI scheme accepted in front of resource paths.
pub const SCHEME: &str = "notebook://";

/// Longest cell preview in search results, in characters.
pub const PREVIEW_CHARS: usize = 100;

/// A projection of the session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Cells,
    Cell(usize),
    CellInput(usize),
    CellOutput(usize),
    State,
    Errors,
    Dependencies,
    Outputs,
    Variables,
    /// Cells whose source contains the query, ignoring case.
    Search(String),
}

impl Resource {
    /// Every resource available for a notebook with `cell_count` cells.
    pub fn all(cell_count: usize) -> Vec<Resource> {
        let mut resources = vec![
            Resource::Cells,
            Resource::State,
            Resource::Errors,
            Resource::Dependencies,
            Resource::Outputs,
            Resource::Variables,
        ];
        for index in 0..cell_count {
            resources.extend([
                Resource::Cell(index),
                Resource::CellInput(index),
                Resource::CellOutput(index),
            ]);
        }
        resources
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(path: &str) -> Result<Self> {
        let invalid = || Error::InvalidResource(path.to_string());
        let trimmed = path.strip_prefix(SCHEME).unwrap_or(path).trim_start_matches('/');
        if let Some(query) = trimmed.strip_prefix("search/") {
            return if query.is_empty() {
                Err(invalid())
            } else {
                Ok(Resource::Search(query.to_string()))
            };
        }
        let trimmed = trimmed.trim_end_matches('/');
        let parts: Vec<&str> = trimmed.split('/').collect();
        match parts.as_slice() {
            ["cells"] => Ok(Resource::Cells),
            ["state"] => Ok(Resource::State),
            ["errors"] => Ok(Resource::Errors),
            ["dependencies"] => Ok(Resource::Dependencies),
            ["outputs"] => Ok(Resource::Outputs),
            ["variables"] => Ok(Resource::Variables),
            ["cell", index, rest @ ..] => {
                let index = index.parse().map_err(|_| invalid())?;
                match rest {
                    [] => Ok(Resource::Cell(index)),
                    ["input"] => Ok(Resource::CellInput(index)),
                    ["output"] => Ok(Resource::CellOutput(index)),
                    _ => Err(invalid()),
                }
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Cells => write!(f, "cells"),
            Resource::Cell(i) => write!(f, "cell/{i}"),
            Resource::CellInput(i) => write!(f, "cell/{i}/input"),
            Resource::CellOutput(i) => write!(f, "cell/{i}/output"),
            Resource::State => write!(f, "state"),
            Resource::Errors => write!(f, "errors"),
            Resource::Dependencies => write!(f, "dependencies"),
            Resource::Outputs => write!(f, "outputs"),
            Resource::Variables => write!(f, "variables"),
            Resource::Search(query) => write!(f, "search/{query}"),
        }
    }
}

impl NotebookSession {
    /// Render a projection as JSON. Cell inputs are plain JSON strings.
    pub fn read(&self, resource: Resource) -> Result<Value> {
        match resource {
            Resource::Cells => {
                let cells: Vec<Value> = self.notebook().cells().iter().map(|c| self.cell_json(c)).collect();
                Ok(json!({
                    "revision": self.revision(),
                    "total": cells.len(),
                    "cells": cells,
                }))
            }
            Resource::Cell(index) => Ok(self.cell_json(self.cell_at(index)?)),
            Resource::CellInput(index) => Ok(Value::String(self.cell_at(index)?.source.clone())),
            Resource::CellOutput(index) => {
                let cell = self.cell_at(index)?;
                Ok(self.output_json(cell))
            }
            Resource::State => Ok(self.state_json()),
            Resource::Errors => Ok(self.errors_json()),
            Resource::Dependencies => Ok(self.dependencies_json()),
            Resource::Outputs => {
                let outputs: Vec<Value> = self
                    .notebook()
                    .cells()
                    .iter()
                    .filter(|cell| cell.is_code())
                    .filter(|cell| self.record(cell.index).is_some_and(|r| !r.output.is_empty()))
                    .map(|cell| self.output_json(cell))
                    .collect();
                Ok(json!({
                    "total_outputs": outputs.len(),
                    "outputs": outputs,
                }))
            }
            Resource::Variables => {
                let variables: Vec<_> = self
                    .environment()
                    .variables(self.config().repr_limit)
                    .into_iter()
                    .filter(|v| !v.name.starts_with('_'))
                    .collect();
                Ok(json!({
                    "total_variables": variables.len(),
                    "variables": variables,
                    "drifted": self.drifted_names(),
                }))
            }
            Resource::Search(query) => Ok(self.search_json(&query)),
        }
    }

    /// Parse `path` and render it.
    pub fn read_path(&self, path: &str) -> Result<Value> {
        self.read(path.parse()?)
    }

    fn cell_at(&self, index: usize) -> Result<&Cell> {
        self.notebook().cell(index).ok_or(Error::CellNotFound(index))
    }

    fn cell_json(&self, cell: &Cell) -> Value {
        let graph = self.notebook().graph();
        let record = self.record(cell.index);
        json!({
            "index": cell.index,
            "kind": cell.kind,
            "title": cell.title(),
            "span": cell.span,
            "metadata": cell.metadata,
            "source": cell.source,
            "content_hash": cell.content_hash,
            "defines": cell.defines,
            "uses": cell.uses,
            "depends_on": graph.providers(cell.index),
            "dependents": graph.dependents(cell.index),
            "notes": cell.notes,
            "status": record.map(|r| r.status).unwrap_or(ExecutionStatus::NotRun),
            "execution_counter": record.map(|r| r.execution_counter).unwrap_or(0),
            "record": record,
        })
    }

    fn output_json(&self, cell: &Cell) -> Value {
        let record = self.record(cell.index);
        json!({
            "cell_index": cell.index,
            "line_number": cell.span.start_line,
            "execution_counter": record.map(|r| r.execution_counter).unwrap_or(0),
            "status": record.map(|r| r.status).unwrap_or(ExecutionStatus::NotRun),
            "result": record.and_then(|r| r.output.result.clone()),
            "stdout": record.map(|r| r.output.stdout.clone()).unwrap_or_default(),
            "error": record.and_then(|r| r.output.error.clone()),
        })
    }

    fn state_json(&self) -> Value {
        let cells = self.notebook().cells();
        let count = |status: ExecutionStatus| {
            cells
                .iter()
                .filter(|c| c.is_code() && self.record(c.index).map(|r| r.status) == Some(status))
                .count()
        };
        let parse_error = self.last_error().map(|failure| {
            json!({
                "line": failure.error.line,
                "column": failure.error.column,
                "message": failure.error.message,
                "failed_index": failure.failed_index,
            })
        });
        json!({
            "session": self.id().to_string(),
            "revision": self.revision(),
            "total_cells": cells.len(),
            "code_cells": cells.iter().filter(|c| c.is_code()).count(),
            "markdown_cells": cells.iter().filter(|c| !c.is_code()).count(),
            "execution_summary": {
                "total_executions": self.total_executions(),
                "successful": count(ExecutionStatus::Success),
                "failed": count(ExecutionStatus::Error),
                "blocked": count(ExecutionStatus::Blocked),
                "not_run": cells.iter().filter(|c| c.is_code()).count()
                    - count(ExecutionStatus::Success)
                    - count(ExecutionStatus::Error)
                    - count(ExecutionStatus::Blocked),
            },
            "last_run": self.last_report(),
            "parse_error": parse_error,
        })
    }

    fn errors_json(&self) -> Value {
        let errors: Vec<Value> = self
            .notebook()
            .cells()
            .iter()
            .filter_map(|cell| {
                let record = self.record(cell.index)?;
                let error = record.output.error.as_ref()?;
                Some(json!({
                    "cell_index": cell.index,
                    "status": record.status,
                    "kind": error.kind,
                    "message": error.message,
                    "line": error.line,
                    "document_line": error.line.map(|line| cell.span.start_line + line - 1),
                    "blocked_by": record.blocked_by,
                    "execution_counter": record.execution_counter,
                    "source": cell.source,
                }))
            })
            .collect();
        json!({
            "total_errors": errors.len(),
            "errors": errors,
            "parse_error": self.last_error().map(|failure| failure.to_string()),
        })
    }

    fn dependencies_json(&self) -> Value {
        let graph = self.notebook().graph();
        let mut variables = BTreeMap::new();
        let mut cells = Vec::new();
        for cell in self.notebook().cells().iter().filter(|c| c.is_code()) {
            cells.push(json!({
                "cell_index": cell.index,
                "line_number": cell.span.start_line,
                "provides": cell.defines,
                "requires": cell.uses,
                "depends_on": graph.providers(cell.index),
                "notes": cell.notes.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }));
            for name in &cell.defines {
                variables.insert(
                    name.clone(),
                    json!({
                        "defined_in_cell": cell.index,
                        "line_number": cell.span.start_line,
                        "execution_counter": self.record(cell.index).map(|r| r.execution_counter).unwrap_or(0),
                    }),
                );
            }
        }
        json!({
            "cell_dependencies": cells,
            "edges": graph.edges(),
            "variables": variables,
            "chains": graph.chains(),
            "unused": graph.unused_definitions(),
        })
    }

    fn search_json(&self, query: &str) -> Value {
        let needle = query.to_lowercase();
        let results: Vec<Value> = self
            .notebook()
            .cells()
            .iter()
            .filter(|cell| cell.source.to_lowercase().contains(&needle))
            .map(|cell| {
                json!({
                    "index": cell.index,
                    "kind": cell.kind,
                    "line_number": cell.span.start_line,
                    "preview": preview(&cell.source),
                })
            })
            .collect();
        tracing::debug!(query, matches = results.len(), "searched cells");
        json!({
            "query": query,
            "total": results.len(),
            "results": results,
        })
    }
}

/// The first [`PREVIEW_CHARS`] characters of `source`, marked when cut.
fn preview(source: &str) -> String {
    match source.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &source[..end]),
        None => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paths() {
        assert_eq!("cells".parse::<Resource>().unwrap(), Resource::Cells);
        assert_eq!("notebook://cell/3/output".parse::<Resource>().unwrap(), Resource::CellOutput(3));
        assert_eq!("/cell/0/".parse::<Resource>().unwrap(), Resource::Cell(0));
        assert!(matches!("cell/x".parse::<Resource>(), Err(Error::InvalidResource(_))));
        assert!(matches!("cell/1/stderr".parse::<Resource>(), Err(Error::InvalidResource(_))));
        assert!(matches!("nope".parse::<Resource>(), Err(Error::InvalidResource(_))));
        assert_eq!(
            "notebook://search/a/b ".parse::<Resource>().unwrap(),
            Resource::Search("a/b ".to_string())
        );
        assert!(matches!("search/".parse::<Resource>(), Err(Error::InvalidResource(_))));
    }

    #[test]
    fn test_preview_cuts_long_sources() {
        assert_eq!(preview("short"), "short");
        let long = "é".repeat(150);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 3);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_display_round_trips_listing() {
        for resource in Resource::all(2) {
            assert_eq!(resource.to_string().parse::<Resource>().unwrap(), resource);
        }
        assert_eq!(Resource::all(2).len(), 12);
    }
}
