//! Error types for plaque-core.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Result type for plaque-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A syntax error with its location in the source text.
///
/// Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }

    /// Shift the error location by a line offset (for errors found in a
    /// region that starts further down in the document).
    pub fn offset_lines(mut self, offset: usize) -> Self {
        self.line += offset;
        self
    }
}

/// Errors that can occur in plaque-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Source text is not syntactically valid.
    #[error("parse error at {0}")]
    Parse(#[from] ParseError),

    /// Cell index out of range.
    #[error("cell not found: {0}")]
    CellNotFound(usize),

    /// Unknown projection path.
    #[error("unknown resource: {0}")]
    InvalidResource(String),

    /// `reload()` on a session created without a source provider.
    #[error("session has no source provider")]
    NoSource,

    /// Failed to read the notebook source.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Render the error together with a short recovery hint for terminal users.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::Parse(_) => {
                "fix the syntax error and save again; the last good revision is still shown"
            }
            Error::CellNotFound(_) => "run `plaque check` to list the cells of the notebook",
            Error::InvalidResource(_) => {
                "valid resources: cells, cell/N, cell/N/input, cell/N/output, state, errors, dependencies, outputs, variables"
            }
            Error::NoSource => "create the session with a file source or call update() directly",
            Error::Read { .. } | Error::Io(_) => "check that the notebook path exists and is readable",
            Error::Json(_) => return self.to_string(),
        };
        format!("{self}\n  hint: {hint}")
    }
}
