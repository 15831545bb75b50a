//! Captured output of a single cell execution.

use std::fmt;

use serde::Serialize;

/// An exception raised while executing a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellError {
    /// Exception type name, e.g. `ZeroDivisionError`.
    pub kind: String,
    pub message: String,
    /// Line within the cell (1-based) where the exception was raised.
    pub line: Option<usize>,
}

impl CellError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)?;
        } else {
            write!(f, "{}: {}", self.kind, self.message)?;
        }
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        Ok(())
    }
}

/// What a cell produced: its result value, printed text and any error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CellOutput {
    /// Repr of the final expression's value, when it is not `None`.
    pub result: Option<String>,
    /// Text written by `print` during the execution.
    pub stdout: String,
    pub error: Option<CellError>,
}

impl CellOutput {
    pub fn failed(error: CellError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_none() && self.stdout.is_empty() && self.error.is_none()
    }

    /// Everything the cell showed, in the order a terminal would show it.
    pub fn rendered(&self) -> String {
        let mut text = self.stdout.clone();
        for extra in [
            self.result.clone(),
            self.error.as_ref().map(ToString::to_string),
        ]
        .into_iter()
        .flatten()
        {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&extra);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_joins_parts() {
        let output = CellOutput {
            result: Some("42".into()),
            stdout: "hello".into(),
            error: None,
        };
        assert_eq!(output.rendered(), "hello\n42");

        let failed = CellOutput::failed(CellError::new("ValueError", "bad", Some(3)));
        assert_eq!(failed.rendered(), "ValueError: bad (line 3)");
        assert!(failed.is_error());
        assert!(CellOutput::default().is_empty());
    }
}
