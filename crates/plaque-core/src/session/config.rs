//! Session configuration.

use crate::execute::InterpreterConfig;

/// Settings of a notebook session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum nesting of function calls inside a cell.
    pub max_depth: usize,
    /// Echo cell `print` output to the terminal while it runs.
    pub echo_stdout: bool,
    /// Longest value repr kept in outputs and projections.
    pub repr_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let interpreter = InterpreterConfig::default();
        Self {
            max_depth: interpreter.max_depth,
            echo_stdout: interpreter.echo_stdout,
            repr_limit: interpreter.repr_limit,
        }
    }
}

impl SessionConfig {
    pub fn interpreter_config(&self) -> InterpreterConfig {
        InterpreterConfig {
            max_depth: self.max_depth,
            echo_stdout: self.echo_stdout,
            repr_limit: self.repr_limit,
        }
    }
}
