//! The seam between the engine and whatever actually runs cell code.

use super::format;
use super::interpreter::Interpreter;
use crate::state::{CellError, CellOutput, Environment};
use crate::syntax::parse;

/// Runs the source of one code cell against the shared environment.
///
/// Implementations never fail: every problem is reported through the
/// returned output's `error`.
pub trait ExecutionBackend {
    fn execute(&mut self, source: &str, env: &mut Environment) -> CellOutput;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "custom"
    }
}

impl ExecutionBackend for Interpreter {
    fn execute(&mut self, source: &str, env: &mut Environment) -> CellOutput {
        let module = match parse(source) {
            Ok(module) => module,
            Err(e) => {
                return CellOutput::failed(CellError::new("SyntaxError", e.message, Some(e.line)));
            }
        };

        let outcome = self.run_suite(&module.body, env.namespace());
        let mut output = CellOutput::default();
        match outcome {
            Ok(Some(value)) if !value.is_none() => match self.repr(&value) {
                Ok(text) => output.result = Some(format::truncate(&text, self.config().repr_limit)),
                Err(e) => output.error = Some(CellError::new(e.kind_name(), e.message(), e.line)),
            },
            Ok(_) => {}
            Err(e) => output.error = Some(CellError::new(e.kind_name(), e.message(), e.line)),
        }
        output.stdout = self.take_stdout();
        output
    }

    fn name(&self) -> &str {
        "interpreter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::InterpreterConfig;

    #[test]
    fn test_result_and_stdout_are_captured() {
        let mut env = Environment::new();
        let mut interpreter = Interpreter::default();
        let output = interpreter.execute("print('hi')\n1 + 1", &mut env);
        assert_eq!(output.stdout, "hi\n");
        assert_eq!(output.result.as_deref(), Some("2"));
        assert!(output.error.is_none());
    }

    #[test]
    fn test_none_result_is_not_shown() {
        let mut env = Environment::new();
        let output = Interpreter::default().execute("x = 5\nNone", &mut env);
        assert!(output.is_empty());
        assert!(env.contains("x"));
    }

    #[test]
    fn test_errors_keep_partial_stdout_and_line() {
        let mut env = Environment::new();
        let output = Interpreter::default().execute("print('before')\nx = 1\n1 / 0\n", &mut env);
        assert_eq!(output.stdout, "before\n");
        let error = output.error.unwrap();
        assert_eq!(error.kind, "ZeroDivisionError");
        assert_eq!(error.message, "division by zero");
        assert_eq!(error.line, Some(3));
        assert!(env.contains("x"));
    }

    #[test]
    fn test_long_results_are_truncated() {
        let mut env = Environment::new();
        let mut interpreter = Interpreter::new(InterpreterConfig {
            repr_limit: 10,
            ..InterpreterConfig::default()
        });
        let output = interpreter.execute("list(range(100))", &mut env);
        assert_eq!(output.result.as_deref(), Some("[0, 1, 2, ..."));
    }

    #[test]
    fn test_syntax_errors_are_reported() {
        let mut env = Environment::new();
        let output = Interpreter::default().execute("x = (", &mut env);
        assert_eq!(output.error.map(|e| e.kind), Some("SyntaxError".to_string()));
    }
}
