//! The notebook session: one document, one environment, one engine.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use super::config::SessionConfig;
use super::source::SourceProvider;
use crate::error::{Error, ParseError, Result};
use crate::execute::{
    ExecutionBackend, ExecutionCallback, ExecutionPlan, IncrementalEngine, Interpreter, RunReport,
};
use crate::graph::{Cell, Notebook};
use crate::state::{Environment, ExecutionRecord};

/// Unique identifier of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The last revision that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub error: ParseError,
    /// Index of the cell containing the error.
    pub failed_index: usize,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell {}: {}", self.failed_index, self.error)
    }
}

/// An incrementally executed notebook.
///
/// [`update`](Self::update) is the only way to change the session. Every
/// other method is a read-only view of the last successful revision.
pub struct NotebookSession {
    id: SessionId,
    config: SessionConfig,
    source: Option<Box<dyn SourceProvider>>,
    notebook: Notebook,
    engine: IncrementalEngine,
    last_error: Option<ParseFailure>,
    last_report: Option<RunReport>,
}

impl NotebookSession {
    /// Create a session that runs cells with the built-in interpreter.
    pub fn new(config: SessionConfig) -> Self {
        let backend = Interpreter::new(config.interpreter_config());
        Self::with_backend(config, Box::new(backend))
    }

    /// Create a session that runs cells with a custom backend.
    pub fn with_backend(config: SessionConfig, backend: Box<dyn ExecutionBackend>) -> Self {
        let id = SessionId::new();
        tracing::debug!("Created session {}", id);
        Self {
            id,
            config,
            source: None,
            notebook: Notebook::default(),
            engine: IncrementalEngine::new(backend),
            last_error: None,
            last_report: None,
        }
    }

    /// Attach the provider read by [`reload`](Self::reload).
    pub fn with_source(mut self, source: Box<dyn SourceProvider>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn set_callback(&mut self, callback: Box<dyn ExecutionCallback>) {
        self.engine.set_callback(callback);
    }

    /// Parse a new revision of the document and run whatever became stale.
    ///
    /// A parse error leaves cells, records and environment untouched and is
    /// remembered as [`last_error`](Self::last_error).
    pub fn update(&mut self, source: &str) -> Result<RunReport> {
        let notebook = match Notebook::parse(source) {
            Ok(notebook) => notebook,
            Err(split) => {
                tracing::warn!("Parse error in cell {}: {}", split.failed_index, split.error);
                self.last_error = Some(ParseFailure {
                    error: split.error.clone(),
                    failed_index: split.failed_index,
                });
                return Err(Error::Parse(split.error));
            }
        };

        self.last_error = None;
        self.notebook = notebook;
        let report = self.engine.run(&self.notebook);
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Read the source provider and [`update`](Self::update) with its text.
    pub fn reload(&mut self) -> Result<RunReport> {
        let source = match &self.source {
            Some(provider) => {
                tracing::debug!("Reloading {}", provider.describe());
                provider.current_source()?
            }
            None => return Err(Error::NoSource),
        };
        self.update(&source)
    }

    /// Which cells would run if `source` were the next revision.
    pub fn preview(&self, source: &str) -> Result<ExecutionPlan> {
        let notebook = Notebook::parse(source).map_err(|split| Error::Parse(split.error))?;
        Ok(self.engine.plan(&notebook))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    /// Cells of the last good revision, each with its execution record.
    pub fn cells(&self) -> impl Iterator<Item = (&Cell, Option<&ExecutionRecord>)> {
        self.notebook
            .cells()
            .iter()
            .map(|cell| (cell, self.engine.store().get(cell.index)))
    }

    pub fn record(&self, index: usize) -> Option<&ExecutionRecord> {
        self.engine.store().get(index)
    }

    pub fn environment(&self) -> &Environment {
        self.engine.environment()
    }

    /// Number of successful revisions so far.
    pub fn revision(&self) -> u64 {
        self.engine.revision()
    }

    pub fn total_executions(&self) -> u64 {
        self.engine.store().total_executions()
    }

    pub fn last_error(&self) -> Option<&ParseFailure> {
        self.last_error.as_ref()
    }

    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    /// Names bound in the environment that no current cell defines.
    pub fn drifted_names(&self) -> Vec<String> {
        let defined: BTreeSet<&str> = self
            .notebook
            .cells()
            .iter()
            .flat_map(|cell| cell.defines.iter().map(String::as_str))
            .collect();
        self.environment()
            .names()
            .into_iter()
            .filter(|name| !defined.contains(name.as_str()))
            .collect()
    }
}

impl fmt::Debug for NotebookSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotebookSession")
            .field("id", &self.id)
            .field("cells", &self.notebook.len())
            .field("engine", &self.engine)
            .field("last_error", &self.last_error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FileSource;

    #[test]
    fn test_parse_error_keeps_previous_revision() {
        let mut session = NotebookSession::new(SessionConfig::default());
        session.update("x = 1\n# %%\ny = x + 1\n").unwrap();

        let err = session.update("x = 1\n# %%\ny = (\n").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(session.notebook().len(), 2);
        assert_eq!(session.last_error().map(|f| f.failed_index), Some(1));
        assert_eq!(session.revision(), 1);

        session.update("x = 1\n# %%\ny = x + 2\n").unwrap();
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_drifted_names() {
        let mut session = NotebookSession::new(SessionConfig::default());
        session.update("a = 1\n# %%\nb = 2\n").unwrap();
        session.update("a = 1\n").unwrap();
        assert_eq!(session.drifted_names(), vec!["b".to_string()]);
    }

    #[test]
    fn test_reload_reads_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nb.py");
        std::fs::write(&path, "x = 41\n# %%\nx + 1\n").unwrap();

        let mut session = NotebookSession::new(SessionConfig::default())
            .with_source(Box::new(FileSource::new(&path)));
        let report = session.reload().unwrap();
        assert_eq!(report.executed, vec![0, 1]);
        assert_eq!(session.record(1).unwrap().output.result.as_deref(), Some("42"));
    }

    #[test]
    fn test_reload_without_source() {
        let mut session = NotebookSession::new(SessionConfig::default());
        assert!(matches!(session.reload(), Err(Error::NoSource)));
    }

    #[test]
    fn test_preview_does_not_run() {
        let mut session = NotebookSession::new(SessionConfig::default());
        session.update("x = 1\n# %%\ny = x\n").unwrap();
        let plan = session.preview("x = 2\n# %%\ny = x\n").unwrap();
        assert_eq!(plan.stale_cells(), vec![0, 1]);
        assert_eq!(session.total_executions(), 2);
    }
}
