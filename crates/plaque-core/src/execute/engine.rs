//! Incremental execution engine.
//!
//! On every revision the engine compares each cell with the record stored at
//! its index, derives the stale set through the dependency graph and runs
//! only those cells, in document order, against the shared environment.

use std::fmt;
use std::time::Instant;

use serde::Serialize;

use super::backend::ExecutionBackend;
use super::context::ExecutionCallback;
use crate::graph::{Cell, Notebook};
use crate::state::{
    CellError, CellOutput, Environment, ExecutionRecord, ExecutionStatus, ExecutionStore,
};

/// Error kind of the placeholder output of a blocked cell.
pub const UPSTREAM_ERROR: &str = "UpstreamError";

/// Why a cell has to be brought up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StaleReason {
    /// No record exists at this index.
    New,
    /// The source text changed.
    ContentChanged,
    /// The cell switched between code and markdown.
    KindChanged,
    /// The stored record never produced a result for this content.
    NeverRan,
    /// A used name now resolves to a different or edited provider.
    InputsChanged,
    /// A provider is itself stale.
    UpstreamStale { provider: usize },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::New => write!(f, "new cell"),
            StaleReason::ContentChanged => write!(f, "source changed"),
            StaleReason::KindChanged => write!(f, "kind changed"),
            StaleReason::NeverRan => write!(f, "never ran"),
            StaleReason::InputsChanged => write!(f, "inputs changed"),
            StaleReason::UpstreamStale { provider } => write!(f, "cell {provider} is stale"),
        }
    }
}

/// Per-cell staleness of one revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    reasons: Vec<Option<StaleReason>>,
}

impl ExecutionPlan {
    /// Why cell `index` is stale, or `None` when its record can be reused.
    pub fn reason(&self, index: usize) -> Option<StaleReason> {
        self.reasons.get(index).copied().flatten()
    }

    pub fn is_stale(&self, index: usize) -> bool {
        self.reason(index).is_some()
    }

    /// Stale cell indices in ascending order.
    pub fn stale_cells(&self) -> Vec<usize> {
        (0..self.reasons.len()).filter(|&i| self.is_stale(i)).collect()
    }

    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }
}

/// Summary of one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub revision: u64,
    /// Cells that were executed, in execution order.
    pub executed: Vec<usize>,
    /// Cells whose previous record was kept.
    pub reused: Vec<usize>,
    /// Stale cells skipped because a provider failed.
    pub blocked: Vec<usize>,
    /// Executed cells that raised.
    pub failed: Vec<usize>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty()
    }
}

/// Owns the execution store, the environment and the backend of a session.
pub struct IncrementalEngine {
    backend: Box<dyn ExecutionBackend>,
    store: ExecutionStore,
    env: Environment,
    callback: Option<Box<dyn ExecutionCallback>>,
    revision: u64,
}

impl IncrementalEngine {
    pub fn new(backend: Box<dyn ExecutionBackend>) -> Self {
        Self {
            backend,
            store: ExecutionStore::new(),
            env: Environment::new(),
            callback: None,
            revision: 0,
        }
    }

    pub fn set_callback(&mut self, callback: Box<dyn ExecutionCallback>) {
        self.callback = Some(callback);
    }

    pub fn store(&self) -> &ExecutionStore {
        &self.store
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Number of completed runs.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Compute which cells of `notebook` are stale against the stored records.
    pub fn plan(&self, notebook: &Notebook) -> ExecutionPlan {
        let mut reasons: Vec<Option<StaleReason>> = Vec::with_capacity(notebook.len());
        for cell in notebook.cells() {
            let direct = self.direct_reason(cell, notebook.inputs_fingerprint(cell.index));
            // Providers always precede their consumers, so their entries are final.
            let reason = direct.or_else(|| {
                notebook
                    .graph()
                    .providers(cell.index)
                    .into_iter()
                    .find(|&provider| reasons[provider].is_some())
                    .map(|provider| StaleReason::UpstreamStale { provider })
            });
            reasons.push(reason);
        }
        ExecutionPlan { reasons }
    }

    fn direct_reason(&self, cell: &Cell, fingerprint: u64) -> Option<StaleReason> {
        let Some(record) = self.store.get(cell.index) else {
            return Some(StaleReason::New);
        };
        if record.last_content_hash != cell.content_hash {
            Some(StaleReason::ContentChanged)
        } else if record.kind != cell.kind {
            Some(StaleReason::KindChanged)
        } else if cell.is_code()
            && matches!(record.status, ExecutionStatus::NotRun | ExecutionStatus::Blocked)
        {
            Some(StaleReason::NeverRan)
        } else if record.inputs_fingerprint != fingerprint {
            Some(StaleReason::InputsChanged)
        } else {
            None
        }
    }

    /// Bring every cell of `notebook` up to date.
    ///
    /// Cell exceptions are captured in the store and never returned.
    pub fn run(&mut self, notebook: &Notebook) -> RunReport {
        let plan = self.plan(notebook);
        self.revision += 1;
        let mut report = RunReport {
            revision: self.revision,
            ..RunReport::default()
        };

        for cell in notebook.cells() {
            let Some(reason) = plan.reason(cell.index) else {
                report.reused.push(cell.index);
                continue;
            };
            let fingerprint = notebook.inputs_fingerprint(cell.index);
            let counter = self
                .store
                .get(cell.index)
                .map(|record| record.execution_counter)
                .unwrap_or(0);

            if !cell.is_code() {
                let record = ExecutionRecord {
                    execution_counter: counter,
                    ..ExecutionRecord::not_run(cell.content_hash, cell.kind, fingerprint)
                };
                self.store.set(cell.index, record);
                continue;
            }

            let failed_provider = notebook
                .graph()
                .providers(cell.index)
                .into_iter()
                .find(|&provider| self.store.status(provider).is_failure());
            if let Some(provider) = failed_provider {
                self.block(cell, provider, counter, fingerprint);
                report.blocked.push(cell.index);
                continue;
            }

            tracing::debug!("Executing cell {} ({})", cell.index, reason);
            if let Some(callback) = &self.callback {
                callback.on_cell_started(cell);
            }

            let started = Instant::now();
            let output = self.backend.execute(&cell.source, &mut self.env);
            let duration = started.elapsed();

            let status = match &output.error {
                Some(error) => {
                    tracing::debug!("Cell {} raised {}", cell.index, error);
                    if let Some(callback) = &self.callback {
                        callback.on_cell_error(cell, error);
                    }
                    report.failed.push(cell.index);
                    ExecutionStatus::Error
                }
                None => {
                    if let Some(callback) = &self.callback {
                        callback.on_cell_completed(cell, &output);
                    }
                    ExecutionStatus::Success
                }
            };
            report.executed.push(cell.index);

            self.store.set(
                cell.index,
                ExecutionRecord {
                    last_content_hash: cell.content_hash,
                    kind: cell.kind,
                    inputs_fingerprint: fingerprint,
                    execution_counter: counter + 1,
                    output,
                    status,
                    duration: Some(duration),
                    blocked_by: None,
                },
            );
        }

        self.store.truncate(notebook.len());
        tracing::info!(
            "Revision {}: {} executed, {} reused, {} blocked, {} failed (backend: {})",
            report.revision,
            report.executed.len(),
            report.reused.len(),
            report.blocked.len(),
            report.failed.len(),
            self.backend.name()
        );
        report
    }

    fn block(&mut self, cell: &Cell, provider: usize, counter: u64, fingerprint: u64) {
        tracing::debug!("Cell {} blocked by failed cell {}", cell.index, provider);
        if let Some(callback) = &self.callback {
            callback.on_cell_blocked(cell, provider);
        }
        let placeholder = CellError::new(
            UPSTREAM_ERROR,
            format!("cell {provider} failed; this cell was not run"),
            None,
        );
        self.store.set(
            cell.index,
            ExecutionRecord {
                last_content_hash: cell.content_hash,
                kind: cell.kind,
                inputs_fingerprint: fingerprint,
                execution_counter: counter,
                output: CellOutput::failed(placeholder),
                status: ExecutionStatus::Blocked,
                duration: None,
                blocked_by: Some(provider),
            },
        );
    }
}

impl fmt::Debug for IncrementalEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalEngine")
            .field("backend", &self.backend.name())
            .field("revision", &self.revision)
            .field("records", &self.store.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::execute::Interpreter;
    use crate::graph::CellKind;

    fn notebook(cells: &[&str]) -> Notebook {
        Notebook::parse(&cells.join("\n# %%\n")).unwrap()
    }

    fn counters(engine: &IncrementalEngine) -> Vec<u64> {
        engine.store().records().iter().map(|r| r.execution_counter).collect()
    }

    /// Records which sources were executed, delegating to the interpreter.
    struct Recording {
        inner: Interpreter,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl ExecutionBackend for Recording {
        fn execute(&mut self, source: &str, env: &mut Environment) -> CellOutput {
            self.log.borrow_mut().push(source.to_string());
            self.inner.execute(source, env)
        }
    }

    #[test]
    fn test_first_run_executes_everything() {
        let mut engine = IncrementalEngine::new(Box::new(Interpreter::default()));
        let report = engine.run(&notebook(&["x = 1", "y = x + 1", "print(y)"]));
        assert_eq!(report.executed, vec![0, 1, 2]);
        assert_eq!(counters(&engine), vec![1, 1, 1]);
        assert_eq!(engine.store().get(2).unwrap().output.stdout, "2\n");
    }

    #[test]
    fn test_rerun_without_changes_reuses() {
        let mut engine = IncrementalEngine::new(Box::new(Interpreter::default()));
        let nb = notebook(&["x = 1", "y = x + 1"]);
        engine.run(&nb);
        let report = engine.run(&nb);
        assert!(report.executed.is_empty());
        assert_eq!(report.reused, vec![0, 1]);
        assert_eq!(counters(&engine), vec![1, 1]);
        assert!(engine.plan(&nb).stale_cells().is_empty());
    }

    #[test]
    fn test_edit_runs_only_dependents() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut engine = IncrementalEngine::new(Box::new(Recording {
            inner: Interpreter::default(),
            log: log.clone(),
        }));
        engine.run(&notebook(&["a = 1", "b = 2", "c = a + 1", "d = b + 1"]));
        log.borrow_mut().clear();

        let edited = notebook(&["a = 5", "b = 2", "c = a + 1", "d = b + 1"]);
        let plan = engine.plan(&edited);
        assert_eq!(plan.reason(0), Some(StaleReason::ContentChanged));
        assert_eq!(plan.reason(2), Some(StaleReason::UpstreamStale { provider: 0 }));
        assert_eq!(plan.stale_cells(), vec![0, 2]);

        let report = engine.run(&edited);
        assert_eq!(report.executed, vec![0, 2]);
        assert_eq!(*log.borrow(), vec!["a = 5".to_string(), "c = a + 1".to_string()]);
        assert_eq!(counters(&engine), vec![2, 1, 2, 1]);
    }

    #[test]
    fn test_failed_cell_blocks_dependents() {
        let mut engine = IncrementalEngine::new(Box::new(Interpreter::default()));
        engine.run(&notebook(&["x = 1", "y = x", "z = y", "w = 3"]));

        let report = engine.run(&notebook(&["x = 1", "y = x / 0", "z = y", "w = 3"]));
        assert_eq!(report.failed, vec![1]);
        assert_eq!(report.blocked, vec![2]);

        let blocked = engine.store().get(2).unwrap();
        assert_eq!(blocked.status, ExecutionStatus::Blocked);
        assert_eq!(blocked.execution_counter, 1);
        assert_eq!(blocked.blocked_by, Some(1));
        assert_eq!(blocked.output.error.as_ref().unwrap().kind, UPSTREAM_ERROR);
        assert_eq!(engine.store().get(0).unwrap().status, ExecutionStatus::Success);
        assert_eq!(engine.store().get(3).unwrap().execution_counter, 1);
    }

    #[test]
    fn test_fixing_error_unblocks() {
        let mut engine = IncrementalEngine::new(Box::new(Interpreter::default()));
        engine.run(&notebook(&["x = 1 / 0", "y = x"]));
        assert_eq!(engine.store().status(1), ExecutionStatus::Blocked);

        let report = engine.run(&notebook(&["x = 1", "y = x"]));
        assert_eq!(report.executed, vec![0, 1]);
        assert_eq!(engine.store().status(1), ExecutionStatus::Success);
        assert_eq!(counters(&engine), vec![2, 1]);
    }

    #[test]
    fn test_deleted_cells_drop_records_but_keep_names() {
        let mut engine = IncrementalEngine::new(Box::new(Interpreter::default()));
        engine.run(&notebook(&["x = 1", "old = 2"]));
        engine.run(&notebook(&["x = 1"]));
        assert_eq!(engine.store().len(), 1);
        assert!(engine.environment().contains("old"));
    }

    #[test]
    fn test_shifted_cell_is_not_reused() {
        let mut engine = IncrementalEngine::new(Box::new(Interpreter::default()));
        engine.run(&notebook(&["x = 1", "y = x * 2"]));
        let report = engine.run(&notebook(&["x = 1", "x = 5", "y = x * 2"]));
        assert_eq!(report.executed, vec![1, 2]);
        assert_eq!(engine.environment().get("y"), Some(crate::execute::Value::Int(10)));
    }

    #[test]
    fn test_kind_change_with_same_text_is_stale() {
        let mut engine = IncrementalEngine::new(Box::new(Interpreter::default()));
        let code = Notebook::parse("x = 1\n# %%\nprint(x)\n").unwrap();
        let markdown = Notebook::parse("x = 1\n# %% [markdown]\n# print(x)\n").unwrap();
        assert_eq!(code.cell(1).unwrap().content_hash, markdown.cell(1).unwrap().content_hash);

        engine.run(&code);
        let plan = engine.plan(&markdown);
        assert_eq!(plan.reason(1), Some(StaleReason::KindChanged));
        assert_eq!(plan.reason(0), None);

        let report = engine.run(&markdown);
        assert_eq!(report.reused, vec![0]);
        assert_eq!(engine.store().get(1).unwrap().kind, CellKind::Markdown);
        assert!(engine.store().get(1).unwrap().output.stdout.is_empty());

        assert_eq!(engine.plan(&code).reason(1), Some(StaleReason::KindChanged));
        let report = engine.run(&code);
        assert_eq!(report.executed, vec![1]);
        assert_eq!(engine.store().get(1).unwrap().output.stdout, "1\n");
    }

    #[test]
    fn test_inputs_changed_when_provider_moves() {
        let mut engine = IncrementalEngine::new(Box::new(Interpreter::default()));
        engine.run(&notebook(&["x = 1", "x = 2", "y = x"]));
        // Cell 2 keeps its text but `x` now resolves to cell 0.
        let nb = notebook(&["x = 1", "z = 2", "y = x"]);
        assert_eq!(engine.plan(&nb).reason(2), Some(StaleReason::InputsChanged));
    }
}
