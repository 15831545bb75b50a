//! Core engine for plaque incremental script notebooks.
//!
//! This crate provides:
//! - A cell splitter for `# %%` scripts and top-level string cells
//! - Static analysis of the names each cell defines and uses
//! - A dependency graph between cells
//! - An interpreter for cell code behind a pluggable backend trait
//! - An incremental engine that re-runs only stale cells
//! - Sessions with read-only JSON projections

pub mod error;
pub mod execute;
pub mod graph;
pub mod session;
mod stack;
pub mod state;
pub mod syntax;

pub use error::{Error, ParseError, Result};
pub use execute::{
    ExecutionBackend, ExecutionCallback, ExecutionPlan, IncrementalEngine, Interpreter,
    InterpreterConfig, RunReport, StaleReason,
};
pub use graph::{
    AnalysisNote, Cell, CellKind, DependencyEdge, DependencyGraph, Notebook, UnusedDefinition, split,
};
pub use session::{FileSource, NotebookSession, Resource, SessionConfig, SourceProvider};
pub use state::{CellError, CellOutput, Environment, ExecutionRecord, ExecutionStatus};
